use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::refresh_token::hash_token;
use crate::models::{ClientMeta, RefreshTokenRecord};

use super::ServiceError;

/// Persistence seam for active sessions, keyed by refresh-token digest.
/// Expiry is enforced here: `find` never returns an expired row, so callers
/// never recompute expiry ad hoc.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Store the digest of a raw token plus client metadata.
    async fn persist(
        &self,
        owner_id: Uuid,
        raw_token: &str,
        meta: &ClientMeta,
        ttl_days: i64,
    ) -> Result<(), ServiceError>;

    /// Look up by digest. Expired rows are treated as absent.
    async fn find(&self, raw_token: &str) -> Result<Option<RefreshTokenRecord>, ServiceError>;

    /// Atomically remove and return the row matching the digest. Of any
    /// number of concurrent callers presenting the same token, exactly one
    /// receives the row; the rest see `None`.
    async fn consume(&self, raw_token: &str) -> Result<Option<RefreshTokenRecord>, ServiceError>;

    /// Delete the row matching the digest. Idempotent.
    async fn revoke_one(&self, raw_token: &str) -> Result<(), ServiceError>;

    /// Delete every row for the owner. Returns the number of rows removed.
    async fn revoke_all(&self, owner_id: Uuid) -> Result<u64, ServiceError>;

    /// Count live (unexpired) rows for an owner.
    async fn count_active(&self, owner_id: Uuid) -> Result<u64, ServiceError>;

    /// Remove expired rows. Called opportunistically; correctness never
    /// depends on it because `find` filters on expiry.
    async fn purge_expired(&self) -> Result<u64, ServiceError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn persist(
        &self,
        owner_id: Uuid,
        raw_token: &str,
        meta: &ClientMeta,
        ttl_days: i64,
    ) -> Result<(), ServiceError> {
        let record = RefreshTokenRecord::new(owner_id, raw_token, meta, ttl_days);
        sqlx::query(
            "INSERT INTO refresh_tokens \
             (token_hash, owner_id, expires_at, ip, user_agent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.token_hash)
        .bind(record.owner_id)
        .bind(record.expires_at)
        .bind(&record.ip)
        .bind(&record.user_agent)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn find(&self, raw_token: &str) -> Result<Option<RefreshTokenRecord>, ServiceError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "SELECT token_hash, owner_id, expires_at, ip, user_agent, created_at \
             FROM refresh_tokens WHERE token_hash = $1 AND expires_at > now()",
        )
        .bind(hash_token(raw_token))
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(record)
    }

    async fn consume(&self, raw_token: &str) -> Result<Option<RefreshTokenRecord>, ServiceError> {
        // Single-statement delete-returning; concurrent rotations of the
        // same token race on the row lock and only one gets it back.
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            "DELETE FROM refresh_tokens \
             WHERE token_hash = $1 AND expires_at > now() \
             RETURNING token_hash, owner_id, expires_at, ip, user_agent, created_at",
        )
        .bind(hash_token(raw_token))
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(record)
    }

    async fn revoke_one(&self, raw_token: &str) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(hash_token(raw_token))
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn revoke_all(&self, owner_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(result.rows_affected())
    }

    async fn count_active(&self, owner_id: Uuid) -> Result<u64, ServiceError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM refresh_tokens \
             WHERE owner_id = $1 AND expires_at > now()",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(count as u64)
    }

    async fn purge_expired(&self) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(result.rows_affected())
    }
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    rows: DashMap<String, RefreshTokenRecord>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn persist(
        &self,
        owner_id: Uuid,
        raw_token: &str,
        meta: &ClientMeta,
        ttl_days: i64,
    ) -> Result<(), ServiceError> {
        let record = RefreshTokenRecord::new(owner_id, raw_token, meta, ttl_days);
        self.rows.insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn find(&self, raw_token: &str) -> Result<Option<RefreshTokenRecord>, ServiceError> {
        Ok(self
            .rows
            .get(&hash_token(raw_token))
            .map(|r| r.clone())
            .filter(|r| !r.is_expired()))
    }

    async fn consume(&self, raw_token: &str) -> Result<Option<RefreshTokenRecord>, ServiceError> {
        Ok(self
            .rows
            .remove(&hash_token(raw_token))
            .map(|(_, record)| record)
            .filter(|r| !r.is_expired()))
    }

    async fn revoke_one(&self, raw_token: &str) -> Result<(), ServiceError> {
        self.rows.remove(&hash_token(raw_token));
        Ok(())
    }

    async fn revoke_all(&self, owner_id: Uuid) -> Result<u64, ServiceError> {
        let before = self.rows.len();
        self.rows.retain(|_, r| r.owner_id != owner_id);
        Ok((before - self.rows.len()) as u64)
    }

    async fn count_active(&self, owner_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.owner_id == owner_id && !r.is_expired())
            .count() as u64)
    }

    async fn purge_expired(&self) -> Result<u64, ServiceError> {
        let before = self.rows.len();
        self.rows.retain(|_, r| !r.is_expired());
        Ok((before - self.rows.len()) as u64)
    }
}
