use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::refresh_token::hash_token;
use crate::models::{ActionKind, ActionToken};

use super::ServiceError;

/// Store for single-use action tokens (password reset). `consume` removes
/// the row in the same operation that returns it, so a token can never be
/// redeemed twice.
#[async_trait]
pub trait ActionTokenStore: Send + Sync {
    async fn persist(&self, token: &ActionToken) -> Result<(), ServiceError>;

    /// Fetch-and-delete. Returns the principal the token was issued to, or
    /// None when the token is unknown, expired, or already used.
    async fn consume(
        &self,
        raw_token: &str,
        kind: ActionKind,
    ) -> Result<Option<Uuid>, ServiceError>;

    /// Invalidate all outstanding tokens of a kind for a principal; called
    /// before issuing a new one so only the latest token is redeemable.
    async fn revoke_for(&self, principal_id: Uuid, kind: ActionKind) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct PgActionTokenStore {
    pool: PgPool,
}

impl PgActionTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionTokenStore for PgActionTokenStore {
    async fn persist(&self, token: &ActionToken) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO action_tokens (token_hash, principal_id, kind, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&token.token_hash)
        .bind(token.principal_id)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn consume(
        &self,
        raw_token: &str,
        kind: ActionKind,
    ) -> Result<Option<Uuid>, ServiceError> {
        // DELETE ... RETURNING makes consumption atomic: concurrent redeems
        // of the same token see at most one winner.
        let principal_id: Option<Uuid> = sqlx::query_scalar(
            "DELETE FROM action_tokens \
             WHERE token_hash = $1 AND kind = $2 AND expires_at > now() \
             RETURNING principal_id",
        )
        .bind(hash_token(raw_token))
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(principal_id)
    }

    async fn revoke_for(&self, principal_id: Uuid, kind: ActionKind) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM action_tokens WHERE principal_id = $1 AND kind = $2")
            .bind(principal_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(())
    }
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct MemoryActionTokenStore {
    rows: DashMap<String, ActionToken>,
}

impl MemoryActionTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionTokenStore for MemoryActionTokenStore {
    async fn persist(&self, token: &ActionToken) -> Result<(), ServiceError> {
        self.rows.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn consume(
        &self,
        raw_token: &str,
        kind: ActionKind,
    ) -> Result<Option<Uuid>, ServiceError> {
        let removed = self.rows.remove(&hash_token(raw_token));
        Ok(removed
            .map(|(_, t)| t)
            .filter(|t| t.kind == kind && !t.is_expired())
            .map(|t| t.principal_id))
    }

    async fn revoke_for(&self, principal_id: Uuid, kind: ActionKind) -> Result<(), ServiceError> {
        self.rows
            .retain(|_, t| !(t.principal_id == principal_id && t.kind == kind));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_is_single_use() {
        let store = MemoryActionTokenStore::new();
        let principal = Uuid::new_v4();
        let token = ActionToken::new(principal, "raw", ActionKind::PasswordReset, 30);
        store.persist(&token).await.unwrap();

        let first = store.consume("raw", ActionKind::PasswordReset).await.unwrap();
        assert_eq!(first, Some(principal));

        // Second redemption of the same token fails
        let second = store.consume("raw", ActionKind::PasswordReset).await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn expired_tokens_cannot_be_consumed() {
        let store = MemoryActionTokenStore::new();
        let mut token = ActionToken::new(Uuid::new_v4(), "raw", ActionKind::PasswordReset, 30);
        token.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        store.persist(&token).await.unwrap();

        assert_eq!(
            store.consume("raw", ActionKind::PasswordReset).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn revoke_for_invalidates_outstanding_tokens() {
        let store = MemoryActionTokenStore::new();
        let principal = Uuid::new_v4();
        let token = ActionToken::new(principal, "old", ActionKind::PasswordReset, 30);
        store.persist(&token).await.unwrap();

        store
            .revoke_for(principal, ActionKind::PasswordReset)
            .await
            .unwrap();
        assert_eq!(
            store.consume("old", ActionKind::PasswordReset).await.unwrap(),
            None
        );
    }
}
