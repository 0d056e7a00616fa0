use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Principal;

use super::ServiceError;

/// Seam to the user-account collaborator. The session core only ever reads
/// snapshots through this trait and writes the few fields it owns
/// (password hash, profile name); everything else about accounts lives
/// outside this subsystem.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, ServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, ServiceError>;
    async fn insert(&self, principal: &Principal) -> Result<(), ServiceError>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), ServiceError>;
    async fn set_name(&self, id: Uuid, name: Option<&str>) -> Result<(), ServiceError>;
    async fn set_suspended(&self, id: Uuid, suspended: bool) -> Result<(), ServiceError>;
    async fn delete(&self, id: Uuid) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PRINCIPAL_COLUMNS: &str =
    "id, email, name, role, suspended, password_hash, created_at, updated_at";

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, ServiceError> {
        sqlx::query_as::<_, Principal>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::Database)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, ServiceError> {
        sqlx::query_as::<_, Principal>(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ServiceError::Database)
    }

    async fn insert(&self, principal: &Principal) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO principals \
             (id, email, name, role, suspended, password_hash, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(principal.id)
        .bind(&principal.email)
        .bind(&principal.name)
        .bind(principal.role)
        .bind(principal.suspended)
        .bind(&principal.password_hash)
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), ServiceError> {
        sqlx::query("UPDATE principals SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn set_name(&self, id: Uuid, name: Option<&str>) -> Result<(), ServiceError> {
        sqlx::query("UPDATE principals SET name = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn set_suspended(&self, id: Uuid, suspended: bool) -> Result<(), ServiceError> {
        sqlx::query("UPDATE principals SET suspended = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(suspended)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM principals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ServiceError::Database)?;
        Ok(())
    }
}

/// In-memory store for tests and local development.
#[derive(Default)]
pub struct MemoryPrincipalStore {
    rows: DashMap<Uuid, Principal>,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, ServiceError> {
        Ok(self
            .rows
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .map(|p| p.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, ServiceError> {
        Ok(self.rows.get(&id).map(|p| p.clone()))
    }

    async fn insert(&self, principal: &Principal) -> Result<(), ServiceError> {
        self.rows.insert(principal.id, principal.clone());
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), ServiceError> {
        if let Some(mut p) = self.rows.get_mut(&id) {
            p.password_hash = password_hash.to_string();
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_name(&self, id: Uuid, name: Option<&str>) -> Result<(), ServiceError> {
        if let Some(mut p) = self.rows.get_mut(&id) {
            p.name = name.map(|n| n.to_string());
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_suspended(&self, id: Uuid, suspended: bool) -> Result<(), ServiceError> {
        if let Some(mut p) = self.rows.get_mut(&id) {
            p.suspended = suspended;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.rows.remove(&id);
        Ok(())
    }
}
