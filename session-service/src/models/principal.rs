use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role label carried in token claims. The core does not interpret it
/// beyond round-tripping it for downstream authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Snapshot of an account as the session core sees it. Ownership of the full
/// profile lives with the user-account collaborator; the core reads this at
/// authentication time and re-reads it on every refresh to catch suspension.
#[derive(Debug, Clone, FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub suspended: bool,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(email: String, name: Option<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            role: Role::User,
            suspended: false,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    /// View safe to return to clients: never includes the password hash.
    pub fn view(&self) -> PrincipalView {
        PrincipalView {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalView {
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
    pub role: Role,
}
