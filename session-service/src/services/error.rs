use service_core::error::AppError;
use thiserror::Error;

use super::token::TokenError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account suspended")]
    Suspended,

    /// Refresh-token reuse or revocation mid-chain: the whole login chain
    /// has been torn down and the client must authenticate from scratch.
    #[error("Session integrity compromised")]
    SessionRevoked,

    #[error("No session")]
    NoSession,

    #[error("Invalid or expired credential: {0}")]
    Credential(TokenError),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            // Generic message: never reveal whether the email exists or
            // which part of the credential was wrong.
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid email or password"))
            }
            ServiceError::Suspended => AppError::Forbidden(anyhow::anyhow!("Account suspended")),
            ServiceError::SessionRevoked => AppError::Forbidden(anyhow::anyhow!(
                "Session integrity compromised; please log in again"
            )),
            ServiceError::NoSession => {
                AppError::Unauthorized(anyhow::anyhow!("Not authenticated"))
            }
            ServiceError::Credential(_) => {
                AppError::Unauthorized(anyhow::anyhow!("Not authenticated"))
            }
            ServiceError::EmailTaken => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::InvalidToken => {
                AppError::BadRequest(anyhow::anyhow!("Invalid or expired token"))
            }
            ServiceError::PrincipalNotFound => {
                AppError::NotFound(anyhow::anyhow!("Account not found"))
            }
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
