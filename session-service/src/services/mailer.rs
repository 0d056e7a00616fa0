use async_trait::async_trait;

use super::ServiceError;

/// Outbound delivery seam. Actual email transport is an external
/// collaborator; this service only hands it the reset token.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), ServiceError>;
}

/// Development/test mailer: logs instead of sending.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, email: &str, _token: &str) -> Result<(), ServiceError> {
        tracing::info!(email = %email, "Password reset token issued (delivery delegated)");
        Ok(())
    }
}
