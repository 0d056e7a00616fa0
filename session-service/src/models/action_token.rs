use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::refresh_token::hash_token;

/// What a single-use action token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    PasswordReset,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::PasswordReset => "password_reset",
        }
    }
}

/// Short-lived single-use token gating a one-time action (password reset).
/// Stored by digest like refresh tokens, and deleted on consumption: the
/// same reuse-detection philosophy at smaller scale.
#[derive(Debug, Clone)]
pub struct ActionToken {
    pub token_hash: String,
    pub principal_id: Uuid,
    pub kind: ActionKind,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActionToken {
    pub fn new(principal_id: Uuid, raw_token: &str, kind: ActionKind, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        Self {
            token_hash: hash_token(raw_token),
            principal_id,
            kind,
            expires_at: now + Duration::minutes(ttl_minutes),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_stored_by_digest() {
        let token = ActionToken::new(Uuid::new_v4(), "raw", ActionKind::PasswordReset, 30);
        assert_ne!(token.token_hash, "raw");
        assert!(!token.is_expired());
    }

    #[test]
    fn expiry_honors_ttl() {
        let mut token = ActionToken::new(Uuid::new_v4(), "raw", ActionKind::PasswordReset, 30);
        token.expires_at = Utc::now() - Duration::seconds(1);
        assert!(token.is_expired());
    }
}
