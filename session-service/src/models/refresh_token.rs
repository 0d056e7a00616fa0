use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Client metadata captured when a session is established, kept for
/// forensic review alongside the token row.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

/// One active session: the SHA-256 digest of a refresh token plus owner,
/// expiry and client metadata. The raw token value is never stored.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub owner_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub ip: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(owner_id: Uuid, raw_token: &str, meta: &ClientMeta, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            token_hash: hash_token(raw_token),
            owner_id,
            expires_at: now + Duration::days(ttl_days),
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Digest a raw refresh token for storage and lookup. A fast one-way hash is
/// deliberate: lookups happen on every refresh, and the input is a
/// high-entropy signed token, not a password.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_stores_digest_not_raw_value() {
        let record = RefreshTokenRecord::new(
            Uuid::new_v4(),
            "raw-token-value",
            &ClientMeta::default(),
            14,
        );
        assert_ne!(record.token_hash, "raw-token-value");
        assert_eq!(record.token_hash, hash_token("raw-token-value"));
        assert_eq!(record.token_hash.len(), 64);
        assert!(!record.is_expired());
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn expiry_is_relative_to_creation() {
        let mut record =
            RefreshTokenRecord::new(Uuid::new_v4(), "t", &ClientMeta::default(), 14);
        assert!(!record.is_expired());
        record.expires_at = Utc::now() - Duration::seconds(1);
        assert!(record.is_expired());
    }
}
