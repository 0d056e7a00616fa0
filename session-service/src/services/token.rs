use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{JwtConfig, INSECURE_DEV_SECRET};
use crate::models::{Principal, Role};

/// Verification failures, kept distinct for logging even though callers
/// treat all three as "unauthenticated".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    SignatureInvalid,
}

/// Discriminates access from refresh tokens so one can never be presented
/// as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: uuid::Uuid,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// Credential signer: mints and verifies the access/refresh token pair
/// against the configured server secret (HS256).
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
}

impl TokenService {
    pub fn new(config: &JwtConfig, effective_secret: &str) -> Self {
        if effective_secret == INSECURE_DEV_SECRET {
            tracing::warn!(
                "SIGNING WITH THE INSECURE DEVELOPMENT SECRET - tokens offer no protection; \
                 set SESSION_SIGNING_SECRET before deploying"
            );
        }

        Self {
            encoding_key: EncodingKey::from_secret(effective_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(effective_secret.as_bytes()),
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
        }
    }

    pub fn sign_access(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        self.sign_access_at(principal, Utc::now())
    }

    pub fn sign_access_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        let exp = now + Duration::minutes(self.access_ttl_minutes);
        self.sign(principal, TokenKind::Access, now, exp)
    }

    pub fn sign_refresh(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        self.sign_refresh_at(principal, Utc::now())
    }

    pub fn sign_refresh_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        let exp = now + Duration::days(self.refresh_ttl_days);
        self.sign(principal, TokenKind::Refresh, now, exp)
    }

    fn sign(
        &self,
        principal: &Principal,
        kind: TokenKind,
        now: DateTime<Utc>,
        exp: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        let claims = Claims {
            sub: principal.id,
            email: principal.email.clone(),
            role: principal.role,
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode {:?} token: {}", kind, e))
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, TokenKind::Access, Utc::now())
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, TokenKind::Refresh, Utc::now())
    }

    /// Verify signature and shape, then check expiry against the supplied
    /// clock. Expiry is checked here rather than by the JWT library so tests
    /// can advance time without sleeping.
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.kind != expected {
            return Err(TokenError::Malformed);
        }
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_minutes * 60
    }

    pub fn refresh_ttl_days(&self) -> i64 {
        self.refresh_ttl_days
    }
}
