use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lifecycle events recorded for forensic review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    RegisterSuccess,
    LoginSuccess,
    LoginFailure,
    RefreshSuccess,
    /// A cryptographically valid refresh token was presented but its digest
    /// was absent from the store: theft/replay signal.
    RefreshTokenReuse,
    Logout,
    PasswordChange,
    PasswordResetRequest,
    PasswordResetConfirm,
    AccountDeleted,
}

impl AuthEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventKind::RegisterSuccess => "register_success",
            AuthEventKind::LoginSuccess => "login_success",
            AuthEventKind::LoginFailure => "login_failure",
            AuthEventKind::RefreshSuccess => "refresh_success",
            AuthEventKind::RefreshTokenReuse => "refresh_token_reuse",
            AuthEventKind::Logout => "logout",
            AuthEventKind::PasswordChange => "password_change",
            AuthEventKind::PasswordResetRequest => "password_reset_request",
            AuthEventKind::PasswordResetConfirm => "password_reset_confirm",
            AuthEventKind::AccountDeleted => "account_deleted",
        }
    }
}

/// Append-only auth log entry. The core never mutates or deletes these;
/// retention is an external concern.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub id: Uuid,
    pub principal_id: Option<Uuid>,
    pub kind: AuthEventKind,
    pub ip: String,
    pub user_agent: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventKind, principal_id: Option<Uuid>, ip: String, user_agent: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id,
            kind,
            ip,
            user_agent,
            detail: None,
            at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
