use std::sync::Arc;

use uuid::Uuid;

use crate::{
    models::{ActionKind, ActionToken, AuthEvent, AuthEventKind, ClientMeta, Principal, PrincipalView},
    services::{
        ActionTokenStore, AuditLog, Mailer, PrincipalStore, RefreshTokenStore, ServiceError,
        TokenService,
    },
    utils::{hash_password, random_token, verify_password, Password, PasswordHashString},
};

/// A freshly minted session: the principal snapshot plus the raw token pair
/// the transport layer turns into cookies.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub principal: PrincipalView,
    pub access_token: String,
    pub refresh_token: String,
}

/// Session orchestrator. Owns every login-chain state transition; handlers
/// only translate between HTTP and these methods.
#[derive(Clone)]
pub struct SessionService {
    principals: Arc<dyn PrincipalStore>,
    sessions: Arc<dyn RefreshTokenStore>,
    actions: Arc<dyn ActionTokenStore>,
    tokens: TokenService,
    audit: AuditLog,
    mailer: Arc<dyn Mailer>,
    reset_ttl_minutes: i64,
}

impl SessionService {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        sessions: Arc<dyn RefreshTokenStore>,
        actions: Arc<dyn ActionTokenStore>,
        tokens: TokenService,
        audit: AuditLog,
        mailer: Arc<dyn Mailer>,
        reset_ttl_minutes: i64,
    ) -> Self {
        Self {
            principals,
            sessions,
            actions,
            tokens,
            audit,
            mailer,
            reset_ttl_minutes,
        }
    }

    pub async fn register(
        &self,
        email: String,
        password: String,
        name: Option<String>,
        meta: ClientMeta,
    ) -> Result<EstablishedSession, ServiceError> {
        if self
            .principals
            .find_by_email(&email)
            .await?
            .is_some()
        {
            return Err(ServiceError::EmailTaken);
        }

        let password_hash = hash_password(&Password::new(password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let principal = Principal::new(email, name, password_hash.into_string());
        self.principals.insert(&principal).await?;

        tracing::info!(principal_id = %principal.id, "Principal registered");

        let session = self.establish(&principal, &meta).await?;
        self.audit.record(AuthEvent::new(
            AuthEventKind::RegisterSuccess,
            Some(principal.id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(session)
    }

    pub async fn login(
        &self,
        email: String,
        password: String,
        meta: ClientMeta,
    ) -> Result<EstablishedSession, ServiceError> {
        let principal = match self.principals.find_by_email(&email).await? {
            Some(p) => p,
            None => {
                self.audit.record(
                    AuthEvent::new(
                        AuthEventKind::LoginFailure,
                        None,
                        meta.ip.clone(),
                        meta.user_agent.clone(),
                    )
                    .with_detail("unknown email"),
                );
                return Err(ServiceError::InvalidCredentials);
            }
        };

        // Suspension is checked before the password so a suspended account
        // never reveals whether the password was right.
        if principal.suspended {
            self.audit.record(
                AuthEvent::new(
                    AuthEventKind::LoginFailure,
                    Some(principal.id),
                    meta.ip.clone(),
                    meta.user_agent.clone(),
                )
                .with_detail("suspended"),
            );
            return Err(ServiceError::Suspended);
        }

        if verify_password(
            &Password::new(password),
            &PasswordHashString::new(principal.password_hash.clone()),
        )
        .is_err()
        {
            self.audit.record(
                AuthEvent::new(
                    AuthEventKind::LoginFailure,
                    Some(principal.id),
                    meta.ip.clone(),
                    meta.user_agent.clone(),
                )
                .with_detail("bad password"),
            );
            return Err(ServiceError::InvalidCredentials);
        }

        let session = self.establish(&principal, &meta).await?;
        self.audit.record(AuthEvent::new(
            AuthEventKind::LoginSuccess,
            Some(principal.id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(session)
    }

    /// Rotate a refresh token. The presented row is consumed atomically, so
    /// of any concurrent rotations of the same token at most one proceeds.
    /// A token that verifies cryptographically but consumes no row is
    /// treated as replay of a revoked token: every session the owner holds
    /// is torn down before the error is returned.
    pub async fn refresh(
        &self,
        raw_token: Option<&str>,
        meta: ClientMeta,
    ) -> Result<EstablishedSession, ServiceError> {
        let raw = raw_token.ok_or(ServiceError::NoSession)?;

        let claims = self.tokens.verify_refresh(raw).map_err(|e| {
            tracing::debug!(error = %e, "Refresh token failed verification");
            ServiceError::Credential(e)
        })?;

        let record = match self.sessions.consume(raw).await? {
            Some(record) => record,
            None => {
                let revoked = self.sessions.revoke_all(claims.sub).await?;
                tracing::warn!(
                    principal_id = %claims.sub,
                    sessions_revoked = revoked,
                    "Refresh token reuse detected; all sessions revoked"
                );
                self.audit.record(
                    AuthEvent::new(
                        AuthEventKind::RefreshTokenReuse,
                        Some(claims.sub),
                        meta.ip.clone(),
                        meta.user_agent.clone(),
                    )
                    .with_detail(format!("{} sessions revoked", revoked)),
                );
                return Err(ServiceError::SessionRevoked);
            }
        };

        let principal = match self.principals.find_by_id(record.owner_id).await? {
            Some(p) => p,
            None => {
                self.sessions.revoke_all(record.owner_id).await?;
                return Err(ServiceError::SessionRevoked);
            }
        };

        if principal.suspended {
            self.sessions.revoke_all(principal.id).await?;
            return Err(ServiceError::Suspended);
        }

        // The presented token is already consumed; establish() additionally
        // revokes any other row the owner still holds before persisting the
        // replacement.
        let session = self.establish(&principal, &meta).await?;
        self.audit.record(AuthEvent::new(
            AuthEventKind::RefreshSuccess,
            Some(principal.id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(session)
    }

    /// Best-effort logout. Succeeds even when no valid session is presented
    /// so clients can always clear their cookies.
    pub async fn logout(
        &self,
        raw_token: Option<&str>,
        meta: ClientMeta,
    ) -> Result<(), ServiceError> {
        let principal_id = raw_token
            .and_then(|raw| self.tokens.verify_refresh(raw).ok())
            .map(|claims| claims.sub);

        if let Some(raw) = raw_token {
            self.sessions.revoke_one(raw).await?;
        }

        self.audit.record(AuthEvent::new(
            AuthEventKind::Logout,
            principal_id,
            meta.ip,
            meta.user_agent,
        ));
        Ok(())
    }

    pub async fn current(&self, principal_id: Uuid) -> Result<PrincipalView, ServiceError> {
        self.principals
            .find_by_id(principal_id)
            .await?
            .map(|p| p.view())
            .ok_or(ServiceError::PrincipalNotFound)
    }

    pub async fn update_profile(
        &self,
        principal_id: Uuid,
        name: Option<String>,
    ) -> Result<PrincipalView, ServiceError> {
        let principal = self
            .principals
            .find_by_id(principal_id)
            .await?
            .ok_or(ServiceError::PrincipalNotFound)?;

        self.principals
            .set_name(principal.id, name.as_deref())
            .await?;
        self.current(principal.id).await
    }

    /// Change password with re-authentication, then drop every session so
    /// anything minted under the old password stops working.
    pub async fn change_password(
        &self,
        principal_id: Uuid,
        current_password: String,
        new_password: String,
        meta: ClientMeta,
    ) -> Result<(), ServiceError> {
        let principal = self
            .principals
            .find_by_id(principal_id)
            .await?
            .ok_or(ServiceError::PrincipalNotFound)?;

        if verify_password(
            &Password::new(current_password),
            &PasswordHashString::new(principal.password_hash.clone()),
        )
        .is_err()
        {
            return Err(ServiceError::InvalidCredentials);
        }

        let password_hash = hash_password(&Password::new(new_password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;
        self.principals
            .set_password_hash(principal.id, password_hash.as_str())
            .await?;

        let revoked = self.sessions.revoke_all(principal.id).await?;
        tracing::info!(
            principal_id = %principal.id,
            sessions_revoked = revoked,
            "Password changed"
        );
        self.audit.record(AuthEvent::new(
            AuthEventKind::PasswordChange,
            Some(principal.id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(())
    }

    pub async fn delete_account(
        &self,
        principal_id: Uuid,
        meta: ClientMeta,
    ) -> Result<(), ServiceError> {
        let principal = self
            .principals
            .find_by_id(principal_id)
            .await?
            .ok_or(ServiceError::PrincipalNotFound)?;

        self.sessions.revoke_all(principal.id).await?;
        self.actions
            .revoke_for(principal.id, ActionKind::PasswordReset)
            .await?;
        self.principals.delete(principal.id).await?;

        tracing::info!(principal_id = %principal.id, "Account deleted");
        self.audit.record(AuthEvent::new(
            AuthEventKind::AccountDeleted,
            Some(principal.id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(())
    }

    /// Issue a password-reset token. Always succeeds from the caller's view
    /// so the endpoint cannot be used to probe which emails exist.
    pub async fn request_password_reset(
        &self,
        email: String,
        meta: ClientMeta,
    ) -> Result<(), ServiceError> {
        let principal = match self.principals.find_by_email(&email).await? {
            Some(p) if !p.suspended => p,
            _ => {
                tracing::debug!("Password reset requested for unknown or suspended account");
                return Ok(());
            }
        };

        // Only the newest token stays redeemable
        self.actions
            .revoke_for(principal.id, ActionKind::PasswordReset)
            .await?;

        let raw = random_token();
        let token = ActionToken::new(
            principal.id,
            &raw,
            ActionKind::PasswordReset,
            self.reset_ttl_minutes,
        );
        self.actions.persist(&token).await?;
        self.mailer.send_password_reset(&principal.email, &raw).await?;

        self.audit.record(AuthEvent::new(
            AuthEventKind::PasswordResetRequest,
            Some(principal.id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        raw_token: String,
        new_password: String,
        meta: ClientMeta,
    ) -> Result<(), ServiceError> {
        let principal_id = self
            .actions
            .consume(&raw_token, ActionKind::PasswordReset)
            .await?
            .ok_or(ServiceError::InvalidToken)?;

        let password_hash = hash_password(&Password::new(new_password)).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;
        self.principals
            .set_password_hash(principal_id, password_hash.as_str())
            .await?;
        self.sessions.revoke_all(principal_id).await?;

        tracing::info!(principal_id = %principal_id, "Password reset completed");
        self.audit.record(AuthEvent::new(
            AuthEventKind::PasswordResetConfirm,
            Some(principal_id),
            meta.ip,
            meta.user_agent,
        ));
        Ok(())
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Mint a token pair and persist the refresh half. Prior sessions for
    /// the owner are revoked first so exactly one chain is live afterwards.
    async fn establish(
        &self,
        principal: &Principal,
        meta: &ClientMeta,
    ) -> Result<EstablishedSession, ServiceError> {
        self.sessions.revoke_all(principal.id).await?;

        let access_token = self
            .tokens
            .sign_access(principal)
            .map_err(ServiceError::Internal)?;
        let refresh_token = self
            .tokens
            .sign_refresh(principal)
            .map_err(ServiceError::Internal)?;

        self.sessions
            .persist(
                principal.id,
                &refresh_token,
                meta,
                self.tokens.refresh_ttl_days(),
            )
            .await?;

        Ok(EstablishedSession {
            principal: principal.view(),
            access_token,
            refresh_token,
        })
    }
}
