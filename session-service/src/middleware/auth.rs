use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;

use crate::{cookies::ACCESS_COOKIE, services::Claims, AppState};

/// Require a valid access token. Accepts a Bearer header first, falling
/// back to the HttpOnly access cookie browsers send automatically.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    let token = bearer
        .or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not authenticated")))?;

    let claims = state.tokens.verify_access(&token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AppError::Unauthorized(anyhow::anyhow!("Not authenticated"))
    })?;

    // Handlers read the claims from request extensions
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor handing verified claims to handlers behind `auth_middleware`.
pub struct AuthUser(pub Claims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<Claims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Auth claims missing from request extensions"))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}
