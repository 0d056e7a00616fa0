use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;
use subtle::ConstantTimeEq;

use crate::{cookies::CSRF_COOKIE, AppState};

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Double-submit CSRF check for state-changing requests.
///
/// Safe methods pass untouched, as do paths on the configured bypass list
/// (endpoints that establish or tear down the session itself, which a
/// client may call before it holds a CSRF cookie). Everything else must
/// send the CSRF cookie and echo its value in the `x-csrf-token` header.
pub async fn csrf_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    if is_safe(req.method()) || is_bypassed(&state, req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match (cookie, header) {
        (Some(cookie), Some(header))
            if !cookie.is_empty()
                && cookie.as_bytes().ct_eq(header.as_bytes()).into() =>
        {
            Ok(next.run(req).await)
        }
        _ => {
            tracing::debug!(path = req.uri().path(), "CSRF check failed");
            Err(AppError::CsrfMismatch)
        }
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn is_bypassed(state: &AppState, path: &str) -> bool {
    state
        .config
        .csrf
        .bypass_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
}
