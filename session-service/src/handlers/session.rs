use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;

use crate::{
    cookies::REFRESH_COOKIE,
    dtos::auth::{CsrfResponse, LoginRequest, OkResponse, RegisterRequest, SessionResponse},
    services::EstablishedSession,
    utils::{random_token, ValidatedJson},
    AppState,
};

use super::Meta;

/// Create an account and establish a session in one step
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, session established", body = SessionResponse),
        (status = 409, description = "Email already registered", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: Meta,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .sessions
        .register(req.email, req.password, req.name, meta.0)
        .await?;
    Ok(with_session_cookies(&state, jar, session, StatusCode::CREATED))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session established", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::dtos::ErrorResponse),
        (status = 403, description = "Account suspended", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: Meta,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.login(req.email, req.password, meta.0).await?;
    Ok(with_session_cookies(&state, jar, session, StatusCode::OK))
}

/// Rotate the refresh token and mint a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Session rotated", body = OkResponse),
        (status = 401, description = "No valid refresh token", body = crate::dtos::ErrorResponse),
        (status = 403, description = "Token reuse detected; all sessions revoked", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn refresh(State(state): State<AppState>, jar: CookieJar, meta: Meta) -> Response {
    let raw = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());

    match state.sessions.refresh(raw.as_deref(), meta.0).await {
        Ok(session) => {
            let csrf = random_token();
            let jar = state
                .cookies
                .issue(jar, &session.access_token, &session.refresh_token, &csrf);
            (jar, Json(OkResponse { ok: true })).into_response()
        }
        // Any refresh failure invalidates the cookies on the client so the
        // browser stops replaying a dead session.
        Err(e) => (state.cookies.clear(jar), AppError::from(e)).into_response(),
    }
}

/// End the current session and clear cookies
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out; cookies cleared"),
        (status = 500, description = "Internal server error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Session"
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar, meta: Meta) -> Response {
    let raw = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let cleared = state.cookies.clear(jar);

    // 204 regardless of whether a session existed
    match state.sessions.logout(raw.as_deref(), meta.0).await {
        Ok(()) => (cleared, StatusCode::NO_CONTENT).into_response(),
        Err(e) => (cleared, AppError::from(e)).into_response(),
    }
}

/// Mint a CSRF token for the double-submit check
#[utoipa::path(
    get,
    path = "/auth/csrf",
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfResponse)
    ),
    tag = "Session"
)]
pub async fn csrf(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let token = random_token();
    let jar = state.cookies.issue_csrf(jar, &token);
    (jar, Json(CsrfResponse { csrf_token: token }))
}

fn with_session_cookies(
    state: &AppState,
    jar: CookieJar,
    session: EstablishedSession,
    status: StatusCode,
) -> impl IntoResponse {
    let csrf = random_token();
    let jar = state
        .cookies
        .issue(jar, &session.access_token, &session.refresh_token, &csrf);
    (
        jar,
        (
            status,
            Json(SessionResponse {
                principal: session.principal,
            }),
        ),
    )
}
