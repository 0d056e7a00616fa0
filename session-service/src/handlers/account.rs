use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::auth::{ChangePasswordRequest, MessageResponse, SessionResponse, UpdateProfileRequest},
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

use super::Meta;

/// Current principal behind the access token
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current principal", body = SessionResponse),
        (status = 401, description = "Not authenticated", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Account no longer exists", body = crate::dtos::ErrorResponse)
    ),
    tag = "Account",
    security(("cookie_auth" = []))
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.sessions.current(user.0.sub).await?;
    Ok(Json(SessionResponse { principal }))
}

/// Update profile fields
#[utoipa::path(
    patch,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = SessionResponse),
        (status = 401, description = "Not authenticated", body = crate::dtos::ErrorResponse),
        (status = 403, description = "CSRF token missing or mismatched", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Account",
    security(("cookie_auth" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let principal = state.sessions.update_profile(user.0.sub, req.name).await?;
    Ok(Json(SessionResponse { principal }))
}

/// Change password; requires the current password and ends every session
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; re-login required", body = MessageResponse),
        (status = 401, description = "Current password incorrect", body = crate::dtos::ErrorResponse),
        (status = 403, description = "CSRF token missing or mismatched", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Account",
    security(("cookie_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    user: AuthUser,
    meta: Meta,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Response {
    match state
        .sessions
        .change_password(user.0.sub, req.current_password, req.new_password, meta.0)
        .await
    {
        // All sessions are gone server-side; clear the client too
        Ok(()) => (
            state.cookies.clear(jar),
            Json(MessageResponse {
                message: "Password changed; please log in again".to_string(),
            }),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// Delete the account and every session it owns
#[utoipa::path(
    delete,
    path = "/auth/account",
    responses(
        (status = 200, description = "Account deleted", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::dtos::ErrorResponse),
        (status = 403, description = "CSRF token missing or mismatched", body = crate::dtos::ErrorResponse)
    ),
    tag = "Account",
    security(("cookie_auth" = []))
)]
pub async fn delete_account(
    State(state): State<AppState>,
    jar: CookieJar,
    user: AuthUser,
    meta: Meta,
) -> Response {
    match state.sessions.delete_account(user.0.sub, meta.0).await {
        Ok(()) => (
            state.cookies.clear(jar),
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Account deleted".to_string(),
                }),
            ),
        )
            .into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}
