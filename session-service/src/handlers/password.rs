use axum::{extract::State, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::auth::{MessageResponse, PasswordResetConfirm, PasswordResetRequest},
    utils::ValidatedJson,
    AppState,
};

use super::Meta;

/// Request a password-reset token
///
/// Responds identically whether or not the email is registered.
#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset token issued if the account exists", body = MessageResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 429, description = "Too many attempts", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Password reset"
)]
pub async fn request_reset(
    State(state): State<AppState>,
    meta: Meta,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.request_password_reset(req.email, meta.0).await?;
    Ok(Json(MessageResponse {
        message: "If that email is registered, a reset link is on its way".to_string(),
    }))
}

/// Redeem a reset token and set a new password
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password reset; re-login required", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Password reset"
)]
pub async fn confirm_reset(
    State(state): State<AppState>,
    meta: Meta,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    state
        .sessions
        .confirm_password_reset(req.token, req.new_password, meta.0)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password reset; please log in with your new password".to_string(),
    }))
}
