use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::PrincipalView;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "correct horse battery staple", min_length = 8)]
    pub password: String,

    #[validate(length(max = 120, message = "Name is too long"))]
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "correct horse battery staple")]
    pub password: String,
}

/// Body returned whenever a session is established or rotated. The tokens
/// themselves ride in cookies, never in the body.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub principal: PrincipalView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OkResponse {
    #[schema(example = true)]
    pub ok: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Logged out")]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 120, message = "Name is too long"))]
    #[schema(example = "Jane Doe")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CsrfResponse {
    #[schema(example = "6b3a55e0261b0304143f805a24924d0c1c44524821305f31d9277843b8a10f4e")]
    pub csrf_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "session-service")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
}
