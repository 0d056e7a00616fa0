pub mod config;
pub mod cookies;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::SessionConfig;
use crate::cookies::CookieManager;
use crate::dtos::auth::HealthResponse;
use crate::services::{SessionService, TokenService};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::session::register,
        handlers::session::login,
        handlers::session::refresh,
        handlers::session::logout,
        handlers::session::csrf,
        handlers::account::me,
        handlers::account::update_profile,
        handlers::account::change_password,
        handlers::account::delete_account,
        handlers::password::request_reset,
        handlers::password::confirm_reset,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::SessionResponse,
            dtos::auth::OkResponse,
            dtos::auth::MessageResponse,
            dtos::auth::UpdateProfileRequest,
            dtos::auth::ChangePasswordRequest,
            dtos::auth::PasswordResetRequest,
            dtos::auth::PasswordResetConfirm,
            dtos::auth::CsrfResponse,
            dtos::auth::HealthResponse,
            models::PrincipalView,
            models::Role,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Session", description = "Session establishment, rotation and teardown"),
        (name = "Account", description = "Authenticated account management"),
        (name = "Password reset", description = "Token-based password recovery"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::cookies::ACCESS_COOKIE,
                ))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: SessionConfig,
    /// Absent when running against in-memory stores.
    pub pool: Option<PgPool>,
    pub tokens: TokenService,
    pub cookies: CookieManager,
    pub sessions: SessionService,
    pub login_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub register_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
    pub password_reset_rate_limiter: service_core::middleware::rate_limit::IpRateLimiter,
}

pub fn build_router(state: AppState) -> Router {
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/auth/login", post(handlers::session::login))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let register_limiter = state.register_rate_limiter.clone();
    let register_route = Router::new()
        .route("/auth/register", post(handlers::session::register))
        .layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    let reset_request_limiter = state.password_reset_rate_limiter.clone();
    let reset_request_route = Router::new()
        .route(
            "/auth/password-reset/request",
            post(handlers::password::request_reset),
        )
        .layer(from_fn_with_state(
            reset_request_limiter,
            ip_rate_limit_middleware,
        ));

    // Routes behind the access-token check
    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::account::me))
        .route("/auth/profile", patch(handlers::account::update_profile))
        .route(
            "/auth/change-password",
            post(handlers::account::change_password),
        )
        .route("/auth/account", delete(handlers::account::delete_account))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let cors_origins: Vec<service_core::axum::http::HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| {
            o.parse()
                .map_err(|e| tracing::error!(origin = %o, error = %e, "Invalid CORS origin"))
                .ok()
        })
        .collect();

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/csrf", get(handlers::session::csrf))
        .route("/auth/refresh", post(handlers::session::refresh))
        .route("/auth/logout", post(handlers::session::logout))
        .route(
            "/auth/password-reset/confirm",
            post(handlers::password::confirm_reset),
        )
        .merge(login_route)
        .merge(register_route)
        .merge(reset_request_route)
        .merge(protected_routes)
        // CSRF runs above routing so every mutating endpoint is covered
        .layer(from_fn_with_state(
            state.clone(),
            middleware::csrf_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origins)
                .allow_credentials(true)
                .allow_headers([
                    service_core::axum::http::header::CONTENT_TYPE,
                    service_core::axum::http::HeaderName::from_static(
                        middleware::CSRF_HEADER,
                    ),
                ])
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::POST,
                    service_core::axum::http::Method::PATCH,
                    service_core::axum::http::Method::DELETE,
                ]),
        )
}

/// Service health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let healthy = match &state.pool {
        Some(pool) => db::health_check(pool).await.is_ok(),
        None => true,
    };

    let body = Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        service: state.config.service_name.clone(),
        version: state.config.service_version.clone(),
    });

    if healthy {
        Ok((StatusCode::OK, body))
    } else {
        Ok((StatusCode::SERVICE_UNAVAILABLE, body))
    }
}
