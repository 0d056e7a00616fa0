//! Shared setup for session-service integration tests: an app wired to
//! in-memory stores, plus cookie plumbing for multi-request flows.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

use service_core::middleware::rate_limit::create_ip_rate_limiter;

use session_service::{
    build_router,
    config::{
        CookieConfig, CsrfConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig,
        SessionConfig,
    },
    cookies::CookieManager,
    services::{
        AuditLog, Mailer, MemoryActionTokenStore, MemoryAuthEventSink, MemoryPrincipalStore,
        MemoryRefreshTokenStore, ServiceError, SessionService, TokenService,
    },
    AppState,
};

pub const TEST_SECRET: &str = "integration-test-signing-secret-0123456789";

/// Mailer that captures reset tokens so tests can redeem them.
#[derive(Default)]
pub struct CapturingMailer {
    pub tokens: Mutex<Vec<String>>,
}

#[service_core::axum::async_trait]
impl Mailer for CapturingMailer {
    async fn send_password_reset(&self, _email: &str, token: &str) -> Result<(), ServiceError> {
        self.tokens
            .lock()
            .expect("mailer lock poisoned")
            .push(token.to_string());
        Ok(())
    }
}

impl CapturingMailer {
    pub fn last_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .expect("mailer lock poisoned")
            .last()
            .cloned()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub principals: Arc<MemoryPrincipalStore>,
    pub sessions: Arc<MemoryRefreshTokenStore>,
    pub actions: Arc<MemoryActionTokenStore>,
    pub sink: Arc<MemoryAuthEventSink>,
    pub mailer: Arc<CapturingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_environment(Environment::Dev)
    }

    pub fn with_environment(environment: Environment) -> Self {
        Self::from_config(test_config(environment))
    }

    pub fn with_login_limit(attempts: u32) -> Self {
        let mut config = test_config(Environment::Dev);
        config.rate_limit.login_attempts = attempts;
        Self::from_config(config)
    }

    pub fn from_config(config: SessionConfig) -> Self {
        let principals = Arc::new(MemoryPrincipalStore::new());
        let sessions = Arc::new(MemoryRefreshTokenStore::new());
        let actions = Arc::new(MemoryActionTokenStore::new());
        let sink = Arc::new(MemoryAuthEventSink::new());
        let mailer = Arc::new(CapturingMailer::default());

        let tokens = TokenService::new(&config.jwt, config.effective_secret());
        let cookies = CookieManager::new(
            &config.cookies,
            config.environment,
            tokens.access_ttl_seconds(),
            tokens.refresh_ttl_days(),
        );
        let session_service = SessionService::new(
            principals.clone(),
            sessions.clone(),
            actions.clone(),
            tokens.clone(),
            AuditLog::new(sink.clone()),
            mailer.clone(),
            config.jwt.reset_ttl_minutes,
        );

        let state = AppState {
            config: config.clone(),
            pool: None,
            tokens,
            cookies,
            sessions: session_service,
            login_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            register_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.register_attempts,
                config.rate_limit.register_window_seconds,
            ),
            password_reset_rate_limiter: create_ip_rate_limiter(
                config.rate_limit.password_reset_attempts,
                config.rate_limit.password_reset_window_seconds,
            ),
        };

        Self {
            state,
            principals,
            sessions,
            actions,
            sink,
            mailer,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router().oneshot(req).await.expect("request failed")
    }

    /// POST a JSON body, optionally with a cookie jar and CSRF header.
    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        jar: &CookieStore,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie_header) = jar.header() {
            builder = builder.header(header::COOKIE, cookie_header);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn register(&self, email: &str, password: &str) -> CookieStore {
        let mut jar = CookieStore::default();
        let response = self
            .post_json(
                "/auth/register",
                serde_json::json!({ "email": email, "password": password }),
                &jar,
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        jar.absorb(&response);
        jar
    }

    pub async fn login(&self, email: &str, password: &str) -> (CookieStore, StatusCode) {
        let mut jar = CookieStore::default();
        let response = self
            .post_json(
                "/auth/login",
                serde_json::json!({ "email": email, "password": password }),
                &jar,
            )
            .await;
        let status = response.status();
        jar.absorb(&response);
        (jar, status)
    }
}

/// Minimal client-side cookie jar: keeps the latest value per cookie name
/// and drops cookies the server expires.
#[derive(Default, Clone)]
pub struct CookieStore {
    cookies: HashMap<String, String>,
}

impl CookieStore {
    /// Apply every Set-Cookie header from a response.
    pub fn absorb(&mut self, response: &Response<Body>) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some(pair) = raw.split(';').next() else { continue };
            let Some((name, val)) = pair.split_once('=') else { continue };
            if val.is_empty() {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), val.to_string());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_string(), value.to_string());
    }

    pub fn header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body was not valid JSON")
}

fn test_config(environment: Environment) -> SessionConfig {
    SessionConfig {
        common: service_core::config::Config { port: 0 },
        environment,
        service_name: "session-service".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "warn".to_string(),
        allowed_origins: vec!["http://localhost:3000".to_string()],
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_ttl_minutes: 30,
            refresh_ttl_days: 14,
            reset_ttl_minutes: 30,
            allow_insecure_defaults: false,
        },
        cookies: CookieConfig {
            api_path: "/auth".to_string(),
            domain: None,
        },
        csrf: CsrfConfig {
            bypass_prefixes: vec![
                "/auth/register".to_string(),
                "/auth/login".to_string(),
                "/auth/refresh".to_string(),
                "/auth/logout".to_string(),
                "/auth/password-reset".to_string(),
                "/health".to_string(),
            ],
        },
        rate_limit: RateLimitConfig {
            // Generous so unrelated tests never trip the limiter
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
            password_reset_attempts: 100,
            password_reset_window_seconds: 60,
        },
    }
}
