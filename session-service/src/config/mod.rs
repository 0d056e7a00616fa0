use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Fallback signing secret for local development. Only ever used when
/// `SESSION_ALLOW_INSECURE_DEFAULTS=true`, and loudly warned about at startup.
pub const INSECURE_DEV_SECRET: &str = "insecure-dev-secret-do-not-use-in-production";

/// Secrets that are obviously copied from documentation or examples.
/// Rejected outright in production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "secret",
    "changeme",
    "change-me",
    "dev-secret",
    "insecure",
    "password",
    "jwt-secret",
    "your-secret-here",
    INSECURE_DEV_SECRET,
];

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// Origins allowed to call the API with credentials. Wildcards are not
    /// usable here; CORS with cookies requires explicit origins.
    pub allowed_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    pub csrf: CsrfConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing secret shared by access and refresh tokens.
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    /// Lifetime of single-use password-reset tokens.
    pub reset_ttl_minutes: i64,
    /// Opt-in gate for the insecure development fallback secret.
    pub allow_insecure_defaults: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    /// Path prefix the access/refresh cookies are scoped to.
    pub api_path: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    /// Path prefixes exempt from CSRF verification, matched before the
    /// token comparison. These endpoints must be reachable without an
    /// existing session (or carry their own credential, like refresh).
    pub bypass_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub password_reset_attempts: u32,
    pub password_reset_window_seconds: u64,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = SessionConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("session-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
            },
            jwt: JwtConfig {
                secret: get_env("SESSION_SIGNING_SECRET", Some(""), is_prod)?,
                access_ttl_minutes: get_env("SESSION_ACCESS_TTL_MINUTES", Some("30"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                refresh_ttl_days: get_env("SESSION_REFRESH_TTL_DAYS", Some("14"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                reset_ttl_minutes: get_env("SESSION_RESET_TTL_MINUTES", Some("30"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
                allow_insecure_defaults: get_env(
                    "SESSION_ALLOW_INSECURE_DEFAULTS",
                    Some("false"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(false),
            },
            cookies: CookieConfig {
                api_path: get_env("COOKIE_API_PATH", Some("/auth"), is_prod)?,
                domain: env::var("COOKIE_DOMAIN").ok().filter(|d| !d.is_empty()),
            },
            csrf: CsrfConfig {
                bypass_prefixes: get_env(
                    "CSRF_BYPASS_PREFIXES",
                    Some(
                        "/auth/register,/auth/login,/auth/refresh,/auth/logout,/auth/password-reset,/health",
                    ),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                login_attempts: get_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
                login_window_seconds: get_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(900),
                register_attempts: get_env("RATE_LIMIT_REGISTER_ATTEMPTS", Some("3"), is_prod)?
                    .parse()
                    .unwrap_or(3),
                register_window_seconds: get_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    Some("3600"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(3600),
                password_reset_attempts: get_env(
                    "RATE_LIMIT_PASSWORD_RESET_ATTEMPTS",
                    Some("3"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(3),
                password_reset_window_seconds: get_env(
                    "RATE_LIMIT_PASSWORD_RESET_WINDOW_SECONDS",
                    Some("3600"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(3600),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup validation. Signing misconfiguration in production is fatal
    /// here, before the process ever serves a request.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 && self.environment == Environment::Prod {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_ttl_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_ACCESS_TTL_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_REFRESH_TTL_DAYS must be positive"
            )));
        }

        self.check_secret_strength()
    }

    fn check_secret_strength(&self) -> Result<(), AppError> {
        let secret = self.jwt.secret.trim();
        let is_placeholder = PLACEHOLDER_SECRETS
            .iter()
            .any(|p| secret.eq_ignore_ascii_case(p));

        match self.environment {
            Environment::Prod => {
                if secret.is_empty() {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "SESSION_SIGNING_SECRET is required in production"
                    )));
                }
                if is_placeholder {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "SESSION_SIGNING_SECRET is a known placeholder value"
                    )));
                }
                if secret.len() < 32 {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "SESSION_SIGNING_SECRET must be at least 32 characters"
                    )));
                }
            }
            Environment::Dev => {
                if secret.is_empty() && !self.jwt.allow_insecure_defaults {
                    return Err(AppError::ConfigError(anyhow::anyhow!(
                        "SESSION_SIGNING_SECRET is not set; set it or opt in with \
                         SESSION_ALLOW_INSECURE_DEFAULTS=true"
                    )));
                }
                if is_placeholder || (secret.len() < 32 && !secret.is_empty()) {
                    tracing::warn!("SESSION_SIGNING_SECRET is weak; fine for dev, fatal in prod");
                }
            }
        }
        Ok(())
    }

    /// The secret the signer should use, applying the development fallback.
    pub fn effective_secret(&self) -> &str {
        if self.jwt.secret.trim().is_empty() {
            INSECURE_DEV_SECRET
        } else {
            &self.jwt.secret
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
