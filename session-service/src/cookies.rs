use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::{CookieConfig, Environment};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrf_token";

/// Builds and clears the session cookie trio. The three cookies always move
/// together: a response either carries all of them or expires all of them.
///
/// The token cookies are HttpOnly and scoped to the API path. The CSRF
/// cookie is readable by scripts on purpose; the double-submit check needs
/// the frontend to echo it back in a header.
#[derive(Clone)]
pub struct CookieManager {
    api_path: String,
    domain: Option<String>,
    secure: bool,
    same_site: SameSite,
    access_ttl_seconds: i64,
    refresh_ttl_days: i64,
}

impl CookieManager {
    pub fn new(
        config: &CookieConfig,
        environment: Environment,
        access_ttl_seconds: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        // Cross-site frontends need SameSite=None, which browsers only
        // accept over HTTPS. Dev runs same-site over plain HTTP, so Lax.
        let (secure, same_site) = match environment {
            Environment::Prod => (true, SameSite::None),
            Environment::Dev => (false, SameSite::Lax),
        };
        Self {
            api_path: config.api_path.clone(),
            domain: config.domain.clone(),
            secure,
            same_site,
            access_ttl_seconds,
            refresh_ttl_days,
        }
    }

    pub fn issue(&self, jar: CookieJar, access: &str, refresh: &str, csrf: &str) -> CookieJar {
        jar.add(self.token_cookie(
            ACCESS_COOKIE,
            access.to_string(),
            time::Duration::seconds(self.access_ttl_seconds),
        ))
        .add(self.token_cookie(
            REFRESH_COOKIE,
            refresh.to_string(),
            time::Duration::days(self.refresh_ttl_days),
        ))
        .add(self.csrf_cookie(csrf.to_string(), time::Duration::days(self.refresh_ttl_days)))
    }

    /// Rotate only the CSRF cookie, leaving the token cookies alone. Used
    /// by the token-issuance endpoint before a session exists.
    pub fn issue_csrf(&self, jar: CookieJar, csrf: &str) -> CookieJar {
        jar.add(self.csrf_cookie(csrf.to_string(), time::Duration::days(self.refresh_ttl_days)))
    }

    /// Expire all three cookies. Attributes must match issuance or browsers
    /// treat the expiry as a different cookie and keep the original.
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.token_cookie(ACCESS_COOKIE, String::new(), time::Duration::ZERO))
            .add(self.token_cookie(REFRESH_COOKIE, String::new(), time::Duration::ZERO))
            .add(self.csrf_cookie(String::new(), time::Duration::ZERO))
    }

    fn token_cookie(&self, name: &'static str, value: String, max_age: time::Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .path(self.api_path.clone())
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(max_age);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    fn csrf_cookie(&self, value: String, max_age: time::Duration) -> Cookie<'static> {
        let mut builder = Cookie::build((CSRF_COOKIE, value))
            .path("/")
            .http_only(false)
            .secure(self.secure)
            .same_site(self.same_site)
            .max_age(max_age);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}
