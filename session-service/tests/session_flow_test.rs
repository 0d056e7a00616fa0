mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_json, CookieStore, TestApp};
use session_service::services::{PrincipalStore, RefreshTokenStore};
use uuid::Uuid;

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "correct horse battery staple";

fn get_with_cookies(uri: &str, jar: &CookieStore) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie_header) = jar.header() {
        builder = builder.header(header::COOKIE, cookie_header);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn register_establishes_a_session_with_all_three_cookies() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;

    assert!(jar.get("access_token").is_some());
    assert!(jar.get("refresh_token").is_some());
    assert!(jar.get("csrf_token").is_some());

    let response = app.request(get_with_cookies("/auth/me", &jar)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["principal"]["email"], EMAIL);
    // The password hash never leaves the service
    assert!(body["principal"].get("password_hash").is_none());
}

#[tokio::test]
async fn me_without_a_session_is_unauthorized() {
    let app = TestApp::new();
    let response = app
        .request(get_with_cookies("/auth/me", &CookieStore::default()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_header_authenticates_without_any_cookies() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;
    let access = jar.get("access_token").unwrap().to_string();

    let request = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["principal"]["email"], EMAIL);
}

#[tokio::test]
async fn bad_bearer_is_rejected_even_with_a_valid_access_cookie() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;

    // A presented Authorization header takes precedence over the cookie
    let mut builder = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt");
    if let Some(cookie_header) = jar.header() {
        builder = builder.header(header::COOKIE, cookie_header);
    }
    let response = app.request(builder.body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_replaces_any_prior_session() {
    let app = TestApp::new();
    let first = app.register(EMAIL, PASSWORD).await;

    let (second, status) = app.login(EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    // Exactly one active session remains and it is the new one
    let owner = owner_of(&app, &second).await;
    assert_eq!(app.sessions.count_active(owner).await.unwrap(), 1);
    assert!(app
        .sessions
        .find(first.get("refresh_token").unwrap())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn wrong_password_returns_unauthorized() {
    let app = TestApp::new();
    app.register(EMAIL, PASSWORD).await;

    let (_, status) = app.login(EMAIL, "not the password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_the_token_pair() {
    let app = TestApp::new();
    let mut jar = app.register(EMAIL, PASSWORD).await;
    let old_refresh = jar.get("refresh_token").unwrap().to_string();

    let response = app
        .post_json("/auth/refresh", serde_json::json!({}), &jar)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    jar.absorb(&response);

    assert_ne!(jar.get("refresh_token").unwrap(), old_refresh);

    // The rotated session still authenticates
    let response = app.request(get_with_cookies("/auth/me", &jar)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn replaying_a_rotated_refresh_token_revokes_everything() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;
    let stale = jar.clone();

    // Rotate once; `stale` still holds the consumed token
    let response = app
        .post_json("/auth/refresh", serde_json::json!({}), &jar)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut rotated = jar.clone();
    rotated.absorb(&response);
    let owner = owner_of(&app, &rotated).await;

    // Replay
    let response = app
        .post_json("/auth/refresh", serde_json::json!({}), &stale)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Every session for the owner is gone, including the fresh one
    assert_eq!(app.sessions.count_active(owner).await.unwrap(), 0);
    let response = app
        .post_json("/auth/refresh", serde_json::json!({}), &rotated)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refresh_failure_expires_the_cookies() {
    let app = TestApp::new();
    let response = app
        .post_json("/auth/refresh", serde_json::json!({}), &CookieStore::default())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The error response carries expirations for all three cookies
    let set_cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    assert!(set_cookies.iter().any(|c| c.starts_with("access_token=;")));
    assert!(set_cookies.iter().any(|c| c.starts_with("refresh_token=;")));
    assert!(set_cookies.iter().any(|c| c.starts_with("csrf_token=;")));
}

#[tokio::test]
async fn logout_revokes_the_session_and_clears_cookies() {
    let app = TestApp::new();
    let mut jar = app.register(EMAIL, PASSWORD).await;
    let owner = owner_of(&app, &jar).await;

    let response = app
        .post_json("/auth/logout", serde_json::json!({}), &jar)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    jar.absorb(&response);

    assert!(jar.get("access_token").is_none());
    assert!(jar.get("refresh_token").is_none());
    assert_eq!(app.sessions.count_active(owner).await.unwrap(), 0);
}

#[tokio::test]
async fn logout_without_a_session_still_succeeds() {
    let app = TestApp::new();
    let response = app
        .post_json("/auth/logout", serde_json::json!({}), &CookieStore::default())
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn suspended_account_cannot_login() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;
    let owner = owner_of(&app, &jar).await;

    app.principals.set_suspended(owner, true).await.unwrap();

    let (_, status) = app.login(EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

async fn owner_of(app: &TestApp, jar: &CookieStore) -> Uuid {
    app.sessions
        .find(jar.get("refresh_token").expect("no refresh cookie"))
        .await
        .unwrap()
        .expect("refresh token not in store")
        .owner_id
}
