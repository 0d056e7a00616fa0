mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{CookieStore, TestApp};
use session_service::services::RefreshTokenStore;

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "correct horse battery staple";
const NEW_PASSWORD: &str = "entirely different passphrase";

async fn change_password(
    app: &TestApp,
    jar: &CookieStore,
    current: &str,
    new: &str,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/auth/change-password")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie_header) = jar.header() {
        builder = builder.header(header::COOKIE, cookie_header);
    }
    if let Some(token) = jar.get("csrf_token") {
        builder = builder.header("x-csrf-token", token);
    }
    app.request(
        builder
            .body(Body::from(
                serde_json::json!({
                    "current_password": current,
                    "new_password": new,
                })
                .to_string(),
            ))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn change_password_requires_the_current_password() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;

    let response = change_password(&app, &jar, "wrong current", NEW_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Nothing changed
    let (_, status) = app.login(EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_ends_every_session() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;
    let owner = app
        .sessions
        .find(jar.get("refresh_token").unwrap())
        .await
        .unwrap()
        .unwrap()
        .owner_id;

    let response = change_password(&app, &jar, PASSWORD, NEW_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.sessions.count_active(owner).await.unwrap(), 0);

    // Old password rejected, new accepted
    let (_, status) = app.login(EMAIL, PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (_, status) = app.login(EMAIL, NEW_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_flow_issues_a_single_use_token() {
    let app = TestApp::new();
    app.register(EMAIL, PASSWORD).await;

    let response = app
        .post_json(
            "/auth/password-reset/request",
            serde_json::json!({ "email": EMAIL }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let token = app.mailer.last_token().expect("no reset token captured");

    let response = app
        .post_json(
            "/auth/password-reset/confirm",
            serde_json::json!({ "token": token, "new_password": NEW_PASSWORD }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Second redemption of the same token fails
    let response = app
        .post_json(
            "/auth/password-reset/confirm",
            serde_json::json!({ "token": token, "new_password": "yet another one!" }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, status) = app.login(EMAIL, NEW_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_request_is_silent_for_unknown_emails() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/auth/password-reset/request",
            serde_json::json!({ "email": "nobody@example.com" }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.mailer.last_token().is_none());
}

#[tokio::test]
async fn a_new_reset_request_invalidates_the_previous_token() {
    let app = TestApp::new();
    app.register(EMAIL, PASSWORD).await;

    for _ in 0..2 {
        let response = app
            .post_json(
                "/auth/password-reset/request",
                serde_json::json!({ "email": EMAIL }),
                &CookieStore::default(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let tokens = app.mailer.tokens.lock().unwrap().clone();
    assert_eq!(tokens.len(), 2);

    // First token was revoked by the second request
    let response = app
        .post_json(
            "/auth/password-reset/confirm",
            serde_json::json!({ "token": tokens[0], "new_password": NEW_PASSWORD }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            "/auth/password-reset/confirm",
            serde_json::json!({ "token": tokens[1], "new_password": NEW_PASSWORD }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reset_confirm_revokes_open_sessions() {
    let app = TestApp::new();
    let jar = app.register(EMAIL, PASSWORD).await;
    let owner = app
        .sessions
        .find(jar.get("refresh_token").unwrap())
        .await
        .unwrap()
        .unwrap()
        .owner_id;

    app.post_json(
        "/auth/password-reset/request",
        serde_json::json!({ "email": EMAIL }),
        &CookieStore::default(),
    )
    .await;
    let token = app.mailer.last_token().unwrap();

    let response = app
        .post_json(
            "/auth/password-reset/confirm",
            serde_json::json!({ "token": token, "new_password": NEW_PASSWORD }),
            &CookieStore::default(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.sessions.count_active(owner).await.unwrap(), 0);
}
