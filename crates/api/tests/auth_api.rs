//! HTTP-level integration tests for the auth and user endpoints.
//!
//! Tests cover registration, login and its cookie, logout, session
//! extension, password change, and account deletion.

mod common;

use axum::http::StatusCode;
use capacity_db::UserBackend;
use chrono::{DateTime, Utc};
use common::{
    body_json, build_test_app, cookie_pair, empty_request, get_with_cookie, json_request, login,
    post_json, register, send, set_cookie, signed_in_user, token_of, PASSWORD,
};
use serde_json::json;

const IP: &str = "203.0.113.10";

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_returns_created_user_without_hash() {
    let app = build_test_app();

    let json = register(&app.router, IP, "  New.User@Example.COM ").await;

    assert_eq!(json["data"]["email"], "new.user@example.com");
    assert_eq!(json["data"]["name"], "Test User");
    assert_eq!(json["data"]["isActive"], true);
    assert!(json["data"]["id"].is_number());
    assert!(json["data"].get("passwordHash").is_none());
    assert!(json["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let app = build_test_app();
    register(&app.router, IP, "dupe@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/auth/register",
        IP,
        json!({ "email": "DUPE@example.com", "name": "Again", "password": PASSWORD }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");
}

#[tokio::test]
async fn register_rejects_short_password_and_bad_email() {
    let app = build_test_app();

    let response = post_json(
        &app.router,
        "/api/v1/auth/register",
        IP,
        json!({ "email": "short@example.com", "name": "Short", "password": "abc" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = post_json(
        &app.router,
        "/api/v1/auth/register",
        IP,
        json!({ "email": "not-an-email", "name": "Bad", "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_sets_session_cookie_with_security_attributes() {
    let app = build_test_app();
    register(&app.router, IP, "cookie@example.com").await;

    let response = login(&app.router, IP, "cookie@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("sessionToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86"), "lifetime should be about a day: {cookie}");
    assert!(!cookie.contains("Secure"), "Secure is production-only");
    assert_eq!(token_of(&response).len(), 64);

    let json = body_json(response).await;
    assert_eq!(json["data"]["user"]["email"], "cookie@example.com");
    assert!(json["data"]["expiresAt"].is_string());
    assert!(json["data"].get("token").is_none(), "token is only sent as a cookie");
}

#[tokio::test]
async fn login_records_client_address_and_agent() {
    let app = build_test_app();
    register(&app.router, IP, "client@example.com").await;

    let response = login(&app.router, "198.51.100.4", "client@example.com", PASSWORD).await;
    let token = token_of(&response);

    let session = app
        .state
        .sessions
        .find_by_token(&token)
        .await
        .unwrap()
        .expect("new session should be usable");
    assert_eq!(session.ip_address.as_deref(), Some("198.51.100.4"));
    assert_eq!(session.user_agent.as_deref(), Some("capacity-tests/1.0"));
}

#[tokio::test]
async fn unknown_account_and_wrong_password_look_the_same() {
    let app = build_test_app();
    register(&app.router, IP, "real@example.com").await;

    let wrong = login(&app.router, IP, "real@example.com", "not-the-password").await;
    let unknown = login(&app.router, IP, "ghost@example.com", PASSWORD).await;

    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong).await, body_json(unknown).await);
}

#[tokio::test]
async fn disabled_account_cannot_log_in() {
    let app = build_test_app();
    let user = register(&app.router, IP, "disabled@example.com").await;
    let id = user["data"]["id"].as_i64().unwrap();
    app.state.users.set_user_active(id, false).await.unwrap();

    let response = login(&app.router, IP, "disabled@example.com", PASSWORD).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Account is not active");
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn me_returns_identity() {
    let app = build_test_app();
    let (id, cookie) = signed_in_user(&app.router, IP, "me@example.com").await;

    let response = get_with_cookie(&app.router, "/api/v1/auth/me", IP, &cookie).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["user"]["userId"], id);
    assert_eq!(json["data"]["user"]["email"], "me@example.com");
    assert_eq!(json["data"]["user"]["isActive"], true);
}

#[tokio::test]
async fn logout_invalidates_session_and_clears_cookie() {
    let app = build_test_app();
    let (_, cookie) = signed_in_user(&app.router, IP, "logout@example.com").await;

    let response = send(
        &app.router,
        empty_request("POST", "/api/v1/auth/logout", IP, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&response).contains("Max-Age=0"));

    let response = get_with_cookie(&app.router, "/api/v1/auth/me", IP, &cookie).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn extend_pushes_expiry_out() {
    let app = build_test_app();
    let (_, cookie) = signed_in_user(&app.router, IP, "extend@example.com").await;

    let before = body_json(get_with_cookie(&app.router, "/api/v1/auth/me", IP, &cookie).await)
        .await["data"]["expiresAt"]
        .as_str()
        .unwrap()
        .parse::<DateTime<Utc>>()
        .unwrap();

    let response = send(
        &app.router,
        empty_request("POST", "/api/v1/auth/session/extend", IP, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cookie_pair(&response), cookie, "token is unchanged");

    let after = body_json(response).await["data"]["expiresAt"]
        .as_str()
        .unwrap()
        .parse::<DateTime<Utc>>()
        .unwrap();
    assert_eq!(after - before, chrono::Duration::hours(24));
}

// ---------------------------------------------------------------------------
// Password change and account deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn password_change_invalidates_every_session_and_issues_a_new_one() {
    let app = build_test_app();
    let (id, first) = signed_in_user(&app.router, IP, "rotate@example.com").await;
    let second = cookie_pair(&login(&app.router, IP, "rotate@example.com", PASSWORD).await);

    let response = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/v1/users/{id}/password"),
            IP,
            json!({ "currentPassword": PASSWORD, "newPassword": "a-brand-new-secret" }),
            Some(&first),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let fresh = cookie_pair(&response);
    assert_ne!(fresh, first);

    for old in [&first, &second] {
        let response = get_with_cookie(&app.router, "/api/v1/auth/me", IP, old).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = get_with_cookie(&app.router, "/api/v1/auth/me", IP, &fresh).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = login(&app.router, IP, "rotate@example.com", "a-brand-new-secret").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn password_change_requires_current_password() {
    let app = build_test_app();
    let (id, cookie) = signed_in_user(&app.router, IP, "guard@example.com").await;

    let response = send(
        &app.router,
        json_request(
            "PUT",
            &format!("/api/v1/users/{id}/password"),
            IP,
            json!({ "currentPassword": "wrong-password", "newPassword": "a-brand-new-secret" }),
            Some(&cookie),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_CREDENTIALS");
    let response = get_with_cookie(&app.router, "/api/v1/auth/me", IP, &cookie).await;
    assert_eq!(response.status(), StatusCode::OK, "session survives a failed attempt");
}

#[tokio::test]
async fn cannot_manage_someone_elses_account() {
    let app = build_test_app();
    let (_, cookie) = signed_in_user(&app.router, IP, "mallory@example.com").await;
    let victim = register(&app.router, "203.0.113.11", "victim@example.com").await;
    let victim_id = victim["data"]["id"].as_i64().unwrap();

    let response = send(
        &app.router,
        empty_request("DELETE", &format!("/api/v1/users/{victim_id}"), IP, Some(&cookie)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.state.users.find_user_by_id(victim_id).await.unwrap().is_some());
}

#[tokio::test]
async fn delete_account_removes_user_and_sessions() {
    let app = build_test_app();
    let (id, cookie) = signed_in_user(&app.router, IP, "leaving@example.com").await;

    let response = send(
        &app.router,
        empty_request("DELETE", &format!("/api/v1/users/{id}"), IP, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.backend.session_count().await, 0);

    let response = get_with_cookie(&app.router, "/api/v1/auth/me", IP, &cookie).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = login(&app.router, IP, "leaving@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_store_status() {
    let app = build_test_app();

    let response = send(&app.router, empty_request("GET", "/health", IP, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_healthy"], true);
}
