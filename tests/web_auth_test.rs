#![cfg(feature = "web")]
//! Account and session flows over the JSON API.
//!
//! Tests cover:
//! - Sign-up validation and session issue
//! - Login with correct and wrong credentials
//! - Protected routes without a session
//! - Logout and password change invalidating sessions

mod common;

use axum::http::StatusCode;
use coinfolio::domain::config_validation::{AuthSettings, CachePolicy};
use coinfolio::domain::user::UserRole;
use serde_json::json;
use tower::ServiceExt;

use common::*;

async fn login_cookie(app: &TestApp, email: &str, password: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "email": email, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = extract_cookies(&response);
    assert!(!cookies.is_empty(), "login should set a session cookie");
    build_cookie_header(&cookies)
}

mod signup_tests {
    use super::*;

    #[tokio::test]
    async fn signup_creates_account_and_session() {
        let app = test_app(MockMarketPort::new()).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/signup",
                None,
                json!({
                    "email": "Alice@Example.com",
                    "password": "longenough",
                    "name": "Alice",
                    "gender": "female",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = build_cookie_header(&extract_cookies(&response));
        let body = body_json(response).await;
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["role"], "USER");
        assert_eq!(body["balance"], 0.0);

        let me = app
            .router
            .clone()
            .oneshot(get_request("/api/me", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(body_json(me).await["name"], "Alice");
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let app = test_app(MockMarketPort::new()).await;
        seed_user(&app.store, "taken@example.com", UserRole::User, 0.0);

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/signup",
                None,
                json!({ "email": "TAKEN@example.com", "password": "longenough", "name": "B" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "An account with this email already exists.");
        assert_eq!(body["code"], "auth/email-already-in-use");
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let app = test_app(MockMarketPort::new()).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/signup",
                None,
                json!({ "email": "c@example.com", "password": "short", "name": "C" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Password must be at least 8 characters long."
        );
    }

    #[tokio::test]
    async fn malformed_email_is_rejected() {
        let app = test_app(MockMarketPort::new()).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/signup",
                None,
                json!({ "email": "not-an-email", "password": "longenough", "name": "D" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod login_tests {
    use super::*;

    #[tokio::test]
    async fn unauthenticated_access_is_rejected() {
        let app = test_app(MockMarketPort::new()).await;

        for uri in ["/api/me", "/api/portfolio", "/api/transactions", "/api/admin/users"] {
            let response = app.router.clone().oneshot(get_request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn login_with_correct_credentials() {
        let app = test_app(MockMarketPort::new()).await;
        let user = seed_user(&app.store, "bob@example.com", UserRole::User, 10.0);

        let cookie = login_cookie(&app, "bob@example.com", TEST_PASSWORD).await;
        let me = app
            .router
            .clone()
            .oneshot(get_request("/api/me", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(body_json(me).await["id"], user.id.as_str());
    }

    #[tokio::test]
    async fn session_cookie_secure_flag_follows_settings() {
        for secure in [false, true] {
            let auth = AuthSettings {
                secure_cookie: secure,
                ..auth_settings()
            };
            let app = test_app_with(MockMarketPort::new(), CachePolicy::NoCache, auth).await;
            seed_user(&app.store, "bob@example.com", UserRole::User, 0.0);

            let response = app
                .router
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/login",
                    None,
                    json!({ "email": "bob@example.com", "password": TEST_PASSWORD }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let cookies = extract_cookies(&response);
            assert!(!cookies.is_empty());
            assert_eq!(
                cookies.iter().any(|c| c.contains("Secure")),
                secure,
                "{cookies:?}"
            );
        }
    }

    #[tokio::test]
    async fn login_with_wrong_password() {
        let app = test_app(MockMarketPort::new()).await;
        seed_user(&app.store, "bob@example.com", UserRole::User, 0.0);

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({ "email": "bob@example.com", "password": "wrongpassword" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Incorrect email or password.");
        assert_eq!(body["code"], "auth/invalid-credential");
    }

    #[tokio::test]
    async fn login_with_unknown_email() {
        let app = test_app(MockMarketPort::new()).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({ "email": "ghost@example.com", "password": TEST_PASSWORD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_destroys_session() {
        let app = test_app(MockMarketPort::new()).await;
        seed_user(&app.store, "bob@example.com", UserRole::User, 0.0);
        let cookie = login_cookie(&app, "bob@example.com", TEST_PASSWORD).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request("POST", "/logout", Some(&cookie), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let me = app
            .router
            .clone()
            .oneshot(get_request("/api/me", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    }
}

mod profile_tests {
    use super::*;

    #[tokio::test]
    async fn profile_update_applies_fields() {
        let app = test_app(MockMarketPort::new()).await;
        seed_user(&app.store, "bob@example.com", UserRole::User, 0.0);
        let cookie = login_cookie(&app, "bob@example.com", TEST_PASSWORD).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/me",
                Some(&cookie),
                json!({ "name": "Robert", "address": "1 Main St", "dateOfBirth": "1990-05-01" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Robert");
        assert_eq!(body["address"], "1 Main St");
        assert_eq!(body["dateOfBirth"], "1990-05-01");
        assert_eq!(body["email"], "bob@example.com");
    }

    #[tokio::test]
    async fn password_change_requires_current_password() {
        let app = test_app(MockMarketPort::new()).await;
        seed_user(&app.store, "bob@example.com", UserRole::User, 0.0);
        let cookie = login_cookie(&app, "bob@example.com", TEST_PASSWORD).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/me/password",
                Some(&cookie),
                json!({ "currentPassword": "not-it-at-all", "newPassword": "brandnewpass" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn password_change_switches_credentials() {
        let app = test_app(MockMarketPort::new()).await;
        seed_user(&app.store, "bob@example.com", UserRole::User, 0.0);
        let cookie = login_cookie(&app, "bob@example.com", TEST_PASSWORD).await;

        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/me/password",
                Some(&cookie),
                json!({ "currentPassword": TEST_PASSWORD, "newPassword": "brandnewpass" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let old = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({ "email": "bob@example.com", "password": TEST_PASSWORD }),
            ))
            .await
            .unwrap();
        assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

        login_cookie(&app, "bob@example.com", "brandnewpass").await;
    }
}
