//! Integration tests per gli endpoints di autenticazione
//!
//! Test per:
//! - POST /auth/send-sms
//! - POST /auth/verify-sms
//! - POST /auth/register
//! - POST /auth/login
//! - POST /auth/logout
//! - middleware di autenticazione (Bearer e cookie)
//!
//! Questi test usano `#[sqlx::test]` che:
//! - Crea automaticamente un database di test isolato
//! - Applica le migrations da `migrations/`
//! - Applica i fixtures specificati da `fixtures/`

mod common;

#[cfg(test)]
mod auth_tests {
    use super::common::*;
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    const NEW_PHONE: &str = "13900000009";

    // ============================================================
    // Test per POST /auth/send-sms - send_sms
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_send_sms_returns_dev_code(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": NEW_PHONE, "mode": "register" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        let code = body["dev_code"].as_str().expect("dev_code in development");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(body["can_resend_at"].as_i64().is_some());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_send_sms_hides_code_in_production(pool: SqlitePool) -> sqlx::Result<()> {
        let state = std::sync::Arc::new(
            xiaoyuan_server::AppState::new(pool, JWT_SECRET.to_string())
                .with_app_env("production"),
        );
        let server = create_test_server(state);

        let response = server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": NEW_PHONE }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert!(body.get("dev_code").is_none());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_send_sms_cooldown(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let body = json!({ "phone_number": NEW_PHONE });

        server.post("/auth/send-sms").json(&body).await.assert_status_ok();

        let response = server.post("/auth/send-sms").json(&body).await;
        response.assert_status(StatusCode::TOO_MANY_REQUESTS);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_send_sms_mode_checks(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        // login con telefono sconosciuto
        server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": NEW_PHONE, "mode": "login" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        // registrazione con telefono già usato da alice
        server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": "13800000001", "mode": "register" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_send_sms_invalid_phone(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": "123" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    // ============================================================
    // Test per POST /auth/verify-sms - verify_sms
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_verify_sms_wrong_then_right(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let sent: Value = server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": NEW_PHONE }))
            .await
            .json();
        let code = sent["dev_code"].as_str().unwrap().to_string();
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let response = server
            .post("/auth/verify-sms")
            .json(&json!({ "phone_number": NEW_PHONE, "code": wrong }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/auth/verify-sms")
            .json(&json!({ "phone_number": NEW_PHONE, "code": code }))
            .await;
        response.assert_status_ok();

        // il codice è monouso
        server
            .post("/auth/verify-sms")
            .json(&json!({ "phone_number": NEW_PHONE, "code": code }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    // ============================================================
    // Test per POST /auth/register - register_user
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_register_with_sms_code(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let sent: Value = server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": NEW_PHONE, "mode": "register" }))
            .await
            .json();
        let code = sent["dev_code"].as_str().unwrap().to_string();

        let response = server
            .post("/auth/register")
            .json(&json!({ "phone_number": NEW_PHONE, "sms_code": code }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert!(response.headers().get("set-cookie").is_some());
        let body: Value = response.json();
        assert_eq!(body["user"]["username"], NEW_PHONE);
        assert_eq!(body["user"]["phone_number"], NEW_PHONE);
        assert!(!body["token"].as_str().unwrap().is_empty());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_register_requires_code_or_password(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        server
            .post("/auth/register")
            .json(&json!({ "phone_number": NEW_PHONE }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_register_duplicates(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        // telefono di alice
        server
            .post("/auth/register")
            .json(&json!({ "phone_number": "13800000001", "password": "Segreto123" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        // username di bob
        let response = server
            .post("/auth/register")
            .json(&json!({
                "phone_number": NEW_PHONE,
                "password": "Segreto123",
                "username": "bob"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["details"], "username");

        Ok(())
    }

    // ============================================================
    // Test per POST /auth/login - login_user
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_login_with_password(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        server
            .post("/auth/register")
            .json(&json!({ "phone_number": NEW_PHONE, "password": "Segreto123" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/auth/login")
            .json(&json!({ "phone_number": NEW_PHONE, "password": "Segreto123" }))
            .await;

        response.assert_status_ok();
        let headers = response.headers();
        let cookie = headers.get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));
        let auth_header = headers.get("authorization").unwrap().to_str().unwrap();
        assert!(auth_header.starts_with("Bearer "));

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_login_with_sms_code(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let sent: Value = server
            .post("/auth/send-sms")
            .json(&json!({ "phone_number": "13800000002", "mode": "login" }))
            .await
            .json();
        let code = sent["dev_code"].as_str().unwrap().to_string();

        let response = server
            .post("/auth/login")
            .json(&json!({ "phone_number": "13800000002", "sms_code": code }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["user"]["username"], "bob");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_login_failures(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        // alice non ha una password utilizzabile
        server
            .post("/auth/login")
            .json(&json!({ "phone_number": "13800000001", "password": "qualsiasi" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/auth/login")
            .json(&json!({ "phone_number": NEW_PHONE, "password": "qualsiasi" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // codice mai richiesto
        server
            .post("/auth/login")
            .json(&json!({ "phone_number": "13800000001", "sms_code": "123456" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        server
            .post("/auth/login")
            .json(&json!({ "phone_number": "13800000001" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    // ============================================================
    // Test per POST /auth/logout e middleware
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_logout_clears_cookie(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let response = server.post("/auth/logout").await;

        response.assert_status_ok();
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_protected_route_requires_token(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        server.get("/users/me").await.assert_status_unauthorized();

        server
            .get("/users/me")
            .add_header(
                HeaderName::from_static("authorization"),
                HeaderValue::from_static("Bearer non-un-token"),
            )
            .await
            .assert_status_unauthorized();

        // token firmato per un id che non esiste
        let (name, value) = bearer(999, "fantasma");
        server
            .get("/users/me")
            .add_header(name, value)
            .await
            .assert_status_unauthorized();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_token_from_cookie(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let token = create_test_jwt(1, "alice", JWT_SECRET);
        let response = server
            .get("/users/me")
            .add_header(
                HeaderName::from_static("cookie"),
                HeaderValue::from_str(&format!("token={}", token)).unwrap(),
            )
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["username"], "alice");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_register_rejects_digit_only_username(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        server
            .post("/auth/register")
            .json(&json!({
                "phone_number": NEW_PHONE,
                "password": "password123",
                "username": "18874748888"
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }
}
