//! Integration tests per i varchi facegate
//!
//! Test per:
//! - GET/POST /facegate/devices
//! - DELETE /facegate/devices/{id}
//! - POST /facegate/devices/{device_id}/heartbeat

mod common;

#[cfg(test)]
mod facegate_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "devices")))]
    async fn test_list_hidden_from_non_admins(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server.get("/facegate/devices").add_header(name, value).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["items"].as_array().unwrap().is_empty());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "devices")))]
    async fn test_configured_admin_phone(pool: SqlitePool) -> sqlx::Result<()> {
        // alice come amministratrice, l'admin predefinito perde l'accesso
        let state = std::sync::Arc::new(
            xiaoyuan_server::AppState::new(pool, JWT_SECRET.to_string())
                .with_admin_phone("13800000001"),
        );
        let server = create_test_server(state);

        let (name, value) = alice();
        let body: Value = server.get("/facegate/devices").add_header(name, value).await.json();
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (name, value) = admin();
        let body: Value = server.get("/facegate/devices").add_header(name, value).await.json();
        assert!(body["items"].as_array().unwrap().is_empty());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "devices")))]
    async fn test_heartbeat_marks_device_online(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = admin();

        let body: Value = server
            .get("/facegate/devices")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["device_id"], "fg-001");
        assert_eq!(items[0]["online"], false);

        server
            .post("/facegate/devices/fg-001/heartbeat")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body: Value = server
            .get("/facegate/devices")
            .add_header(name.clone(), value.clone())
            .await
            .json();
        assert_eq!(body["items"][0]["online"], true);

        server
            .post("/facegate/devices/fg-999/heartbeat")
            .add_header(name, value)
            .await
            .assert_status_not_found();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "devices")))]
    async fn test_create_device_requires_admin(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let body = json!({ "device_id": "fg-002", "device_name": "Uscita", "location": "Retro" });

        let (name, value) = alice();
        server
            .post("/facegate/devices")
            .json(&body)
            .add_header(name, value)
            .await
            .assert_status_forbidden();

        let (name, value) = admin();
        let response = server
            .post("/facegate/devices")
            .json(&body)
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::CREATED);
        let device: Value = response.json();
        assert_eq!(device["device_id"], "fg-002");
        assert_eq!(device["location"], "Retro");
        assert_eq!(device["online"], false);

        // device_id duplicato
        let response = server
            .post("/facegate/devices")
            .json(&body)
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["details"], "device_id");

        server
            .post("/facegate/devices")
            .json(&json!({ "device_id": "fg-003" }))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "devices")))]
    async fn test_delete_device(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());

        let (name, value) = bob();
        server
            .delete("/facegate/devices/1")
            .add_header(name, value)
            .await
            .assert_status_forbidden();

        let (name, value) = admin();
        let response = server
            .delete("/facegate/devices/1")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], 1);

        server
            .delete("/facegate/devices/1")
            .add_header(name, value)
            .await
            .assert_status_not_found();

        Ok(())
    }
}
