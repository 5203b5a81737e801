//! Integration tests per gli endpoints utenti
//!
//! Test per:
//! - GET /users, /users/me, /users/{user_id}, /users/by-username/{username}
//! - PATCH /users/{user_id}
//! - GET /users/{user_id}/activity
//! - POST/DELETE follow, GET punked-followers
//! - PUT /users/me/tts-settings, POST /users/me/photo
//! - GET /users/balance
//! - PATCH /users/{user_id}/password

mod common;

#[cfg(test)]
mod user_tests {
    use super::common::*;
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;
    use xiaoyuan_server::entities::User;

    async fn set_stored_password(pool: &SqlitePool, user_id: i32, password: &str) {
        let hash = User::hash_password(password).unwrap();
        sqlx::query("UPDATE users SET password = ? WHERE user_id = ?")
            .bind(hash)
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
    }

    // ============================================================
    // Test per GET /users - list_users
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_list_users_excludes_current_user(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server.get("/users").add_header(name, value).await;

        response.assert_status_ok();
        let users: Vec<Value> = response.json();
        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| u["id"] != 1));

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_list_users_search_with_stats(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = bob();

        let response = server
            .get("/users")
            .add_query_param("search", "al")
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let users: Vec<Value> = response.json();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "alice");
        assert_eq!(users[0]["follower_count"], 2);
        assert_eq!(users[0]["following_count"], 1);
        assert_eq!(users[0]["is_following"], true);
        assert!(users[0]["profile_photo"]
            .as_str()
            .unwrap()
            .ends_with("/alice.jpg"));
        // il telefono non viene esposto agli altri utenti
        assert!(users[0].get("phone_number").is_none());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_list_users_followers_of(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = admin();

        let response = server
            .get("/users")
            .add_query_param("followers-of", 1)
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let users: Vec<Value> = response.json();
        let ids: Vec<i64> = users.iter().map(|u| u["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3]);
        // charlie non ha un nome: si usa lo username
        assert_eq!(users[1]["name"], "charlie");

        Ok(())
    }

    // ============================================================
    // Test per GET /users/me, /users/{id}, /users/by-username
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_get_me_includes_phone(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server.get("/users/me").add_header(name, value).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], 1);
        assert_eq!(body["phone_number"], "13800000001");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_get_user_by_id(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server.get("/users/2").add_header(name.clone(), value.clone()).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["username"], "bob");
        assert!(body.get("phone_number").is_none());

        // utente inesistente: null
        let response = server.get("/users/999").add_header(name, value).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body.is_null());

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_get_user_by_username(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server
            .get("/users/by-username/bob")
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], 2);

        Ok(())
    }

    // ============================================================
    // Test per PATCH /users/{user_id} - update_user
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_update_own_profile(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server
            .patch("/users/1")
            .json(&json!({ "bio": "nuova bio", "website": "https://alice.example.com" }))
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["bio"], "nuova bio");
        assert_eq!(body["website"], "https://alice.example.com");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_update_other_profile_unauthorized(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        server
            .patch("/users/2")
            .json(&json!({ "bio": "hackerato" }))
            .add_header(name, value)
            .await
            .assert_status_unauthorized();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_update_profile_conflicts_and_validation(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server
            .patch("/users/1")
            .json(&json!({ "username": "bob" }))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["details"], "username");

        server
            .patch("/users/1")
            .json(&json!({ "website": "non un url" }))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        Ok(())
    }

    // ============================================================
    // Test per GET /users/{user_id}/activity
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_activity_status(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = bob();

        // alice non ha mai fatto richieste
        let response = server
            .get("/users/1/activity")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["is_afk"], false);
        assert_eq!(body["is_punked"], false);
        assert!(body["last_activity_at"].is_null());

        // bob è appena passato dal middleware
        let response = server
            .get("/users/2/activity")
            .add_header(name.clone(), value.clone())
            .await;
        let body: Value = response.json();
        assert_eq!(body["is_afk"], false);
        assert_eq!(body["is_punked"], true);
        assert!(body["last_activity_at"].is_string());

        server
            .get("/users/999/activity")
            .add_header(name, value)
            .await
            .assert_status_not_found();

        Ok(())
    }

    // ============================================================
    // Test per follow / unfollow / punked followers
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_follow_and_unfollow(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = charlie();

        let response = server
            .post("/users/3/following")
            .json(&json!({ "user_id_to_follow": 2 }))
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["follower_id"], 3);
        assert_eq!(body["following_id"], 2);

        server
            .post("/users/3/following")
            .json(&json!({ "user_id_to_follow": 2 }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::CONFLICT);

        server
            .delete("/users/3/following/2")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .delete("/users/3/following/2")
            .add_header(name, value)
            .await
            .assert_status_not_found();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_follow_invalid_requests(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = charlie();

        server
            .post("/users/3/following")
            .json(&json!({ "user_id_to_follow": 3 }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/users/3/following")
            .json(&json!({ "user_id_to_follow": 999 }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_not_found();

        // per conto di un altro utente
        server
            .post("/users/1/following")
            .json(&json!({ "user_id_to_follow": 2 }))
            .add_header(name, value)
            .await
            .assert_status_unauthorized();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_punked_followers(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server
            .get("/users/1/punked-followers")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 2);

        // bob è seguito solo da alice, che non è punk
        let response = server
            .get("/users/2/punked-followers")
            .add_header(name, value)
            .await;
        let body: Value = response.json();
        assert_eq!(body["count"], 0);

        Ok(())
    }

    // ============================================================
    // Test per impostazioni TTS, foto e saldo
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "follows")))]
    async fn test_update_tts_settings(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server
            .put("/users/me/tts-settings")
            .json(&json!({ "tts_voice_id": "S_alice", "punked": true }))
            .add_header(name.clone(), value.clone())
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["punked"], true);
        assert_eq!(body["tts_voice_id"], "S_alice");

        // alice ora compare tra i follower punk di bob
        let response = server
            .get("/users/2/punked-followers")
            .add_header(name, value)
            .await;
        let body: Value = response.json();
        assert_eq!(body["count"], 1);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_upload_profile_photo(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(vec![0x89, b'P', b'N', b'G'])
                .file_name("avatar.png")
                .mime_type("image/png"),
        );
        let response = server
            .post("/users/me/photo")
            .multipart(form)
            .add_header(name.clone(), value.clone())
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        let url = body["profile_photo"].as_str().unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.contains("/avatars/1/"));
        assert!(url.ends_with(".png"));

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"%PDF-1.4".to_vec())
                .file_name("doc.pdf")
                .mime_type("application/pdf"),
        );
        server
            .post("/users/me/photo")
            .add_query_param("kind", "cover")
            .multipart(form)
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_balance_without_transactions(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        let response = server.get("/users/balance").add_header(name, value).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["ape_balance"], 200.0);
        // nessun movimento né wallet: si usa la data di creazione dell'utente
        assert_eq!(body["last_updated_label"], "1/1 10:00");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_session_survives_username_change(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        server
            .patch("/users/1")
            .json(&json!({ "username": "alice_new" }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_ok();

        // stesso token emesso con il vecchio username
        let response = server.get("/users/me").add_header(name, value).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["id"], 1);
        assert_eq!(body["username"], "alice_new");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_digit_only_username_rejected(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = alice();

        server
            .patch("/users/1")
            .json(&json!({ "username": "18874748888" }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let body: Value = server.get("/users/me").add_header(name, value).await.json();
        assert_eq!(body["username"], "alice");

        Ok(())
    }

    // ============================================================
    // Test per PATCH /users/{user_id}/password - change_password
    // ============================================================

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_change_password(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool.clone());
        let server = create_test_server(state.clone());
        let (name, value) = alice();
        set_stored_password(&pool, 1, "vecchia1").await;

        server
            .patch("/users/1/password")
            .json(&json!({ "current_password": "sbagliata", "new_password": "nuova123" }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_bad_request();

        server
            .patch("/users/1/password")
            .json(&json!({ "current_password": "vecchia1", "new_password": "corta" }))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_bad_request();

        let response = server
            .patch("/users/1/password")
            .json(&json!({ "current_password": "vecchia1", "new_password": "nuova123" }))
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["success"], true);

        server
            .post("/auth/login")
            .json(&json!({ "phone_number": "13800000001", "password": "vecchia1" }))
            .await
            .assert_status_unauthorized();
        server
            .post("/auth/login")
            .json(&json!({ "phone_number": "13800000001", "password": "nuova123" }))
            .await
            .assert_status_ok();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_change_password_of_other_user_rejected(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool.clone());
        let server = create_test_server(state.clone());
        let (name, value) = bob();
        set_stored_password(&pool, 1, "vecchia1").await;

        server
            .patch("/users/1/password")
            .json(&json!({ "current_password": "vecchia1", "new_password": "nuova123" }))
            .add_header(name, value)
            .await
            .assert_status_unauthorized();

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users")))]
    async fn test_change_password_without_stored_password(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state.clone());
        let (name, value) = bob();

        let response = server
            .patch("/users/2/password")
            .json(&json!({ "current_password": "qualsiasi", "new_password": "nuova123" }))
            .add_header(name, value)
            .await;
        response.assert_status_bad_request();

        Ok(())
    }
}
