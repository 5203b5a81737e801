use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use sqlx::SqlitePool;
use std::sync::Arc;
use xiaoyuan_server::core::AppState;

pub const JWT_SECRET: &str = "ilmiobellissimosegretochevaassolutamentecambiato";

/// Crea un AppState per i test
///
/// # Arguments
/// * `pool` - Connection pool SQLite
///
/// # Returns
/// Arc<AppState> configurato con il JWT secret di test, ambiente `development`
/// e storage locale in una directory temporanea
pub fn create_test_state(pool: SqlitePool) -> Arc<AppState> {
    Arc::new(AppState::new(pool, JWT_SECRET.to_string()))
}

/// Crea un TestServer per i test
///
/// # Arguments
/// * `state` - AppState da utilizzare per il server
///
/// # Returns
/// TestServer configurato e pronto per eseguire richieste
pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = xiaoyuan_server::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

/// Genera un JWT token per testing
///
/// # Arguments
/// * `user_id` - ID dell'utente per cui generare il token
/// * `username` - Username dell'utente
/// * `jwt_secret` - Secret key per firmare il token
///
/// # Returns
/// Token JWT valido per 24 ore
pub fn create_test_jwt(user_id: i32, username: &str, jwt_secret: &str) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Claims {
        id: i32,
        username: String,
        exp: usize,
        iat: usize,
    }

    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::hours(24))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        id: user_id,
        username: username.to_string(),
        exp: expiration,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("Failed to create JWT token")
}

/// Header `Authorization: Bearer ...` per l'utente dato
pub fn bearer(user_id: i32, username: &str) -> (HeaderName, HeaderValue) {
    let token = create_test_jwt(user_id, username, JWT_SECRET);
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header"),
    )
}

pub fn alice() -> (HeaderName, HeaderValue) {
    bearer(1, "alice")
}

pub fn bob() -> (HeaderName, HeaderValue) {
    bearer(2, "bob")
}

pub fn charlie() -> (HeaderName, HeaderValue) {
    bearer(3, "charlie")
}

/// L'amministratore delle fixtures: utente 4, telefono uguale a `ADMIN_PHONE`
pub fn admin() -> (HeaderName, HeaderValue) {
    bearer(4, "18874748888")
}
