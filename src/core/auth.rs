use crate::core::{AppError, AppState};
use crate::entities::User;
use crate::repositories::Read;
use axum::extract::State;
use axum::{
    Error,
    body::Body,
    extract::Request,
    http::{self, HeaderMap, HeaderValue, Response},
    middleware::Next,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Durata della sessione (token e cookie)
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

// struct che codifica il contenuto del token jwt
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize, // Expiry time of the token
    pub iat: usize, // Issued at time of the token
    pub id: i32,
    pub username: String,
}

#[instrument(skip(secret), fields(username = %username, id = %id))]
pub fn encode_jwt(username: String, id: i32, secret: &str) -> Result<String, Error> {
    debug!("Encoding JWT token for user");
    let now = Utc::now();
    let exp = (now + Duration::seconds(SESSION_TTL_SECS)).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claim = Claims {
        iat,
        exp,
        username,
        id,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!("Failed to encode JWT token: {:?}", e);
        Error::new("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: &str, secret: &str) -> Result<TokenData<Claims>, Error> {
    decode(
        jwt_token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Failed to decode JWT token: {:?}", e);
        Error::new("Error in decoding jwt token")
    })
}

/// Header `Set-Cookie` e `Authorization` per una sessione appena aperta
pub fn session_headers(token: &str) -> Result<HeaderMap, AppError> {
    let cookie = format!(
        "token={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token, SESSION_TTL_SECS
    );
    let mut headers = HeaderMap::new();
    headers.insert(http::header::SET_COOKIE, header_value(&cookie)?);
    headers.insert(
        http::header::AUTHORIZATION,
        header_value(&format!("Bearer {}", token))?,
    );
    Ok(headers)
}

/// Header che invalida il cookie di sessione
pub fn clear_session_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::SET_COOKIE,
        HeaderValue::from_static("token=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0"),
    );
    headers
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value).map_err(|_| {
        error!("Session token produced an invalid header value");
        AppError::internal_server_error("Failed to build session headers")
    })
}

/// Token dalla `Authorization: Bearer ...` oppure dal cookie `token`
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        let mut parts = value.split_whitespace();
        if let (Some(scheme), Some(token)) = (parts.next(), parts.next()) {
            if scheme.eq_ignore_ascii_case("bearer") {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    let token = extract_token(req.headers()).ok_or_else(|| {
        warn!("Missing session token");
        AppError::unauthorized("Authentication required")
    })?;

    let token_data = decode_jwt(&token, &state.jwt_secret)
        .map_err(|_| AppError::unauthorized("Unable to decode token"))?;

    // l'identità è l'id: lo username può cambiare durante la sessione
    let current_user = match state.user.read(&token_data.claims.id).await? {
        Some(user) => user,
        None => {
            warn!("User not found in database: {}", token_data.claims.id);
            return Err(AppError::unauthorized("You are not an authorized user"));
        }
    };

    // tracciamento attività: un errore qui non deve bloccare la richiesta
    if let Err(e) = state
        .user
        .touch_activity(current_user.user_id, Utc::now())
        .await
    {
        warn!("Failed to record activity for user {}: {:?}", current_user.user_id, e);
    }

    debug!("User authenticated: {}", current_user.username);
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// L'amministratore è l'utente il cui telefono (verificato via SMS) coincide con `ADMIN_PHONE`
pub fn is_admin(user: &User, admin_phone: &str) -> bool {
    user.phone_number.as_deref() == Some(admin_phone)
}

pub fn require_admin(user: &User, admin_phone: &str) -> Result<(), AppError> {
    if is_admin(user, admin_phone) {
        Ok(())
    } else {
        warn!("User {} attempted an admin action", user.user_id);
        Err(AppError::forbidden("Admin privileges required"))
    }
}

/// Da montare dopo `authentication_middleware`: il backoffice risponde 401 ai non admin
#[instrument(skip(state, req, next))]
pub async fn admin_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    let user = req
        .extensions()
        .get::<User>()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    if !is_admin(user, &state.admin_phone) {
        warn!("User {} denied access to backoffice", user.user_id);
        return Err(AppError::unauthorized("Admin privileges required"));
    }

    info!("Admin {} accessing backoffice", user.user_id);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip_and_wrong_secret() {
        let token = encode_jwt("alice".into(), 1, "segreto").unwrap();
        let data = decode_jwt(&token, "segreto").unwrap();
        assert_eq!(data.claims.id, 1);
        assert_eq!(data.claims.username, "alice");
        assert_eq!(data.claims.exp - data.claims.iat, SESSION_TTL_SECS as usize);
        assert!(decode_jwt(&token, "altro").is_err());
    }

    #[test]
    fn test_token_from_header_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        assert!(extract_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_admin_by_phone_only() {
        let mut user = User::for_tests(9, "someone");
        assert!(!is_admin(&user, "18874748888"));
        user.phone_number = Some("18874748888".into());
        assert!(is_admin(&user, "18874748888"));
        // uno username uguale al telefono non basta
        assert!(require_admin(&User::for_tests(1, "18874748888"), "18874748888").is_err());
    }
}
