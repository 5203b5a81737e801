//! Auth services - SMS, registrazione, login e logout

use crate::core::{AppError, AppState, clear_session_headers, encode_jwt, session_headers};
use crate::dtos::{
    AuthResponse, CreateUserDTO, LoginRequest, RegisterRequest, SendSmsRequest, SendSmsResponse,
    SmsMode, SuccessDTO, UserDTO, VerifySmsRequest,
};
use crate::entities::User;
use crate::repositories::Create;
use crate::sms::normalize_phone;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

#[instrument(skip(state, body))]
pub async fn send_sms(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendSmsRequest>,
) -> Result<Json<SendSmsResponse>, AppError> {
    body.validate()?;
    let phone = normalize_phone(&body.phone_number);

    match body.mode {
        Some(SmsMode::Login) => {
            if state.user.find_by_phone(&phone).await?.is_none() {
                warn!("Login code requested for unknown phone");
                return Err(AppError::not_found("Phone number not registered"));
            }
        }
        Some(SmsMode::Register) => {
            if state.user.find_by_phone(&phone).await?.is_some() {
                warn!("Register code requested for existing phone");
                return Err(AppError::conflict("Phone number already registered"));
            }
        }
        None => {}
    }

    let issued = state.sms.issue(&phone, Utc::now())?;

    // l'invio reale passa dal provider SMS, qui il codice viene solo loggato
    info!("Verification code for {}: {}", issued.phone, issued.code);

    Ok(Json(SendSmsResponse {
        success: true,
        message: "Verification code sent".to_string(),
        can_resend_at: issued.can_resend_at.timestamp(),
        dev_code: state.is_development().then_some(issued.code),
    }))
}

#[instrument(skip(state, body))]
pub async fn verify_sms(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifySmsRequest>,
) -> Result<Json<SuccessDTO>, AppError> {
    body.validate()?;
    state
        .sms
        .verify(&body.phone_number, &body.code, Utc::now())?;

    info!("Phone verified");
    Ok(Json(SuccessDTO {
        success: true,
        message: "Verification successful".to_string(),
    }))
}

#[instrument(skip(state, body))]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. validazione formale
    // 2. serve un codice SMS valido oppure una password
    // 3. telefono e username devono essere liberi (409)
    // 4. creazione utente, apertura sessione
    body.validate()?;
    let phone = normalize_phone(&body.phone_number);

    match (&body.sms_code, &body.password) {
        (Some(code), _) => state.sms.verify(&phone, code, Utc::now())?,
        (None, Some(_)) => {}
        (None, None) => {
            return Err(AppError::bad_request(
                "A verification code or a password is required",
            ));
        }
    }

    if state.user.find_by_phone(&phone).await?.is_some() {
        return Err(AppError::conflict("Phone number already registered"));
    }

    let username = body
        .username
        .clone()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| phone.clone());
    if state.user.find_by_username(&username).await?.is_some() {
        return Err(AppError::conflict("Username already exists").with_details("username"));
    }

    let password = match &body.password {
        Some(password) => User::hash_password(password)
            .map_err(|_| AppError::internal_server_error("Failed to hash password"))?,
        None => String::new(),
    };

    let user = state
        .user
        .create(&CreateUserDTO {
            username,
            name: body.name.clone(),
            phone_number: Some(phone),
            password,
            ..Default::default()
        })
        .await?;
    info!("User {} registered", user.user_id);

    let token = encode_jwt(user.username.clone(), user.user_id, &state.jwt_secret)?;
    let headers = session_headers(&token)?;
    let dto = UserDTO::from_user(user.clone(), &state.storage_config).for_owner(&user);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse { user: dto, token }),
    ))
}

#[instrument(skip(state, body))]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let phone = normalize_phone(&body.phone_number);
    if phone.is_empty() {
        return Err(AppError::bad_request("Phone number is required"));
    }

    let user = state
        .user
        .find_by_phone(&phone)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid phone number or credentials"))?;

    match (&body.sms_code, &body.password) {
        (Some(code), _) => {
            state
                .sms
                .verify(&phone, code, Utc::now())
                .map_err(|e| {
                    warn!("SMS login failed for user {}: {}", user.user_id, e);
                    AppError::unauthorized("Invalid verification code").with_details(e.to_string())
                })?;
        }
        (None, Some(password)) => {
            if !user.verify_password(password) {
                warn!("Wrong password for user {}", user.user_id);
                return Err(AppError::unauthorized("Invalid phone number or credentials"));
            }
        }
        (None, None) => {
            return Err(AppError::bad_request(
                "A verification code or a password is required",
            ));
        }
    }

    let token = encode_jwt(user.username.clone(), user.user_id, &state.jwt_secret)?;
    let headers = session_headers(&token)?;
    debug!("Session opened for user {}", user.user_id);
    let dto = UserDTO::from_user(user.clone(), &state.storage_config).for_owner(&user);

    Ok((StatusCode::OK, headers, Json(AuthResponse { user: dto, token })))
}

pub async fn logout_user() -> impl IntoResponse {
    (
        StatusCode::OK,
        clear_session_headers(),
        Json(SuccessDTO {
            success: true,
            message: "Logged out".to_string(),
        }),
    )
}
