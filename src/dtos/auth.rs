//! Auth DTOs - SMS, registrazione e login

use super::user::{USERNAME, UserDTO, validate_phone_number, validate_username};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmsMode {
    Login,
    Register,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct SendSmsRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: String,
    pub mode: Option<SmsMode>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SendSmsResponse {
    pub success: bool,
    pub message: String,
    /// secondi unix dopo i quali si può richiedere un nuovo codice
    pub can_resend_at: i64,
    /// solo in sviluppo, al posto dell'invio reale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct VerifySmsRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: String,
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SuccessDTO {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: String,
    #[validate(length(min = 6, max = 100, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub sms_code: Option<String>,
    #[validate(
        regex(path = *USERNAME, message = "Username must be 2-30 letters, digits, '_' or '.'"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: Option<String>,
    pub sms_code: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub user: UserDTO,
    pub token: String,
}
