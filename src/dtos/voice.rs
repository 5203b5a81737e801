//! Voice DTOs - dispositivi vocali e sessioni

use crate::entities::{VoiceDevice, VoiceMessage, VoiceRole, VoiceSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateDeviceRequest {
    #[validate(length(min = 1, max = 100, message = "device_id is required"))]
    pub device_id: Option<String>,
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub device_type: Option<String>,
    pub role_id: Option<String>,
}

/// DTO per creare un dispositivo
#[derive(Debug, Clone)]
pub struct CreateDeviceDTO {
    pub device_id: String,
    pub user_id: i32,
    pub name: String,
    pub device_type: String,
    pub role_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// DTO per aggiornare un dispositivo (solo campi modificabili)
#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateDeviceDTO {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub device_type: Option<String>,
    pub role_id: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct DeviceDetailDTO {
    #[serde(flatten)]
    pub device: VoiceDevice,
    pub recent_sessions: Vec<VoiceSession>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SessionListQuery {
    pub device_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize, Debug)]
pub struct SessionListDTO {
    pub sessions: Vec<VoiceSession>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StartSessionRequest {
    pub device_id: String,
}

#[derive(Serialize, Debug)]
pub struct SessionDetailDTO {
    #[serde(flatten)]
    pub session: VoiceSession,
    pub messages: Vec<VoiceMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateVoiceMessageRequest {
    pub session_id: i32,
    #[validate(length(min = 1, max = 5000, message = "Content must be between 1 and 5000 characters"))]
    pub content: String,
    #[validate(length(min = 1, max = 20, message = "Role is required"))]
    pub role: String,
}

/// DTO per creare un messaggio di sessione
#[derive(Debug, Clone)]
pub struct CreateVoiceMessageDTO {
    pub session_id: i32,
    pub role: String,
    pub content: String,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateVoiceRoleRequest {
    #[validate(length(min = 1, max = 50, message = "Role name must be between 1 and 50 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// oggetto libero passato al motore vocale
    pub config: Option<serde_json::Value>,
}

/// DTO per creare un ruolo personalizzato
#[derive(Debug, Clone)]
pub struct CreateVoiceRoleDTO {
    pub role_id: String,
    pub name: String,
    pub description: String,
    pub user_id: i32,
    /// JSON serializzato
    pub config: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoiceRoleDTO {
    pub id: String,
    pub name: String,
    pub description: String,
    pub user_id: Option<i32>,
    pub is_system: bool,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<VoiceRole> for VoiceRoleDTO {
    fn from(role: VoiceRole) -> Self {
        // config illeggibile: oggetto vuoto
        let config = serde_json::from_str(&role.config)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
        Self {
            id: role.role_id,
            name: role.name,
            description: role.description,
            user_id: role.user_id,
            is_system: role.is_system,
            config,
            created_at: role.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceRoleListDTO {
    pub roles: Vec<VoiceRoleDTO>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceRoleCreatedDTO {
    pub role: VoiceRoleDTO,
}
