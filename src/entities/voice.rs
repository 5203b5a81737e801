//! Voice entities - dispositivi vocali, sessioni e messaggi di sessione

use super::enums::DeviceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct VoiceDevice {
    pub device_id: String,
    pub user_id: i32,
    pub name: String,
    pub device_type: String,
    pub status: DeviceStatus,
    pub role_id: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct VoiceSession {
    pub session_id: i32,
    pub device_id: String,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    /// None finchè la sessione è attiva
    pub end_time: Option<DateTime<Utc>>,
}

impl VoiceSession {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct VoiceMessage {
    pub voice_message_id: i32,
    pub session_id: i32,
    pub role: String,
    pub content: String,
    pub audio_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Personalità del dispositivo vocale: di sistema o creata da un utente
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct VoiceRole {
    pub role_id: String,
    pub name: String,
    pub description: String,
    pub user_id: Option<i32>,
    pub is_system: bool,
    /// oggetto JSON serializzato
    pub config: String,
    pub created_at: DateTime<Utc>,
}
