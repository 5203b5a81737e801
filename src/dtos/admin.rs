//! Admin DTOs - backoffice utenti

use super::user::validate_phone_number;
use crate::entities::{User, VoiceMapping};
use crate::storage::StorageConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminUserQuery {
    pub search: Option<String>,
    pub has_voice: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminUserDTO {
    pub id: i32,
    pub username: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub profile_photo: Option<String>,
    pub punked: bool,
    pub tts_voice_id: Option<String>,
    pub ape_balance: f64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AdminUserDTO {
    pub fn from_user(user: User, storage: &StorageConfig) -> Self {
        Self {
            id: user.user_id,
            profile_photo: storage.url_for(user.profile_photo.as_deref()),
            username: user.username,
            name: user.name,
            phone_number: user.phone_number,
            email: user.email,
            punked: user.punked,
            tts_voice_id: user.tts_voice_id,
            ape_balance: user.ape_balance,
            last_activity_at: user.last_activity_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PaginationDTO {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

impl PaginationDTO {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_count + limit - 1) / limit
        } else {
            0
        };
        Self {
            page,
            limit,
            total_count,
            total_pages,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdminUserListDTO {
    pub users: Vec<AdminUserDTO>,
    pub pagination: PaginationDTO,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: String,
    #[validate(length(min = 6, max = 100, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(max = 100))]
    pub tts_voice_id: Option<String>,
    pub punked: Option<bool>,
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
}

/// Voci standard del motore TTS; le voci personalizzate iniziano con `S_`
pub const STANDARD_VOICES: [&str; 5] = ["BV001", "BV002", "BV003", "BV004", "BV005"];

pub fn is_custom_voice(voice_id: &str) -> bool {
    voice_id.starts_with("S_")
}

/// Vuoto significa "nessuna voce"
pub fn is_valid_voice_id(voice_id: &str) -> bool {
    voice_id.is_empty() || is_custom_voice(voice_id) || STANDARD_VOICES.contains(&voice_id)
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceMappingDTO {
    pub id: i32,
    pub username: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_photo: Option<String>,
    pub tts_voice_id: Option<String>,
    pub tts_remaining_trainings: i64,
    pub punked: bool,
    pub wallet_created_at: Option<DateTime<Utc>>,
}

impl VoiceMappingDTO {
    pub fn from_mapping(mapping: VoiceMapping, storage: &StorageConfig) -> Self {
        Self {
            id: mapping.user_id,
            profile_photo: storage.url_for(mapping.profile_photo.as_deref()),
            username: mapping.username,
            name: mapping.name,
            phone_number: mapping.phone_number,
            tts_voice_id: mapping.tts_voice_id,
            tts_remaining_trainings: mapping.tts_remaining_trainings,
            punked: mapping.punked,
            wallet_created_at: mapping.wallet_created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceMappingListDTO {
    pub users: Vec<VoiceMappingDTO>,
    pub pagination: PaginationDTO,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoiceMappingItem {
    pub user_id: i32,
    /// stringa vuota per rimuovere la voce
    pub voice_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VoiceMappingBatchRequest {
    pub mappings: Vec<VoiceMappingItem>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceMappingBatchDTO {
    pub success: bool,
    pub updated: u64,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct UpdateVoiceMappingRequest {
    pub voice_id: Option<String>,
    #[validate(range(min = 0, message = "remaining_trainings cannot be negative"))]
    pub remaining_trainings: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VoiceMappingResultDTO {
    pub success: bool,
    pub user: VoiceMappingDTO,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_id_format() {
        assert!(is_valid_voice_id(""));
        assert!(is_valid_voice_id("S_abc123"));
        assert!(is_valid_voice_id("BV003"));
        assert!(!is_valid_voice_id("BV006"));
        assert!(!is_valid_voice_id("custom"));
        assert!(is_custom_voice("S_x"));
        assert!(!is_custom_voice("BV001"));
    }

    #[test]
    fn test_negative_trainings_rejected() {
        let body = UpdateVoiceMappingRequest {
            voice_id: None,
            remaining_trainings: Some(-1),
        };
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_pagination_pages() {
        assert_eq!(PaginationDTO::new(1, 50, 0).total_pages, 0);
        assert_eq!(PaginationDTO::new(1, 50, 50).total_pages, 1);
        assert_eq!(PaginationDTO::new(2, 50, 51).total_pages, 2);
    }
}
