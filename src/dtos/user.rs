//! User DTOs - Data Transfer Objects per utenti

use crate::entities::{User, UserWithStats};
use crate::storage::StorageConfig;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

lazy_static! {
    static ref PHONE_CHARS: Regex = Regex::new(r"^\+?[0-9\s\-()]+$").expect("phone regex");
    pub(crate) static ref USERNAME: Regex = Regex::new(r"^[\w.]{2,30}$").expect("username regex");
}

/// Accetta spazi, trattini e parentesi ma richiede tra 10 e 15 cifre
pub fn validate_phone_number(value: &str) -> Result<(), ValidationError> {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    if !PHONE_CHARS.is_match(value) || !(10..=15).contains(&digits) {
        let mut err = ValidationError::new("phone_number");
        err.message = Some("Phone number must contain 10 to 15 digits".into());
        return Err(err);
    }
    Ok(())
}

/// Gli username di sole cifre sono riservati: quello predefinito è il telefono
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("username");
        err.message = Some("Username cannot be made of digits only".into());
        return Err(err);
    }
    Ok(())
}

/// Riepilogo autore usato in post, commenti e conversazioni
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserSummaryDTO {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub profile_photo: Option<String>,
    pub punked: bool,
}

impl UserSummaryDTO {
    pub fn from_user(user: &User, storage: &StorageConfig) -> Self {
        Self {
            id: user.user_id,
            username: user.username.clone(),
            name: user.display_name(),
            profile_photo: storage.url_for(user.profile_photo.as_deref()),
            punked: user.punked,
        }
    }
}

// struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserDTO {
    pub id: i32,
    pub username: String,
    pub name: String,
    /// esposto solo al proprietario del profilo
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub profile_photo: Option<String>,
    pub cover_photo: Option<String>,
    pub punked: bool,
    pub tts_voice_id: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
    pub created_at: DateTime<Utc>,
}

impl UserDTO {
    pub fn from_user(user: User, storage: &StorageConfig) -> Self {
        Self {
            id: user.user_id,
            name: user.display_name(),
            profile_photo: storage.url_for(user.profile_photo.as_deref()),
            cover_photo: storage.url_for(user.cover_photo.as_deref()),
            username: user.username,
            phone_number: None, // mai esposto ad altri utenti
            email: user.email,
            bio: user.bio,
            website: user.website,
            punked: user.punked,
            tts_voice_id: user.tts_voice_id,
            follower_count: 0,
            following_count: 0,
            is_following: false,
            created_at: user.created_at,
        }
    }

    pub fn from_stats(stats: UserWithStats, storage: &StorageConfig) -> Self {
        let mut dto = Self::from_user(stats.user, storage);
        dto.follower_count = stats.follower_count;
        dto.following_count = stats.following_count;
        dto.is_following = stats.is_following;
        dto
    }

    /// Vista del proprio profilo: include il telefono
    pub fn for_owner(mut self, user: &User) -> Self {
        self.phone_number = user.phone_number.clone();
        self
    }
}

/// DTO per creare un nuovo utente (senza user_id)
#[derive(Debug, Clone, Default)]
pub struct CreateUserDTO {
    pub username: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// già hashata
    pub password: String,
    pub tts_voice_id: Option<String>,
}

/// Body di PATCH /users/{user_id}/password
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, max = 100, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// DTO per aggiornare un utente (solo i campi `Some` vengono modificati)
#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateUserDTO {
    #[validate(
        regex(path = *USERNAME, message = "Username must be 2-30 letters, digits, '_' or '.'"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,
    #[validate(length(max = 160, message = "Bio must be at most 160 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "Website must be a valid URL"))]
    pub website: Option<String>,
    #[serde(skip)]
    pub profile_photo: Option<String>,
    #[serde(skip)]
    pub cover_photo: Option<String>,
    #[serde(skip)]
    pub tts_voice_id: Option<String>,
    #[serde(skip)]
    pub punked: Option<bool>,
}

/// PUT /users/me/tts-settings
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct TtsSettingsDTO {
    #[validate(length(min = 1, max = 100, message = "Voice id must be between 1 and 100 characters"))]
    pub tts_voice_id: Option<String>,
    pub punked: Option<bool>,
}

#[derive(Serialize, Debug)]
pub struct PunkedFollowersDTO {
    pub count: usize,
    pub users: Vec<UserSummaryDTO>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FollowRequestDTO {
    pub user_id_to_follow: i32,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PhotoKindQuery {
    #[serde(default)]
    pub kind: PhotoKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    #[default]
    Profile,
    Cover,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_validation() {
        assert!(validate_phone_number("13800000001").is_ok());
        assert!(validate_phone_number("+86 138-0000-0001").is_ok());
        assert!(validate_phone_number("12345").is_err());
        assert!(validate_phone_number("1380000000a").is_err());
        assert!(validate_phone_number("1234567890123456").is_err());
    }

    #[test]
    fn test_update_validation() {
        let dto = UpdateUserDTO {
            website: Some("not a url".into()),
            ..Default::default()
        };
        assert!(dto.validate().is_err());

        let dto = UpdateUserDTO {
            username: Some("alice_99".into()),
            website: Some("https://alice.dev".into()),
            ..Default::default()
        };
        assert!(dto.validate().is_ok());

        let dto = UpdateUserDTO {
            username: Some("18874748888".into()),
            ..Default::default()
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_username_digits_only_rejected() {
        assert!(validate_username("13800000001").is_err());
        assert!(validate_username("alice2").is_ok());
        assert!(validate_username("2024.bob").is_ok());
    }
}
