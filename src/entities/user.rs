//! User entity - Entità utente con metodi per gestione password

use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: i32,
    pub username: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// hash bcrypt, stringa vuota per account creati solo via SMS
    #[serde(skip_serializing)]
    pub password: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    // nomi file nello storage, non URL
    pub profile_photo: Option<String>,
    pub cover_photo: Option<String>,
    pub punked: bool,
    pub tts_voice_id: Option<String>,
    pub ape_balance: f64,
    pub wallet_address: Option<String>,
    pub wallet_created_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Verify if target_password matches the stored hashed password
    pub fn verify_password(&self, target_password: &str) -> bool {
        if self.password.is_empty() {
            return false;
        }
        verify(target_password, &self.password).unwrap_or(false)
    }

    /// Hash a password using bcrypt with default cost
    pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
        let hash = hash(password, DEFAULT_COST)?;
        Ok(hash)
    }

    /// Nome da mostrare: name, poi username, poi telefono
    pub fn display_name(&self) -> String {
        [
            self.name.as_deref(),
            Some(self.username.as_str()),
            self.phone_number.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("用户")
        .to_string()
    }

    #[cfg(test)]
    pub fn for_tests(user_id: i32, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
            name: None,
            phone_number: None,
            email: None,
            password: String::new(),
            bio: None,
            website: None,
            profile_photo: None,
            cover_photo: None,
            punked: false,
            tts_voice_id: None,
            ape_balance: 0.0,
            wallet_address: None,
            wallet_created_at: None,
            last_activity_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Associazione utente → voce TTS vista dal backoffice
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct VoiceMapping {
    pub user_id: i32,
    pub username: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_photo: Option<String>,
    pub tts_voice_id: Option<String>,
    pub tts_remaining_trainings: i64,
    pub punked: bool,
    pub wallet_created_at: Option<DateTime<Utc>>,
}

/// Utente con i contatori social calcolati per chi sta guardando
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserWithStats {
    #[sqlx(flatten)]
    pub user: User,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = User::for_tests(1, "alice");
        user.name = Some("Alice".into());
        assert_eq!(user.display_name(), "Alice");

        user.name = Some("  ".into());
        assert_eq!(user.display_name(), "alice");

        user.username = String::new();
        user.phone_number = Some("13800000001".into());
        assert_eq!(user.display_name(), "13800000001");

        user.phone_number = None;
        assert_eq!(user.display_name(), "用户");
    }

    #[test]
    fn test_empty_password_never_verifies() {
        let user = User::for_tests(1, "alice");
        assert!(!user.verify_password(""));
    }
}
