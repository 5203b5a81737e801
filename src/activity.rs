//! Stato di attività (AFK) degli utenti
//!
//! Un utente è AFK se la sua ultima attività risale a più di 15 minuti fa.

use crate::entities::User;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const AFK_THRESHOLD_MINUTES: i64 = 15;

pub fn afk_threshold() -> Duration {
    Duration::minutes(AFK_THRESHOLD_MINUTES)
}

/// Nessuna attività registrata conta come AFK
pub fn is_afk(last_activity_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_activity_at {
        Some(last) => now - last > afk_threshold(),
        None => true,
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ActivityStatus {
    pub is_afk: bool,
    pub is_punked: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl ActivityStatus {
    /// Nella vista di stato un utente mai attivo non viene mostrato come AFK
    pub fn of(user: &User, now: DateTime<Utc>) -> Self {
        let is_afk = match user.last_activity_at {
            Some(_) => is_afk(user.last_activity_at, now),
            None => false,
        };
        Self {
            is_afk,
            is_punked: user.punked,
            last_activity_at: user.last_activity_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_is_afk_thresholds() {
        assert!(is_afk(None, now()));
        assert!(!is_afk(Some(now() - Duration::minutes(14)), now()));
        assert!(!is_afk(Some(now() - Duration::minutes(15)), now()));
        assert!(is_afk(Some(now() - Duration::minutes(16)), now()));
    }

    #[test]
    fn test_status_for_user_without_activity() {
        let mut user = User::for_tests(1, "alice");
        user.punked = true;
        let status = ActivityStatus::of(&user, now());
        assert!(!status.is_afk);
        assert!(status.is_punked);
        assert_eq!(status.last_activity_at, None);
    }

    #[test]
    fn test_status_for_idle_user() {
        let mut user = User::for_tests(1, "alice");
        user.last_activity_at = Some(now() - Duration::hours(1));
        let status = ActivityStatus::of(&user, now());
        assert!(status.is_afk);
        assert!(!status.is_punked);
    }
}
