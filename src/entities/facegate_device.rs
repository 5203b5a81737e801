//! FacegateDevice entity - varchi con riconoscimento facciale

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Un varco è online se ha inviato un heartbeat negli ultimi 120 secondi
pub const ONLINE_WINDOW_SECS: i64 = 120;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct FacegateDevice {
    pub id: i32,
    pub device_id: String,
    pub device_name: String,
    pub location: Option<String>,
    /// secondi unix dell'ultimo heartbeat
    pub last_seen_ts: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl FacegateDevice {
    pub fn is_online(&self, now_ts: i64) -> bool {
        self.last_seen_ts
            .is_some_and(|seen| now_ts - seen < ONLINE_WINDOW_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(last_seen_ts: Option<i64>) -> FacegateDevice {
        FacegateDevice {
            id: 1,
            device_id: "fg-001".into(),
            device_name: "Ingresso".into(),
            location: None,
            last_seen_ts,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_online_window() {
        assert!(device(Some(1_000)).is_online(1_119));
        assert!(!device(Some(1_000)).is_online(1_120));
        assert!(!device(None).is_online(1_000));
    }
}
