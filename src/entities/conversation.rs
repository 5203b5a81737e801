//! Conversation entity - chat privata tra due utenti

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Conversation {
    /// `"{min}_{max}"` degli id dei partecipanti
    pub conversation_id: String,
    pub participant1_id: i32,
    pub participant2_id: i32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Id deterministico della coppia, indipendente dall'ordine
    pub fn id_for(a: i32, b: i32) -> String {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        format!("{}_{}", low, high)
    }

    pub fn has_participant(&self, user_id: i32) -> bool {
        self.participant1_id == user_id || self.participant2_id == user_id
    }

    pub fn other_participant(&self, user_id: i32) -> i32 {
        if self.participant1_id == user_id {
            self.participant2_id
        } else {
            self.participant1_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_order_independent() {
        assert_eq!(Conversation::id_for(7, 3), "3_7");
        assert_eq!(Conversation::id_for(3, 7), "3_7");
    }

    #[test]
    fn test_other_participant() {
        let conv = Conversation {
            conversation_id: "1_2".into(),
            participant1_id: 1,
            participant2_id: 2,
            last_message_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(conv.other_participant(1), 2);
        assert_eq!(conv.other_participant(2), 1);
        assert!(!conv.has_participant(3));
    }
}
