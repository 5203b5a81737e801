//! Message entity - Entità messaggio

use super::enums::MessageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub message_id: i32,
    pub conversation_id: String,
    pub sender_id: i32,
    pub content: String,
    // campo rinominato perchè type è una parola protetta
    pub message_type: MessageType,
    pub red_packet_amount: Option<f64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
