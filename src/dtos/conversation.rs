//! Conversation DTOs - conversazioni private e messaggi

use super::user::UserSummaryDTO;
use crate::entities::{Conversation, Message, MessageType, User};
use crate::storage::StorageConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Struct per gestire io col client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageDTO {
    pub id: i32,
    pub conversation_id: String,
    pub sender_id: i32,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_packet_amount: Option<f64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageDTO {
    fn from(value: Message) -> Self {
        Self {
            id: value.message_id,
            conversation_id: value.conversation_id,
            sender_id: value.sender_id,
            content: value.content,
            message_type: value.message_type,
            red_packet_amount: value.red_packet_amount,
            is_read: value.is_read,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversationDTO {
    pub id: String,
    pub other_user: Option<UserSummaryDTO>,
    pub last_message: Option<MessageDTO>,
    pub unread_count: i64,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ConversationDTO {
    pub fn assemble(
        conversation: Conversation,
        other_user: Option<&User>,
        last_message: Option<Message>,
        unread_count: i64,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            id: conversation.conversation_id,
            other_user: other_user.map(|u| UserSummaryDTO::from_user(u, storage)),
            last_message: last_message.map(MessageDTO::from),
            unread_count,
            last_message_at: conversation.last_message_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateConversationRequest {
    pub target_user_id: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct SendMessageRequest {
    #[validate(length(max = 5000, message = "Message content must be at most 5000 characters"))]
    pub content: String,
}

/// DTO per creare un nuovo messaggio (senza message_id)
#[derive(Debug, Clone)]
pub struct CreateMessageDTO {
    pub conversation_id: String,
    pub sender_id: i32,
    pub content: String,
    pub message_type: MessageType,
    pub red_packet_amount: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MarkReadDTO {
    pub success: bool,
    pub marked_as_read: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageSearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UploadedFileDTO {
    pub url: String,
}
