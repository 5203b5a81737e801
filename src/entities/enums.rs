//! Enumerazioni - Tipi enumerati utilizzati nelle entità

use serde::{Deserialize, Serialize};

// ********************* ENUMERAZIONI UTILI **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum MediaType {
    Photo,
    Video,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Image,
    RedPacket,
    /// esito di un passaggio del task, scritto dal server
    System,
    TaskCompletionRequest,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Reward,
    Transfer,
    TaskPost,
    RedPacket,
    Refund,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Open,
    InProgress,
    CompletionRequested,
    Completed,
    /// chiuso dal proprietario senza pagare il saldo
    Ended,
    Failed,
    /// nessuno l'ha accettato entro il termine
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "OPEN",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::CompletionRequested => "COMPLETION_REQUESTED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Ended => "ENDED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Expired => "EXPIRED",
        }
    }

    /// La ricompensa è già stata pagata o restituita
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Ended | TaskStatus::Failed | TaskStatus::Expired
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}
