//! Task DTOs - richieste e risposte del ciclo di vita dei post task

use super::post::PostDTO;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body di POST /posts/{post_id}/confirm-completion
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfirmCompletionRequest {
    pub approved: bool,
}

/// Body di POST /posts/{post_id}/handle-completion e handle-task-outcome.
/// L'azione resta testuale: un valore sconosciuto è un 400, non un errore di parsing.
#[derive(Serialize, Deserialize, Debug)]
pub struct TaskActionRequest {
    pub action: String,
}

/// Decisioni dell'autore su una richiesta di completamento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAction {
    Complete,
    /// non conforme: saldo restituito, task ENDED
    Reject,
    Fail,
}

impl CompletionAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "complete" => Some(Self::Complete),
            "reject" => Some(Self::Reject),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TaskActionDTO {
    pub success: bool,
    pub message: String,
    pub post: PostDTO,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ExpiryReportDTO {
    pub success: bool,
    pub processed: u64,
    pub total_refunded: f64,
    pub timestamp: DateTime<Utc>,
}
