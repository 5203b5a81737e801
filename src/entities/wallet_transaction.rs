//! WalletTransaction entity - movimenti di APE

use super::enums::{TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct WalletTransaction {
    pub transaction_id: i32,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub from_user_id: Option<i32>,
    pub to_user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
