//! Wallet DTOs - saldo, movimenti e red packet

use super::conversation::MessageDTO;
use crate::entities::{TransactionStatus, TransactionType, User, WalletTransaction};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug)]
pub struct WalletDTO {
    pub address: Option<String>,
    pub ape_balance: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<User> for WalletDTO {
    fn from(value: User) -> Self {
        Self {
            address: value.wallet_address,
            ape_balance: value.ape_balance,
            created_at: value.wallet_created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WalletTransactionDTO {
    pub id: i32,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: f64,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub from_user_id: Option<i32>,
    pub to_user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<WalletTransaction> for WalletTransactionDTO {
    fn from(value: WalletTransaction) -> Self {
        Self {
            id: value.transaction_id,
            tx_type: value.tx_type,
            amount: value.amount,
            status: value.status,
            description: value.description,
            from_user_id: value.from_user_id,
            to_user_id: value.to_user_id,
            created_at: value.created_at,
            completed_at: value.completed_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct RedPacketRequest {
    pub recipient_id: i32,
    #[validate(range(exclusive_min = 0.0, message = "Amount must be positive"))]
    pub amount: f64,
    #[validate(length(max = 100, message = "Message must be at most 100 characters"))]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RedPacketDTO {
    pub success: bool,
    pub transaction_id: i32,
    pub message_id: i32,
    pub message: MessageDTO,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BalanceDTO {
    pub ape_balance: f64,
    pub last_updated: DateTime<Utc>,
    pub last_updated_label: String,
}

/// Etichetta relativa per l'ultimo aggiornamento del saldo
pub fn format_last_updated(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - ts;
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "刚刚更新".to_string();
    }
    if minutes < 60 {
        return format!("{}分钟前", minutes);
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{}小时前", hours);
    }
    let days = elapsed.num_days();
    if days < 7 {
        return format!("{}天前", days);
    }
    format!(
        "{}/{} {:02}:{:02}",
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-20T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_format_last_updated_buckets() {
        assert_eq!(format_last_updated(now() - Duration::seconds(30), now()), "刚刚更新");
        assert_eq!(format_last_updated(now() - Duration::minutes(5), now()), "5分钟前");
        assert_eq!(format_last_updated(now() - Duration::minutes(59), now()), "59分钟前");
        assert_eq!(format_last_updated(now() - Duration::hours(3), now()), "3小时前");
        assert_eq!(format_last_updated(now() - Duration::days(2), now()), "2天前");
    }

    #[test]
    fn test_format_last_updated_absolute_date() {
        let ts = DateTime::parse_from_rfc3339("2024-05-03T08:07:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_last_updated(ts, now()), "5/3 08:07");
    }

    #[test]
    fn test_format_last_updated_future_timestamp() {
        // orologi non allineati: trattato come appena aggiornato
        assert_eq!(format_last_updated(now() + Duration::minutes(2), now()), "刚刚更新");
    }
}
