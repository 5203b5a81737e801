//! WalletRepository - saldo APE e movimenti
//!
//! Tutte le operazioni che toccano più di un saldo girano in una transazione.

use super::conversation::ensure_conversation;
use super::message::insert_message;
use super::user::USER_COLUMNS;
use crate::dtos::CreateMessageDTO;
use crate::entities::{
    Message, MessageType, TransactionStatus, TransactionType, User, WalletTransaction,
};
use chrono::{DateTime, Utc};
use sqlx::{Error, SqliteConnection, SqlitePool};

pub const WELCOME_BONUS: f64 = 100.0;

const TX_COLUMNS: &str = "transaction_id, tx_type, amount, status, description, from_user_id, \
     to_user_id, created_at, completed_at";

/// Esito di un invio red packet
#[derive(Debug)]
pub enum RedPacketOutcome {
    Sent {
        transaction: WalletTransaction,
        message: Message,
    },
    InsufficientBalance,
}

/// Indirizzo deterministico: `0x` + hex dell'id utente, completato con `0` a 40 caratteri
pub fn wallet_address_for(user_id: i32) -> String {
    let hex: String = user_id
        .to_string()
        .bytes()
        .map(|b| format!("{:02x}", b))
        .collect();
    let mut body = format!("{:0<40}", hex);
    body.truncate(40);
    format!("0x{}", body)
}

pub struct WalletRepository {
    connection_pool: SqlitePool,
}

impl WalletRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Crea il wallet al primo accesso con il bonus di benvenuto.
    /// Se il wallet esiste già ritorna l'utente invariato.
    pub async fn ensure_wallet(&self, user_id: i32, now: DateTime<Utc>) -> Result<User, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let created = sqlx::query(
            "UPDATE users SET wallet_address = ?, wallet_created_at = ?, ape_balance = ape_balance + ? \
             WHERE user_id = ? AND wallet_address IS NULL",
        )
        .bind(wallet_address_for(user_id))
        .bind(now)
        .bind(WELCOME_BONUS)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if created.rows_affected() > 0 {
            insert_transaction(
                &mut tx,
                TransactionType::Reward,
                WELCOME_BONUS,
                Some("钱包开通奖励".to_string()),
                None,
                Some(user_id),
                now,
            )
            .await?;
        }

        let sql = format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::RowNotFound)?;

        tx.commit().await?;
        Ok(user)
    }

    /// Movimenti in cui l'utente è mittente o destinatario, dal più recente
    pub async fn list_transactions(
        &self,
        user_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, Error> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE from_user_id = ? OR to_user_id = ? \
             ORDER BY created_at DESC, transaction_id DESC LIMIT ? OFFSET ?",
            TX_COLUMNS
        );
        sqlx::query_as::<_, WalletTransaction>(&sql)
            .bind(user_id)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Data dell'ultimo movimento dell'utente, se presente
    pub async fn last_activity_at(&self, user_id: i32) -> Result<Option<DateTime<Utc>>, Error> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT created_at FROM wallet_transactions WHERE from_user_id = ? OR to_user_id = ? \
             ORDER BY created_at DESC, transaction_id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await?;
        Ok(row.map(|(at,)| at))
    }

    /// Trasferimento APE consegnato come messaggio RED_PACKET nella chat della coppia.
    /// Addebito, accredito, movimento, messaggio e `last_message_at` in una sola transazione.
    pub async fn send_red_packet(
        &self,
        from_user_id: i32,
        to_user_id: i32,
        amount: f64,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RedPacketOutcome, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let debited = sqlx::query(
            "UPDATE users SET ape_balance = ape_balance - ? WHERE user_id = ? AND ape_balance >= ?",
        )
        .bind(amount)
        .bind(from_user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;
        if debited.rows_affected() == 0 {
            return Ok(RedPacketOutcome::InsufficientBalance);
        }

        let credited = sqlx::query("UPDATE users SET ape_balance = ape_balance + ? WHERE user_id = ?")
            .bind(amount)
            .bind(to_user_id)
            .execute(&mut *tx)
            .await?;
        if credited.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }

        let description = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("红包转账")
            .to_string();
        let transaction = insert_transaction(
            &mut tx,
            TransactionType::Transfer,
            amount,
            Some(description),
            Some(from_user_id),
            Some(to_user_id),
            now,
        )
        .await?;

        let conversation = ensure_conversation(&mut tx, from_user_id, to_user_id, now).await?;
        let message = insert_message(
            &mut tx,
            &CreateMessageDTO {
                conversation_id: conversation.conversation_id,
                sender_id: from_user_id,
                content: "发送了红包".to_string(),
                message_type: MessageType::RedPacket,
                red_packet_amount: Some(amount),
                created_at: now,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(RedPacketOutcome::Sent {
            transaction,
            message,
        })
    }
}

pub(crate) async fn insert_transaction(
    conn: &mut SqliteConnection,
    tx_type: TransactionType,
    amount: f64,
    description: Option<String>,
    from_user_id: Option<i32>,
    to_user_id: Option<i32>,
    now: DateTime<Utc>,
) -> Result<WalletTransaction, Error> {
    let sql = format!(
        "INSERT INTO wallet_transactions \
         (tx_type, amount, status, description, from_user_id, to_user_id, created_at, completed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        TX_COLUMNS
    );
    sqlx::query_as::<_, WalletTransaction>(&sql)
        .bind(tx_type)
        .bind(amount)
        .bind(TransactionStatus::Completed)
        .bind(description)
        .bind(from_user_id)
        .bind(to_user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
}
