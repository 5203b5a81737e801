//! MessageRepository - Repository per la gestione dei messaggi

use super::{Create, Read, like_contains};
use crate::dtos::CreateMessageDTO;
use crate::entities::Message;
use sqlx::{Error, SqliteConnection, SqlitePool};

const MESSAGE_COLUMNS: &str = "message_id, conversation_id, sender_id, content, message_type, \
     red_packet_amount, is_read, created_at";

// MESSAGE REPO
pub struct MessageRepository {
    connection_pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Tutti i messaggi di una conversazione in ordine cronologico
    pub async fn find_many_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, Error> {
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, message_id ASC",
            MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .fetch_all(&self.connection_pool)
            .await
    }

    pub async fn find_last(&self, conversation_id: &str) -> Result<Option<Message>, Error> {
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ? \
             ORDER BY created_at DESC, message_id DESC LIMIT 1",
            MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(conversation_id)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Messaggi non letti ricevuti da `reader_id`
    pub async fn count_unread(&self, conversation_id: &str, reader_id: i32) -> Result<i64, Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ? AND is_read = 0 AND sender_id != ?",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_one(&self.connection_pool)
        .await
    }

    /// Segna come letti i messaggi dell'altro partecipante, ritorna quanti
    pub async fn mark_read(&self, conversation_id: &str, reader_id: i32) -> Result<u64, Error> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE conversation_id = ? AND sender_id != ? AND is_read = 0",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(&self.connection_pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Ricerca case-insensitive nelle conversazioni dell'utente
    pub async fn search_for_user(&self, user_id: i32, query: &str) -> Result<Vec<Message>, Error> {
        let sql = format!(
            "SELECT {} FROM messages m WHERE m.conversation_id IN \
             (SELECT conversation_id FROM conversations WHERE participant1_id = ? OR participant2_id = ?) \
             AND LOWER(m.content) LIKE ? ESCAPE '\\' \
             ORDER BY m.created_at DESC, m.message_id DESC LIMIT 50",
            MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, Message>(&sql)
            .bind(user_id)
            .bind(user_id)
            .bind(like_contains(&query.to_lowercase()))
            .fetch_all(&self.connection_pool)
            .await
    }
}

/// Inserisce il messaggio e aggiorna `last_message_at` della conversazione
pub(crate) async fn insert_message(
    conn: &mut SqliteConnection,
    data: &CreateMessageDTO,
) -> Result<Message, Error> {
    let sql = format!(
        "INSERT INTO messages \
         (conversation_id, sender_id, content, message_type, red_packet_amount, is_read, created_at) \
         VALUES (?, ?, ?, ?, ?, 0, ?) RETURNING {}",
        MESSAGE_COLUMNS
    );
    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(&data.conversation_id)
        .bind(data.sender_id)
        .bind(&data.content)
        .bind(data.message_type)
        .bind(data.red_packet_amount)
        .bind(data.created_at)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query("UPDATE conversations SET last_message_at = ? WHERE conversation_id = ?")
        .bind(data.created_at)
        .bind(&data.conversation_id)
        .execute(&mut *conn)
        .await?;

    Ok(message)
}

impl Create<Message, CreateMessageDTO> for MessageRepository {
    async fn create(&self, data: &CreateMessageDTO) -> Result<Message, Error> {
        let mut tx = self.connection_pool.begin().await?;
        let message = insert_message(&mut tx, data).await?;
        tx.commit().await?;
        Ok(message)
    }
}

impl Read<Message, i32> for MessageRepository {
    async fn read(&self, id: &i32) -> Result<Option<Message>, Error> {
        let sql = format!("SELECT {} FROM messages WHERE message_id = ?", MESSAGE_COLUMNS);
        sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}
