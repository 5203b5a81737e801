//! ConversationRepository - conversazioni private tra due utenti

use super::Read;
use crate::entities::Conversation;
use chrono::{DateTime, Utc};
use sqlx::{Error, SqliteConnection, SqlitePool};

const CONVERSATION_COLUMNS: &str =
    "conversation_id, participant1_id, participant2_id, last_message_at, created_at";

pub struct ConversationRepository {
    connection_pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Conversazioni dell'utente, dalla più recente; quelle senza messaggi in fondo
    pub async fn find_many_by_user_id(&self, user_id: i32) -> Result<Vec<Conversation>, Error> {
        let sql = format!(
            "SELECT {} FROM conversations WHERE participant1_id = ? OR participant2_id = ? \
             ORDER BY last_message_at IS NULL, last_message_at DESC, created_at DESC",
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Idempotente: ritorna la conversazione esistente della coppia se c'è già
    pub async fn find_or_create(&self, a: i32, b: i32) -> Result<Conversation, Error> {
        let mut conn = self.connection_pool.acquire().await?;
        ensure_conversation(&mut conn, a, b, Utc::now()).await
    }
}

/// Crea la conversazione della coppia se manca, dentro la connessione/transazione data
pub(crate) async fn ensure_conversation(
    conn: &mut SqliteConnection,
    a: i32,
    b: i32,
    now: DateTime<Utc>,
) -> Result<Conversation, Error> {
    let id = Conversation::id_for(a, b);
    let (low, high) = if a <= b { (a, b) } else { (b, a) };

    sqlx::query(
        "INSERT OR IGNORE INTO conversations \
         (conversation_id, participant1_id, participant2_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(low)
    .bind(high)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let sql = format!(
        "SELECT {} FROM conversations WHERE conversation_id = ?",
        CONVERSATION_COLUMNS
    );
    sqlx::query_as::<_, Conversation>(&sql)
        .bind(&id)
        .fetch_one(&mut *conn)
        .await
}

impl Read<Conversation, String> for ConversationRepository {
    async fn read(&self, id: &String) -> Result<Option<Conversation>, Error> {
        let sql = format!(
            "SELECT {} FROM conversations WHERE conversation_id = ?",
            CONVERSATION_COLUMNS
        );
        sqlx::query_as::<_, Conversation>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}
