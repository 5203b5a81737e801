//! TaskRepository - ciclo di vita dei post task e movimenti di escrow
//!
//! La ricompensa viene scalata all'autore quando il task è pubblicato e resta
//! in escrow: metà va a chi accetta, l'altra metà alla conferma oppure torna
//! all'autore. Ogni transizione è un UPDATE condizionato sullo stato atteso,
//! così due richieste concorrenti non possono pagare due volte.

use super::conversation::ensure_conversation;
use super::message::insert_message;
use super::post::POST_COLUMNS;
use super::wallet::insert_transaction;
use crate::dtos::CreateMessageDTO;
use crate::entities::{Message, MessageType, Post, TaskStatus, TransactionType};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Error, SqliteConnection, SqlitePool};
use tracing::{info, warn};

/// Giorni dopo i quali un task mai accettato scade
pub const TASK_EXPIRY_DAYS: i64 = 30;

/// Quota della ricompensa pagata all'accettazione
const INITIAL_SHARE: f64 = 0.5;

/// Prime 50 lettere del contenuto, per le descrizioni dei movimenti
fn excerpt(post: &Post) -> String {
    post.content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(50)
        .collect()
}

/// Ripartizione della ricompensa: (acconto, saldo)
pub fn split_reward(reward: f64) -> (f64, f64) {
    let initial = reward * INITIAL_SHARE;
    (initial, reward - initial)
}

async fn credit(conn: &mut SqliteConnection, user_id: i32, amount: f64) -> Result<(), Error> {
    let result = sqlx::query("UPDATE users SET ape_balance = ape_balance + ? WHERE user_id = ?")
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::RowNotFound);
    }
    Ok(())
}

/// Messaggio nella chat tra autore e esecutore
async fn notify(
    conn: &mut SqliteConnection,
    sender_id: i32,
    receiver_id: i32,
    content: String,
    message_type: MessageType,
    amount: Option<f64>,
    now: DateTime<Utc>,
) -> Result<Message, Error> {
    let conversation = ensure_conversation(conn, sender_id, receiver_id, now).await?;
    insert_message(
        conn,
        &CreateMessageDTO {
            conversation_id: conversation.conversation_id,
            sender_id,
            content,
            message_type,
            red_packet_amount: amount,
            created_at: now,
        },
    )
    .await
}

/// Chiusura di un task con il saldo restituito all'autore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalRefund {
    /// concluso senza pagare il saldo
    Ended,
    Failed,
}

impl FinalRefund {
    fn status(self) -> TaskStatus {
        match self {
            FinalRefund::Ended => TaskStatus::Ended,
            FinalRefund::Failed => TaskStatus::Failed,
        }
    }

    fn description(self, post: &Post) -> String {
        match self {
            FinalRefund::Ended => format!("任务尾款退回 - {}", excerpt(post)),
            FinalRefund::Failed => format!("任务失败退款 - {}", excerpt(post)),
        }
    }

    fn note(self, amount: f64) -> String {
        match self {
            FinalRefund::Ended => format!(
                "⚠️ 任务尾款已拒付\n\n任务已结束，{} APE 尾款已退回发布者账户",
                amount
            ),
            FinalRefund::Failed => format!(
                "❌ 任务已标记为失败\n\n{} APE 尾款已退回发布者账户",
                amount
            ),
        }
    }
}

/// Riepilogo di un passaggio di scadenza
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ExpirySummary {
    pub processed: u64,
    pub total_refunded: f64,
}

pub struct TaskRepository {
    connection_pool: SqlitePool,
}

impl TaskRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// OPEN → IN_PROGRESS: l'esecutore riceve subito l'acconto dall'escrow
    ///
    /// # Returns
    /// * `Ok(None)` se il task non era più OPEN
    pub async fn accept(
        &self,
        post: &Post,
        acceptor_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, Error> {
        let (initial, final_amount) = split_reward(post.reward_amount);
        let mut tx = self.connection_pool.begin().await?;

        let sql = format!(
            "UPDATE posts SET task_status = ?, completed_by = ?, accepted_at = ?, \
             initial_payment_amount = ?, final_payment_amount = ? \
             WHERE post_id = ? AND is_task = 1 AND task_status = ? RETURNING {}",
            POST_COLUMNS
        );
        let Some(updated) = sqlx::query_as::<_, Post>(&sql)
            .bind(TaskStatus::InProgress)
            .bind(acceptor_id)
            .bind(now)
            .bind(initial)
            .bind(final_amount)
            .bind(post.post_id)
            .bind(TaskStatus::Open)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if initial > 0.0 {
            credit(&mut tx, acceptor_id, initial).await?;
            insert_transaction(
                &mut tx,
                TransactionType::Reward,
                initial,
                Some(format!("任务佣金（首付50%） - {}", excerpt(post))),
                Some(post.user_id),
                Some(acceptor_id),
                now,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// IN_PROGRESS → COMPLETION_REQUESTED, con la richiesta in chat all'autore
    pub async fn request_completion(
        &self,
        post: &Post,
        acceptor_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<(Post, Message)>, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let sql = format!(
            "UPDATE posts SET task_status = ?, completion_requested_at = ? \
             WHERE post_id = ? AND completed_by = ? AND task_status = ? RETURNING {}",
            POST_COLUMNS
        );
        let Some(updated) = sqlx::query_as::<_, Post>(&sql)
            .bind(TaskStatus::CompletionRequested)
            .bind(now)
            .bind(post.post_id)
            .bind(acceptor_id)
            .bind(TaskStatus::InProgress)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let message = notify(
            &mut tx,
            acceptor_id,
            post.user_id,
            "任务完成申请已提交".to_string(),
            MessageType::TaskCompletionRequest,
            Some(updated.final_payment_amount),
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(Some((updated, message)))
    }

    /// COMPLETION_REQUESTED → COMPLETED: il saldo esce dall'escrow verso l'esecutore
    /// e arriva in chat come red packet. `note` aggiunge un messaggio di sistema.
    pub async fn complete(
        &self,
        post: &Post,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, Error> {
        let Some(acceptor_id) = post.completed_by else {
            return Ok(None);
        };
        let mut tx = self.connection_pool.begin().await?;

        let Some(updated) =
            close_requested(&mut tx, post.post_id, TaskStatus::Completed, now).await?
        else {
            return Ok(None);
        };

        let amount = updated.final_payment_amount;
        if amount > 0.0 {
            credit(&mut tx, acceptor_id, amount).await?;
            insert_transaction(
                &mut tx,
                TransactionType::Reward,
                amount,
                Some(format!("任务佣金（尾款50%） - {}", excerpt(post))),
                Some(post.user_id),
                Some(acceptor_id),
                now,
            )
            .await?;
            notify(
                &mut tx,
                post.user_id,
                acceptor_id,
                "任务佣金红包（尾款）".to_string(),
                MessageType::RedPacket,
                Some(amount),
                now,
            )
            .await?;
        }
        if let Some(note) = note {
            notify(
                &mut tx,
                post.user_id,
                acceptor_id,
                note.to_string(),
                MessageType::System,
                None,
                now,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// COMPLETION_REQUESTED → IN_PROGRESS: l'esecutore deve riprovare
    pub async fn deny_completion(
        &self,
        post: &Post,
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, Error> {
        let Some(acceptor_id) = post.completed_by else {
            return Ok(None);
        };
        let mut tx = self.connection_pool.begin().await?;

        let sql = format!(
            "UPDATE posts SET task_status = ?, completion_requested_at = NULL \
             WHERE post_id = ? AND task_status = ? RETURNING {}",
            POST_COLUMNS
        );
        let Some(updated) = sqlx::query_as::<_, Post>(&sql)
            .bind(TaskStatus::InProgress)
            .bind(post.post_id)
            .bind(TaskStatus::CompletionRequested)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        notify(
            &mut tx,
            post.user_id,
            acceptor_id,
            "❌ 任务完成申请被拒绝\n\n请继续完成任务后重新申请".to_string(),
            MessageType::System,
            None,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// COMPLETION_REQUESTED → ENDED/FAILED: il saldo torna all'autore
    pub async fn refund_final(
        &self,
        post: &Post,
        outcome: FinalRefund,
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, Error> {
        let Some(acceptor_id) = post.completed_by else {
            return Ok(None);
        };
        let mut tx = self.connection_pool.begin().await?;

        let Some(updated) = close_requested(&mut tx, post.post_id, outcome.status(), now).await?
        else {
            return Ok(None);
        };

        let amount = updated.final_payment_amount;
        if amount > 0.0 {
            credit(&mut tx, post.user_id, amount).await?;
            insert_transaction(
                &mut tx,
                TransactionType::Refund,
                amount,
                Some(outcome.description(post)),
                Some(post.user_id),
                Some(post.user_id),
                now,
            )
            .await?;
        }
        notify(
            &mut tx,
            post.user_id,
            acceptor_id,
            outcome.note(amount),
            MessageType::System,
            None,
            now,
        )
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// Cancella un task ancora OPEN restituendo l'intera ricompensa
    ///
    /// # Returns
    /// * `Ok(false)` se il task non era più OPEN (nulla viene scritto)
    pub async fn delete_open(&self, post: &Post, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM posts WHERE post_id = ? AND task_status = ?")
            .bind(post.post_id)
            .bind(TaskStatus::Open)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        if post.reward_amount > 0.0 {
            credit(&mut tx, post.user_id, post.reward_amount).await?;
            insert_transaction(
                &mut tx,
                TransactionType::Refund,
                post.reward_amount,
                Some(format!("任务取消退款 - {}", excerpt(post))),
                Some(post.user_id),
                Some(post.user_id),
                now,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Task OPEN pubblicati prima di `cutoff`
    pub async fn find_unclaimed_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Post>, Error> {
        let sql = format!(
            "SELECT {} FROM posts WHERE is_task = 1 AND task_status = ? AND created_at < ? \
             ORDER BY post_id ASC",
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(TaskStatus::Open)
            .bind(cutoff)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// OPEN da più di `TASK_EXPIRY_DAYS` → EXPIRED con rimborso completo.
    /// Ogni task ha la sua transazione: un errore salta solo quel task.
    pub async fn expire_unclaimed(&self, now: DateTime<Utc>) -> Result<ExpirySummary, Error> {
        let cutoff = now - Duration::days(TASK_EXPIRY_DAYS);
        let mut summary = ExpirySummary::default();

        for post in self.find_unclaimed_before(cutoff).await? {
            match self.expire_one(&post, now).await {
                Ok(true) => {
                    summary.processed += 1;
                    summary.total_refunded += post.reward_amount;
                    info!(
                        "Expired task {} and refunded {} APE",
                        post.post_id, post.reward_amount
                    );
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to expire task {}: {}", post.post_id, e),
            }
        }

        Ok(summary)
    }

    async fn expire_one(&self, post: &Post, now: DateTime<Utc>) -> Result<bool, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE posts SET task_status = ?, completion_confirmed_at = ? \
             WHERE post_id = ? AND task_status = ?",
        )
        .bind(TaskStatus::Expired)
        .bind(now)
        .bind(post.post_id)
        .bind(TaskStatus::Open)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        if post.reward_amount > 0.0 {
            credit(&mut tx, post.user_id, post.reward_amount).await?;
            insert_transaction(
                &mut tx,
                TransactionType::Refund,
                post.reward_amount,
                Some(format!(
                    "任务过期退款（{}天无人揭榜） - {}",
                    TASK_EXPIRY_DAYS,
                    excerpt(post)
                )),
                Some(post.user_id),
                Some(post.user_id),
                now,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

/// Chiude una richiesta di completamento pendente nello stato dato
async fn close_requested(
    conn: &mut SqliteConnection,
    post_id: i32,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<Option<Post>, Error> {
    let sql = format!(
        "UPDATE posts SET task_status = ?, completion_confirmed_at = ? \
         WHERE post_id = ? AND task_status = ? RETURNING {}",
        POST_COLUMNS
    );
    sqlx::query_as::<_, Post>(&sql)
        .bind(status)
        .bind(now)
        .bind(post_id)
        .bind(TaskStatus::CompletionRequested)
        .fetch_optional(&mut *conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::CreatePostDTO;
    use crate::repositories::{PostRepository, Read};

    async fn balance(pool: &SqlitePool, user_id: i32) -> sqlx::Result<f64> {
        sqlx::query_scalar("SELECT ape_balance FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
    }

    async fn publish_task(
        pool: &SqlitePool,
        reward: f64,
        created_at: DateTime<Utc>,
    ) -> sqlx::Result<Post> {
        let post = PostRepository::new(pool.clone())
            .create_with_media(&CreatePostDTO {
                user_id: 1,
                content: Some("Portare la spesa".into()),
                is_task: true,
                reward_amount: reward,
                media: Vec::new(),
                created_at,
            })
            .await?
            .expect("alice can afford the reward");
        Ok(post)
    }

    #[test]
    fn test_split_reward() {
        assert_eq!(split_reward(50.0), (25.0, 25.0));
        assert_eq!(split_reward(0.0), (0.0, 0.0));
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_full_escrow_flow(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = TaskRepository::new(pool.clone());
        let post = publish_task(&pool, 50.0, Utc::now()).await?;
        assert_eq!(balance(&pool, 1).await?, 150.0);

        let accepted = repo.accept(&post, 2, Utc::now()).await?.expect("open task");
        assert_eq!(accepted.task_status, Some(TaskStatus::InProgress));
        assert_eq!(accepted.completed_by, Some(2));
        assert_eq!(balance(&pool, 2).await?, 75.0);

        // un secondo accept non paga di nuovo
        assert!(repo.accept(&post, 3, Utc::now()).await?.is_none());
        assert_eq!(balance(&pool, 3).await?, 0.0);

        let (requested, message) = repo
            .request_completion(&accepted, 2, Utc::now())
            .await?
            .expect("in progress");
        assert_eq!(requested.task_status, Some(TaskStatus::CompletionRequested));
        assert_eq!(message.message_type, MessageType::TaskCompletionRequest);

        let completed = repo
            .complete(&requested, None, Utc::now())
            .await?
            .expect("completion requested");
        assert_eq!(completed.task_status, Some(TaskStatus::Completed));
        assert_eq!(balance(&pool, 2).await?, 100.0);
        // l'autore ha pagato una sola volta
        assert_eq!(balance(&pool, 1).await?, 150.0);

        assert!(repo.complete(&completed, None, Utc::now()).await?.is_none());
        assert_eq!(balance(&pool, 2).await?, 100.0);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_refund_final_returns_second_half(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = TaskRepository::new(pool.clone());
        let post = publish_task(&pool, 50.0, Utc::now()).await?;
        let accepted = repo.accept(&post, 2, Utc::now()).await?.expect("open task");
        let (requested, _) = repo
            .request_completion(&accepted, 2, Utc::now())
            .await?
            .expect("in progress");

        let failed = repo
            .refund_final(&requested, FinalRefund::Failed, Utc::now())
            .await?
            .expect("completion requested");
        assert_eq!(failed.task_status, Some(TaskStatus::Failed));
        assert_eq!(balance(&pool, 1).await?, 175.0);
        assert_eq!(balance(&pool, 2).await?, 75.0);

        let refunds: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM wallet_transactions WHERE tx_type = 'REFUND' AND to_user_id = 1",
        )
        .fetch_one(&pool)
        .await?;
        assert_eq!(refunds, 1);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_delete_open_task_refunds(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = TaskRepository::new(pool.clone());
        let post = publish_task(&pool, 50.0, Utc::now()).await?;
        assert_eq!(balance(&pool, 1).await?, 150.0);

        assert!(repo.delete_open(&post, Utc::now()).await?);
        assert_eq!(balance(&pool, 1).await?, 200.0);
        assert!(
            PostRepository::new(pool.clone())
                .read(&post.post_id)
                .await?
                .is_none()
        );

        // già cancellato: nessun secondo rimborso
        assert!(!repo.delete_open(&post, Utc::now()).await?);
        assert_eq!(balance(&pool, 1).await?, 200.0);
        Ok(())
    }

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users")))]
    async fn test_expire_unclaimed_only_old_open_tasks(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = TaskRepository::new(pool.clone());
        let now = Utc::now();
        let old = publish_task(&pool, 40.0, now - Duration::days(31)).await?;
        let recent = publish_task(&pool, 10.0, now - Duration::days(2)).await?;
        let old_accepted = publish_task(&pool, 20.0, now - Duration::days(40)).await?;
        repo.accept(&old_accepted, 2, now).await?.expect("open task");
        assert_eq!(balance(&pool, 1).await?, 130.0);

        let summary = repo.expire_unclaimed(now).await?;
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.total_refunded, 40.0);
        assert_eq!(balance(&pool, 1).await?, 170.0);

        let posts = PostRepository::new(pool.clone());
        let status = |p: Option<Post>| p.and_then(|p| p.task_status);
        assert_eq!(status(posts.read(&old.post_id).await?), Some(TaskStatus::Expired));
        assert_eq!(status(posts.read(&recent.post_id).await?), Some(TaskStatus::Open));
        assert_eq!(
            status(posts.read(&old_accepted.post_id).await?),
            Some(TaskStatus::InProgress)
        );

        // secondo passaggio: niente da fare
        assert_eq!(repo.expire_unclaimed(now).await?.processed, 0);
        Ok(())
    }
}
