//! PostRepository - Repository per post, media e like

use super::{Delete, Read};
use crate::dtos::{CreatePostDTO, SortDirection};
use crate::entities::{
    Post, PostWithStats, TaskStatus, TransactionStatus, TransactionType, VisualMedia,
};
use chrono::{DateTime, Utc};
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};

pub(crate) const POST_COLUMNS: &str = "post_id, user_id, content, is_task, reward_amount, \
     task_status, completed_by, initial_payment_amount, final_payment_amount, accepted_at, \
     completion_requested_at, completion_confirmed_at, created_at";

// POST REPO
pub struct PostRepository {
    connection_pool: SqlitePool,
}

impl PostRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    fn stats_select(viewer_id: i32) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(
            "SELECT p.post_id, p.user_id, p.content, p.is_task, p.reward_amount, \
             p.task_status, p.completed_by, p.initial_payment_amount, p.final_payment_amount, \
             p.accepted_at, p.completion_requested_at, p.completion_confirmed_at, p.created_at, \
             (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.post_id) AS like_count, \
             (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.post_id) AS comment_count, \
             EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.post_id AND l.user_id = ",
        );
        qb.push_bind(viewer_id);
        qb.push(") AS is_liked FROM posts p");
        qb
    }

    /// Feed con paginazione a cursore sull'id del post (il cursore è escluso)
    pub async fn list_feed(
        &self,
        viewer_id: i32,
        cursor: Option<i32>,
        limit: i64,
        direction: SortDirection,
    ) -> Result<Vec<PostWithStats>, Error> {
        let mut qb = Self::stats_select(viewer_id);
        if let Some(cursor) = cursor {
            match direction {
                SortDirection::Desc => qb.push(" WHERE p.post_id < "),
                SortDirection::Asc => qb.push(" WHERE p.post_id > "),
            };
            qb.push_bind(cursor);
        }
        match direction {
            SortDirection::Desc => qb.push(" ORDER BY p.post_id DESC LIMIT "),
            SortDirection::Asc => qb.push(" ORDER BY p.post_id ASC LIMIT "),
        };
        qb.push_bind(limit);

        qb.build_query_as::<PostWithStats>()
            .fetch_all(&self.connection_pool)
            .await
    }

    pub async fn list_by_user(
        &self,
        user_id: i32,
        viewer_id: i32,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostWithStats>, Error> {
        let mut qb = Self::stats_select(viewer_id);
        qb.push(" WHERE p.user_id = ");
        qb.push_bind(user_id);
        qb.push(" ORDER BY p.post_id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        qb.build_query_as::<PostWithStats>()
            .fetch_all(&self.connection_pool)
            .await
    }

    pub async fn find_with_stats(
        &self,
        post_id: i32,
        viewer_id: i32,
    ) -> Result<Option<PostWithStats>, Error> {
        let mut qb = Self::stats_select(viewer_id);
        qb.push(" WHERE p.post_id = ");
        qb.push_bind(post_id);
        qb.build_query_as::<PostWithStats>()
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Media di più post in una sola query
    pub async fn media_for_posts(&self, post_ids: &[i32]) -> Result<Vec<VisualMedia>, Error> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT media_id, post_id, user_id, media_type, file_name FROM visual_media \
             WHERE post_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in post_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY media_id ASC");
        qb.build_query_as::<VisualMedia>()
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Crea il post con i suoi media in una transazione.
    /// Per i post task scala la ricompensa dal saldo dell'autore e registra il movimento.
    ///
    /// # Returns
    /// * `Ok(None)` se il saldo non copre la ricompensa (nulla viene scritto)
    pub async fn create_with_media(&self, data: &CreatePostDTO) -> Result<Option<Post>, Error> {
        let mut tx = self.connection_pool.begin().await?;

        if data.is_task {
            let debited = sqlx::query(
                "UPDATE users SET ape_balance = ape_balance - ? \
                 WHERE user_id = ? AND ape_balance >= ?",
            )
            .bind(data.reward_amount)
            .bind(data.user_id)
            .bind(data.reward_amount)
            .execute(&mut *tx)
            .await?;
            if debited.rows_affected() == 0 {
                return Ok(None);
            }
        }

        let task_status = data.is_task.then_some(TaskStatus::Open);
        let sql = format!(
            "INSERT INTO posts (user_id, content, is_task, reward_amount, task_status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            POST_COLUMNS
        );
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(data.user_id)
            .bind(&data.content)
            .bind(data.is_task)
            .bind(if data.is_task { data.reward_amount } else { 0.0 })
            .bind(task_status)
            .bind(data.created_at)
            .fetch_one(&mut *tx)
            .await?;

        for (media_type, file_name) in &data.media {
            sqlx::query(
                "INSERT INTO visual_media (post_id, user_id, media_type, file_name) VALUES (?, ?, ?, ?)",
            )
            .bind(post.post_id)
            .bind(data.user_id)
            .bind(*media_type)
            .bind(file_name)
            .execute(&mut *tx)
            .await?;
        }

        if data.is_task {
            sqlx::query(
                "INSERT INTO wallet_transactions \
                 (tx_type, amount, status, description, from_user_id, created_at, completed_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(TransactionType::TaskPost)
            .bind(data.reward_amount)
            .bind(TransactionStatus::Completed)
            .bind(format!("任务悬赏 #{}", post.post_id))
            .bind(data.user_id)
            .bind(data.created_at)
            .bind(data.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(post))
    }

    /// Ritorna false se il like esisteva già
    pub async fn like(&self, post_id: i32, user_id: i32, at: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(at)
        .execute(&self.connection_pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn unlike(&self, post_id: i32, user_id: i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Read<Post, i32> for PostRepository {
    async fn read(&self, id: &i32) -> Result<Option<Post>, Error> {
        let sql = format!("SELECT {} FROM posts WHERE post_id = ?", POST_COLUMNS);
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Delete<i32> for PostRepository {
    /// Media, like e commenti vengono rimossi in cascata
    async fn delete(&self, id: &i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM posts WHERE post_id = ?")
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
