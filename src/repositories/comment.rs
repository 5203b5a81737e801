//! CommentRepository - Repository per i commenti ai post

use super::{Create, Delete, Read};
use crate::dtos::CreateCommentDTO;
use crate::entities::Comment;
use sqlx::{Error, SqlitePool};

const COMMENT_COLUMNS: &str = "comment_id, post_id, user_id, content, created_at";

pub struct CommentRepository {
    connection_pool: SqlitePool,
}

impl CommentRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Commenti di un post, dal più vecchio
    pub async fn find_many_by_post_id(&self, post_id: i32) -> Result<Vec<Comment>, Error> {
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = ? ORDER BY created_at ASC, comment_id ASC",
            COMMENT_COLUMNS
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .fetch_all(&self.connection_pool)
            .await
    }
}

impl Create<Comment, CreateCommentDTO> for CommentRepository {
    async fn create(&self, data: &CreateCommentDTO) -> Result<Comment, Error> {
        let sql = format!(
            "INSERT INTO comments (post_id, user_id, content, created_at) VALUES (?, ?, ?, ?) RETURNING {}",
            COMMENT_COLUMNS
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(data.post_id)
            .bind(data.user_id)
            .bind(&data.content)
            .bind(data.created_at)
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Read<Comment, i32> for CommentRepository {
    async fn read(&self, id: &i32) -> Result<Option<Comment>, Error> {
        let sql = format!("SELECT {} FROM comments WHERE comment_id = ?", COMMENT_COLUMNS);
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Delete<i32> for CommentRepository {
    async fn delete(&self, id: &i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM comments WHERE comment_id = ?")
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
