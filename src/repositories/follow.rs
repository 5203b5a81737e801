//! FollowRepository - relazioni follower/seguito

use super::{Create, Delete, Read};
use crate::entities::Follow;
use chrono::Utc;
use sqlx::{Error, SqlitePool};

pub struct FollowRepository {
    connection_pool: SqlitePool,
}

impl FollowRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }
}

/// Chiave: (follower_id, following_id)
impl Create<Follow, (i32, i32)> for FollowRepository {
    async fn create(&self, data: &(i32, i32)) -> Result<Follow, Error> {
        sqlx::query_as::<_, Follow>(
            "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?) \
             RETURNING follower_id, following_id, created_at",
        )
        .bind(data.0)
        .bind(data.1)
        .bind(Utc::now())
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl Read<Follow, (i32, i32)> for FollowRepository {
    async fn read(&self, id: &(i32, i32)) -> Result<Option<Follow>, Error> {
        sqlx::query_as::<_, Follow>(
            "SELECT follower_id, following_id, created_at FROM follows \
             WHERE follower_id = ? AND following_id = ?",
        )
        .bind(id.0)
        .bind(id.1)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Delete<(i32, i32)> for FollowRepository {
    async fn delete(&self, id: &(i32, i32)) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
            .bind(id.0)
            .bind(id.1)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(fixtures(path = "../../fixtures", scripts("users", "follows")))]
    async fn test_duplicate_follow_is_unique_violation(pool: SqlitePool) -> sqlx::Result<()> {
        let repo = FollowRepository::new(pool);

        let err = repo.create(&(2, 1)).await.unwrap_err();
        match err {
            Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("unexpected error: {other:?}"),
        }

        repo.create(&(3, 2)).await?;
        assert!(repo.read(&(3, 2)).await?.is_some());
        assert!(repo.delete(&(3, 2)).await?);
        assert!(!repo.delete(&(3, 2)).await?);
        Ok(())
    }
}
