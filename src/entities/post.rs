//! Post entity - Post del feed e relativi media

use super::enums::{MediaType, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub post_id: i32,
    pub user_id: i32,
    pub content: Option<String>,
    /// un post "task" offre una ricompensa in APE a chi lo completa
    pub is_task: bool,
    pub reward_amount: f64,
    pub task_status: Option<TaskStatus>,
    /// chi ha accettato il task
    pub completed_by: Option<i32>,
    pub initial_payment_amount: f64,
    pub final_payment_amount: f64,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completion_requested_at: Option<DateTime<Utc>>,
    pub completion_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostWithStats {
    #[sqlx(flatten)]
    pub post: Post,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_liked: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct VisualMedia {
    pub media_id: i32,
    pub post_id: i32,
    pub user_id: i32,
    pub media_type: MediaType,
    pub file_name: String,
}
