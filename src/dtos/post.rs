//! Post DTOs - Data Transfer Objects per post, media e commenti

use super::user::UserSummaryDTO;
use crate::entities::{Comment, MediaType, PostWithStats, TaskStatus, User, VisualMedia};
use crate::storage::StorageConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VisualMediaDTO {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: Option<String>,
}

impl VisualMediaDTO {
    pub fn from_media(media: &VisualMedia, storage: &StorageConfig) -> Self {
        Self {
            media_type: media.media_type,
            url: storage.url_for(Some(&media.file_name)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostDTO {
    pub id: i32,
    pub content: Option<String>,
    pub is_task: bool,
    pub reward_amount: f64,
    pub task_status: Option<TaskStatus>,
    /// id di chi ha accettato il task
    pub completed_by: Option<i32>,
    pub initial_payment_amount: f64,
    pub final_payment_amount: f64,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completion_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub author: Option<UserSummaryDTO>,
    pub visual_media: Vec<VisualMediaDTO>,
    pub like_count: i64,
    pub comment_count: i64,
    pub is_liked: bool,
}

impl PostDTO {
    /// Assembla il post a partire dalle righe già caricate
    pub fn assemble(
        row: PostWithStats,
        author: Option<&User>,
        media: &[VisualMedia],
        storage: &StorageConfig,
    ) -> Self {
        let post = row.post;
        Self {
            id: post.post_id,
            content: post.content,
            is_task: post.is_task,
            reward_amount: post.reward_amount,
            task_status: post.task_status,
            completed_by: post.completed_by,
            initial_payment_amount: post.initial_payment_amount,
            final_payment_amount: post.final_payment_amount,
            accepted_at: post.accepted_at,
            completion_requested_at: post.completion_requested_at,
            created_at: post.created_at,
            author: author.map(|u| UserSummaryDTO::from_user(u, storage)),
            visual_media: media
                .iter()
                .filter(|m| m.post_id == post.post_id)
                .map(|m| VisualMediaDTO::from_media(m, storage))
                .collect(),
            like_count: row.like_count,
            comment_count: row.comment_count,
            is_liked: row.is_liked,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// GET /posts?cursor&limit&sort-direction
#[derive(Serialize, Deserialize, Debug)]
pub struct FeedQuery {
    pub cursor: Option<i32>,
    pub limit: Option<i64>,
    #[serde(rename = "sort-direction", default)]
    pub sort_direction: SortDirection,
}

/// Body di POST /posts
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePostRequest {
    #[validate(length(max = 5000, message = "Post content must be at most 5000 characters"))]
    pub content: Option<String>,
    /// chiavi restituite da POST /posts/media dello stesso utente o URL assoluti
    #[serde(default)]
    #[validate(length(max = 9, message = "At most 9 files per post"))]
    pub files: Vec<String>,
    #[serde(default)]
    pub is_task: bool,
    pub reward_amount: Option<f64>,
}

/// DTO per creare un post (senza post_id)
#[derive(Debug, Clone)]
pub struct CreatePostDTO {
    pub user_id: i32,
    pub content: Option<String>,
    pub is_task: bool,
    pub reward_amount: f64,
    pub media: Vec<(MediaType, String)>,
    pub created_at: DateTime<Utc>,
}

/// Risposta di POST /posts/media: `key` va passata in `files` alla creazione del post
#[derive(Serialize, Deserialize, Debug)]
pub struct PostMediaDTO {
    pub key: String,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeletedDTO<T> {
    pub id: T,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CommentDTO {
    pub id: i32,
    pub post_id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<UserSummaryDTO>,
}

impl CommentDTO {
    pub fn assemble(comment: Comment, author: Option<&User>, storage: &StorageConfig) -> Self {
        Self {
            id: comment.comment_id,
            post_id: comment.post_id,
            content: comment.content,
            created_at: comment.created_at,
            author: author.map(|u| UserSummaryDTO::from_user(u, storage)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be between 1 and 2000 characters"))]
    pub content: String,
}

/// DTO per creare un commento (senza comment_id)
#[derive(Debug, Clone)]
pub struct CreateCommentDTO {
    pub post_id: i32,
    pub user_id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
