//! Post services - feed, post, like e commenti

use super::read_multipart;
use crate::core::{AppError, AppState};
use crate::dtos::{
    CommentDTO, CreateCommentDTO, CreateCommentRequest, CreatePostDTO, CreatePostRequest,
    DeletedDTO, FeedQuery, PageQuery, PostDTO, PostMediaDTO,
};
use crate::entities::{MediaType, PostWithStats, TaskStatus, User};
use crate::repositories::{Create, Delete, Read, ReadMany};
use crate::storage::{is_absolute_url, is_own_post_media, is_valid_image_mime, post_media_key};
use axum::{
    Extension,
    extract::{Json, Path, Query, State, multipart::Multipart},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const DEFAULT_FEED_PAGE: i64 = 10;
const MAX_FEED_PAGE: i64 = 50;

/// Carica media e autori di una pagina di post con due query
async fn assemble_posts(
    state: &AppState,
    rows: Vec<PostWithStats>,
) -> Result<Vec<PostDTO>, AppError> {
    let post_ids: Vec<i32> = rows.iter().map(|r| r.post.post_id).collect();
    let mut author_ids: Vec<i32> = rows.iter().map(|r| r.post.user_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let media = state.post.media_for_posts(&post_ids).await?;
    let authors: HashMap<i32, User> = state
        .user
        .read_many(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.user_id, u))
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let author = authors.get(&row.post.user_id);
            PostDTO::assemble(row, author, &media, &state.storage_config)
        })
        .collect())
}

pub(crate) async fn load_post(
    state: &AppState,
    post_id: i32,
    viewer_id: i32,
) -> Result<Option<PostDTO>, AppError> {
    match state.post.find_with_stats(post_id, viewer_id).await? {
        Some(row) => Ok(assemble_posts(state, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id))]
pub async fn list_feed(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<FeedQuery>, // /posts?cursor=10&limit=10&sort-direction=desc
) -> Result<Json<Vec<PostDTO>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FEED_PAGE)
        .clamp(1, MAX_FEED_PAGE);
    let rows = state
        .post
        .list_feed(current_user.user_id, params.cursor, limit, params.sort_direction)
        .await?;
    debug!("Feed page with {} posts", rows.len());
    Ok(Json(assemble_posts(&state, rows).await?))
}

#[instrument(skip(state, current_user), fields(post_id = %post_id))]
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
) -> Result<Json<Option<PostDTO>>, AppError> {
    Ok(Json(load_post(&state, post_id, current_user.user_id).await?))
}

#[instrument(skip(state, current_user, params), fields(user_id = %user_id))]
pub async fn list_user_posts(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<i32>,
    Query(params): Query<PageQuery>,
) -> Result<Json<Vec<PostDTO>>, AppError> {
    let (limit, offset) = params.resolve(DEFAULT_FEED_PAGE, MAX_FEED_PAGE);
    let rows = state
        .post
        .list_by_user(user_id, current_user.user_id, limit, offset)
        .await?;
    Ok(Json(assemble_posts(&state, rows).await?))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. validazione: testo o almeno un file
    // 2. i post task richiedono una ricompensa positiva coperta dal saldo
    // 3. post, media e movimento in un'unica transazione
    body.validate()?;

    let content = body
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let files: Vec<String> = body
        .files
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    if content.is_none() && files.is_empty() {
        return Err(AppError::bad_request("Post content or files are required"));
    }
    // solo oggetti caricati dall'autore: la cancellazione del post li rimuove dallo storage
    if let Some(foreign) = files
        .iter()
        .find(|f| !is_absolute_url(f) && !is_own_post_media(f, current_user.user_id))
    {
        warn!("Rejected post file outside the author's prefix: {}", foreign);
        return Err(AppError::bad_request("Post files must be uploaded by the author")
            .with_details(foreign.clone()));
    }

    let reward_amount = if body.is_task {
        match body.reward_amount {
            Some(amount) if amount > 0.0 => amount,
            _ => {
                return Err(AppError::bad_request(
                    "Task posts require a positive reward amount",
                ));
            }
        }
    } else {
        0.0
    };

    let data = CreatePostDTO {
        user_id: current_user.user_id,
        content,
        is_task: body.is_task,
        reward_amount,
        media: files
            .into_iter()
            .map(|f| (MediaType::from_file_name(&f), f))
            .collect(),
        created_at: Utc::now(),
    };

    let post = state.post.create_with_media(&data).await?.ok_or_else(|| {
        warn!("Insufficient balance for task reward {}", reward_amount);
        AppError::bad_request("Insufficient balance for the task reward")
    })?;
    info!("Post {} created", post.post_id);

    let dto = load_post(&state, post.post_id, current_user.user_id)
        .await?
        .ok_or_else(|| AppError::internal_server_error("Created post not found"))?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// POST /posts/media (multipart, campo `file`): immagine o video sotto `posts/{user_id}/`
#[instrument(skip(state, current_user, multipart), fields(user_id = %current_user.user_id))]
pub async fn upload_post_media(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_multipart(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::bad_request("Missing file field"))?;
    let is_video = file
        .content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("video/");
    if !is_valid_image_mime(&file.content_type) && !is_video {
        return Err(
            AppError::unsupported_media_type("Only image and video uploads are allowed")
                .with_details(file.content_type),
        );
    }

    let key = post_media_key(current_user.user_id, &file.content_type, Utc::now());
    state
        .storage
        .put(&key, &file.bytes, &file.content_type)
        .await?;
    info!("Stored post media {} ({} bytes)", key, file.bytes.len());

    let url = state
        .storage_config
        .url_for(Some(&key))
        .ok_or_else(|| AppError::internal_server_error("Failed to build file URL"))?;
    Ok((
        StatusCode::CREATED,
        Json(PostMediaDTO {
            media_type: MediaType::from_mime(&file.content_type),
            key,
            url,
        }),
    ))
}

#[instrument(skip(state, current_user), fields(post_id = %post_id))]
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
) -> Result<Json<DeletedDTO<i32>>, AppError> {
    let post = state
        .post
        .read(&post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post not found"))?;
    if post.user_id != current_user.user_id {
        warn!("User {} tried to delete post {}", current_user.user_id, post_id);
        return Err(AppError::forbidden("You can only delete your own posts"));
    }

    let media = state.post.media_for_posts(&[post_id]).await?;
    match post.task_status.filter(|_| post.is_task) {
        Some(TaskStatus::Open) => {
            // la ricompensa in escrow torna all'autore
            if !state.task.delete_open(&post, Utc::now()).await? {
                return Err(AppError::conflict("Task status changed, retry"));
            }
            info!("Open task deleted, refunded {} APE", post.reward_amount);
        }
        Some(status) if !status.is_closed() => {
            warn!("Refusing to delete task in status {}", status.as_str());
            return Err(AppError::bad_request("Tasks in progress cannot be deleted")
                .with_details(format!("Current status: {}", status.as_str())));
        }
        _ => {
            state.post.delete(&post_id).await?;
        }
    }
    info!("Post deleted with {} media", media.len());

    // pulizia degli oggetti dell'autore: gli errori vengono solo loggati
    for item in media
        .iter()
        .filter(|m| is_own_post_media(&m.file_name, post.user_id))
    {
        if let Err(e) = state.storage.delete(&item.file_name).await {
            warn!("Failed to delete media object {}: {}", item.file_name, e);
        }
    }

    Ok(Json(DeletedDTO { id: post_id }))
}

#[instrument(skip(state, current_user), fields(post_id = %post_id))]
pub async fn like_post(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
) -> Result<Json<PostDTO>, AppError> {
    if state.post.read(&post_id).await?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }
    if !state
        .post
        .like(post_id, current_user.user_id, Utc::now())
        .await?
    {
        debug!("Post already liked");
    }
    load_post(&state, post_id, current_user.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Post not found"))
}

#[instrument(skip(state, current_user), fields(post_id = %post_id))]
pub async fn unlike_post(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
) -> Result<Json<PostDTO>, AppError> {
    if state.post.read(&post_id).await?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }
    state.post.unlike(post_id, current_user.user_id).await?;
    load_post(&state, post_id, current_user.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Post not found"))
}

#[instrument(skip(state), fields(post_id = %post_id))]
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<i32>,
) -> Result<Json<Vec<CommentDTO>>, AppError> {
    if state.post.read(&post_id).await?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }
    let comments = state.comment.find_many_by_post_id(post_id).await?;

    let mut author_ids: Vec<i32> = comments.iter().map(|c| c.user_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let authors: HashMap<i32, User> = state
        .user
        .read_many(&author_ids)
        .await?
        .into_iter()
        .map(|u| (u.user_id, u))
        .collect();

    Ok(Json(
        comments
            .into_iter()
            .map(|c| {
                let author = authors.get(&c.user_id);
                CommentDTO::assemble(c, author, &state.storage_config)
            })
            .collect(),
    ))
}

#[instrument(skip(state, current_user, body), fields(post_id = %post_id))]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(post_id): Path<i32>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let content = body.content.trim().to_string();
    CreateCommentRequest {
        content: content.clone(),
    }
    .validate()?;
    if state.post.read(&post_id).await?.is_none() {
        return Err(AppError::not_found("Post not found"));
    }

    let comment = state
        .comment
        .create(&CreateCommentDTO {
            post_id,
            user_id: current_user.user_id,
            content,
            created_at: Utc::now(),
        })
        .await?;
    info!("Comment {} created", comment.comment_id);

    Ok((
        StatusCode::CREATED,
        Json(CommentDTO::assemble(
            comment,
            Some(&current_user),
            &state.storage_config,
        )),
    ))
}

#[instrument(skip(state, current_user), fields(comment_id = %comment_id))]
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(comment_id): Path<i32>,
) -> Result<Json<DeletedDTO<i32>>, AppError> {
    let comment = state
        .comment
        .read(&comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    if comment.user_id != current_user.user_id {
        return Err(AppError::forbidden("You can only delete your own comments"));
    }
    state.comment.delete(&comment_id).await?;
    Ok(Json(DeletedDTO { id: comment_id }))
}
