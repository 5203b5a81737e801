//! Conversation services - chat private, messaggi, ricerca e immagini

use super::read_multipart;
use crate::core::{AppError, AppState};
use crate::dtos::{
    ConversationDTO, CreateConversationRequest, CreateMessageDTO, MarkReadDTO, MessageDTO,
    MessageSearchQuery, SendMessageRequest, UploadedFileDTO,
};
use crate::entities::{Conversation, MessageType, User};
use crate::repositories::{Create, Read};
use crate::storage::{is_valid_image_mime, post_file_name};
use axum::{
    Extension,
    extract::{Json, Path, Query, State, multipart::Multipart},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use futures::future;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Conversazione esistente di cui l'utente è partecipante (404 / 403 altrimenti)
async fn participant_conversation(
    state: &AppState,
    conversation_id: &str,
    user_id: i32,
) -> Result<Conversation, AppError> {
    let conversation = state
        .conversation
        .read(&conversation_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;
    if !conversation.has_participant(user_id) {
        warn!("User {} is not part of conversation {}", user_id, conversation_id);
        return Err(AppError::forbidden("You are not part of this conversation"));
    }
    Ok(conversation)
}

async fn conversation_dto(
    state: &AppState,
    conversation: Conversation,
    viewer_id: i32,
) -> Result<ConversationDTO, AppError> {
    let other_id = conversation.other_participant(viewer_id);
    let (other_user, last_message, unread) = tokio::try_join!(
        state.user.read(&other_id),
        state.msg.find_last(&conversation.conversation_id),
        state
            .msg
            .count_unread(&conversation.conversation_id, viewer_id),
    )?;
    Ok(ConversationDTO::assemble(
        conversation,
        other_user.as_ref(),
        last_message,
        unread,
        &state.storage_config,
    ))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<Vec<ConversationDTO>>, AppError> {
    let conversations = state
        .conversation
        .find_many_by_user_id(current_user.user_id)
        .await?;
    debug!("Found {} conversations", conversations.len());

    let dtos = future::try_join_all(
        conversations
            .into_iter()
            .map(|c| conversation_dto(&state, c, current_user.user_id)),
    )
    .await?;
    Ok(Json(dtos))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreateConversationRequest>,
) -> Result<Json<ConversationDTO>, AppError> {
    let target_id = body
        .target_user_id
        .ok_or_else(|| AppError::bad_request("target_user_id is required"))?;
    if target_id == current_user.user_id {
        return Err(AppError::bad_request("Cannot start a conversation with yourself"));
    }
    if state.user.read(&target_id).await?.is_none() {
        return Err(AppError::not_found("Target user not found"));
    }

    let conversation = state
        .conversation
        .find_or_create(current_user.user_id, target_id)
        .await?;
    info!("Conversation {} ready", conversation.conversation_id);
    Ok(Json(
        conversation_dto(&state, conversation, current_user.user_id).await?,
    ))
}

#[instrument(skip(state, current_user), fields(conversation_id = %conversation_id))]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(conversation_id): Path<String>,
) -> Result<Json<Vec<MessageDTO>>, AppError> {
    participant_conversation(&state, &conversation_id, current_user.user_id).await?;
    let messages = state
        .msg
        .find_many_by_conversation_id(&conversation_id)
        .await?;
    Ok(Json(messages.into_iter().map(MessageDTO::from).collect()))
}

#[instrument(skip(state, current_user, body), fields(conversation_id = %conversation_id))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("Message content cannot be empty"));
    }
    participant_conversation(&state, &conversation_id, current_user.user_id).await?;

    let message = state
        .msg
        .create(&CreateMessageDTO {
            conversation_id,
            sender_id: current_user.user_id,
            content: content.to_string(),
            message_type: MessageType::Text,
            red_packet_amount: None,
            created_at: Utc::now(),
        })
        .await?;
    info!("Message {} sent", message.message_id);
    Ok((StatusCode::CREATED, Json(MessageDTO::from(message))))
}

#[instrument(skip(state, current_user), fields(conversation_id = %conversation_id))]
pub async fn mark_messages_read(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(conversation_id): Path<String>,
) -> Result<Json<MarkReadDTO>, AppError> {
    participant_conversation(&state, &conversation_id, current_user.user_id).await?;
    let marked_as_read = state
        .msg
        .mark_read(&conversation_id, current_user.user_id)
        .await?;
    debug!("Marked {} messages as read", marked_as_read);
    Ok(Json(MarkReadDTO {
        success: true,
        marked_as_read,
    }))
}

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id))]
pub async fn search_messages(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<MessageSearchQuery>, // /messages/search?q=ciao
) -> Result<Json<Vec<MessageDTO>>, AppError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let messages = state
        .msg
        .search_for_user(current_user.user_id, query)
        .await?;
    Ok(Json(messages.into_iter().map(MessageDTO::from).collect()))
}

/// POST /messages/upload-image (multipart, campo `file`)
#[instrument(skip(state, current_user, multipart), fields(user_id = %current_user.user_id))]
pub async fn upload_message_image(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    multipart: Multipart,
) -> Result<Json<UploadedFileDTO>, AppError> {
    let form = read_multipart(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::bad_request("Missing file field"))?;
    if !is_valid_image_mime(&file.content_type) {
        return Err(AppError::unsupported_media_type("Only image uploads are allowed")
            .with_details(file.content_type));
    }

    let key = format!("messages/{}", post_file_name(&file.content_type, Utc::now()));
    state
        .storage
        .put(&key, &file.bytes, &file.content_type)
        .await?;
    info!("Stored message image {} ({} bytes)", key, file.bytes.len());

    let url = state
        .storage_config
        .url_for(Some(&key))
        .ok_or_else(|| AppError::internal_server_error("Failed to build file URL"))?;
    Ok(Json(UploadedFileDTO { url }))
}
