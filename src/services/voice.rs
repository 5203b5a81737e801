//! Voice services - dispositivi vocali, sessioni e messaggi di sessione

use super::read_multipart;
use crate::core::{AppError, AppState};
use crate::dtos::{
    CreateDeviceDTO, CreateDeviceRequest, CreateVoiceMessageDTO, CreateVoiceMessageRequest,
    CreateVoiceRoleDTO, CreateVoiceRoleRequest, DeletedDTO, DeviceDetailDTO, SessionDetailDTO,
    SessionListDTO, SessionListQuery, StartSessionRequest, UpdateDeviceDTO, VoiceRoleCreatedDTO,
    VoiceRoleListDTO,
};
use crate::entities::{User, VoiceDevice, VoiceSession};
use crate::repositories::{Create, Delete, Update};
use crate::storage::audio_key;
use axum::{
    Extension,
    extract::{Json, Path, Query, State, multipart::Multipart},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

const RECENT_SESSIONS: i64 = 5;
const DEFAULT_SESSION_PAGE: i64 = 20;
const MAX_SESSION_PAGE: i64 = 100;
const DEFAULT_DEVICE_TYPE: &str = "web";

async fn owned_device(
    state: &AppState,
    device_id: &str,
    user_id: i32,
) -> Result<VoiceDevice, AppError> {
    state
        .device
        .find_owned(device_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Device not found"))
}

async fn owned_session(
    state: &AppState,
    session_id: i32,
    user_id: i32,
) -> Result<VoiceSession, AppError> {
    state
        .session
        .find_owned(session_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Session not found"))
}

// ************************* DEVICES ************************* //

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<Vec<VoiceDevice>>, AppError> {
    let devices = state
        .device
        .find_many_by_user_id(current_user.user_id)
        .await?;
    Ok(Json(devices))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_device(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreateDeviceRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let (Some(device_id), Some(name)) = (
        body.device_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        body.name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::bad_request("device_id and name are required"));
    };

    let device = state
        .device
        .create(&CreateDeviceDTO {
            device_id: device_id.to_string(),
            user_id: current_user.user_id,
            name: name.to_string(),
            device_type: body
                .device_type
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_TYPE.to_string()),
            role_id: body.role_id.clone(),
            created_at: Utc::now(),
        })
        .await?;
    info!("Device {} registered", device.device_id);
    Ok((StatusCode::CREATED, Json(device)))
}

#[instrument(skip(state, current_user), fields(device_id = %device_id))]
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceDetailDTO>, AppError> {
    let device = owned_device(&state, &device_id, current_user.user_id).await?;
    let recent_sessions = state
        .session
        .recent_for_device(&device_id, RECENT_SESSIONS)
        .await?;
    Ok(Json(DeviceDetailDTO {
        device,
        recent_sessions,
    }))
}

#[instrument(skip(state, current_user, body), fields(device_id = %device_id))]
pub async fn update_device(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(device_id): Path<String>,
    Json(body): Json<UpdateDeviceDTO>,
) -> Result<Json<VoiceDevice>, AppError> {
    body.validate()?;
    owned_device(&state, &device_id, current_user.user_id).await?;
    let device = state.device.update(&device_id, &body).await?;
    Ok(Json(device))
}

#[instrument(skip(state, current_user), fields(device_id = %device_id))]
pub async fn delete_device(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(device_id): Path<String>,
) -> Result<Json<DeletedDTO<String>>, AppError> {
    owned_device(&state, &device_id, current_user.user_id).await?;
    state.device.delete(&device_id).await?;
    info!("Device deleted");
    Ok(Json(DeletedDTO { id: device_id }))
}

// ************************* SESSIONS ************************* //

#[instrument(skip(state, current_user, params), fields(user_id = %current_user.user_id))]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<SessionListQuery>,
) -> Result<Json<SessionListDTO>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SESSION_PAGE)
        .clamp(1, MAX_SESSION_PAGE);
    let offset = params.offset.unwrap_or(0).max(0);
    let (sessions, total) = state
        .session
        .list_for_user(current_user.user_id, params.device_id.as_deref(), limit, offset)
        .await?;
    Ok(Json(SessionListDTO {
        sessions,
        total,
        limit,
        offset,
    }))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    owned_device(&state, &body.device_id, current_user.user_id).await?;
    let session = state
        .session
        .start(&body.device_id, current_user.user_id, Utc::now())
        .await?;
    info!("Session {} started on {}", session.session_id, body.device_id);
    Ok((StatusCode::CREATED, Json(session)))
}

#[instrument(skip(state, current_user), fields(session_id = %session_id))]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(session_id): Path<i32>,
) -> Result<Json<SessionDetailDTO>, AppError> {
    let session = owned_session(&state, session_id, current_user.user_id).await?;
    let messages = state.session.messages(session_id).await?;
    debug!("Session has {} messages", messages.len());
    Ok(Json(SessionDetailDTO { session, messages }))
}

/// PUT chiude la sessione
#[instrument(skip(state, current_user), fields(session_id = %session_id))]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(session_id): Path<i32>,
) -> Result<Json<VoiceSession>, AppError> {
    owned_session(&state, session_id, current_user.user_id).await?;
    let session = state.session.end(session_id, Utc::now()).await?;
    info!("Session ended");
    Ok(Json(session))
}

#[instrument(skip(state, current_user), fields(session_id = %session_id))]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(session_id): Path<i32>,
) -> Result<Json<DeletedDTO<i32>>, AppError> {
    owned_session(&state, session_id, current_user.user_id).await?;
    state.session.delete(&session_id).await?;
    Ok(Json(DeletedDTO { id: session_id }))
}

// ************************* MESSAGES ************************* //

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_voice_message(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreateVoiceMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    owned_session(&state, body.session_id, current_user.user_id).await?;

    let message = state
        .session
        .create(&CreateVoiceMessageDTO {
            session_id: body.session_id,
            role: body.role,
            content: body.content,
            audio_url: None,
            created_at: Utc::now(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /voice/messages/audio (multipart: `session_id`, `role`, `content?`, `file`)
#[instrument(skip(state, current_user, multipart), fields(user_id = %current_user.user_id))]
pub async fn upload_voice_audio(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_multipart(multipart).await?;
    let session_id: i32 = form
        .text("session_id")
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| AppError::bad_request("session_id is required"))?;
    let role = form
        .text("role")
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::bad_request("role is required"))?
        .to_string();
    let content = form.text("content").unwrap_or_default().trim().to_string();
    let file = form
        .file
        .ok_or_else(|| AppError::bad_request("Missing file field"))?;
    if !file.content_type.starts_with("audio/") {
        return Err(AppError::unsupported_media_type("Only audio uploads are allowed")
            .with_details(file.content_type));
    }

    owned_session(&state, session_id, current_user.user_id).await?;

    let now = Utc::now();
    let file_name = file
        .file_name
        .clone()
        .unwrap_or_else(|| format!("{}.bin", now.timestamp_millis()));
    let key = audio_key(now, &file_name);
    state
        .storage
        .put(&key, &file.bytes, &file.content_type)
        .await?;

    let message = match state
        .session
        .create(&CreateVoiceMessageDTO {
            session_id,
            role,
            content,
            audio_url: state.storage_config.url_for(Some(&key)),
            created_at: now,
        })
        .await
    {
        Ok(message) => message,
        Err(e) => {
            warn!("Failed to save voice message: {:?}", e);
            // l'oggetto senza messaggio non è raggiungibile
            if let Err(cleanup) = state.storage.delete(&key).await {
                warn!("Failed to remove orphan audio {}: {}", key, cleanup);
            }
            return Err(e.into());
        }
    };
    info!("Voice audio stored as {}", key);
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /voice/roles: ruoli di sistema e personali; i ruoli di sistema nascono alla prima lettura
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_voice_roles(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<VoiceRoleListDTO>, AppError> {
    let mut roles = state.role.list_visible(current_user.user_id).await?;
    if roles.is_empty() {
        let seeded = state.role.seed_defaults(Utc::now()).await?;
        info!("Seeded {} system voice roles", seeded);
        roles = state.role.list_visible(current_user.user_id).await?;
    }
    Ok(Json(VoiceRoleListDTO {
        roles: roles.into_iter().map(Into::into).collect(),
    }))
}

/// POST /voice/roles {name, description?, config?}
#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_voice_role(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreateVoiceRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::bad_request("Role name is required"))?
        .to_string();
    let config = match body.config {
        Some(value) if value.is_object() => value.to_string(),
        Some(_) => return Err(AppError::bad_request("Role config must be an object")),
        None => "{}".to_string(),
    };

    let now = Utc::now();
    let role = state
        .role
        .create(&CreateVoiceRoleDTO {
            role_id: format!("role_{}_{}", current_user.user_id, now.timestamp_millis()),
            name,
            description: body.description.unwrap_or_default(),
            user_id: current_user.user_id,
            config,
            created_at: now,
        })
        .await?;
    info!("Voice role {} created", role.role_id);

    Ok((
        StatusCode::CREATED,
        Json(VoiceRoleCreatedDTO { role: role.into() }),
    ))
}
