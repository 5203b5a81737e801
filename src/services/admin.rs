//! Admin services - backoffice utenti
//!
//! Le route sono protette da `admin_middleware`, montato dopo l'autenticazione.

use crate::core::{AppError, AppState};
use crate::dtos::{
    AdminCreateUserRequest, AdminUpdateUserRequest, AdminUserDTO, AdminUserListDTO,
    AdminUserQuery, CreateUserDTO, DeletedDTO, PaginationDTO, UpdateUserDTO,
    UpdateVoiceMappingRequest, VoiceMappingBatchDTO, VoiceMappingBatchRequest, VoiceMappingDTO,
    VoiceMappingListDTO, VoiceMappingResultDTO, is_valid_voice_id,
};
use crate::entities::User;
use crate::repositories::{Create, Delete, Update};
use crate::sms::normalize_phone;
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_macros::debug_handler;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

const DEFAULT_ADMIN_PAGE: i64 = 50;
const MAX_ADMIN_PAGE: i64 = 200;

#[debug_handler]
pub async fn admin_list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminUserQuery>, // /admin/users?search=&has_voice=true&page=1&limit=50
) -> Result<Json<AdminUserListDTO>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ADMIN_PAGE)
        .clamp(1, MAX_ADMIN_PAGE);
    let (users, total) = state
        .user
        .admin_list(
            params.search.as_deref(),
            params.has_voice,
            limit,
            (page - 1) * limit,
        )
        .await?;

    Ok(Json(AdminUserListDTO {
        users: users
            .into_iter()
            .map(|u| AdminUserDTO::from_user(u, &state.storage_config))
            .collect(),
        pagination: PaginationDTO::new(page, limit, total),
    }))
}

#[debug_handler]
pub async fn admin_create_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<User>,
    Json(body): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;
    let phone = normalize_phone(&body.phone_number);
    if state.user.find_by_phone(&phone).await?.is_some()
        || state.user.find_by_username(&phone).await?.is_some()
    {
        return Err(AppError::conflict("Phone number already registered")
            .with_details("phone_number"));
    }

    let password = User::hash_password(&body.password)
        .map_err(|_| AppError::internal_server_error("Failed to hash password"))?;
    let user = state
        .user
        .create(&CreateUserDTO {
            username: phone.clone(),
            name: body.name.clone(),
            phone_number: Some(phone),
            email: body.email.clone(),
            password,
            tts_voice_id: body.voice_id.clone().filter(|v| !v.trim().is_empty()),
        })
        .await?;
    info!("Admin {} created user {}", admin.user_id, user.user_id);

    Ok((
        StatusCode::CREATED,
        Json(AdminUserDTO::from_user(user, &state.storage_config)),
    ))
}

#[instrument(skip(state, body), fields(user_id = %user_id))]
pub async fn admin_update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    Json(body): Json<AdminUpdateUserRequest>,
) -> Result<Json<AdminUserDTO>, AppError> {
    body.validate()?;
    let changes = UpdateUserDTO {
        tts_voice_id: body.tts_voice_id,
        punked: body.punked,
        name: body.name,
        ..Default::default()
    };
    let user = state.user.update(&user_id, &changes).await?;
    info!("Admin updated user");
    Ok(Json(AdminUserDTO::from_user(user, &state.storage_config)))
}

#[instrument(skip(state, admin), fields(user_id = %user_id))]
pub async fn admin_delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<User>,
    Path(user_id): Path<i32>,
) -> Result<Json<DeletedDTO<i32>>, AppError> {
    if user_id == admin.user_id {
        return Err(AppError::bad_request("Admins cannot delete their own account"));
    }
    if !state.user.delete(&user_id).await? {
        warn!("Admin tried to delete a missing user");
        return Err(AppError::not_found("User not found"));
    }
    info!("Admin deleted user");
    Ok(Json(DeletedDTO { id: user_id }))
}

// ************************* VOICE MAPPINGS ************************* //

fn invalid_voice(voice_id: &str) -> AppError {
    AppError::bad_request("Invalid voice ID format")
        .with_details(format!("{}: must start with S_ or be BV001-BV005", voice_id))
}

/// GET /admin/voice-mappings?search=&has_voice=&page=&limit=
#[instrument(skip(state, params))]
pub async fn admin_list_voice_mappings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminUserQuery>,
) -> Result<Json<VoiceMappingListDTO>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ADMIN_PAGE)
        .clamp(1, MAX_ADMIN_PAGE);
    let (mappings, total) = state
        .user
        .voice_mappings(
            params.search.as_deref(),
            params.has_voice,
            limit,
            (page - 1) * limit,
        )
        .await?;

    Ok(Json(VoiceMappingListDTO {
        users: mappings
            .into_iter()
            .map(|m| VoiceMappingDTO::from_mapping(m, &state.storage_config))
            .collect(),
        pagination: PaginationDTO::new(page, limit, total),
    }))
}

/// POST /admin/voice-mappings {mappings: [{user_id, voice_id}]}: tutto o niente
#[instrument(skip(state, admin, body))]
pub async fn admin_batch_voice_mappings(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<User>,
    Json(body): Json<VoiceMappingBatchRequest>,
) -> Result<Json<VoiceMappingBatchDTO>, AppError> {
    if let Some(bad) = body
        .mappings
        .iter()
        .find(|m| !is_valid_voice_id(m.voice_id.trim()))
    {
        return Err(invalid_voice(&bad.voice_id));
    }

    let mappings: Vec<(i32, Option<String>)> = body
        .mappings
        .iter()
        .map(|m| {
            let voice = m.voice_id.trim();
            (m.user_id, (!voice.is_empty()).then(|| voice.to_string()))
        })
        .collect();
    let updated = state.user.batch_voice_mappings(&mappings).await?;
    info!("Admin {} updated {} voice mappings", admin.user_id, updated);

    Ok(Json(VoiceMappingBatchDTO {
        success: true,
        updated,
        message: format!("Successfully updated {} voice mappings", updated),
    }))
}

/// PUT /admin/voice-mappings/{user_id} {voice_id?, remaining_trainings?}
#[instrument(skip(state, body), fields(user_id = %user_id))]
pub async fn admin_update_voice_mapping(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    Json(body): Json<UpdateVoiceMappingRequest>,
) -> Result<Json<VoiceMappingResultDTO>, AppError> {
    body.validate()?;
    let voice = body.voice_id.as_deref().map(str::trim);
    if let Some(voice) = voice.filter(|v| !is_valid_voice_id(v)) {
        return Err(invalid_voice(voice));
    }

    let mapping = state
        .user
        .update_voice_mapping(
            user_id,
            voice.map(|v| (!v.is_empty()).then_some(v)),
            body.remaining_trainings,
        )
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!("Voice mapping updated");

    Ok(Json(VoiceMappingResultDTO {
        success: true,
        message: format!("Voice mapping updated for user {}", user_id),
        user: VoiceMappingDTO::from_mapping(mapping, &state.storage_config),
    }))
}

/// DELETE /admin/voice-mappings/{user_id}: voce rimossa e training ripristinati
#[instrument(skip(state), fields(user_id = %user_id))]
pub async fn admin_clear_voice_mapping(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<VoiceMappingResultDTO>, AppError> {
    let mapping = state
        .user
        .clear_voice_mapping(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!("Voice mapping cleared");

    Ok(Json(VoiceMappingResultDTO {
        success: true,
        message: format!("Voice mapping cleared for user {}", user_id),
        user: VoiceMappingDTO::from_mapping(mapping, &state.storage_config),
    }))
}
