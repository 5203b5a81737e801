//! User services - profili, follow, attività, impostazioni punk e saldo

use super::read_multipart;
use crate::activity::ActivityStatus;
use crate::core::{AppError, AppState};
use crate::dtos::{
    BalanceDTO, ChangePasswordRequest, FollowRequestDTO, SuccessDTO, PhotoKind, PhotoKindQuery, PunkedFollowersDTO, TtsSettingsDTO,
    UpdateUserDTO, UserDTO, UserListQuery, UserSummaryDTO, format_last_updated,
};
use crate::entities::User;
use crate::repositories::{Create, Delete, Read, Update, UserFilter};
use crate::storage::{avatar_key, is_valid_image_mime, naming::mime_subtype};
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

const DEFAULT_USER_PAGE: i64 = 4;
const MAX_USER_PAGE: i64 = 100;

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<UserListQuery>, // /users?search=al&followers-of=1
) -> Result<Json<Vec<UserDTO>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_USER_PAGE).clamp(1, MAX_USER_PAGE);
    let offset = params.offset.unwrap_or(0).max(0);
    let filter = UserFilter {
        search: params.search,
        followers_of: params.followers_of,
        following_of: params.following_of,
    };

    let users = state
        .user
        .search(current_user.user_id, &filter, limit, offset)
        .await?;
    debug!("Found {} users", users.len());

    Ok(Json(
        users
            .into_iter()
            .map(|u| UserDTO::from_stats(u, &state.storage_config))
            .collect(),
    ))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<UserDTO>, AppError> {
    let stats = state
        .user
        .find_with_stats(current_user.user_id, current_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let owner = stats.user.clone();
    Ok(Json(
        UserDTO::from_stats(stats, &state.storage_config).for_owner(&owner),
    ))
}

#[instrument(skip(state, current_user), fields(user_id = %user_id))]
pub async fn get_user_by_id(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<i32>, // parametro dalla URL /users/{user_id}
) -> Result<Json<Option<UserDTO>>, AppError> {
    let stats = state
        .user
        .find_with_stats(user_id, current_user.user_id)
        .await?;
    if stats.is_none() {
        warn!("User not found");
    }
    Ok(Json(stats.map(|s| {
        let owner = s.user.clone();
        let dto = UserDTO::from_stats(s, &state.storage_config);
        if owner.user_id == current_user.user_id {
            dto.for_owner(&owner)
        } else {
            dto
        }
    })))
}

#[instrument(skip(state, current_user))]
pub async fn get_user_by_username(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(username): Path<String>,
) -> Result<Json<Option<UserDTO>>, AppError> {
    let Some(user) = state.user.find_by_username(&username).await? else {
        return Ok(Json(None));
    };
    get_user_by_id(State(state), Extension(current_user), Path(user.user_id)).await
}

#[instrument(skip(state, current_user, body), fields(user_id = %user_id))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<i32>,
    Json(body): Json<UpdateUserDTO>,
) -> Result<Json<UserDTO>, AppError> {
    if user_id != current_user.user_id {
        warn!("User {} tried to edit profile {}", current_user.user_id, user_id);
        return Err(AppError::unauthorized("You can only edit your own profile"));
    }
    body.validate()?;

    let updated = state.user.update(&user_id, &body).await?;
    info!("Profile updated");
    Ok(Json(
        UserDTO::from_user(updated.clone(), &state.storage_config).for_owner(&updated),
    ))
}

/// PATCH /users/{user_id}/password: serve la password attuale
#[instrument(skip(state, current_user, body), fields(user_id = %user_id))]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<i32>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessDTO>, AppError> {
    if user_id != current_user.user_id {
        warn!("User {} tried to change the password of {}", current_user.user_id, user_id);
        return Err(AppError::unauthorized("You can only change your own password"));
    }
    body.validate()?;

    // gli account creati via SMS non hanno una password da verificare
    if current_user.password.is_empty() {
        return Err(AppError::bad_request("No password set for this account")
            .with_details("current_password"));
    }
    if !current_user.verify_password(&body.current_password) {
        warn!("Wrong current password");
        return Err(AppError::bad_request("Current password is incorrect")
            .with_details("current_password"));
    }

    let hash = User::hash_password(&body.new_password)
        .map_err(|_| AppError::internal_server_error("Failed to hash password"))?;
    if !state.user.set_password(user_id, &hash).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!("Password changed");

    Ok(Json(SuccessDTO {
        success: true,
        message: "密码已成功更新".to_string(),
    }))
}

#[instrument(skip(state), fields(user_id = %user_id))]
pub async fn get_user_activity(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<ActivityStatus>, AppError> {
    let user = state
        .user
        .read(&user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(Json(ActivityStatus::of(&user, Utc::now())))
}

#[instrument(skip(state, current_user, body), fields(user_id = %user_id))]
pub async fn follow_user(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(user_id): Path<i32>,
    Json(body): Json<FollowRequestDTO>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != current_user.user_id {
        return Err(AppError::unauthorized("You can only follow on your own behalf"));
    }
    let target = body.user_id_to_follow;
    if target == user_id {
        return Err(AppError::bad_request("You cannot follow yourself"));
    }
    if state.user.read(&target).await?.is_none() {
        return Err(AppError::not_found("User to follow not found"));
    }

    let follow = state.follow.create(&(user_id, target)).await?;
    info!("User {} now follows {}", user_id, target);
    Ok((StatusCode::CREATED, Json(follow)))
}

#[instrument(skip(state, current_user))]
pub async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path((user_id, target_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    if user_id != current_user.user_id {
        return Err(AppError::unauthorized("You can only unfollow on your own behalf"));
    }
    if !state.follow.delete(&(user_id, target_id)).await? {
        return Err(AppError::not_found("You are not following this user"));
    }
    info!("User {} unfollowed {}", user_id, target_id);
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state), fields(user_id = %user_id))]
pub async fn get_punked_followers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
) -> Result<Json<PunkedFollowersDTO>, AppError> {
    let users = state.user.find_punked_followers(user_id).await?;
    let users: Vec<UserSummaryDTO> = users
        .iter()
        .map(|u| UserSummaryDTO::from_user(u, &state.storage_config))
        .collect();
    Ok(Json(PunkedFollowersDTO {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn update_tts_settings(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<TtsSettingsDTO>,
) -> Result<Json<UserDTO>, AppError> {
    body.validate()?;
    let changes = UpdateUserDTO {
        tts_voice_id: body.tts_voice_id,
        punked: body.punked,
        ..Default::default()
    };
    let updated = state.user.update(&current_user.user_id, &changes).await?;
    info!("TTS settings updated (punked = {})", updated.punked);
    Ok(Json(
        UserDTO::from_user(updated.clone(), &state.storage_config).for_owner(&updated),
    ))
}

/// POST /users/me/photo?kind=profile|cover (multipart, campo `file`)
#[instrument(skip(state, current_user, multipart), fields(user_id = %current_user.user_id))]
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(query): Query<PhotoKindQuery>,
    multipart: Multipart,
) -> Result<Json<UserDTO>, AppError> {
    let form = read_multipart(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::bad_request("Missing file field"))?;
    if !is_valid_image_mime(&file.content_type) {
        return Err(AppError::unsupported_media_type("Only image uploads are allowed")
            .with_details(file.content_type));
    }

    let key = avatar_key(current_user.user_id, mime_subtype(&file.content_type));
    state
        .storage
        .put(&key, &file.bytes, &file.content_type)
        .await?;

    let previous = match query.kind {
        PhotoKind::Profile => current_user.profile_photo.clone(),
        PhotoKind::Cover => current_user.cover_photo.clone(),
    };
    let changes = match query.kind {
        PhotoKind::Profile => UpdateUserDTO {
            profile_photo: Some(key),
            ..Default::default()
        },
        PhotoKind::Cover => UpdateUserDTO {
            cover_photo: Some(key),
            ..Default::default()
        },
    };
    let updated = state.user.update(&current_user.user_id, &changes).await?;

    // la foto precedente non serve più
    if let Some(old) = previous.filter(|k| !k.starts_with("http")) {
        if let Err(e) = state.storage.delete(&old).await {
            warn!("Failed to delete previous photo {}: {}", old, e);
        }
    }

    info!("{:?} photo updated", query.kind);
    Ok(Json(
        UserDTO::from_user(updated.clone(), &state.storage_config).for_owner(&updated),
    ))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<BalanceDTO>, AppError> {
    let user = state
        .user
        .read(&current_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    let last_updated = state
        .wallet
        .last_activity_at(user.user_id)
        .await?
        .or(user.wallet_created_at)
        .unwrap_or(user.created_at);

    Ok(Json(BalanceDTO {
        ape_balance: user.ape_balance,
        last_updated,
        last_updated_label: format_last_updated(last_updated, Utc::now()),
    }))
}
