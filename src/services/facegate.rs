//! Facegate services - registro dei varchi e heartbeat

use crate::core::{AppError, AppState, is_admin, require_admin};
use crate::dtos::{
    CreateFacegateDeviceDTO, CreateFacegateDeviceRequest, DeletedDTO, FacegateDeviceDTO,
    FacegateListDTO,
};
use crate::entities::User;
use crate::repositories::{Create, Delete};
use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// I non amministratori ricevono una lista vuota
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_facegate_devices(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<FacegateListDTO>, AppError> {
    if !is_admin(&current_user, &state.admin_phone) {
        debug!("Non-admin facegate listing");
        return Ok(Json(FacegateListDTO { items: Vec::new() }));
    }
    let now_ts = Utc::now().timestamp();
    let items = state
        .facegate
        .find_all()
        .await?
        .into_iter()
        .map(|d| FacegateDeviceDTO::from_device(d, now_ts))
        .collect();
    Ok(Json(FacegateListDTO { items }))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn create_facegate_device(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CreateFacegateDeviceRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_admin(&current_user, &state.admin_phone)?;
    body.validate()?;
    let (Some(device_id), Some(device_name)) = (
        body.device_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        body.device_name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    ) else {
        return Err(AppError::bad_request("device_id and device_name are required"));
    };

    let device = state
        .facegate
        .create(&CreateFacegateDeviceDTO {
            device_id: device_id.to_string(),
            device_name: device_name.to_string(),
            location: body.location.clone(),
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| match e {
            // un device_id già registrato è un errore di input
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::bad_request("Device already registered").with_details("device_id")
            }
            other => AppError::from(other),
        })?;
    info!("Facegate device {} registered", device.device_id);

    Ok((
        StatusCode::CREATED,
        Json(FacegateDeviceDTO::from_device(device, Utc::now().timestamp())),
    ))
}

#[instrument(skip(state, current_user), fields(id = %id))]
pub async fn delete_facegate_device(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Path(id): Path<i32>,
) -> Result<Json<DeletedDTO<i32>>, AppError> {
    require_admin(&current_user, &state.admin_phone)?;
    if !state.facegate.delete(&id).await? {
        return Err(AppError::not_found("Device not found"));
    }
    Ok(Json(DeletedDTO { id }))
}

#[instrument(skip(state), fields(device_id = %device_id))]
pub async fn facegate_heartbeat(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state
        .facegate
        .heartbeat(&device_id, Utc::now().timestamp())
        .await?
    {
        warn!("Heartbeat from unknown device");
        return Err(AppError::not_found("Device not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
