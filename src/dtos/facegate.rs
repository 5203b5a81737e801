//! Facegate DTOs - registro dei varchi

use crate::entities::FacegateDevice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FacegateDeviceDTO {
    pub id: i32,
    pub device_id: String,
    pub device_name: String,
    pub location: Option<String>,
    pub last_seen_ts: Option<i64>,
    pub online: bool,
    pub created_at: DateTime<Utc>,
}

impl FacegateDeviceDTO {
    pub fn from_device(device: FacegateDevice, now_ts: i64) -> Self {
        Self {
            online: device.is_online(now_ts),
            id: device.id,
            device_id: device.device_id,
            device_name: device.device_name,
            location: device.location,
            last_seen_ts: device.last_seen_ts,
            created_at: device.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FacegateListDTO {
    pub items: Vec<FacegateDeviceDTO>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateFacegateDeviceRequest {
    #[validate(length(min = 1, max = 100, message = "device_id is required"))]
    pub device_id: Option<String>,
    #[validate(length(min = 1, max = 100, message = "device_name is required"))]
    pub device_name: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

/// DTO per registrare un varco
#[derive(Debug, Clone)]
pub struct CreateFacegateDeviceDTO {
    pub device_id: String,
    pub device_name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}
