//! FacegateDeviceRepository - registro dei varchi

use super::{Create, Delete};
use crate::dtos::CreateFacegateDeviceDTO;
use crate::entities::FacegateDevice;
use sqlx::{Error, SqlitePool};

const FACEGATE_COLUMNS: &str = "id, device_id, device_name, location, last_seen_ts, created_at";

pub struct FacegateDeviceRepository {
    connection_pool: SqlitePool,
}

impl FacegateDeviceRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    pub async fn find_all(&self) -> Result<Vec<FacegateDevice>, Error> {
        let sql = format!("SELECT {} FROM facegate_devices ORDER BY id ASC", FACEGATE_COLUMNS);
        sqlx::query_as::<_, FacegateDevice>(&sql)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Ritorna false se il varco non è registrato
    pub async fn heartbeat(&self, device_id: &str, now_ts: i64) -> Result<bool, Error> {
        let result = sqlx::query("UPDATE facegate_devices SET last_seen_ts = ? WHERE device_id = ?")
            .bind(now_ts)
            .bind(device_id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Create<FacegateDevice, CreateFacegateDeviceDTO> for FacegateDeviceRepository {
    async fn create(&self, data: &CreateFacegateDeviceDTO) -> Result<FacegateDevice, Error> {
        let sql = format!(
            "INSERT INTO facegate_devices (device_id, device_name, location, created_at) \
             VALUES (?, ?, ?, ?) RETURNING {}",
            FACEGATE_COLUMNS
        );
        sqlx::query_as::<_, FacegateDevice>(&sql)
            .bind(&data.device_id)
            .bind(&data.device_name)
            .bind(&data.location)
            .bind(data.created_at)
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Delete<i32> for FacegateDeviceRepository {
    async fn delete(&self, id: &i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM facegate_devices WHERE id = ?")
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
