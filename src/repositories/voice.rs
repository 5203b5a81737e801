//! Repository per dispositivi vocali, sessioni e messaggi di sessione

use super::{Create, Delete, Read, Update};
use crate::dtos::{CreateDeviceDTO, CreateVoiceMessageDTO, CreateVoiceRoleDTO, UpdateDeviceDTO};
use crate::entities::{DeviceStatus, VoiceDevice, VoiceMessage, VoiceRole, VoiceSession};
use chrono::{DateTime, Utc};
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};

const DEVICE_COLUMNS: &str =
    "device_id, user_id, name, device_type, status, role_id, last_login, created_at, updated_at";
const SESSION_COLUMNS: &str = "session_id, device_id, user_id, start_time, end_time";
const VOICE_MESSAGE_COLUMNS: &str =
    "voice_message_id, session_id, role, content, audio_url, created_at";
const ROLE_COLUMNS: &str = "role_id, name, description, user_id, is_system, config, created_at";

/// Ruoli di sistema creati alla prima lettura: (id, nome, descrizione, config)
const DEFAULT_ROLES: [(&str, &str, &str, &str); 3] = [
    (
        "assistant",
        "AI助手",
        "通用智能助手，可以回答问题、聊天对话",
        r#"{"model":"default","voice":"standard","personality":"friendly"}"#,
    ),
    (
        "teacher",
        "AI老师",
        "教育辅导助手，帮助学习和解答疑问",
        r#"{"model":"educational","voice":"professional","personality":"patient"}"#,
    ),
    (
        "companion",
        "陪伴助手",
        "情感陪伴和日常聊天",
        r#"{"model":"conversational","voice":"warm","personality":"empathetic"}"#,
    ),
];

// ************************* DEVICES ************************* //

pub struct VoiceDeviceRepository {
    connection_pool: SqlitePool,
}

impl VoiceDeviceRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    pub async fn find_many_by_user_id(&self, user_id: i32) -> Result<Vec<VoiceDevice>, Error> {
        let sql = format!(
            "SELECT {} FROM voice_devices WHERE user_id = ? ORDER BY created_at DESC",
            DEVICE_COLUMNS
        );
        sqlx::query_as::<_, VoiceDevice>(&sql)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Il dispositivo solo se appartiene a `user_id`
    pub async fn find_owned(
        &self,
        device_id: &str,
        user_id: i32,
    ) -> Result<Option<VoiceDevice>, Error> {
        let sql = format!(
            "SELECT {} FROM voice_devices WHERE device_id = ? AND user_id = ?",
            DEVICE_COLUMNS
        );
        sqlx::query_as::<_, VoiceDevice>(&sql)
            .bind(device_id)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Create<VoiceDevice, CreateDeviceDTO> for VoiceDeviceRepository {
    async fn create(&self, data: &CreateDeviceDTO) -> Result<VoiceDevice, Error> {
        let sql = format!(
            "INSERT INTO voice_devices \
             (device_id, user_id, name, device_type, status, role_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            DEVICE_COLUMNS
        );
        sqlx::query_as::<_, VoiceDevice>(&sql)
            .bind(&data.device_id)
            .bind(data.user_id)
            .bind(&data.name)
            .bind(&data.device_type)
            .bind(DeviceStatus::Offline)
            .bind(&data.role_id)
            .bind(data.created_at)
            .bind(data.created_at)
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Read<VoiceDevice, String> for VoiceDeviceRepository {
    async fn read(&self, id: &String) -> Result<Option<VoiceDevice>, Error> {
        let sql = format!("SELECT {} FROM voice_devices WHERE device_id = ?", DEVICE_COLUMNS);
        sqlx::query_as::<_, VoiceDevice>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<VoiceDevice, UpdateDeviceDTO, String> for VoiceDeviceRepository {
    async fn update(&self, id: &String, data: &UpdateDeviceDTO) -> Result<VoiceDevice, Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE voice_devices SET updated_at = ");
        qb.push_bind(Utc::now());
        if let Some(name) = &data.name {
            qb.push(", name = ");
            qb.push_bind(name.clone());
        }
        if let Some(device_type) = &data.device_type {
            qb.push(", device_type = ");
            qb.push_bind(device_type.clone());
        }
        if let Some(role_id) = &data.role_id {
            qb.push(", role_id = ");
            qb.push_bind(role_id.clone());
        }
        qb.push(" WHERE device_id = ");
        qb.push_bind(id.clone());

        let result = qb.build().execute(&self.connection_pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::RowNotFound);
        }
        self.read(id).await?.ok_or(Error::RowNotFound)
    }
}

impl Delete<String> for VoiceDeviceRepository {
    /// Le sessioni del dispositivo vengono rimosse in cascata
    async fn delete(&self, id: &String) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM voice_devices WHERE device_id = ?")
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ************************* SESSIONS ************************* //

pub struct VoiceSessionRepository {
    connection_pool: SqlitePool,
}

impl VoiceSessionRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Sessioni dell'utente (opzionalmente di un solo dispositivo) con il totale
    pub async fn list_for_user(
        &self,
        user_id: i32,
        device_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<VoiceSession>, i64), Error> {
        let mut count_qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM voice_sessions WHERE user_id = ");
        count_qb.push_bind(user_id);
        if let Some(device_id) = device_id {
            count_qb.push(" AND device_id = ");
            count_qb.push_bind(device_id.to_string());
        }
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM voice_sessions WHERE user_id = ",
            SESSION_COLUMNS
        ));
        qb.push_bind(user_id);
        if let Some(device_id) = device_id {
            qb.push(" AND device_id = ");
            qb.push_bind(device_id.to_string());
        }
        qb.push(" ORDER BY start_time DESC, session_id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);
        let sessions = qb
            .build_query_as::<VoiceSession>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((sessions, total))
    }

    pub async fn recent_for_device(
        &self,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<VoiceSession>, Error> {
        let sql = format!(
            "SELECT {} FROM voice_sessions WHERE device_id = ? \
             ORDER BY start_time DESC, session_id DESC LIMIT ?",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, VoiceSession>(&sql)
            .bind(device_id)
            .bind(limit)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// La sessione solo se appartiene a `user_id`
    pub async fn find_owned(
        &self,
        session_id: i32,
        user_id: i32,
    ) -> Result<Option<VoiceSession>, Error> {
        let sql = format!(
            "SELECT {} FROM voice_sessions WHERE session_id = ? AND user_id = ?",
            SESSION_COLUMNS
        );
        sqlx::query_as::<_, VoiceSession>(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Chiude le sessioni attive del dispositivo, ne apre una nuova e porta il
    /// dispositivo online, tutto in una transazione
    pub async fn start(
        &self,
        device_id: &str,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<VoiceSession, Error> {
        let mut tx = self.connection_pool.begin().await?;

        sqlx::query(
            "UPDATE voice_sessions SET end_time = ? WHERE device_id = ? AND end_time IS NULL",
        )
        .bind(now)
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "INSERT INTO voice_sessions (device_id, user_id, start_time) VALUES (?, ?, ?) RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, VoiceSession>(&sql)
            .bind(device_id)
            .bind(user_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE voice_devices SET status = ?, last_login = ?, updated_at = ? WHERE device_id = ?",
        )
        .bind(DeviceStatus::Online)
        .bind(now)
        .bind(now)
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    /// Chiude la sessione e porta il dispositivo offline
    pub async fn end(&self, session_id: i32, now: DateTime<Utc>) -> Result<VoiceSession, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let sql = format!(
            "UPDATE voice_sessions SET end_time = COALESCE(end_time, ?) WHERE session_id = ? RETURNING {}",
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, VoiceSession>(&sql)
            .bind(now)
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(Error::RowNotFound)?;

        sqlx::query("UPDATE voice_devices SET status = ?, updated_at = ? WHERE device_id = ?")
            .bind(DeviceStatus::Offline)
            .bind(now)
            .bind(&session.device_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(session)
    }

    pub async fn messages(&self, session_id: i32) -> Result<Vec<VoiceMessage>, Error> {
        let sql = format!(
            "SELECT {} FROM voice_messages WHERE session_id = ? \
             ORDER BY created_at ASC, voice_message_id ASC",
            VOICE_MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, VoiceMessage>(&sql)
            .bind(session_id)
            .fetch_all(&self.connection_pool)
            .await
    }
}

impl Read<VoiceSession, i32> for VoiceSessionRepository {
    async fn read(&self, id: &i32) -> Result<Option<VoiceSession>, Error> {
        let sql = format!("SELECT {} FROM voice_sessions WHERE session_id = ?", SESSION_COLUMNS);
        sqlx::query_as::<_, VoiceSession>(&sql)
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Delete<i32> for VoiceSessionRepository {
    async fn delete(&self, id: &i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM voice_sessions WHERE session_id = ?")
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Create<VoiceMessage, CreateVoiceMessageDTO> for VoiceSessionRepository {
    async fn create(&self, data: &CreateVoiceMessageDTO) -> Result<VoiceMessage, Error> {
        let sql = format!(
            "INSERT INTO voice_messages (session_id, role, content, audio_url, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {}",
            VOICE_MESSAGE_COLUMNS
        );
        sqlx::query_as::<_, VoiceMessage>(&sql)
            .bind(data.session_id)
            .bind(&data.role)
            .bind(&data.content)
            .bind(&data.audio_url)
            .bind(data.created_at)
            .fetch_one(&self.connection_pool)
            .await
    }
}

// ************************* ROLES ************************* //

pub struct VoiceRoleRepository {
    connection_pool: SqlitePool,
}

impl VoiceRoleRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Ruoli di sistema e ruoli dell'utente, prima quelli di sistema
    pub async fn list_visible(&self, user_id: i32) -> Result<Vec<VoiceRole>, Error> {
        let sql = format!(
            "SELECT {} FROM voice_roles WHERE is_system = 1 OR user_id = ? \
             ORDER BY is_system DESC, created_at DESC, role_id ASC",
            ROLE_COLUMNS
        );
        sqlx::query_as::<_, VoiceRole>(&sql)
            .bind(user_id)
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Inserisce i ruoli di sistema mancanti
    pub async fn seed_defaults(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let mut tx = self.connection_pool.begin().await?;
        let mut inserted = 0;
        for (role_id, name, description, config) in DEFAULT_ROLES {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO voice_roles \
                 (role_id, name, description, user_id, is_system, config, created_at) \
                 VALUES (?, ?, ?, NULL, 1, ?, ?)",
            )
            .bind(role_id)
            .bind(name)
            .bind(description)
            .bind(config)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

impl Create<VoiceRole, CreateVoiceRoleDTO> for VoiceRoleRepository {
    async fn create(&self, data: &CreateVoiceRoleDTO) -> Result<VoiceRole, Error> {
        let sql = format!(
            "INSERT INTO voice_roles \
             (role_id, name, description, user_id, is_system, config, created_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?) RETURNING {}",
            ROLE_COLUMNS
        );
        sqlx::query_as::<_, VoiceRole>(&sql)
            .bind(&data.role_id)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.user_id)
            .bind(&data.config)
            .bind(data.created_at)
            .fetch_one(&self.connection_pool)
            .await
    }
}
