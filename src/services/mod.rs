//! Services module - Coordinatore per tutti i service handler HTTP
//!
//! Questo modulo organizza i service handlers in sotto-moduli separati per una migliore manutenibilità.
//! Ogni modulo gestisce gli endpoint HTTP per una specifica funzionalità.

pub mod admin;
pub mod auth;
pub mod conversation;
pub mod facegate;
pub mod post;
pub mod task;
pub mod user;
pub mod voice;
pub mod wallet;

// Re-exports per facilitare l'import
pub use admin::{
    admin_batch_voice_mappings, admin_clear_voice_mapping, admin_create_user, admin_delete_user,
    admin_list_users, admin_list_voice_mappings, admin_update_user, admin_update_voice_mapping,
};
pub use auth::{login_user, logout_user, register_user, send_sms, verify_sms};
pub use conversation::{
    create_conversation, list_conversations, list_messages, mark_messages_read, search_messages,
    send_message, upload_message_image,
};
pub use facegate::{
    create_facegate_device, delete_facegate_device, facegate_heartbeat, list_facegate_devices,
};
pub use post::{
    create_comment, create_post, delete_comment, delete_post, get_post, like_post, list_comments,
    list_feed, list_user_posts, unlike_post, upload_post_media,
};
pub use task::{
    accept_task, confirm_completion, expire_unclaimed_tasks, handle_completion,
    handle_task_outcome, request_completion, start_task_expiry_sweeper,
};
pub use user::{
    change_password, follow_user, get_balance, get_me, get_punked_followers, get_user_activity,
    get_user_by_id, get_user_by_username, list_users, unfollow_user, update_tts_settings,
    update_user, upload_photo,
};
pub use voice::{
    create_device, create_voice_message, create_voice_role, delete_device, delete_session,
    end_session, get_device, get_session, list_devices, list_sessions, list_voice_roles,
    start_session, update_device, upload_voice_audio,
};
pub use wallet::{get_wallet, list_transactions, send_red_packet};

use crate::AppState;
use crate::core::AppError;
use axum::{
    extract::{
        State,
        multipart::{Multipart, MultipartError},
    },
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

/// Dimensione massima di un file caricato (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Root endpoint - health check
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Server is running!")
}

/// File ricevuto da un form multipart
pub(crate) struct UploadedFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Campi di un form multipart: il campo `file` e i campi testuali
#[derive(Default)]
pub(crate) struct MultipartForm {
    pub file: Option<UploadedFile>,
    pub fields: Vec<(String, String)>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Solo il superamento del limite del body è un 413, il resto è input malformato
fn multipart_error(e: MultipartError) -> AppError {
    warn!("Failed to read multipart body: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large("File too large")
    } else {
        AppError::bad_request("Malformed multipart body").with_details(e.body_text())
    }
}

/// Legge l'intero form; il file oltre `MAX_UPLOAD_BYTES` è un 413
pub(crate) async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(AppError::payload_too_large("File too large")
                    .with_details(format!("Maximum size is {} bytes", MAX_UPLOAD_BYTES)));
            }
            form.file = Some(UploadedFile {
                bytes: bytes.to_vec(),
                content_type,
                file_name,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(multipart_error)?;
            form.fields.push((name, value));
        }
    }

    Ok(form)
}
