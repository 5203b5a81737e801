//! Nomi degli oggetti e classificazione dei media

use crate::entities::MediaType;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const PHOTO_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

impl MediaType {
    /// `.jpg/.jpeg/.png/.webp` sono foto, tutto il resto video
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            MediaType::Photo
        } else {
            MediaType::Video
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            MediaType::Photo
        } else {
            MediaType::Video
        }
    }
}

/// Sottotipo del MIME senza parametri (`image/png; q=1` → `png`)
pub fn mime_subtype(mime: &str) -> &str {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((_, subtype)) if !subtype.is_empty() => subtype,
        _ => "bin",
    }
}

pub fn is_valid_image_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    matches!(
        essence.to_ascii_lowercase().as_str(),
        "image/jpeg" | "image/jpg" | "image/png" | "image/webp" | "image/gif"
    )
}

/// `{millis}-{uuid}.{subtype}`
pub fn post_file_name(mime: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}-{}.{}",
        now.timestamp_millis(),
        Uuid::new_v4(),
        mime_subtype(mime)
    )
}

/// Media dei post: `posts/{user_id}/{millis}-{uuid}.{subtype}`
pub fn post_media_key(user_id: i32, mime: &str, now: DateTime<Utc>) -> String {
    format!("posts/{}/{}", user_id, post_file_name(mime, now))
}

/// Vero solo per le chiavi caricate da `user_id` sotto `posts/{user_id}/`
pub fn is_own_post_media(key: &str, user_id: i32) -> bool {
    let prefix = format!("posts/{}/", user_id);
    match key.strip_prefix(&prefix) {
        Some(rest) => !rest.is_empty() && !rest.contains('/') && !rest.contains(".."),
        None => false,
    }
}

pub fn is_absolute_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Foto profilo e copertina: `avatars/{user_id}/{uuid}.{ext}`
pub fn avatar_key(user_id: i32, ext: &str) -> String {
    format!(
        "avatars/{}/{}.{}",
        user_id,
        Uuid::new_v4(),
        ext.trim_start_matches('.')
    )
}

/// `audios/YYYY-MM-DD/{millis}-{uuid}-{nome sanificato}`
pub fn audio_key(now: DateTime<Utc>, file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.is_empty() {
        "audio.bin".to_string()
    } else {
        sanitized
    };
    format!(
        "audios/{}/{}-{}-{}",
        now.format("%Y-%m-%d"),
        now.timestamp_millis(),
        Uuid::new_v4().simple(),
        sanitized
    )
}
