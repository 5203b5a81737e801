//! Storage Module - Oggetti caricati dagli utenti (foto, video, audio)
//!
//! - `ObjectStore`: seam verso lo storage a oggetti (locale in questa build)
//! - `naming`: generazione delle chiavi e classificazione dei media
//! - `file_name_to_url`: da nome file salvato a URL pubblico

pub mod local;
pub mod naming;

pub use local::LocalObjectStore;
pub use naming::{
    audio_key, avatar_key, is_absolute_url, is_own_post_media, is_valid_image_mime,
    post_file_name, post_media_key,
};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Cancellare una chiave inesistente non è un errore
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Configurazione per la costruzione degli URL pubblici
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Dominio personalizzato (es. `https://assets.example.com`)
    pub public_base_url: Option<String>,
    pub bucket: String,
    pub endpoint: String,
    pub root_dir: String,
}

impl StorageConfig {
    pub fn from_config(config: &crate::core::Config) -> Self {
        Self {
            public_base_url: config.storage_public_url.clone(),
            bucket: config.storage_bucket.clone(),
            endpoint: config.storage_endpoint.clone(),
            root_dir: config.storage_root.clone(),
        }
    }

    pub fn url_for(&self, file_name: Option<&str>) -> Option<String> {
        file_name_to_url(self, file_name)
    }
}

/// Converte un nome file salvato in DB nell'URL pubblico
///
/// I valori che sono già URL assoluti vengono restituiti così come sono.
pub fn file_name_to_url(config: &StorageConfig, file_name: Option<&str>) -> Option<String> {
    let file_name = file_name?.trim();
    if file_name.is_empty() {
        return None;
    }
    if file_name.starts_with("http://") || file_name.starts_with("https://") {
        return Some(file_name.to_string());
    }

    let key = file_name.trim_start_matches('/');
    match config
        .public_base_url
        .as_deref()
        .map(|d| d.trim_end_matches('/'))
        .filter(|d| !d.is_empty())
    {
        Some(domain) => Some(format!("{}/{}", domain, key)),
        None => Some(format!(
            "https://{}.{}/{}",
            config.bucket,
            config.endpoint.trim_matches('/'),
            key
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_config() -> StorageConfig {
        StorageConfig {
            public_base_url: None,
            bucket: "xiaoyuan-chat".into(),
            endpoint: "tos-cn-guangzhou.volces.com".into(),
            root_dir: "./uploads".into(),
        }
    }

    #[test]
    fn test_missing_or_empty_file_name() {
        let cfg = bucket_config();
        assert_eq!(file_name_to_url(&cfg, None), None);
        assert_eq!(file_name_to_url(&cfg, Some("")), None);
        assert_eq!(file_name_to_url(&cfg, Some("   ")), None);
    }

    #[test]
    fn test_absolute_urls_unchanged() {
        let cfg = bucket_config();
        assert_eq!(
            file_name_to_url(&cfg, Some("https://cdn.example.com/a.jpg")).as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
        assert_eq!(
            file_name_to_url(&cfg, Some("http://x/b.png")).as_deref(),
            Some("http://x/b.png")
        );
    }

    #[test]
    fn test_bucket_endpoint_url() {
        let cfg = bucket_config();
        assert_eq!(
            file_name_to_url(&cfg, Some("1700000000000-abc.jpg")).as_deref(),
            Some("https://xiaoyuan-chat.tos-cn-guangzhou.volces.com/1700000000000-abc.jpg")
        );
    }

    #[test]
    fn test_custom_domain_url() {
        let mut cfg = bucket_config();
        cfg.public_base_url = Some("https://assets.xyuan.chat/".into());
        assert_eq!(
            file_name_to_url(&cfg, Some("/avatars/1.png")).as_deref(),
            Some("https://assets.xyuan.chat/avatars/1.png")
        );
    }
}
