//! Application State - Stato globale dell'applicazione
//!
//! Contiene tutti i repository, configurazioni e stato condiviso
//! necessario per gestire l'applicazione.

use crate::core::Config;
use crate::repositories::{
    CommentRepository, ConversationRepository, FacegateDeviceRepository, FollowRepository,
    MessageRepository, PostRepository, TaskRepository, UserRepository, VoiceDeviceRepository,
    VoiceRoleRepository, VoiceSessionRepository, WalletRepository,
};
use crate::sms::VerificationStore;
use crate::storage::{LocalObjectStore, ObjectStore, StorageConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_ADMIN_PHONE: &str = "18874748888";

/// Stato globale dell'applicazione condiviso tra tutte le route e middleware
pub struct AppState {
    pub user: UserRepository,
    pub post: PostRepository,
    pub task: TaskRepository,
    pub comment: CommentRepository,
    pub follow: FollowRepository,
    pub conversation: ConversationRepository,
    pub msg: MessageRepository,
    pub wallet: WalletRepository,
    pub device: VoiceDeviceRepository,
    pub session: VoiceSessionRepository,
    pub role: VoiceRoleRepository,
    pub facegate: FacegateDeviceRepository,

    /// Secret key per JWT token
    pub jwt_secret: String,

    /// Telefono dell'amministratore
    pub admin_phone: String,

    /// `development` abilita l'eco del codice SMS nella risposta
    pub app_env: String,

    /// Codici di verifica SMS in memoria, l'unico stato mutabile condiviso
    pub sms: Arc<VerificationStore>,

    pub storage: Arc<dyn ObjectStore>,
    pub storage_config: StorageConfig,
}

impl AppState {
    /// Stato con impostazioni di sviluppo: storage locale in una directory
    /// temporanea e amministratore predefinito.
    ///
    /// # Arguments
    /// * `pool` - Pool di connessioni SQLite condiviso
    /// * `jwt_secret` - Chiave segreta per la firma dei token JWT
    pub fn new(pool: SqlitePool, jwt_secret: String) -> Self {
        let root_dir = std::env::temp_dir()
            .join(format!("xiaoyuan-uploads-{}", Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        let storage_config = StorageConfig {
            public_base_url: None,
            bucket: "xiaoyuan-chat".to_string(),
            endpoint: "tos-cn-guangzhou.volces.com".to_string(),
            root_dir,
        };
        Self::build(
            pool,
            jwt_secret,
            DEFAULT_ADMIN_PHONE.to_string(),
            "development".to_string(),
            storage_config,
        )
    }

    /// Stato costruito dalla configurazione caricata in `main`
    pub fn from_config(pool: SqlitePool, config: &Config) -> Self {
        Self::build(
            pool,
            config.jwt_secret.clone(),
            config.admin_phone.clone(),
            config.app_env.clone(),
            StorageConfig::from_config(config),
        )
    }

    fn build(
        pool: SqlitePool,
        jwt_secret: String,
        admin_phone: String,
        app_env: String,
        storage_config: StorageConfig,
    ) -> Self {
        Self {
            user: UserRepository::new(pool.clone()),
            post: PostRepository::new(pool.clone()),
            task: TaskRepository::new(pool.clone()),
            comment: CommentRepository::new(pool.clone()),
            follow: FollowRepository::new(pool.clone()),
            conversation: ConversationRepository::new(pool.clone()),
            msg: MessageRepository::new(pool.clone()),
            wallet: WalletRepository::new(pool.clone()),
            device: VoiceDeviceRepository::new(pool.clone()),
            session: VoiceSessionRepository::new(pool.clone()),
            role: VoiceRoleRepository::new(pool.clone()),
            facegate: FacegateDeviceRepository::new(pool),
            jwt_secret,
            admin_phone,
            app_env,
            sms: Arc::new(VerificationStore::new()),
            storage: Arc::new(LocalObjectStore::new(storage_config.root_dir.clone())),
            storage_config,
        }
    }

    pub fn with_admin_phone(mut self, admin_phone: impl Into<String>) -> Self {
        self.admin_phone = admin_phone.into();
        self
    }

    pub fn with_app_env(mut self, app_env: impl Into<String>) -> Self {
        self.app_env = app_env.into();
        self
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
