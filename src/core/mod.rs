//! Core Module - Componenti infrastrutturali dell'applicazione
//!
//! Questo modulo contiene tutti i componenti "core" dell'applicazione:
//! - Autenticazione, sessione JWT e controllo amministratore
//! - Configurazione
//! - Gestione errori
//! - Stato applicazione

pub mod auth;
pub mod config;
pub mod error;
pub mod state;

// Re-exports per facilitare l'import
pub use auth::{
    Claims, admin_middleware, authentication_middleware, clear_session_headers, decode_jwt,
    encode_jwt, is_admin, require_admin, session_headers,
};
pub use config::Config;
pub use error::AppError;
pub use state::AppState;
