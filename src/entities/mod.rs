//! Entities module - Entità del dominio applicativo
//!
//! Ogni entity corrisponde a una tabella nel database.

pub mod comment;
pub mod conversation;
pub mod enums;
pub mod facegate_device;
pub mod follow;
pub mod message;
pub mod post;
pub mod user;
pub mod voice;
pub mod wallet_transaction;

// Re-exports per facilitare l'import
pub use comment::Comment;
pub use conversation::Conversation;
pub use enums::{DeviceStatus, MediaType, MessageType, TaskStatus, TransactionStatus, TransactionType};
pub use facegate_device::FacegateDevice;
pub use follow::Follow;
pub use message::Message;
pub use post::{Post, PostWithStats, VisualMedia};
pub use user::{User, UserWithStats, VoiceMapping};
pub use voice::{VoiceDevice, VoiceMessage, VoiceRole, VoiceSession};
pub use wallet_transaction::WalletTransaction;
