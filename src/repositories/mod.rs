//! Repositories module - Coordinatore per tutti i repository del progetto
//!
//! Ogni repository gestisce le operazioni di database per una specifica entità
//! sopra un `SqlitePool` condiviso.

// ************************* NOTA SU SQLX ************************* //

/*
   Le query usano le funzioni runtime (`sqlx::query`, `sqlx::query_as::<_, T>`,
   `QueryBuilder`) invece delle macro `query!`/`query_as!`: così la build non
   richiede un database raggiungibile né la cache offline di sqlx.
   Le entity derivano `sqlx::FromRow`, quindi la select deve nominare tutte le
   colonne della struct (vedi le costanti `*_COLUMNS` di ogni repository).

   Metodo da chiamare in base alle righe attese:
   - nessuna (INSERT/UPDATE/DELETE senza RETURNING) -> .execute()
   - zero o una                                     -> .fetch_optional()
   - esattamente una (anche aggregati, RETURNING)   -> .fetch_one()
   - molte                                          -> .fetch_all()

   Le operazioni che devono essere atomiche aprono una transazione con
   `pool.begin()` e fanno commit esplicito: se la funzione esce prima
   (errore o `return`), la transazione viene annullata al drop.
*/

// ************************* MODULI REPOSITORY ************************* //

pub mod comment;
pub mod conversation;
pub mod facegate;
pub mod follow;
pub mod message;
pub mod post;
pub mod task;
pub mod traits;
pub mod user;
pub mod voice;
pub mod wallet;

// Re-esportazione dei trait per facilitare l'import
pub use traits::{Create, Delete, Read, ReadMany, Update};

pub use comment::CommentRepository;
pub use conversation::ConversationRepository;
pub use facegate::FacegateDeviceRepository;
pub use follow::FollowRepository;
pub use message::MessageRepository;
pub use post::PostRepository;
pub use task::{ExpirySummary, FinalRefund, TASK_EXPIRY_DAYS, TaskRepository};
pub use user::{DEFAULT_TTS_TRAININGS, UserFilter, UserRepository};
pub use voice::{VoiceDeviceRepository, VoiceRoleRepository, VoiceSessionRepository};
pub use wallet::{RedPacketOutcome, WalletRepository, wallet_address_for};

/// Escape dei metacaratteri di LIKE (da usare con `ESCAPE '\'`)
fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub(crate) fn like_prefix(raw: &str) -> String {
    format!("{}%", like_escape(raw))
}

pub(crate) fn like_contains(raw: &str) -> String {
    format!("%{}%", like_escape(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_patterns_escape_wildcards() {
        assert_eq!(like_prefix("al"), "al%");
        assert_eq!(like_contains("50%_off"), "%50\\%\\_off%");
    }
}
