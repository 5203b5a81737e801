//! Trait comuni dei repository
//!
//! Interfacce generiche per le operazioni CRUD: ogni repository implementa
//! solo quelle che la sua entità supporta.

/// Inserimento di una nuova entità
///
/// # Type Parameters
/// * `Entity` - entità restituita, con l'id assegnato dal database
/// * `CreateDTO` - dati di creazione (senza id)
pub trait Create<Entity, CreateDTO> {
    async fn create(&self, data: &CreateDTO) -> Result<Entity, sqlx::Error>;
}

/// Lettura per chiave primaria
///
/// # Returns
/// * `Ok(None)` se non esiste nessuna riga con quella chiave
pub trait Read<Entity, Id> {
    async fn read(&self, id: &Id) -> Result<Option<Entity>, sqlx::Error>;
}

/// Lettura di più entità per lista di chiavi
///
/// L'ordine del risultato non segue quello delle chiavi.
pub trait ReadMany<Entity, Id> {
    async fn read_many(&self, ids: &[Id]) -> Result<Vec<Entity>, sqlx::Error>;
}

/// Aggiornamento parziale: solo i campi `Some(_)` del DTO vengono modificati
///
/// # Returns
/// * `Err(sqlx::Error::RowNotFound)` se l'entità non esiste
pub trait Update<Entity, UpdateDTO, Id> {
    async fn update(&self, id: &Id, data: &UpdateDTO) -> Result<Entity, sqlx::Error>;
}

/// Cancellazione per chiave primaria
///
/// # Returns
/// * `Ok(true)` se una riga è stata cancellata
pub trait Delete<Id> {
    async fn delete(&self, id: &Id) -> Result<bool, sqlx::Error>;
}
