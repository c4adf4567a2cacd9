// ==========================================
// Trip import engine - ImportLedger trait
// ==========================================
// Responsibility: content-hash idempotency + committed batch history
// A hash is either free, reserved by one in-flight import, or committed.
// Commit writes the batch's trips and the batch row in one atomic step.
// ==========================================

use crate::domain::{ImportBatch, ImportFilter, TripKey, TripRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

/// Result of an atomic hash reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    Reserved,
    AlreadyImported { batch_id: String }, // committed earlier, or in flight right now
}

/// Result of an atomic commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    KeyConflict(Vec<TripKey>), // keys already stored; nothing written, reservation kept
}

// ==========================================
// ImportLedger Trait
// ==========================================
// Implementors: MemoryImportLedger, SqliteImportLedger
#[async_trait]
pub trait ImportLedger: Send + Sync {
    /// Atomically claim `file_hash` for `batch_id`
    async fn reserve(&self, file_hash: &str, batch_id: &str) -> RepositoryResult<Reservation>;

    /// Drop an uncommitted reservation (batch-level failure)
    async fn release(&self, file_hash: &str, batch_id: &str) -> RepositoryResult<()>;

    /// Insert `trips` and replace the reservation with the committed batch,
    /// all or nothing.
    ///
    /// # Returns
    /// - Committed: every trip stored, batch visible in history
    /// - KeyConflict: some keys were taken meanwhile; nothing written
    /// - Err: `batch` does not own the reservation, or storage failure; nothing written
    async fn commit(
        &self,
        batch: ImportBatch,
        trips: Vec<TripRecord>,
    ) -> RepositoryResult<CommitOutcome>;

    async fn find_by_hash(&self, file_hash: &str) -> RepositoryResult<Option<ImportBatch>>;

    async fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>>;

    /// Committed batches, newest first
    async fn list_batches(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportBatch>>;
}
