// ==========================================
// Trip import engine - TripStore trait
// ==========================================
// Responsibility: read side of committed trip storage
// Writes go through ImportLedger::commit so trips and batch land together.
// Red line: repositories hold no business rules, only CRUD and constraints
// ==========================================

use crate::domain::{TripFilter, TripKey, TripRecord};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

// ==========================================
// TripStore Trait
// ==========================================
// Implementors: MemoryTripStore, SqliteTripStore
#[async_trait]
pub trait TripStore: Send + Sync {
    /// Subset of `keys` already present
    async fn existing_keys(&self, keys: &[TripKey]) -> RepositoryResult<HashSet<TripKey>>;

    /// Trips on one service date, filtered by partition
    async fn find_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> RepositoryResult<Vec<TripRecord>>;

    /// Trips produced by one import batch
    async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<TripRecord>>;

    async fn count(&self) -> RepositoryResult<usize>;
}
