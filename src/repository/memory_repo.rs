// ==========================================
// Trip import engine - in-memory repositories
// ==========================================
// Mutex-guarded maps; each check-and-insert happens under one lock.
// Used by tests and by short-lived processes that do not need persistence.
// ==========================================

use crate::domain::{ImportBatch, ImportFilter, TripFilter, TripKey, TripRecord};
use crate::repository::alias_registry::AliasRegistry;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_ledger::{CommitOutcome, ImportLedger, Reservation};
use crate::repository::trip_store::TripStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

// ==========================================
// MemoryTripStore
// ==========================================
#[derive(Default)]
pub struct MemoryTripStore {
    trips: Mutex<HashMap<TripKey, TripRecord>>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every trip, or none of them.
    ///
    /// # Returns
    /// - keys already stored or repeated within `trips` (empty = all inserted)
    fn insert_all_or_nothing(&self, trips: Vec<TripRecord>) -> RepositoryResult<Vec<TripKey>> {
        let mut guard = self.trips.lock()?;

        let mut seen = HashSet::new();
        let conflicts: Vec<TripKey> = trips
            .iter()
            .map(TripRecord::key)
            .filter(|key| guard.contains_key(key) || !seen.insert(key.clone()))
            .collect();
        if !conflicts.is_empty() {
            return Ok(conflicts);
        }

        for trip in trips {
            guard.insert(trip.key(), trip);
        }
        Ok(Vec::new())
    }
}

fn sort_trips(trips: &mut [TripRecord]) {
    trips.sort_by(|a, b| {
        (&a.opco_id, &a.broker_account_id, &a.trip_id)
            .cmp(&(&b.opco_id, &b.broker_account_id, &b.trip_id))
    });
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn existing_keys(&self, keys: &[TripKey]) -> RepositoryResult<HashSet<TripKey>> {
        let guard = self.trips.lock()?;
        Ok(keys
            .iter()
            .filter(|k| guard.contains_key(*k))
            .cloned()
            .collect())
    }

    async fn find_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> RepositoryResult<Vec<TripRecord>> {
        let guard = self.trips.lock()?;
        let mut trips: Vec<TripRecord> = guard
            .values()
            .filter(|t| t.service_date == service_date && filter.matches(t))
            .cloned()
            .collect();
        sort_trips(&mut trips);
        Ok(trips)
    }

    async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<TripRecord>> {
        let guard = self.trips.lock()?;
        let mut trips: Vec<TripRecord> = guard
            .values()
            .filter(|t| t.batch_id == batch_id)
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.source_row);
        Ok(trips)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.trips.lock()?.len())
    }
}

// ==========================================
// MemoryImportLedger
// ==========================================
#[derive(Default)]
struct LedgerState {
    reservations: HashMap<String, String>, // file_hash -> in-flight batch_id
    committed: HashMap<String, ImportBatch>, // file_hash -> batch
}

/// Ledger that commits into a shared MemoryTripStore under its own lock
pub struct MemoryImportLedger {
    state: Mutex<LedgerState>,
    trips: Arc<MemoryTripStore>,
}

impl MemoryImportLedger {
    pub fn new(trips: Arc<MemoryTripStore>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            trips,
        }
    }
}

#[async_trait]
impl ImportLedger for MemoryImportLedger {
    async fn reserve(&self, file_hash: &str, batch_id: &str) -> RepositoryResult<Reservation> {
        let mut state = self.state.lock()?;

        if let Some(batch) = state.committed.get(file_hash) {
            return Ok(Reservation::AlreadyImported {
                batch_id: batch.batch_id.clone(),
            });
        }
        if let Some(in_flight) = state.reservations.get(file_hash) {
            return Ok(Reservation::AlreadyImported {
                batch_id: in_flight.clone(),
            });
        }

        state
            .reservations
            .insert(file_hash.to_string(), batch_id.to_string());
        Ok(Reservation::Reserved)
    }

    async fn release(&self, file_hash: &str, batch_id: &str) -> RepositoryResult<()> {
        let mut state = self.state.lock()?;
        if state.reservations.get(file_hash).map(String::as_str) == Some(batch_id) {
            state.reservations.remove(file_hash);
        }
        Ok(())
    }

    async fn commit(
        &self,
        batch: ImportBatch,
        trips: Vec<TripRecord>,
    ) -> RepositoryResult<CommitOutcome> {
        let mut state = self.state.lock()?;

        match state.reservations.get(&batch.file_hash) {
            Some(owner) if *owner == batch.batch_id => {}
            _ => {
                return Err(RepositoryError::InternalError(format!(
                    "batch {} does not hold the reservation for {}",
                    batch.batch_id, batch.file_hash
                )))
            }
        }

        let conflicts = self.trips.insert_all_or_nothing(trips)?;
        if !conflicts.is_empty() {
            return Ok(CommitOutcome::KeyConflict(conflicts));
        }

        state.reservations.remove(&batch.file_hash);
        state.committed.insert(batch.file_hash.clone(), batch);
        Ok(CommitOutcome::Committed)
    }

    async fn find_by_hash(&self, file_hash: &str) -> RepositoryResult<Option<ImportBatch>> {
        Ok(self.state.lock()?.committed.get(file_hash).cloned())
    }

    async fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        Ok(self
            .state
            .lock()?
            .committed
            .values()
            .find(|b| b.batch_id == batch_id)
            .cloned())
    }

    async fn list_batches(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportBatch>> {
        let state = self.state.lock()?;
        let mut batches: Vec<ImportBatch> = state
            .committed
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        batches.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| a.batch_id.cmp(&b.batch_id))
        });
        Ok(batches)
    }
}

// ==========================================
// MemoryAliasRegistry
// ==========================================
#[derive(Default)]
pub struct MemoryAliasRegistry {
    keys: HashMap<String, String>,        // alias key -> canonical
    spellings: BTreeMap<String, String>,  // spelling -> alias key
}

impl MemoryAliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AliasRegistry for MemoryAliasRegistry {
    fn lookup_canonical(&self, alias_key: &str) -> RepositoryResult<Option<String>> {
        Ok(self.keys.get(alias_key).cloned())
    }

    fn upsert_key(&mut self, alias_key: &str, canonical: &str) -> RepositoryResult<()> {
        self.keys
            .insert(alias_key.to_string(), canonical.to_string());
        Ok(())
    }

    fn repoint_canonical(
        &mut self,
        old_canonical: &str,
        new_canonical: &str,
    ) -> RepositoryResult<usize> {
        let mut count = 0;
        for canonical in self.keys.values_mut() {
            if canonical == old_canonical {
                *canonical = new_canonical.to_string();
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_spelling(&mut self, spelling: &str, alias_key: &str) -> RepositoryResult<()> {
        self.spellings
            .insert(spelling.to_string(), alias_key.to_string());
        Ok(())
    }

    fn spellings_for(&self, canonical: &str) -> RepositoryResult<Vec<String>> {
        // BTreeMap iteration keeps the result sorted
        Ok(self
            .spellings
            .iter()
            .filter(|(_, key)| self.keys.get(*key).map(String::as_str) == Some(canonical))
            .map(|(spelling, _)| spelling.clone())
            .collect())
    }
}
