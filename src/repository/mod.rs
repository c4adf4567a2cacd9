// ==========================================
// Trip import engine - repository layer
// ==========================================
// Red line: repositories hold no business rules
// Constraint: every query is parameterized
// ==========================================

pub mod alias_registry;
pub mod alias_registry_impl;
pub mod error;
pub mod import_ledger;
pub mod import_ledger_impl;
pub mod memory_repo;
pub mod trip_store;
pub mod trip_store_impl;

pub use alias_registry::AliasRegistry;
pub use alias_registry_impl::SqliteAliasRegistry;
pub use error::{RepositoryError, RepositoryResult};
pub use import_ledger::{CommitOutcome, ImportLedger, Reservation};
pub use import_ledger_impl::{SqliteImportLedger, DEFAULT_RESERVATION_LEASE_SECS};
pub use memory_repo::{MemoryAliasRegistry, MemoryImportLedger, MemoryTripStore};
pub use trip_store::TripStore;
pub use trip_store_impl::SqliteTripStore;
