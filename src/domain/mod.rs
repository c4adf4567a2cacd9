// ==========================================
// Trip import engine - domain layer
// ==========================================
// Responsibility: entities, value objects and closed vocabularies
// Red line: no data access, no pipeline logic
// ==========================================

pub mod import;
pub mod trip;
pub mod types;

// Re-export core types
pub use import::{
    CompletenessReport, ImportBatch, ImportBatchSummary, ImportFilter, ImportResult, RowError,
};
pub use trip::{
    DriverSummary, NormalizedRow, PartitionContext, RowOutcome, TripFilter, TripKey, TripRecord,
};
pub use types::{BatchStatus, MobilityType};
