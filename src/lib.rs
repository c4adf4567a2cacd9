// ==========================================
// Completed-trip import engine - core library
// ==========================================
// Stack: Rust + SQLite (or in-memory)
// Role: PHI-free ingestion of dispatch-platform completed-trip exports
// ==========================================

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and types
pub mod domain;

// Repository layer - data access
pub mod repository;

// Importer layer - CSV pipeline
pub mod importer;

// Configuration layer
pub mod config;

// Database infrastructure (connection setup / schema)
pub mod db;

// Logging
pub mod logging;

// API layer - import + query surface
pub mod api;

// ==========================================
// Re-exports
// ==========================================

pub use domain::{
    BatchStatus, DriverSummary, ImportBatch, ImportBatchSummary, ImportFilter, ImportResult,
    MobilityType, PartitionContext, RowError, TripFilter, TripKey, TripRecord,
};

pub use api::{ActualImportService, ApiError, ApiResult};

pub use config::{ConfigManager, ImportConfigReader, StaticImportConfig};

pub use importer::{ImportError, TripImporter};

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "nemt-trip-import";
