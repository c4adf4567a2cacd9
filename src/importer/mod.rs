// ==========================================
// Trip import engine - importer layer
// ==========================================
// Responsibility: completed-trip CSV -> PHI-free trip records
// Input: CSV with a header row (RFC 4180 quoting)
// ==========================================

pub mod column_classifier;
pub mod completeness;
pub mod conflict_handler;
pub mod data_cleaner;
pub mod driver_alias_resolver;
pub mod error;
pub mod file_hasher;
pub mod file_parser;
pub mod partition;
pub mod row_normalizer;
pub mod trip_importer_impl;
pub mod trip_importer_trait;

// Core types
pub use column_classifier::{CanonicalField, ColumnClassification, ColumnClassifier};
pub use completeness::CompletenessAccountant;
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use driver_alias_resolver::{alias_key, AliasPlan, DriverAliasResolver};
pub use error::{ImportError, ImportOutcome};
pub use file_hasher::FileHasher;
pub use file_parser::{CsvParser, ParsedCsv, RawRow};
pub use partition::PartitionKeyBuilder;
pub use row_normalizer::{NormalizeOutcome, RowNormalizerImpl};
pub use trip_importer_impl::TripImporterImpl;

// Trait seams
pub use trip_importer_trait::{
    ConflictHandler, DataCleaner, FileParser, RowNormalizer, TripImporter,
};
