// ==========================================
// Trip import engine - importer traits
// ==========================================
// Responsibility: pipeline seams (no implementations here)
// Pipeline: hash -> parse -> classify -> partition -> normalize
//           -> resolve driver -> uniqueness -> commit -> accounting
// ==========================================

use crate::domain::{ImportResult, MobilityType, PartitionContext, TripKey};
use crate::importer::column_classifier::ColumnClassification;
use crate::importer::error::ImportOutcome;
use crate::importer::file_parser::{ParsedCsv, RawRow};
use crate::importer::row_normalizer::NormalizeOutcome;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ==========================================
// TripImporter Trait
// ==========================================
// Implementor: TripImporterImpl
#[async_trait]
pub trait TripImporter: Send + Sync {
    /// Import one completed-trip CSV export.
    ///
    /// # Arguments
    /// - content: raw file content (hashed byte-for-byte)
    /// - file_name: caller-supplied name, informational only
    /// - partition: partition to import under; missing dimensions come from config
    ///
    /// # Returns
    /// - Ok(ImportResult): committed (success=true) or rejected as a whole (success=false)
    /// - Err: infrastructure failure; nothing committed, reservation released
    async fn import_csv(
        &self,
        content: &str,
        file_name: &str,
        partition: Option<PartitionContext>,
    ) -> ImportOutcome<ImportResult>;

    /// Read a file from disk and import it
    async fn import_file(
        &self,
        file_path: &Path,
        partition: Option<PartitionContext>,
    ) -> ImportOutcome<ImportResult>;

    /// Import several files concurrently.
    ///
    /// # Notes
    /// - each file is an independent unit; one failure does not affect the others
    /// - byte-identical files in the same call: exactly one commits
    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        partition: Option<PartitionContext>,
    ) -> Vec<Result<ImportResult, String>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// Implementor: CsvParser
pub trait FileParser: Send + Sync {
    /// Split content into header + logical data rows (blank rows included)
    fn parse_str(&self, content: &str) -> ImportOutcome<ParsedCsv>;
}

// ==========================================
// RowNormalizer Trait
// ==========================================
// Implementor: RowNormalizerImpl
pub trait RowNormalizer: Send + Sync {
    /// Turn one raw row into a typed row, a skip, or a row-level error.
    ///
    /// Only columns present in `columns.mapping` are read. A routed distance above
    /// `max_routed_distance` is a warning, not an error.
    fn normalize(
        &self,
        row: &RawRow,
        columns: &ColumnClassification,
        max_routed_distance: f64,
    ) -> NormalizeOutcome;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// Implementor: DataCleanerImpl
pub trait DataCleaner: Send + Sync {
    /// Trim, optionally uppercase
    fn clean_text(&self, value: &str, uppercase: bool) -> String;

    /// Empty / whitespace -> None
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// Parse a service date under the accepted formats
    ///
    /// # Accepted
    /// - YYYY-MM-DD, MM/DD/YYYY, M/D/YYYY (a trailing time component is ignored)
    fn parse_service_date(&self, value: &str) -> Option<NaiveDate>;

    /// Map a vendor mobility value onto the closed vocabulary
    fn clean_mobility_type(&self, value: Option<&str>) -> MobilityType;

    /// Parse a routed distance ("12.5", "12.5 mi", "1,024.0")
    fn parse_distance(&self, value: &str) -> Option<f64>;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// Implementor: ConflictHandlerImpl
pub trait ConflictHandler: Send + Sync {
    /// Duplicate composite keys inside one file (every occurrence after the first)
    fn detect_duplicates(&self, keys: &[(usize, TripKey)]) -> Vec<(usize, TripKey)>;

    /// Keys that already exist in the store
    fn detect_cross_batch_duplicates(
        &self,
        keys: &[(usize, TripKey)],
        existing: &HashSet<TripKey>,
    ) -> Vec<(usize, TripKey)>;
}
