// ==========================================
// Trip import engine - importer error types
// ==========================================
// Batch-level: DuplicateFile / UnknownPartition / MissingHeader
// Row-level:   DuplicatePartitionKey / MalformedDate / MalformedRow
// Tooling: thiserror derive
// ==========================================

use crate::domain::TripKey;
use crate::repository::RepositoryError;
use thiserror::Error;

/// Importer error
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== Batch-level errors =====
    #[error("file already imported (hash {file_hash}, batch {batch_id})")]
    DuplicateFile { file_hash: String, batch_id: String },

    #[error("unknown partition: {0}")]
    UnknownPartition(String),

    #[error("CSV header row is missing or empty")]
    MissingHeader,

    // ===== Row-level errors =====
    #[error("duplicate partition key (row {row}): {key} already imported")]
    DuplicatePartitionKey { row: usize, key: TripKey },

    #[error("malformed date (row {row}): '{value}' is not YYYY-MM-DD, MM/DD/YYYY or M/D/YYYY")]
    MalformedDate { row: usize, value: String },

    #[error("malformed row (row {row}): {message}")]
    MalformedRow { row: usize, message: String },

    // ===== File errors =====
    #[error("file read failed: {0}")]
    FileReadError(String),

    #[error("CSV parse failed: {0}")]
    CsvParseError(String),

    // ===== Infrastructure =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("configuration error (key: {key}): {message}")]
    ConfigError { key: String, message: String },

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// Row number for row-level errors, `None` for batch-level ones.
    pub fn row(&self) -> Option<usize> {
        match self {
            ImportError::DuplicatePartitionKey { row, .. }
            | ImportError::MalformedDate { row, .. }
            | ImportError::MalformedRow { row, .. } => Some(*row),
            _ => None,
        }
    }

    pub fn is_batch_level(&self) -> bool {
        matches!(
            self,
            ImportError::DuplicateFile { .. }
                | ImportError::UnknownPartition(_)
                | ImportError::MissingHeader
        )
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result alias (named to avoid clashing with the domain `ImportResult`)
pub type ImportOutcome<T> = Result<T, ImportError>;
