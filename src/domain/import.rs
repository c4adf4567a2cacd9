// ==========================================
// Trip import engine - import batch model
// ==========================================
// ImportBatch is owned by the idempotency ledger.
// ImportResult is the caller-facing outcome of one import call.
// ==========================================

use crate::domain::trip::PartitionContext;
use crate::domain::types::BatchStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RowError - row-level error / warning with provenance
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,      // 1-based data row (0 = batch level)
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

// ==========================================
// ImportBatch - committed import attempt
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub batch_id: String,                   // UUID
    pub file_name: String,                  // name supplied by the caller
    pub file_hash: String,                  // SHA-256 hex of the raw bytes
    pub partition: PartitionContext,        // partition the rows were imported under
    pub status: BatchStatus,                // always COMMITTED once stored
    pub received_at: DateTime<Utc>,
    pub committed_at: Option<DateTime<Utc>>,
    pub expected_rows: usize,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub error_rows: usize,
    pub extracted_columns: Vec<String>,
    pub ignored_columns: Vec<String>,
    pub errors: Vec<RowError>,
    pub elapsed_ms: u64,
}

// ==========================================
// ImportBatchSummary - list projection for getImports
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatchSummary {
    pub batch_id: String,
    pub file_name: String,
    pub file_hash: String,
    pub opco_id: String,
    pub broker_id: String,
    pub broker_account_id: String,
    pub status: BatchStatus,
    pub received_at: DateTime<Utc>,
    pub expected_rows: usize,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub error_rows: usize,
}

impl From<&ImportBatch> for ImportBatchSummary {
    fn from(batch: &ImportBatch) -> Self {
        Self {
            batch_id: batch.batch_id.clone(),
            file_name: batch.file_name.clone(),
            file_hash: batch.file_hash.clone(),
            opco_id: batch.partition.opco_id.clone(),
            broker_id: batch.partition.broker_id.clone(),
            broker_account_id: batch.partition.broker_account_id.clone(),
            status: batch.status,
            received_at: batch.received_at,
            expected_rows: batch.expected_rows,
            imported_rows: batch.imported_rows,
            skipped_rows: batch.skipped_rows,
            error_rows: batch.error_rows,
        }
    }
}

/// Conjunctive import-history filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportFilter {
    pub opco_id: Option<String>,
    pub broker_account_id: Option<String>,
}

impl ImportFilter {
    pub fn by_opco(opco_id: impl Into<String>) -> Self {
        Self {
            opco_id: Some(opco_id.into()),
            broker_account_id: None,
        }
    }

    pub fn matches(&self, batch: &ImportBatch) -> bool {
        self.opco_id
            .as_ref()
            .map_or(true, |o| *o == batch.partition.opco_id)
            && self
                .broker_account_id
                .as_ref()
                .map_or(true, |a| *a == batch.partition.broker_account_id)
    }
}

// ==========================================
// CompletenessReport - row accounting proof
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletenessReport {
    pub expected_rows: usize,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub error_rows: usize,
    pub accounted_rows: usize,
    pub missing_rows: Vec<usize>,
    pub is_complete: bool,
}

// ==========================================
// ImportResult - outcome of one import call
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub batch_id: Option<String>,
    pub status: BatchStatus,
    pub file_name: String,
    pub imported_rows: usize,
    pub skipped_rows: usize,
    pub error_rows: usize,
    pub errors: Vec<RowError>,
    pub warnings: Vec<RowError>,
    pub extracted_columns: Vec<String>,
    pub ignored_columns: Vec<String>,
    pub file_hash: String,
    pub expected_rows: usize,
    pub accounted_rows: usize,
    pub missing_rows: Vec<usize>,
    pub is_complete: bool,
    pub opco_id: String,
    pub broker_account_id: String,
    pub elapsed_ms: u64,
}

impl ImportResult {
    /// Whole-batch rejection: nothing committed, `imported_rows = 0`.
    pub fn rejected(
        file_name: &str,
        file_hash: &str,
        status: BatchStatus,
        message: impl Into<String>,
        partition: Option<&PartitionContext>,
    ) -> Self {
        Self {
            success: false,
            batch_id: None,
            status,
            file_name: file_name.to_string(),
            imported_rows: 0,
            skipped_rows: 0,
            error_rows: 0,
            errors: vec![RowError::new(0, message)],
            warnings: Vec::new(),
            extracted_columns: Vec::new(),
            ignored_columns: Vec::new(),
            file_hash: file_hash.to_string(),
            expected_rows: 0,
            accounted_rows: 0,
            missing_rows: Vec::new(),
            is_complete: false,
            opco_id: partition.map(|p| p.opco_id.clone()).unwrap_or_default(),
            broker_account_id: partition
                .map(|p| p.broker_account_id.clone())
                .unwrap_or_default(),
            elapsed_ms: 0,
        }
    }
}
