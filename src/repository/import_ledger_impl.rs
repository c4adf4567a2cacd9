// ==========================================
// Trip import engine - SQLite ImportLedger
// ==========================================
// import_batch.file_hash is UNIQUE: a reservation is a VALIDATING row, a
// commit inserts the trips and flips it to COMMITTED in one transaction.
// A reservation is a lease: once older than the lease it may be taken over,
// and the original holder's commit then fails without writing anything.
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{BatchStatus, ImportBatch, ImportFilter, PartitionContext, TripRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_ledger::{CommitOutcome, ImportLedger, Reservation};
use crate::repository::trip_store_impl::{
    format_timestamp, insert_trip_rows, parse_timestamp_column,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Age after which an uncommitted reservation is considered abandoned (seconds)
pub const DEFAULT_RESERVATION_LEASE_SECS: i64 = 15 * 60;

const BATCH_COLUMNS: &str = "batch_id, file_name, file_hash, opco_id, broker_id, broker_account_id, \
     status, received_at, committed_at, expected_rows, imported_rows, skipped_rows, error_rows, \
     extracted_columns_json, ignored_columns_json, errors_json, elapsed_ms";

fn parse_json_column<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<ImportBatch> {
    let status_raw: String = row.get(6)?;
    let status = BatchStatus::from_db_str(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("unknown batch status {}", status_raw).into(),
        )
    })?;
    let received_at: String = row.get(7)?;
    let committed_at: Option<String> = row.get(8)?;

    Ok(ImportBatch {
        batch_id: row.get(0)?,
        file_name: row.get(1)?,
        file_hash: row.get(2)?,
        partition: PartitionContext {
            opco_id: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            broker_id: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            broker_account_id: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        },
        status,
        received_at: parse_timestamp_column(7, &received_at)?,
        committed_at: committed_at
            .map(|raw| parse_timestamp_column(8, &raw))
            .transpose()?,
        expected_rows: row.get::<_, i64>(9)? as usize,
        imported_rows: row.get::<_, i64>(10)? as usize,
        skipped_rows: row.get::<_, i64>(11)? as usize,
        error_rows: row.get::<_, i64>(12)? as usize,
        extracted_columns: parse_json_column(13, &row.get::<_, String>(13)?)?,
        ignored_columns: parse_json_column(14, &row.get::<_, String>(14)?)?,
        errors: parse_json_column(15, &row.get::<_, String>(15)?)?,
        elapsed_ms: row.get::<_, i64>(16)? as u64,
    })
}

// ==========================================
// SqliteImportLedger
// ==========================================
pub struct SqliteImportLedger {
    conn: Arc<Mutex<Connection>>,
    lease: Duration,
}

impl SqliteImportLedger {
    /// Open (and initialize) the database at `db_path`
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        let ledger = Self::from_connection(Arc::new(Mutex::new(conn)));
        ledger.purge_stale_reservations()?;
        Ok(ledger)
    }

    /// Share an existing connection (schema must already exist)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            lease: Duration::seconds(DEFAULT_RESERVATION_LEASE_SECS),
        }
    }

    /// Override the reservation lease
    pub fn with_reservation_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    fn lease_cutoff(&self) -> String {
        format_timestamp(&(Utc::now() - self.lease))
    }

    /// Drop VALIDATING rows whose lease has expired (process died mid-import).
    /// Live reservations held by other processes are left alone.
    pub fn purge_stale_reservations(&self) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let purged = conn.execute(
            "DELETE FROM import_batch WHERE status = ?1 AND received_at <= ?2",
            params![BatchStatus::Validating.to_string(), self.lease_cutoff()],
        )?;
        if purged > 0 {
            info!(purged, "stale import reservations purged");
        }
        Ok(purged)
    }
}

#[async_trait]
impl ImportLedger for SqliteImportLedger {
    async fn reserve(&self, file_hash: &str, batch_id: &str) -> RepositoryResult<Reservation> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let expired = tx.execute(
            "DELETE FROM import_batch WHERE file_hash = ?1 AND status = ?2 AND received_at <= ?3",
            params![
                file_hash,
                BatchStatus::Validating.to_string(),
                self.lease_cutoff()
            ],
        )?;
        if expired > 0 {
            warn!(file_hash, "expired import reservation taken over");
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO import_batch (batch_id, file_hash, file_name, status, received_at)
             VALUES (?1, ?2, '', ?3, ?4)",
            params![
                batch_id,
                file_hash,
                BatchStatus::Validating.to_string(),
                format_timestamp(&Utc::now()),
            ],
        )?;

        let reservation = if inserted == 1 {
            Reservation::Reserved
        } else {
            let owner: String = tx.query_row(
                "SELECT batch_id FROM import_batch WHERE file_hash = ?1",
                params![file_hash],
                |row| row.get(0),
            )?;
            Reservation::AlreadyImported { batch_id: owner }
        };

        tx.commit()?;
        Ok(reservation)
    }

    async fn release(&self, file_hash: &str, batch_id: &str) -> RepositoryResult<()> {
        let conn = self.conn.lock()?;
        conn.execute(
            "DELETE FROM import_batch WHERE file_hash = ?1 AND batch_id = ?2 AND status = ?3",
            params![file_hash, batch_id, BatchStatus::Validating.to_string()],
        )?;
        Ok(())
    }

    async fn commit(
        &self,
        batch: ImportBatch,
        trips: Vec<TripRecord>,
    ) -> RepositoryResult<CommitOutcome> {
        let mut conn = self.conn.lock()?;
        // dropping `tx` without commit rolls everything back
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let conflicts = insert_trip_rows(&tx, &trips)?;
        if !conflicts.is_empty() {
            return Ok(CommitOutcome::KeyConflict(conflicts));
        }

        let updated = tx.execute(
            "UPDATE import_batch SET
                file_name = ?3, status = ?4, opco_id = ?5, broker_id = ?6, broker_account_id = ?7,
                received_at = ?8, committed_at = ?9, expected_rows = ?10, imported_rows = ?11,
                skipped_rows = ?12, error_rows = ?13, extracted_columns_json = ?14,
                ignored_columns_json = ?15, errors_json = ?16, elapsed_ms = ?17
             WHERE batch_id = ?1 AND file_hash = ?2 AND status = ?18",
            params![
                batch.batch_id,
                batch.file_hash,
                batch.file_name,
                batch.status.to_string(),
                batch.partition.opco_id,
                batch.partition.broker_id,
                batch.partition.broker_account_id,
                format_timestamp(&batch.received_at),
                batch.committed_at.as_ref().map(format_timestamp),
                batch.expected_rows as i64,
                batch.imported_rows as i64,
                batch.skipped_rows as i64,
                batch.error_rows as i64,
                serde_json::to_string(&batch.extracted_columns)?,
                serde_json::to_string(&batch.ignored_columns)?,
                serde_json::to_string(&batch.errors)?,
                batch.elapsed_ms as i64,
                BatchStatus::Validating.to_string(),
            ],
        )?;

        if updated != 1 {
            return Err(RepositoryError::InternalError(format!(
                "batch {} does not hold the reservation for {}",
                batch.batch_id, batch.file_hash
            )));
        }

        tx.commit()?;
        Ok(CommitOutcome::Committed)
    }

    async fn find_by_hash(&self, file_hash: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.conn.lock()?;
        let batch = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_batch WHERE file_hash = ?1 AND status = ?2",
                    BATCH_COLUMNS
                ),
                params![file_hash, BatchStatus::Committed.to_string()],
                map_batch_row,
            )
            .optional()?;
        Ok(batch)
    }

    async fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.conn.lock()?;
        let batch = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_batch WHERE batch_id = ?1 AND status = ?2",
                    BATCH_COLUMNS
                ),
                params![batch_id, BatchStatus::Committed.to_string()],
                map_batch_row,
            )
            .optional()?;
        Ok(batch)
    }

    async fn list_batches(&self, filter: &ImportFilter) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_batch
             WHERE status = ?1
               AND (?2 IS NULL OR opco_id = ?2)
               AND (?3 IS NULL OR broker_account_id = ?3)
             ORDER BY received_at DESC, batch_id",
            BATCH_COLUMNS
        ))?;

        let batches = stmt
            .query_map(
                params![
                    BatchStatus::Committed.to_string(),
                    filter.opco_id,
                    filter.broker_account_id
                ],
                map_batch_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }
}
