// ==========================================
// Trip import engine - import pipeline
// ==========================================
// Flow: hash -> reserve -> parse -> classify -> partition -> normalize
//       -> uniqueness -> plan drivers -> accounting -> atomic commit
//       -> register driver spellings
// Whole-batch failures release the reservation and commit nothing.
// Trips and the batch row are written together by the ledger commit.
// Row-level failures are collected with provenance and never abort siblings.
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{
    BatchStatus, ImportBatch, ImportResult, NormalizedRow, PartitionContext, RowError, RowOutcome,
    TripKey, TripRecord,
};
use crate::importer::column_classifier::ColumnClassifier;
use crate::importer::completeness::CompletenessAccountant;
use crate::importer::driver_alias_resolver::DriverAliasResolver;
use crate::importer::error::{ImportError, ImportOutcome};
use crate::importer::file_hasher::FileHasher;
use crate::importer::file_parser::CsvParser;
use crate::importer::partition::PartitionKeyBuilder;
use crate::importer::row_normalizer::NormalizeOutcome;
use crate::importer::trip_importer_trait::{
    ConflictHandler, FileParser, RowNormalizer, TripImporter,
};
use crate::repository::{CommitOutcome, ImportLedger, Reservation, TripStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// TripImporterImpl
// ==========================================
pub struct TripImporterImpl {
    // storage
    trip_store: Arc<dyn TripStore>,
    ledger: Arc<dyn ImportLedger>,

    // shared driver identity
    aliases: Arc<DriverAliasResolver>,

    // configuration
    config: Arc<dyn ImportConfigReader>,

    // pipeline components
    file_parser: Box<dyn FileParser>,
    normalizer: Box<dyn RowNormalizer>,
    conflict_handler: Box<dyn ConflictHandler>,
}

/// Identity of one in-flight import
struct BatchContext<'a> {
    batch_id: String,
    file_name: &'a str,
    file_hash: String,
    received_at: DateTime<Utc>,
    started: Instant,
}

fn advance(status: &mut BatchStatus, next: BatchStatus) -> ImportOutcome<()> {
    if !status.can_transition_to(next) {
        return Err(ImportError::InternalError(format!(
            "illegal batch transition {} -> {}",
            status, next
        )));
    }
    *status = next;
    Ok(())
}

fn config_error(key: &str, err: impl std::fmt::Display) -> ImportError {
    ImportError::ConfigError {
        key: key.to_string(),
        message: err.to_string(),
    }
}

impl TripImporterImpl {
    /// Build an importer
    ///
    /// # Arguments
    /// - trip_store: committed trips + composite uniqueness
    /// - ledger: content-hash idempotency + batch history
    /// - aliases: driver identity shared with the query layer
    /// - config: default partition, allowlist extension, thresholds
    /// - file_parser: CSV -> logical rows
    /// - normalizer: raw row -> typed row | skip | row error
    /// - conflict_handler: duplicate key detection
    pub fn new(
        trip_store: Arc<dyn TripStore>,
        ledger: Arc<dyn ImportLedger>,
        aliases: Arc<DriverAliasResolver>,
        config: Arc<dyn ImportConfigReader>,
        file_parser: Box<dyn FileParser>,
        normalizer: Box<dyn RowNormalizer>,
        conflict_handler: Box<dyn ConflictHandler>,
    ) -> Self {
        Self {
            trip_store,
            ledger,
            aliases,
            config,
            file_parser,
            normalizer,
            conflict_handler,
        }
    }

    /// Everything between a successful reservation and the ledger commit.
    async fn validate_and_commit(
        &self,
        content: &str,
        ctx: &BatchContext<'_>,
        requested: Option<&PartitionContext>,
        status: &mut BatchStatus,
    ) -> ImportOutcome<ImportResult> {
        // === Step 1: parse ===
        debug!("step 1: parse");
        let parsed = self.file_parser.parse_str(content)?;
        let expected_rows = parsed.expected_rows();
        info!(expected_rows, "file parsed");

        // === Step 2: classify columns ===
        debug!("step 2: classify columns");
        let synonyms = self
            .config
            .get_extra_header_synonyms()
            .await
            .map_err(|e| config_error("import.extra_header_synonyms", e))?;
        let classification = ColumnClassifier::with_extra_synonyms(&synonyms).classify(&parsed.headers);
        info!(
            extracted = classification.extracted_columns.len(),
            ignored = classification.ignored_columns.len(),
            "columns classified"
        );

        // === Step 3: partition ===
        debug!("step 3: resolve partition");
        let defaults = self
            .config
            .get_default_partition()
            .await
            .map_err(|e| config_error("import.default_partition", e))?;
        let partition = PartitionKeyBuilder::resolve(requested, &defaults)?;
        info!(partition = %partition, "partition resolved");

        // === Step 4: normalize rows ===
        debug!("step 4: normalize rows");
        let max_routed_distance = self
            .config
            .get_max_routed_distance()
            .await
            .map_err(|e| config_error("import.max_routed_distance", e))?;

        let mut outcomes: Vec<(usize, RowOutcome)> = Vec::with_capacity(expected_rows);
        let mut errors: Vec<RowError> = Vec::new();
        let mut warnings: Vec<RowError> = Vec::new();
        let mut normalized: Vec<NormalizedRow> = Vec::new();

        for raw in &parsed.rows {
            match self.normalizer.normalize(raw, &classification, max_routed_distance) {
                NormalizeOutcome::Normalized(row) => {
                    warnings.extend(
                        row.warnings
                            .iter()
                            .map(|w| RowError::new(row.row_number, w.clone())),
                    );
                    normalized.push(row);
                }
                NormalizeOutcome::Skipped(reason) => {
                    debug!(row = raw.row_number, reason = %reason, "row skipped");
                    outcomes.push((raw.row_number, RowOutcome::Skipped(reason)));
                }
                NormalizeOutcome::Failed(e) => {
                    warn!(row = raw.row_number, error = %e, "row rejected");
                    errors.push(RowError::new(raw.row_number, e.to_string()));
                    outcomes.push((raw.row_number, RowOutcome::Error(e.to_string())));
                }
            }
        }
        info!(
            normalized = normalized.len(),
            rejected = errors.len(),
            "rows normalized"
        );

        // === Step 5: uniqueness ===
        debug!("step 5: uniqueness check");
        let keyed: Vec<(usize, TripKey)> = normalized
            .iter()
            .map(|r| (r.row_number, PartitionKeyBuilder::build_key(&partition, r)))
            .collect();
        let keys: Vec<TripKey> = keyed.iter().map(|(_, k)| k.clone()).collect();
        let existing = self.trip_store.existing_keys(&keys).await?;

        let mut conflicts: HashMap<usize, TripKey> = HashMap::new();
        conflicts.extend(self.conflict_handler.detect_duplicates(&keyed));
        conflicts.extend(
            self.conflict_handler
                .detect_cross_batch_duplicates(&keyed, &existing),
        );
        info!(conflicts = conflicts.len(), "uniqueness check done");

        // === Steps 6-8: plan drivers, account, commit ===
        // A commit that loses a key to a concurrent import writes nothing; the
        // lost rows become row errors and the rest is committed again.
        let imported_at = Utc::now();
        let mut attempt = 0usize;
        let (report, row_errors, plan, elapsed_ms) = loop {
            attempt += 1;

            debug!(attempt, "step 6: plan driver identities");
            let survivors: Vec<&NormalizedRow> = normalized
                .iter()
                .filter(|r| !conflicts.contains_key(&r.row_number))
                .collect();
            let raw_drivers: Vec<&str> = survivors.iter().map(|r| r.driver_raw.as_str()).collect();
            let plan = self.aliases.plan(&raw_drivers)?;

            let trips: Vec<TripRecord> = survivors
                .iter()
                .zip(plan.canonical_names())
                .map(|(row, driver_name)| TripRecord {
                    trip_id: row.trip_id.clone(),
                    service_date: row.service_date,
                    opco_id: partition.opco_id.clone(),
                    broker_id: partition.broker_id.clone(),
                    broker_account_id: partition.broker_account_id.clone(),
                    driver_name: driver_name.clone(),
                    vehicle_unit: row.vehicle_unit.clone(),
                    mobility_type: row.mobility_type.clone(),
                    routed_distance: row.routed_distance,
                    batch_id: ctx.batch_id.clone(),
                    source_row: row.row_number,
                    imported_at,
                })
                .collect();

            debug!(attempt, "step 7: completeness accounting");
            let mut row_outcomes = outcomes.clone();
            let mut row_errors = errors.clone();
            for (row, key) in &conflicts {
                let e = ImportError::DuplicatePartitionKey {
                    row: *row,
                    key: key.clone(),
                };
                if attempt == 1 {
                    warn!(row = *row, error = %e, "row rejected");
                }
                row_errors.push(RowError::new(*row, e.to_string()));
                row_outcomes.push((*row, RowOutcome::Error(e.to_string())));
            }
            row_outcomes.extend(
                trips
                    .iter()
                    .map(|t| (t.source_row, RowOutcome::Imported(Box::new(t.clone())))),
            );
            row_outcomes.sort_by_key(|(row, _)| *row);
            row_errors.sort_by_key(|e| e.row);

            let report = CompletenessAccountant::account(expected_rows, &row_outcomes);
            if !report.is_complete {
                error!(
                    batch_id = %ctx.batch_id,
                    expected = report.expected_rows,
                    accounted = report.accounted_rows,
                    missing_rows = ?report.missing_rows,
                    "row accounting incomplete"
                );
            }

            debug!(attempt, count = trips.len(), "step 8: commit trips and batch");
            let elapsed_ms = ctx.started.elapsed().as_millis() as u64;
            let batch = ImportBatch {
                batch_id: ctx.batch_id.clone(),
                file_name: ctx.file_name.to_string(),
                file_hash: ctx.file_hash.clone(),
                partition: partition.clone(),
                status: BatchStatus::Committed,
                received_at: ctx.received_at,
                committed_at: Some(Utc::now()),
                expected_rows: report.expected_rows,
                imported_rows: report.imported_rows,
                skipped_rows: report.skipped_rows,
                error_rows: report.error_rows,
                extracted_columns: classification.extracted_columns.clone(),
                ignored_columns: classification.ignored_columns.clone(),
                errors: row_errors.clone(),
                elapsed_ms,
            };

            match self.ledger.commit(batch, trips).await? {
                CommitOutcome::Committed => break (report, row_errors, plan, elapsed_ms),
                CommitOutcome::KeyConflict(lost) => {
                    let before = conflicts.len();
                    for (row, key) in &keyed {
                        if lost.contains(key) {
                            conflicts.entry(*row).or_insert_with(|| key.clone());
                        }
                    }
                    if conflicts.len() == before {
                        return Err(ImportError::InternalError(format!(
                            "commit reported conflicts on keys outside batch {}",
                            ctx.batch_id
                        )));
                    }
                    warn!(
                        attempt,
                        lost = lost.len(),
                        "rows lost a concurrent insert race, committing the rest"
                    );
                }
            }
        };

        advance(status, BatchStatus::Committed)?;

        // === Step 9: driver spellings of committed rows ===
        debug!("step 9: register driver spellings");
        if let Err(e) = self.aliases.apply(&plan) {
            // trips are stored; queries fall back to the cleaned spelling
            error!(error = %e, "failed to register driver spellings");
        }

        info!(
            batch_id = %ctx.batch_id,
            imported = report.imported_rows,
            skipped = report.skipped_rows,
            errors = report.error_rows,
            elapsed_ms,
            "trip import committed"
        );

        Ok(ImportResult {
            success: true,
            batch_id: Some(ctx.batch_id.clone()),
            status: *status,
            file_name: ctx.file_name.to_string(),
            imported_rows: report.imported_rows,
            skipped_rows: report.skipped_rows,
            error_rows: report.error_rows,
            errors: row_errors,
            warnings,
            extracted_columns: classification.extracted_columns,
            ignored_columns: classification.ignored_columns,
            file_hash: ctx.file_hash.clone(),
            expected_rows: report.expected_rows,
            accounted_rows: report.accounted_rows,
            missing_rows: report.missing_rows,
            is_complete: report.is_complete,
            opco_id: partition.opco_id,
            broker_account_id: partition.broker_account_id,
            elapsed_ms,
        })
    }
}

#[async_trait::async_trait]
impl TripImporter for TripImporterImpl {
    #[instrument(skip(self, content, partition), fields(batch_id))]
    async fn import_csv(
        &self,
        content: &str,
        file_name: &str,
        partition: Option<PartitionContext>,
    ) -> ImportOutcome<ImportResult> {
        let ctx = BatchContext {
            batch_id: Uuid::new_v4().to_string(),
            file_name,
            file_hash: FileHasher::hash(content.as_bytes()),
            received_at: Utc::now(),
            started: Instant::now(),
        };
        tracing::Span::current().record("batch_id", ctx.batch_id.as_str());
        info!(file_hash = %ctx.file_hash, bytes = content.len(), "trip import started");

        let mut status = BatchStatus::Received;

        // === Step 0: idempotency reservation ===
        match self.ledger.reserve(&ctx.file_hash, &ctx.batch_id).await? {
            Reservation::AlreadyImported { batch_id } => {
                advance(&mut status, BatchStatus::HashRejected)?;
                let e = ImportError::DuplicateFile {
                    file_hash: ctx.file_hash.clone(),
                    batch_id,
                };
                warn!(error = %e, "import rejected");
                let mut result = ImportResult::rejected(
                    file_name,
                    &ctx.file_hash,
                    status,
                    e.to_string(),
                    partition.as_ref(),
                );
                result.elapsed_ms = ctx.started.elapsed().as_millis() as u64;
                return Ok(result);
            }
            Reservation::Reserved => advance(&mut status, BatchStatus::Validating)?,
        }

        match self
            .validate_and_commit(content, &ctx, partition.as_ref(), &mut status)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                if let Err(release_err) = self.ledger.release(&ctx.file_hash, &ctx.batch_id).await {
                    error!(error = %release_err, "failed to release import reservation");
                }

                if !e.is_batch_level() {
                    error!(error = %e, "trip import failed");
                    return Err(e);
                }

                advance(&mut status, BatchStatus::Rejected)?;
                warn!(error = %e, "import rejected");
                let mut result = ImportResult::rejected(
                    file_name,
                    &ctx.file_hash,
                    status,
                    e.to_string(),
                    partition.as_ref(),
                );
                result.elapsed_ms = ctx.started.elapsed().as_millis() as u64;
                Ok(result)
            }
        }
    }

    async fn import_file(
        &self,
        file_path: &Path,
        partition: Option<PartitionContext>,
    ) -> ImportOutcome<ImportResult> {
        let bytes = CsvParser.read_file(file_path)?;
        let content = String::from_utf8(bytes).map_err(|e| {
            ImportError::FileReadError(format!(
                "{} is not valid UTF-8: {}",
                file_path.display(),
                e
            ))
        })?;

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        self.import_csv(&content, file_name, partition).await
    }

    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        partition: Option<PartitionContext>,
    ) -> Vec<Result<ImportResult, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "batch import started");

        let import_tasks = file_paths.into_iter().map(|path| {
            let partition = partition.clone();
            async move {
                let path_str = path.display().to_string();
                match self.import_file(&path, partition).await {
                    Ok(result) => {
                        info!(
                            file = %path_str,
                            success = result.success,
                            imported = result.imported_rows,
                            "file import finished"
                        );
                        Ok(result)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "file import failed");
                        Err(format!("import of {} failed: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            committed = results
                .iter()
                .filter(|r| matches!(r, Ok(res) if res.success))
                .count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "batch import finished"
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticImportConfig;
    use crate::domain::TripFilter;
    use crate::importer::conflict_handler::ConflictHandler as ConflictHandlerImpl;
    use crate::importer::row_normalizer::RowNormalizerImpl;
    use crate::repository::{MemoryImportLedger, MemoryTripStore, RepositoryResult};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn importer_over(
        read_side: Arc<dyn TripStore>,
        store: Arc<MemoryTripStore>,
        config: StaticImportConfig,
    ) -> TripImporterImpl {
        TripImporterImpl::new(
            read_side,
            Arc::new(MemoryImportLedger::new(store)),
            Arc::new(DriverAliasResolver::in_memory()),
            Arc::new(config),
            Box::new(CsvParser),
            Box::new(RowNormalizerImpl::new()),
            Box::new(ConflictHandlerImpl),
        )
    }

    fn importer(config: StaticImportConfig) -> (TripImporterImpl, Arc<MemoryTripStore>) {
        let store = Arc::new(MemoryTripStore::new());
        (importer_over(store.clone(), store.clone(), config), store)
    }

    /// Store whose pre-check never sees existing keys, as if another import
    /// committed between the check and the commit
    struct StaleReadStore(Arc<MemoryTripStore>);

    #[async_trait::async_trait]
    impl TripStore for StaleReadStore {
        async fn existing_keys(&self, _keys: &[TripKey]) -> RepositoryResult<HashSet<TripKey>> {
            Ok(HashSet::new())
        }

        async fn find_by_date(
            &self,
            service_date: NaiveDate,
            filter: &TripFilter,
        ) -> RepositoryResult<Vec<TripRecord>> {
            self.0.find_by_date(service_date, filter).await
        }

        async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<TripRecord>> {
            self.0.find_by_batch(batch_id).await
        }

        async fn count(&self) -> RepositoryResult<usize> {
            self.0.count().await
        }
    }

    fn main_partition() -> Option<PartitionContext> {
        Some(PartitionContext::new("MAIN", "MTM", "MTM_MAIN"))
    }

    #[tokio::test]
    async fn test_row_outcomes_cover_every_row() {
        let (importer, store) = importer(StaticImportConfig::new());
        let csv = "Trip ID,Date,Driver\n\
                   T1,2025-01-15,John Smith\n\
                   T2,01/15/2025,Jane Doe\n\
                   T3,not a date,Jane Doe\n\
                   ,,\n\
                   T1,2025-01-15,John Smith\n";

        let result = importer.import_csv(csv, "day.csv", main_partition()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.status, BatchStatus::Committed);
        assert_eq!(result.expected_rows, 5);
        assert_eq!(result.imported_rows, 2);
        assert_eq!(result.skipped_rows, 1);
        assert_eq!(result.error_rows, 2);
        assert!(result.is_complete);
        assert_eq!(
            result.errors.iter().map(|e| e.row).collect::<Vec<_>>(),
            vec![3, 5]
        );
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_key_lost_at_commit_becomes_row_error() {
        let store = Arc::new(MemoryTripStore::new());
        let importer = importer_over(
            Arc::new(StaleReadStore(store.clone())),
            store.clone(),
            StaticImportConfig::new(),
        );

        let first = importer
            .import_csv("Trip ID,Date,Driver\nT1,2025-01-15,A\n", "a.csv", main_partition())
            .await
            .unwrap();
        assert_eq!(first.imported_rows, 1);

        let second = importer
            .import_csv(
                "Trip ID,Date,Driver\nT1,2025-01-15,B\nT2,2025-01-15,B\n",
                "b.csv",
                main_partition(),
            )
            .await
            .unwrap();

        assert!(second.success);
        assert!(second.is_complete);
        assert_eq!(second.imported_rows, 1);
        assert_eq!(second.error_rows, 1);
        assert_eq!(second.errors[0].row, 1);
        assert!(second.errors[0].message.contains("duplicate partition key"));
        assert_eq!(store.count().await.unwrap(), 2);

        let batch = store
            .find_by_batch(second.batch_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].trip_id, "T2");
    }

    #[tokio::test]
    async fn test_missing_header_releases_reservation() {
        let (importer, _) = importer(StaticImportConfig::new());

        let first = importer.import_csv("", "empty.csv", main_partition()).await.unwrap();
        assert!(!first.success);
        assert_eq!(first.status, BatchStatus::Rejected);

        // same bytes again: rejected for the header, not as a duplicate
        let second = importer.import_csv("", "empty.csv", main_partition()).await.unwrap();
        assert_eq!(second.status, BatchStatus::Rejected);
    }

    #[tokio::test]
    async fn test_unknown_partition_is_batch_level() {
        let (importer, store) = importer(StaticImportConfig::new());

        let result = importer
            .import_csv("Trip ID,Date,Driver\nT1,2025-01-15,A\n", "x.csv", None)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.imported_rows, 0);
        assert!(result.errors[0].message.contains("unknown partition"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_default_partition_from_config() {
        let config = StaticImportConfig::new()
            .with_default_opco("SAHRAWI")
            .with_default_broker("ModivCare");
        let (importer, _) = importer(config);

        let result = importer
            .import_csv("Trip ID,Date,Driver\nT1,2025-01-15,A\n", "x.csv", None)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.opco_id, "SAHRAWI");
        assert_eq!(result.broker_account_id, "MODIVCARE_SAHRAWI");
    }

    #[tokio::test]
    async fn test_distance_warning_does_not_block_row() {
        let config = StaticImportConfig::new().with_max_routed_distance(100.0);
        let (importer, _) = importer(config);

        let result = importer
            .import_csv(
                "Trip ID,Date,Driver,Miles\nT1,2025-01-15,A,250\n",
                "x.csv",
                main_partition(),
            )
            .await
            .unwrap();

        assert_eq!(result.imported_rows, 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].row, 1);
    }
}
