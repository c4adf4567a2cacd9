// ==========================================
// Trip import engine - service facade
// ==========================================
// Responsibility: wire stores, ledger, alias registry and config into one
// explicit service instance (no process-wide singleton)
// Backings: in-memory, or one shared SQLite connection
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::trip_query_api::TripQueryApi;
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{
    DriverSummary, ImportBatch, ImportBatchSummary, ImportFilter, ImportResult, PartitionContext,
    TripFilter, TripRecord,
};
use crate::importer::{
    ConflictHandlerImpl, CsvParser, DriverAliasResolver, RowNormalizerImpl, TripImporter,
    TripImporterImpl,
};
use crate::repository::{
    ImportLedger, MemoryImportLedger, MemoryTripStore, SqliteAliasRegistry, SqliteImportLedger,
    SqliteTripStore, TripStore,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct ActualImportService {
    importer: TripImporterImpl,
    queries: TripQueryApi,
    aliases: Arc<DriverAliasResolver>,
}

impl ActualImportService {
    /// Assemble a service from explicit components
    ///
    /// `ledger` must commit into the storage `trip_store` reads from.
    pub fn new(
        trip_store: Arc<dyn TripStore>,
        ledger: Arc<dyn ImportLedger>,
        aliases: Arc<DriverAliasResolver>,
        config: Arc<dyn ImportConfigReader>,
    ) -> Self {
        let importer = TripImporterImpl::new(
            trip_store.clone(),
            ledger.clone(),
            aliases.clone(),
            config,
            Box::new(CsvParser),
            Box::new(RowNormalizerImpl::new()),
            Box::new(ConflictHandlerImpl),
        );
        let queries = TripQueryApi::new(trip_store, ledger, aliases.clone());

        Self {
            importer,
            queries,
            aliases,
        }
    }

    /// Process-local service; state is lost when it is dropped
    pub fn in_memory(config: impl ImportConfigReader + 'static) -> Self {
        let trips = Arc::new(MemoryTripStore::new());
        Self::new(
            trips.clone(),
            Arc::new(MemoryImportLedger::new(trips)),
            Arc::new(DriverAliasResolver::in_memory()),
            Arc::new(config),
        )
    }

    /// SQLite-backed service; all repositories share one connection
    ///
    /// # Arguments
    /// - db_path: database file (created when missing)
    /// - config: import configuration
    pub fn open_sqlite(
        db_path: &str,
        config: impl ImportConfigReader + 'static,
    ) -> ApiResult<Self> {
        let conn = Self::open_shared_connection(db_path)?;
        Self::from_shared_connection(conn, Arc::new(config))
    }

    /// SQLite-backed service reading its configuration from the same database
    pub fn open_sqlite_with_stored_config(db_path: &str) -> ApiResult<Self> {
        let conn = Self::open_shared_connection(db_path)?;
        let config = ConfigManager::from_connection(conn.clone())?;
        Self::from_shared_connection(conn, Arc::new(config))
    }

    fn open_shared_connection(db_path: &str) -> ApiResult<Arc<Mutex<Connection>>> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        info!(db_path, "trip import database opened");
        Ok(Arc::new(Mutex::new(conn)))
    }

    fn from_shared_connection(
        conn: Arc<Mutex<Connection>>,
        config: Arc<dyn ImportConfigReader>,
    ) -> ApiResult<Self> {
        // only expired leases; live reservations of other processes stay
        let ledger = SqliteImportLedger::from_connection(conn.clone());
        ledger.purge_stale_reservations()?;

        Ok(Self::new(
            Arc::new(SqliteTripStore::from_connection(conn.clone())),
            Arc::new(ledger),
            Arc::new(DriverAliasResolver::new(Box::new(
                SqliteAliasRegistry::from_connection(conn),
            ))),
            config,
        ))
    }

    // ===== Import =====

    /// Import one CSV export held in memory
    pub async fn import_csv(
        &self,
        content: &str,
        file_name: &str,
        partition: Option<PartitionContext>,
    ) -> ApiResult<ImportResult> {
        Ok(self.importer.import_csv(content, file_name, partition).await?)
    }

    /// Import one CSV file from disk
    pub async fn import_file(
        &self,
        file_path: &Path,
        partition: Option<PartitionContext>,
    ) -> ApiResult<ImportResult> {
        Ok(self.importer.import_file(file_path, partition).await?)
    }

    /// Import several files concurrently; each entry is independent
    pub async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        partition: Option<PartitionContext>,
    ) -> Vec<Result<ImportResult, String>> {
        self.importer.batch_import(file_paths, partition).await
    }

    // ===== Queries =====

    pub async fn get_actual_trips_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> ApiResult<Vec<TripRecord>> {
        self.queries.get_actual_trips_by_date(service_date, filter).await
    }

    pub async fn get_actual_trips_by_driver_and_date(
        &self,
        driver: &str,
        service_date: NaiveDate,
    ) -> ApiResult<Vec<TripRecord>> {
        self.queries
            .get_actual_trips_by_driver_and_date(driver, service_date)
            .await
    }

    pub async fn get_driver_summary_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> ApiResult<Vec<DriverSummary>> {
        self.queries
            .get_driver_summary_by_date(service_date, filter)
            .await
    }

    pub async fn get_imports(&self, filter: &ImportFilter) -> ApiResult<Vec<ImportBatchSummary>> {
        self.queries.get_imports(filter).await
    }

    pub async fn get_import(&self, batch_id: &str) -> ApiResult<Option<ImportBatch>> {
        self.queries.get_import(batch_id).await
    }

    pub async fn get_trips_by_batch(&self, batch_id: &str) -> ApiResult<Vec<TripRecord>> {
        self.queries.get_trips_by_batch(batch_id).await
    }

    // ===== Driver aliases =====

    /// Register `alias` as a spelling of `canonical`; returns the canonical it resolves to
    pub fn add_driver_alias(&self, canonical: &str, alias: &str) -> ApiResult<String> {
        if canonical.trim().is_empty() || alias.trim().is_empty() {
            return Err(ApiError::InvalidInput(
                "canonical name and alias must both be non-empty".to_string(),
            ));
        }
        Ok(self.aliases.add_driver_alias(canonical, alias)?)
    }

    pub fn get_driver_aliases(&self, canonical: &str) -> ApiResult<Vec<String>> {
        Ok(self.aliases.get_driver_aliases(canonical)?)
    }

    pub fn get_canonical_driver_name(&self, alias: &str) -> ApiResult<String> {
        Ok(self.aliases.get_canonical_driver_name(alias)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticImportConfig;

    #[test]
    fn test_add_driver_alias_rejects_empty_input() {
        let service = ActualImportService::in_memory(StaticImportConfig::new());
        assert!(matches!(
            service.add_driver_alias("John Smith", "  "),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_driver_query_rejects_empty_name() {
        let service = ActualImportService::in_memory(StaticImportConfig::new());
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert!(matches!(
            service.get_actual_trips_by_driver_and_date("", date).await,
            Err(ApiError::InvalidInput(_))
        ));
    }
}
