// ==========================================
// Trip import engine - query API
// ==========================================
// Responsibility: read committed state only
// Filters are conjunctive; an empty filter is the union over all partitions.
// Driver queries roll up through the alias registry at query time.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    DriverSummary, ImportBatch, ImportBatchSummary, ImportFilter, TripFilter, TripRecord,
};
use crate::importer::DriverAliasResolver;
use crate::repository::{ImportLedger, TripStore};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct TripQueryApi {
    trip_store: Arc<dyn TripStore>,
    ledger: Arc<dyn ImportLedger>,
    aliases: Arc<DriverAliasResolver>,
}

impl TripQueryApi {
    pub fn new(
        trip_store: Arc<dyn TripStore>,
        ledger: Arc<dyn ImportLedger>,
        aliases: Arc<DriverAliasResolver>,
    ) -> Self {
        Self {
            trip_store,
            ledger,
            aliases,
        }
    }

    /// Committed trips on one service date
    pub async fn get_actual_trips_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> ApiResult<Vec<TripRecord>> {
        let trips = self.trip_store.find_by_date(service_date, filter).await?;
        debug!(date = %service_date, count = trips.len(), "trips by date");
        Ok(trips)
    }

    /// Trips of one driver (any spelling) on one service date, all partitions
    pub async fn get_actual_trips_by_driver_and_date(
        &self,
        driver: &str,
        service_date: NaiveDate,
    ) -> ApiResult<Vec<TripRecord>> {
        if driver.trim().is_empty() {
            return Err(ApiError::InvalidInput("driver name is empty".to_string()));
        }

        let target = self.aliases.get_canonical_driver_name(driver)?;
        let trips = self
            .trip_store
            .find_by_date(service_date, &TripFilter::default())
            .await?;

        let mut matching = Vec::new();
        for trip in trips {
            if self.aliases.get_canonical_driver_name(&trip.driver_name)? == target {
                matching.push(trip);
            }
        }
        Ok(matching)
    }

    /// Per-driver totals for one date, sorted by canonical driver name
    pub async fn get_driver_summary_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> ApiResult<Vec<DriverSummary>> {
        let trips = self.trip_store.find_by_date(service_date, filter).await?;

        let mut by_driver: BTreeMap<String, DriverSummary> = BTreeMap::new();
        for trip in &trips {
            let driver_name = self.aliases.get_canonical_driver_name(&trip.driver_name)?;
            let summary = by_driver
                .entry(driver_name.clone())
                .or_insert_with(|| DriverSummary {
                    driver_name,
                    completed_trips: 0,
                    total_miles: 0.0,
                });
            summary.completed_trips += 1;
            summary.total_miles += trip.routed_distance.unwrap_or(0.0);
        }

        Ok(by_driver.into_values().collect())
    }

    /// Committed import batches, newest first
    pub async fn get_imports(&self, filter: &ImportFilter) -> ApiResult<Vec<ImportBatchSummary>> {
        let batches = self.ledger.list_batches(filter).await?;
        Ok(batches.iter().map(ImportBatchSummary::from).collect())
    }

    /// Full audit detail of one committed batch (row errors included)
    pub async fn get_import(&self, batch_id: &str) -> ApiResult<Option<ImportBatch>> {
        Ok(self.ledger.find_by_id(batch_id).await?)
    }

    /// Trips produced by one batch, in file order
    pub async fn get_trips_by_batch(&self, batch_id: &str) -> ApiResult<Vec<TripRecord>> {
        Ok(self.trip_store.find_by_batch(batch_id).await?)
    }
}
