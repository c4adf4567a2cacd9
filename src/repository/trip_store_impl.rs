// ==========================================
// Trip import engine - SQLite TripStore
// ==========================================
// Composite uniqueness is enforced by the table's UNIQUE constraint.
// Trips are written only by the ledger commit, inside its transaction.
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{MobilityType, TripFilter, TripKey, TripRecord};
use crate::repository::error::RepositoryResult;
use crate::repository::trip_store::TripStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

const TRIP_COLUMNS: &str = "trip_id, service_date, opco_id, broker_id, broker_account_id, \
     driver_name, vehicle_unit, mobility_type, routed_distance, batch_id, source_row, imported_at";

pub(crate) fn parse_date_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_timestamp_column(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Fixed-width RFC 3339 so lexical order == chronological order
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn map_trip_row(row: &Row<'_>) -> rusqlite::Result<TripRecord> {
    let service_date: String = row.get(1)?;
    let mobility: String = row.get(7)?;
    let imported_at: String = row.get(11)?;

    Ok(TripRecord {
        trip_id: row.get(0)?,
        service_date: parse_date_column(1, &service_date)?,
        opco_id: row.get(2)?,
        broker_id: row.get(3)?,
        broker_account_id: row.get(4)?,
        driver_name: row.get(5)?,
        vehicle_unit: row.get(6)?,
        mobility_type: MobilityType::from_db_str(&mobility),
        routed_distance: row.get(8)?,
        batch_id: row.get(9)?,
        source_row: row.get::<_, i64>(10)? as usize,
        imported_at: parse_timestamp_column(11, &imported_at)?,
    })
}

/// Insert trips with INSERT OR IGNORE inside the caller's transaction.
///
/// # Returns
/// - keys that were already present (those rows were not written)
pub(crate) fn insert_trip_rows(
    conn: &Connection,
    trips: &[TripRecord],
) -> rusqlite::Result<Vec<TripKey>> {
    let mut stmt = conn.prepare(&format!(
        "INSERT OR IGNORE INTO trip_record ({}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        TRIP_COLUMNS
    ))?;

    let mut conflicts = Vec::new();
    for trip in trips {
        let changed = stmt.execute(params![
            trip.trip_id,
            trip.service_date.to_string(),
            trip.opco_id,
            trip.broker_id,
            trip.broker_account_id,
            trip.driver_name,
            trip.vehicle_unit,
            trip.mobility_type.as_db_str(),
            trip.routed_distance,
            trip.batch_id,
            trip.source_row as i64,
            format_timestamp(&trip.imported_at),
        ])?;
        if changed == 0 {
            conflicts.push(trip.key());
        }
    }
    Ok(conflicts)
}

// ==========================================
// SqliteTripStore
// ==========================================
pub struct SqliteTripStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTripStore {
    /// Open (and initialize) the database at `db_path`
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Share an existing connection (schema must already exist)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TripStore for SqliteTripStore {
    async fn existing_keys(&self, keys: &[TripKey]) -> RepositoryResult<HashSet<TripKey>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT 1 FROM trip_record
             WHERE opco_id = ?1 AND broker_account_id = ?2 AND service_date = ?3 AND trip_id = ?4
             LIMIT 1",
        )?;

        let mut existing = HashSet::new();
        for key in keys {
            let found = stmt.exists(params![
                key.opco_id,
                key.broker_account_id,
                key.service_date.to_string(),
                key.trip_id,
            ])?;
            if found {
                existing.insert(key.clone());
            }
        }
        Ok(existing)
    }

    async fn find_by_date(
        &self,
        service_date: NaiveDate,
        filter: &TripFilter,
    ) -> RepositoryResult<Vec<TripRecord>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM trip_record
             WHERE service_date = ?1
               AND (?2 IS NULL OR opco_id = ?2)
               AND (?3 IS NULL OR broker_account_id = ?3)
             ORDER BY opco_id, broker_account_id, trip_id",
            TRIP_COLUMNS
        ))?;

        let trips = stmt
            .query_map(
                params![
                    service_date.to_string(),
                    filter.opco_id,
                    filter.broker_account_id
                ],
                map_trip_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trips)
    }

    async fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<TripRecord>> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM trip_record WHERE batch_id = ?1 ORDER BY source_row",
            TRIP_COLUMNS
        ))?;

        let trips = stmt
            .query_map(params![batch_id], map_trip_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(trips)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trip_record", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
