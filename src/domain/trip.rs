// ==========================================
// Trip import engine - trip domain model
// ==========================================
// TripRecord is the committed, PHI-free unit of data.
// Uniqueness: (opco_id, broker_account_id, service_date, trip_id)
// ==========================================

use crate::domain::types::MobilityType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// PartitionContext - tenant / contract partition
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionContext {
    pub opco_id: String,           // operating company
    pub broker_id: String,         // funding source
    pub broker_account_id: String, // broker <-> opco contract
}

impl PartitionContext {
    pub fn new(
        opco_id: impl Into<String>,
        broker_id: impl Into<String>,
        broker_account_id: impl Into<String>,
    ) -> Self {
        Self {
            opco_id: opco_id.into(),
            broker_id: broker_id.into(),
            broker_account_id: broker_account_id.into(),
        }
    }
}

impl fmt::Display for PartitionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.opco_id, self.broker_id, self.broker_account_id)
    }
}

// ==========================================
// TripKey - composite uniqueness key
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripKey {
    pub opco_id: String,
    pub broker_account_id: String,
    pub service_date: NaiveDate,
    pub trip_id: String,
}

impl fmt::Display for TripKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.opco_id, self.broker_account_id, self.service_date, self.trip_id
        )
    }
}

// ==========================================
// TripRecord - committed trip
// ==========================================
// Created only by an import commit; never mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub trip_id: String,                // external id (not globally unique)
    pub service_date: NaiveDate,        // date of service
    pub opco_id: String,                // partition: operating company
    pub broker_id: String,              // partition: broker
    pub broker_account_id: String,      // partition: broker account
    pub driver_name: String,            // canonical driver name at import time
    pub vehicle_unit: Option<String>,   // vehicle / unit number
    pub mobility_type: MobilityType,    // normalized mobility type
    pub routed_distance: Option<f64>,   // routed miles
    pub batch_id: String,               // provenance: producing ImportBatch
    pub source_row: usize,              // provenance: 1-based data row in the file
    pub imported_at: DateTime<Utc>,     // commit timestamp
}

impl TripRecord {
    pub fn key(&self) -> TripKey {
        TripKey {
            opco_id: self.opco_id.clone(),
            broker_account_id: self.broker_account_id.clone(),
            service_date: self.service_date,
            trip_id: self.trip_id.clone(),
        }
    }
}

// ==========================================
// NormalizedRow - typed row before partition / driver resolution
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row_number: usize,
    pub trip_id: String,
    pub service_date: NaiveDate,
    pub driver_raw: String,
    pub vehicle_unit: Option<String>,
    pub mobility_type: MobilityType,
    pub routed_distance: Option<f64>,
    pub warnings: Vec<String>,
}

// ==========================================
// RowOutcome - per-row result (basis of the completeness proof)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowOutcome {
    Imported(Box<TripRecord>),
    Skipped(String),
    Error(String),
}

impl RowOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, RowOutcome::Imported(_))
    }
}

// ==========================================
// Query DTOs
// ==========================================

/// Conjunctive trip filter; `None` means "any partition"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripFilter {
    pub opco_id: Option<String>,
    pub broker_account_id: Option<String>,
}

impl TripFilter {
    pub fn by_opco(opco_id: impl Into<String>) -> Self {
        Self {
            opco_id: Some(opco_id.into()),
            broker_account_id: None,
        }
    }

    pub fn by_broker_account(broker_account_id: impl Into<String>) -> Self {
        Self {
            opco_id: None,
            broker_account_id: Some(broker_account_id.into()),
        }
    }

    pub fn matches(&self, trip: &TripRecord) -> bool {
        self.opco_id.as_ref().map_or(true, |o| *o == trip.opco_id)
            && self
                .broker_account_id
                .as_ref()
                .map_or(true, |a| *a == trip.broker_account_id)
    }
}

/// Per-driver aggregate for one service date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub driver_name: String,
    pub completed_trips: usize,
    pub total_miles: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(opco: &str, account: &str) -> TripRecord {
        TripRecord {
            trip_id: "TRIP001".to_string(),
            service_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            opco_id: opco.to_string(),
            broker_id: "MODIVCARE".to_string(),
            broker_account_id: account.to_string(),
            driver_name: "Driver A".to_string(),
            vehicle_unit: None,
            mobility_type: MobilityType::Ambulatory,
            routed_distance: Some(10.5),
            batch_id: "b1".to_string(),
            source_row: 1,
            imported_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let t = trip("SAHRAWI", "MODIVCARE_SAHRAWI");
        assert!(TripFilter::default().matches(&t));
        assert!(TripFilter::by_opco("SAHRAWI").matches(&t));
        assert!(!TripFilter::by_opco("OTHER").matches(&t));

        let both = TripFilter {
            opco_id: Some("SAHRAWI".to_string()),
            broker_account_id: Some("MTM_MAIN".to_string()),
        };
        assert!(!both.matches(&t));
    }

    #[test]
    fn test_key_differs_across_partitions() {
        let a = trip("SAHRAWI", "MODIVCARE_SAHRAWI");
        let b = trip("MAIN", "MTM_MAIN");
        assert_eq!(a.trip_id, b.trip_id);
        assert_ne!(a.key(), b.key());
    }
}
