// ==========================================
// Trip import engine - domain type definitions
// ==========================================
// Closed vocabularies shared by the importer, the stores and the query layer.
// Serialized form: SCREAMING_SNAKE_CASE (matches the database columns)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Mobility type
// ==========================================
// Closed vocabulary; vendor values outside it are kept verbatim in `Other`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MobilityType {
    Ambulatory,    // walks, no device
    Wheelchair,    // wheelchair van
    Stretcher,     // stretcher / gurney
    Unspecified,   // column absent or empty
    Other(String), // unrecognized vendor value (flagged, not rejected)
}

impl MobilityType {
    /// Database representation. `Other` stores the raw vendor value.
    pub fn as_db_str(&self) -> &str {
        match self {
            MobilityType::Ambulatory => "AMBULATORY",
            MobilityType::Wheelchair => "WHEELCHAIR",
            MobilityType::Stretcher => "STRETCHER",
            MobilityType::Unspecified => "UNSPECIFIED",
            MobilityType::Other(raw) => raw.as_str(),
        }
    }

    pub fn from_db_str(raw: &str) -> Self {
        match raw {
            "AMBULATORY" => MobilityType::Ambulatory,
            "WHEELCHAIR" => MobilityType::Wheelchair,
            "STRETCHER" => MobilityType::Stretcher,
            "UNSPECIFIED" | "" => MobilityType::Unspecified,
            other => MobilityType::Other(other.to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, MobilityType::Other(_))
    }
}

impl fmt::Display for MobilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// Import batch status
// ==========================================
// RECEIVED -> HASH_REJECTED                 (terminal, zero side effects)
// RECEIVED -> VALIDATING -> COMMITTED       (terminal, irreversible)
// VALIDATING -> REJECTED                    (terminal, batch-level failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Received,
    HashRejected,
    Validating,
    Rejected,
    Committed,
}

impl BatchStatus {
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (BatchStatus::Received, BatchStatus::HashRejected)
                | (BatchStatus::Received, BatchStatus::Validating)
                | (BatchStatus::Validating, BatchStatus::Rejected)
                | (BatchStatus::Validating, BatchStatus::Committed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::HashRejected | BatchStatus::Rejected | BatchStatus::Committed
        )
    }

    pub fn from_db_str(raw: &str) -> Option<Self> {
        match raw {
            "RECEIVED" => Some(BatchStatus::Received),
            "HASH_REJECTED" => Some(BatchStatus::HashRejected),
            "VALIDATING" => Some(BatchStatus::Validating),
            "REJECTED" => Some(BatchStatus::Rejected),
            "COMMITTED" => Some(BatchStatus::Committed),
            _ => None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Received => write!(f, "RECEIVED"),
            BatchStatus::HashRejected => write!(f, "HASH_REJECTED"),
            BatchStatus::Validating => write!(f, "VALIDATING"),
            BatchStatus::Rejected => write!(f, "REJECTED"),
            BatchStatus::Committed => write!(f, "COMMITTED"),
        }
    }
}
