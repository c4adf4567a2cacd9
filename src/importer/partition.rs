// ==========================================
// Trip import engine - partition key builder
// ==========================================
// Responsibility: resolve the partition an import runs under and build
// the composite uniqueness key for each row
// Rule: missing broker_account_id = UPPER(broker_id) + "_" + UPPER(opco_id)
// ==========================================

use crate::config::PartitionDefaults;
use crate::domain::{NormalizedRow, PartitionContext, TripKey};
use crate::importer::error::{ImportError, ImportOutcome};

pub struct PartitionKeyBuilder;

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PartitionKeyBuilder {
    /// Fill missing dimensions from defaults and derive the broker account.
    ///
    /// # Arguments
    /// - requested: caller-supplied partition; empty strings count as missing
    /// - defaults: configured default partition
    ///
    /// # Returns
    /// - Err(UnknownPartition): opco or broker still missing
    pub fn resolve(
        requested: Option<&PartitionContext>,
        defaults: &PartitionDefaults,
    ) -> ImportOutcome<PartitionContext> {
        let pick = |from_request: Option<&str>, from_default: Option<&String>| {
            present(from_request).or_else(|| present(from_default.map(String::as_str)))
        };

        let opco_id = pick(
            requested.map(|p| p.opco_id.as_str()),
            defaults.opco_id.as_ref(),
        );
        let broker_id = pick(
            requested.map(|p| p.broker_id.as_str()),
            defaults.broker_id.as_ref(),
        );

        let (opco_id, broker_id) = match (opco_id, broker_id) {
            (Some(opco), Some(broker)) => (opco, broker),
            (opco, broker) => {
                let mut missing = Vec::new();
                if opco.is_none() {
                    missing.push("opco_id");
                }
                if broker.is_none() {
                    missing.push("broker_id");
                }
                return Err(ImportError::UnknownPartition(format!(
                    "no {} supplied and no default configured",
                    missing.join(" / ")
                )));
            }
        };

        // a default account only applies when the requested pair is the default pair
        let broker_account_id = present(requested.map(|p| p.broker_account_id.as_str()))
            .or_else(|| {
                let default_pair = defaults.opco_id.as_deref().map(str::trim)
                    == Some(opco_id.as_str())
                    && defaults.broker_id.as_deref().map(str::trim) == Some(broker_id.as_str());
                if default_pair {
                    present(defaults.broker_account_id.as_deref())
                } else {
                    None
                }
            })
            .unwrap_or_else(|| Self::derive_broker_account_id(&opco_id, &broker_id));

        Ok(PartitionContext {
            opco_id,
            broker_id,
            broker_account_id,
        })
    }

    /// Conventional account id, e.g. ("SAHRAWI", "ModivCare") -> "MODIVCARE_SAHRAWI"
    pub fn derive_broker_account_id(opco_id: &str, broker_id: &str) -> String {
        format!("{}_{}", broker_id.to_uppercase(), opco_id.to_uppercase())
    }

    pub fn build_key(partition: &PartitionContext, row: &NormalizedRow) -> TripKey {
        TripKey {
            opco_id: partition.opco_id.clone(),
            broker_account_id: partition.broker_account_id.clone(),
            service_date: row.service_date,
            trip_id: row.trip_id.clone(),
        }
    }
}
