// ==========================================
// Trip import engine - in-memory import config
// ==========================================
// For services without a config store (tests, one-shot runs).
// ==========================================

use crate::config::import_config_trait::{ConfigError, ImportConfigReader, PartitionDefaults};
use crate::importer::row_normalizer::DEFAULT_MAX_ROUTED_DISTANCE;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticImportConfig {
    pub default_partition: PartitionDefaults,
    pub extra_header_synonyms: HashMap<String, Vec<String>>,
    pub max_routed_distance: f64,
}

impl Default for StaticImportConfig {
    fn default() -> Self {
        Self {
            default_partition: PartitionDefaults::default(),
            extra_header_synonyms: HashMap::new(),
            max_routed_distance: DEFAULT_MAX_ROUTED_DISTANCE,
        }
    }
}

impl StaticImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_opco(mut self, opco_id: impl Into<String>) -> Self {
        self.default_partition.opco_id = Some(opco_id.into());
        self
    }

    pub fn with_default_broker(mut self, broker_id: impl Into<String>) -> Self {
        self.default_partition.broker_id = Some(broker_id.into());
        self
    }

    pub fn with_default_broker_account(mut self, broker_account_id: impl Into<String>) -> Self {
        self.default_partition.broker_account_id = Some(broker_account_id.into());
        self
    }

    pub fn with_header_synonym(mut self, field: &str, header: impl Into<String>) -> Self {
        self.extra_header_synonyms
            .entry(field.to_string())
            .or_default()
            .push(header.into());
        self
    }

    pub fn with_max_routed_distance(mut self, miles: f64) -> Self {
        self.max_routed_distance = miles;
        self
    }
}

#[async_trait]
impl ImportConfigReader for StaticImportConfig {
    async fn get_default_partition(&self) -> Result<PartitionDefaults, ConfigError> {
        Ok(self.default_partition.clone())
    }

    async fn get_extra_header_synonyms(&self) -> Result<HashMap<String, Vec<String>>, ConfigError> {
        Ok(self.extra_header_synonyms.clone())
    }

    async fn get_max_routed_distance(&self) -> Result<f64, ConfigError> {
        Ok(self.max_routed_distance)
    }
}
