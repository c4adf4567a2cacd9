// ==========================================
// Trip import engine - import config reader trait
// ==========================================
// Responsibility: configuration the import pipeline reads (no implementations)
// Red line: no config writes, no business rules
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;

/// Boxed config error (Send so importer futures stay Send)
pub type ConfigError = Box<dyn Error + Send + Sync>;

/// Default partition dimensions; any of them may be unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionDefaults {
    pub opco_id: Option<String>,
    pub broker_id: Option<String>,
    pub broker_account_id: Option<String>,
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// Implementors: ConfigManager (config_kv table), StaticImportConfig (in memory)
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// Partition used for dimensions the caller leaves out
    ///
    /// # Default
    /// - all dimensions unset
    async fn get_default_partition(&self) -> Result<PartitionDefaults, ConfigError>;

    /// Extra header synonyms, canonical field name -> header strings
    ///
    /// # Returns
    /// - extends the built-in allowlist; never adds new canonical fields
    ///
    /// # Default
    /// - empty
    async fn get_extra_header_synonyms(&self) -> Result<HashMap<String, Vec<String>>, ConfigError>;

    /// Routed-distance anomaly threshold in miles
    ///
    /// # Default
    /// - 500.0
    async fn get_max_routed_distance(&self) -> Result<f64, ConfigError>;
}
