// ==========================================
// Trip import engine - configuration layer
// ==========================================
// Responsibility: import settings (default partition, allowlist extension,
// data-quality thresholds)
// Storage: config_kv table, or in memory
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod static_config;

pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ConfigError, ImportConfigReader, PartitionDefaults};
pub use static_config::StaticImportConfig;
