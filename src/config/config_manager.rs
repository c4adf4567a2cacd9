// ==========================================
// Trip import engine - config manager
// ==========================================
// Responsibility: config load / query / override
// Storage: config_kv table (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ConfigError, ImportConfigReader, PartitionDefaults};
use crate::db::{init_schema, open_sqlite_connection};
use crate::importer::row_normalizer::DEFAULT_MAX_ROUTED_DISTANCE;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Open the config store
    ///
    /// # Arguments
    /// - db_path: database file path
    pub fn new(db_path: &str) -> Result<Self, ConfigError> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Build from an existing connection
    ///
    /// The shared PRAGMAs are re-applied (idempotent).
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigError> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| format!("lock acquisition failed: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// Read a value from config_kv (scope_id='global')
    ///
    /// # Returns
    /// - Some(String): value
    /// - None: key not set
    fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// Public read of a global value
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.get_config_value(key)
    }

    /// Upsert a global value
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// Snapshot of every global value as a JSON object
    ///
    /// # Usage
    /// - `config show` in the CLI
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| format!("lock acquisition failed: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_optional_trimmed(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self
            .get_config_value(key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

// ==========================================
// ImportConfigReader impl
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_default_partition(&self) -> Result<PartitionDefaults, ConfigError> {
        Ok(PartitionDefaults {
            opco_id: self.get_optional_trimmed(config_keys::DEFAULT_OPCO_ID)?,
            broker_id: self.get_optional_trimmed(config_keys::DEFAULT_BROKER_ID)?,
            broker_account_id: self.get_optional_trimmed(config_keys::DEFAULT_BROKER_ACCOUNT_ID)?,
        })
    }

    async fn get_extra_header_synonyms(&self) -> Result<HashMap<String, Vec<String>>, ConfigError> {
        let value = match self.get_config_value(config_keys::EXTRA_HEADER_SYNONYMS)? {
            Some(v) => v,
            None => return Ok(HashMap::new()),
        };

        let synonyms: HashMap<String, Vec<String>> =
            serde_json::from_str(&value).unwrap_or_else(|_| {
                tracing::warn!(
                    config_key = config_keys::EXTRA_HEADER_SYNONYMS,
                    raw_value = %value,
                    "malformed header synonym config, using built-in allowlist only"
                );
                HashMap::new()
            });
        Ok(synonyms)
    }

    async fn get_max_routed_distance(&self) -> Result<f64, ConfigError> {
        let value = self.get_config_value(config_keys::MAX_ROUTED_DISTANCE)?;
        Ok(value
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(DEFAULT_MAX_ROUTED_DISTANCE))
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // Default partition
    pub const DEFAULT_OPCO_ID: &str = "import.default_opco_id";
    pub const DEFAULT_BROKER_ID: &str = "import.default_broker_id";
    pub const DEFAULT_BROKER_ACCOUNT_ID: &str = "import.default_broker_account_id";

    // Allowlist extension (JSON object: field -> [headers])
    pub const EXTRA_HEADER_SYNONYMS: &str = "import.extra_header_synonyms";

    // Data quality
    pub const MAX_ROUTED_DISTANCE: &str = "import.max_routed_distance";
}
