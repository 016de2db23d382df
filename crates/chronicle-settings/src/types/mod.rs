//! Settings types.

mod database;
mod pool;

pub use database::{DatabaseDriver, DatabaseSettings};
pub use pool::{PoolPurpose, PoolSettings, PoolsSettings};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChronicleSettings {
    /// Backend selection and credentials.
    pub database: DatabaseSettings,
    /// Core and plugin pool sizing.
    pub pools: PoolsSettings,
    /// Logging output.
    pub logging: LoggingSettings,
}

impl ChronicleSettings {
    /// Reject combinations no pool could be opened with.
    pub fn validate(&self) -> Result<()> {
        for (name, pool) in [("core", &self.pools.core), ("plugin", &self.pools.plugin)] {
            if pool.max_open_conns == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "pools.{name}.maxOpenConns must be greater than zero"
                )));
            }
        }
        if self.database.driver != DatabaseDriver::Sqlite && self.database.host.is_empty() {
            return Err(SettingsError::InvalidValue(format!(
                "database.host is required for {}",
                self.database.driver
            )));
        }
        Ok(())
    }
}
