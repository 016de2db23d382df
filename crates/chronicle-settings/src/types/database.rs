//! Backend selector and connection credentials.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Relational backend the framework talks to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// Embedded `SQLite` file.
    #[default]
    Sqlite,
    /// `PostgreSQL` server.
    Postgres,
    /// `MySQL` / `MariaDB` server.
    Mysql,
}

impl DatabaseDriver {
    /// Lowercase name used in settings files and environment variables.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }
}

impl fmt::Display for DatabaseDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseDriver {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::Mysql),
            other => Err(SettingsError::InvalidValue(format!(
                "unknown database driver: {other}"
            ))),
        }
    }
}

/// Where and how to connect.
///
/// `path` is only used by `SQLite`; the network fields only by the server
/// dialects.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Backend selector.
    pub driver: DatabaseDriver,
    /// `SQLite` database file. Falls back to a fixed local path when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Server host, optionally with `:port`.
    pub host: String,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database (schema) name.
    pub name: String,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// `SQLite` page cache size in KiB.
    pub cache_size_kib: i64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::Sqlite,
            path: None,
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            name: "chronicle".to_string(),
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
        }
    }
}

impl DatabaseSettings {
    /// `SQLite` settings pointing at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: DatabaseDriver::Sqlite,
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("driver", &self.driver)
            .field("path", &self.path)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .field("cache_size_kib", &self.cache_size_kib)
            .finish()
    }
}
