//! Connection pool sizing for the core and plugin pools.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which of the two pools a caller draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolPurpose {
    /// Trusted request paths.
    Core,
    /// Extension code; sized smaller so it cannot starve `Core`.
    Plugin,
}

impl PoolPurpose {
    /// Lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for PoolPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits applied to one pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolSettings {
    /// Maximum connections open at once.
    pub max_open_conns: u32,
    /// Minimum idle connections the pool keeps open, opened eagerly when
    /// the pool is built. This is a floor, not a cap on idle connections.
    /// Clamped to `max_open_conns`.
    pub max_idle_conns: u32,
    /// Maximum lifetime of a connection in seconds; `0` means unlimited.
    pub conn_max_lifetime_secs: u64,
    /// How long a caller waits for a free connection, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_open_conns: 25,
            max_idle_conns: 10,
            conn_max_lifetime_secs: 300,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl PoolSettings {
    /// Defaults for the plugin pool.
    pub fn plugin_default() -> Self {
        Self {
            max_open_conns: 5,
            max_idle_conns: 2,
            ..Self::default()
        }
    }

    /// Idle target clamped to the open limit.
    #[must_use]
    pub fn effective_idle(&self) -> u32 {
        self.max_idle_conns.min(self.max_open_conns)
    }

    /// Connection lifetime, `None` when unlimited.
    #[must_use]
    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.conn_max_lifetime_secs > 0).then(|| Duration::from_secs(self.conn_max_lifetime_secs))
    }

    /// Time to wait for a free connection.
    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Core and plugin pool settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolsSettings {
    /// Pool for trusted request paths.
    pub core: PoolSettings,
    /// Pool for extension code.
    pub plugin: PoolSettings,
}

impl Default for PoolsSettings {
    fn default() -> Self {
        Self {
            core: PoolSettings::default(),
            plugin: PoolSettings::plugin_default(),
        }
    }
}

impl PoolsSettings {
    /// Settings for `purpose`.
    #[must_use]
    pub fn for_purpose(&self, purpose: PoolPurpose) -> &PoolSettings {
        match purpose {
            PoolPurpose::Core => &self.core,
            PoolPurpose::Plugin => &self.plugin,
        }
    }
}
