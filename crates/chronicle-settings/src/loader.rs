//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ChronicleSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `CHRONICLE_*` environment overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ChronicleSettings, DatabaseDriver};

/// Environment variable naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "CHRONICLE_SETTINGS";

/// Resolve the settings file: `$CHRONICLE_SETTINGS`, else
/// `~/.chronicle/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Ok(explicit) = std::env::var(SETTINGS_PATH_ENV) {
        if !explicit.is_empty() {
            return PathBuf::from(explicit);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".chronicle").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ChronicleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON or a failed validation is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<ChronicleSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<ChronicleSettings> {
    let defaults = serde_json::to_value(ChronicleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(settings: &mut ChronicleSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are logged and ignored, falling back to the file or
/// default value.
pub fn apply_overrides_with<F>(settings: &mut ChronicleSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Database ────────────────────────────────────────────────────
    if let Some(v) = env.string("CHRONICLE_DB_DRIVER") {
        match v.parse::<DatabaseDriver>() {
            Ok(driver) => settings.database.driver = driver,
            Err(_) => warn!(key = "CHRONICLE_DB_DRIVER", value = %v, "invalid driver env var, ignoring"),
        }
    }
    if let Some(v) = env.string("CHRONICLE_DB_PATH") {
        settings.database.path = Some(v);
    }
    if let Some(v) = env.string("CHRONICLE_DB_HOST") {
        settings.database.host = v;
    }
    if let Some(v) = env.string("CHRONICLE_DB_USER") {
        settings.database.user = v;
    }
    if let Some(v) = env.string("CHRONICLE_DB_PASSWORD") {
        settings.database.password = v;
    }
    if let Some(v) = env.string("CHRONICLE_DB_NAME") {
        settings.database.name = v;
    }

    // ── Pools ───────────────────────────────────────────────────────
    if let Some(v) = env.u32("CHRONICLE_CORE_MAX_OPEN", 1, 10_000) {
        settings.pools.core.max_open_conns = v;
    }
    if let Some(v) = env.u32("CHRONICLE_CORE_MAX_IDLE", 0, 10_000) {
        settings.pools.core.max_idle_conns = v;
    }
    if let Some(v) = env.u32("CHRONICLE_PLUGIN_MAX_OPEN", 1, 10_000) {
        settings.pools.plugin.max_open_conns = v;
    }
    if let Some(v) = env.u32("CHRONICLE_PLUGIN_MAX_IDLE", 0, 10_000) {
        settings.pools.plugin.max_idle_conns = v;
    }
    if let Some(v) = env.u64("CHRONICLE_CONN_MAX_LIFETIME_SECS", 0, 86_400) {
        settings.pools.core.conn_max_lifetime_secs = v;
        settings.pools.plugin.conn_max_lifetime_secs = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("CHRONICLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        let val = (self.lookup)(name)?;
        let result = parse_u32_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u32 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}
