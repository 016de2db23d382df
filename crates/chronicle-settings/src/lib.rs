//! # chronicle-settings
//!
//! Configuration for Chronicle's database layer.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ChronicleSettings::default()`]
//! 2. **User file**: `~/.chronicle/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CHRONICLE_*` overrides (highest priority)
//!
//! The loaded value is plain data: the composition root passes it to the
//! pool manager and schema manager explicitly.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_with, deep_merge, load_settings,
    load_settings_from_path, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = ChronicleSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = ChronicleSettings::default();
        assert_eq!(settings.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(settings.pools.core.max_open_conns, 25);
        assert_eq!(settings.pools.plugin.max_open_conns, 5);
        assert!(settings.pools.plugin.max_open_conns < settings.pools.core.max_open_conns);
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }
}
