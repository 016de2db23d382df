//! Connection string construction.

use chronicle_settings::{DatabaseDriver, DatabaseSettings};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::errors::{DbError, Result};

/// `SQLite` file used when no path is configured.
pub const DEFAULT_SQLITE_PATH: &str = "chronicle.db";

/// Characters left unescaped in URL credentials (RFC 3986 unreserved).
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Build `(driver_name, dsn)` for the configured backend.
///
/// Pure; nothing is opened. Credentials and the database name are
/// percent-escaped, so passwords may contain `@`, `:` or `/`.
pub fn build_dsn(settings: &DatabaseSettings) -> Result<(&'static str, String)> {
    match settings.driver {
        DatabaseDriver::Sqlite => Ok((
            "sqlite3",
            settings
                .path
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
        )),
        DatabaseDriver::Postgres => Ok((
            "postgres",
            format!("{}?sslmode=disable", network_url("postgres", settings)?),
        )),
        DatabaseDriver::Mysql => Ok(("mysql", network_url("mysql", settings)?)),
    }
}

fn network_url(scheme: &str, settings: &DatabaseSettings) -> Result<String> {
    if settings.host.is_empty() {
        return Err(DbError::Config(format!(
            "database host is required for {}",
            settings.driver
        )));
    }
    if settings.name.is_empty() {
        return Err(DbError::Config(format!(
            "database name is required for {}",
            settings.driver
        )));
    }

    let mut url = format!("{scheme}://");
    if !settings.user.is_empty() {
        url.push_str(&escape(&settings.user));
        if !settings.password.is_empty() {
            url.push(':');
            url.push_str(&escape(&settings.password));
        }
        url.push('@');
    }
    url.push_str(&settings.host);
    url.push('/');
    url.push_str(&escape(&settings.name));
    Ok(url)
}

fn escape(s: &str) -> String {
    utf8_percent_encode(s, USERINFO).to_string()
}
