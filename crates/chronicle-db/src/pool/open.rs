//! Opening a single connection pool.

use chronicle_settings::{DatabaseSettings, PoolSettings};
use tracing::{debug, info};

use super::dsn::build_dsn;
use crate::backend::{Backend, DbPool};
use crate::errors::{DbError, Result, ResultExt};

/// Open a pool for backend `B` and verify it with a ping.
///
/// Fails with [`DbError::Config`] when the configured driver is not `B`'s
/// or `max_open_conns` is zero.
/// The DSN is never logged since it may carry a password.
pub fn open_pool<B: Backend>(database: &DatabaseSettings, pool: &PoolSettings) -> Result<DbPool<B>> {
    let expected = B::DIALECT.driver();
    if database.driver != expected {
        return Err(DbError::Config(format!(
            "configured driver {} does not match backend {expected}",
            database.driver
        )));
    }

    if pool.max_open_conns == 0 {
        return Err(DbError::Config(
            "max_open_conns must be greater than zero".to_string(),
        ));
    }

    let (driver, dsn) = build_dsn(database)?;
    let manager = B::manager(&dsn, database)?;
    let builder = r2d2::Pool::builder()
        .max_size(pool.max_open_conns)
        .min_idle(Some(pool.effective_idle()))
        .max_lifetime(pool.max_lifetime())
        .connection_timeout(pool.acquire_timeout());
    let db_pool = B::configure(builder, database)
        .build(manager)
        .with_context(|| format!("open {driver} pool"))?;

    let mut conn = db_pool.get().with_context(|| format!("ping {driver}"))?;
    B::ping(&mut conn).with_context(|| format!("ping {driver}"))?;
    drop(conn);

    debug!(
        driver,
        min_idle = pool.effective_idle(),
        acquire_timeout_ms = pool.acquire_timeout_ms,
        "pool verified"
    );
    info!(driver, max_open = pool.max_open_conns, "connection pool opened");
    Ok(db_pool)
}
