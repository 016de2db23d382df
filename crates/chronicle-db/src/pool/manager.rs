//! Dual core/plugin pool ownership.
//!
//! A [`PoolManager`] is owned by the composition root and handed out by
//! reference. Each pool is opened at most once; concurrent first callers
//! block on the same lock and then share the identical [`Arc`]. A failed
//! open leaves the slot empty so a later call can retry.

use std::sync::Arc;

use chronicle_settings::{ChronicleSettings, DatabaseSettings, PoolPurpose, PoolSettings, PoolsSettings};
use parking_lot::Mutex;
use tracing::{info, warn};

use super::open::open_pool;
use crate::backend::{Backend, DbPool};
use crate::errors::Result;

type Slot<B> = Mutex<Option<Arc<DbPool<B>>>>;

/// Owner of the core and plugin pools for one database.
pub struct PoolManager<B: Backend> {
    database: DatabaseSettings,
    pools: PoolsSettings,
    core: Slot<B>,
    plugin: Slot<B>,
}

impl<B: Backend> std::fmt::Debug for PoolManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("database", &self.database)
            .field("core_open", &self.is_open(PoolPurpose::Core))
            .field("plugin_open", &self.is_open(PoolPurpose::Plugin))
            .finish_non_exhaustive()
    }
}

impl<B: Backend> PoolManager<B> {
    /// Create a manager; pools open lazily on first use.
    pub fn new(database: DatabaseSettings, pools: PoolsSettings) -> Self {
        Self {
            database,
            pools,
            core: Mutex::new(None),
            plugin: Mutex::new(None),
        }
    }

    /// Create a manager from loaded settings.
    pub fn from_settings(settings: &ChronicleSettings) -> Self {
        Self::new(settings.database.clone(), settings.pools.clone())
    }

    /// Create a manager and open both pools now.
    pub fn open(database: DatabaseSettings, pools: PoolsSettings) -> Result<Self> {
        let manager = Self::new(database, pools);
        let _ = manager.core()?;
        let _ = manager.plugin()?;
        Ok(manager)
    }

    /// Database settings the pools connect with.
    pub fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    /// The core pool, opening it on first call.
    pub fn core(&self) -> Result<Arc<DbPool<B>>> {
        self.get(PoolPurpose::Core)
    }

    /// The plugin pool, opening it on first call.
    pub fn plugin(&self) -> Result<Arc<DbPool<B>>> {
        self.get(PoolPurpose::Plugin)
    }

    /// The pool for `purpose`, opening it on first call.
    pub fn get(&self, purpose: PoolPurpose) -> Result<Arc<DbPool<B>>> {
        let mut slot = self.slot(purpose).lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(open_pool::<B>(&self.database, self.settings(purpose))?);
        info!(purpose = purpose.as_str(), "pool initialized");
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Whether the pool for `purpose` has been opened.
    pub fn is_open(&self, purpose: PoolPurpose) -> bool {
        self.slot(purpose).lock().is_some()
    }

    /// A pool usable before, or independent of, initialization.
    ///
    /// Returns the live core pool when it exists; otherwise opens a
    /// single-connection pool that is not retained and closes when the
    /// last handle drops.
    pub fn one_off(&self) -> Result<Arc<DbPool<B>>> {
        if let Some(pool) = self.core.lock().as_ref() {
            return Ok(Arc::clone(pool));
        }
        let settings = PoolSettings {
            max_open_conns: 1,
            max_idle_conns: 1,
            ..self.pools.core.clone()
        };
        warn!("core pool not initialized, opening one-off pool");
        Ok(Arc::new(open_pool::<B>(&self.database, &settings)?))
    }

    /// Release both pools. Safe to call when nothing was opened, and
    /// more than once.
    ///
    /// Connections close once every outstanding handle is dropped.
    pub fn close(&self) {
        for purpose in [PoolPurpose::Core, PoolPurpose::Plugin] {
            if self.slot(purpose).lock().take().is_some() {
                info!(purpose = purpose.as_str(), "pool closed");
            }
        }
    }

    fn slot(&self, purpose: PoolPurpose) -> &Slot<B> {
        match purpose {
            PoolPurpose::Core => &self.core,
            PoolPurpose::Plugin => &self.plugin,
        }
    }

    fn settings(&self, purpose: PoolPurpose) -> &PoolSettings {
        self.pools.for_purpose(purpose)
    }
}

impl<B: Backend> Drop for PoolManager<B> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::backend::Sqlite;

    fn manager(dir: &tempfile::TempDir) -> PoolManager<Sqlite> {
        let db = DatabaseSettings::sqlite(dir.path().join("pm.db").to_str().unwrap());
        PoolManager::new(db, PoolsSettings::default())
    }

    #[test]
    fn lazy_until_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        assert!(!pm.is_open(PoolPurpose::Core));
        let _ = pm.core().unwrap();
        assert!(pm.is_open(PoolPurpose::Core));
        assert!(!pm.is_open(PoolPurpose::Plugin));
    }

    #[test]
    fn repeated_calls_share_one_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let a = pm.core().unwrap();
        let b = pm.get(PoolPurpose::Core).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let p = pm.plugin().unwrap();
        assert!(!Arc::ptr_eq(&a, &p));
    }

    #[test]
    fn concurrent_first_callers_share_one_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let handles: Vec<_> = thread::scope(|s| {
            let spawned: Vec<_> = (0..8).map(|_| s.spawn(|| pm.plugin().unwrap())).collect();
            spawned.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn close_before_open_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        pm.close();
        pm.close();
        assert!(!pm.is_open(PoolPurpose::Core));
    }

    #[test]
    fn close_then_reopen_yields_new_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let first = pm.core().unwrap();
        pm.close();
        assert!(!pm.is_open(PoolPurpose::Core));
        let second = pm.core().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn one_off_reuses_live_core_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pm = manager(&dir);
        let standalone = pm.one_off().unwrap();
        assert_eq!(standalone.max_size(), 1);
        assert!(!pm.is_open(PoolPurpose::Core));

        let core = pm.core().unwrap();
        assert!(Arc::ptr_eq(&pm.one_off().unwrap(), &core));
    }

    #[test]
    fn failed_open_can_retry() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no/such/dir/x.db");
        let pm: PoolManager<Sqlite> = PoolManager::new(
            DatabaseSettings::sqlite(missing.to_str().unwrap()),
            PoolsSettings {
                core: PoolSettings {
                    acquire_timeout_ms: 200,
                    ..PoolSettings::default()
                },
                ..PoolsSettings::default()
            },
        );
        assert!(pm.core().is_err());
        assert!(!pm.is_open(PoolPurpose::Core));

        std::fs::create_dir_all(missing.parent().unwrap()).unwrap();
        assert!(pm.core().is_ok());
    }
}
