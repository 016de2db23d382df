//! Connection pools: DSN construction, opening and the dual-pool manager.

mod dsn;
mod manager;
mod open;

pub use dsn::{DEFAULT_SQLITE_PATH, build_dsn};
pub use manager::PoolManager;
pub use open::open_pool;
