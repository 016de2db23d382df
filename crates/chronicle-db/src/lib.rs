//! # chronicle-db
//!
//! Audited mutations over interchangeable relational backends.
//!
//! - **Commands**: [`command`] traits an entity layer implements per operation
//! - **Executor**: [`audited::create`], [`audited::update`], [`audited::delete`]
//!   run a command in a transaction and record a change event after commit
//! - **Change events**: [`ChangeEventStore`], the single recorder implementation
//! - **Pools**: [`open_pool`] and [`PoolManager`] (core and plugin pools)
//! - **Schema**: [`SchemaManager`] creates, drops, seeds and validates the catalogue
//!
//! `SQLite` is always compiled in; enable the `postgres` or `mysql` feature
//! for the server backends.

#![deny(unsafe_code)]

pub mod audited;
pub mod backend;
pub mod command;
pub mod dialect;
pub mod errors;
pub mod events;
pub mod pool;
pub mod schema;

#[cfg(feature = "mysql")]
pub use backend::MySql;
#[cfg(feature = "postgres")]
pub use backend::Postgres;
pub use backend::{Backend, Conn, DbPool, Row, SqlTx, SqlValue, Sqlite, Tx};
pub use command::{Command, CreateCommand, DeleteCommand, UpdateCommand};
pub use dialect::Dialect;
pub use errors::{DbError, Result, ResultExt, SchemaAction};
pub use events::{ChangeEventRecorder, ChangeEventStore};
pub use pool::{PoolManager, build_dsn, open_pool};
pub use schema::{SchemaManager, SchemaPlan};
