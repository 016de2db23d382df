//! Relational backends.
//!
//! A [`Backend`] ties an `r2d2` connection manager to a [`Dialect`] and
//! knows how to open a transaction on one of its pooled connections. All
//! SQL flows through [`SqlTx::execute`] and [`SqlTx::query`] with
//! positional [`SqlValue`] parameters; dropping a transaction without
//! calling [`SqlTx::commit`] rolls it back.
//!
//! `SQLite` is always available. `PostgreSQL` and `MySQL` are behind the
//! `postgres` and `mysql` cargo features.

use chronicle_settings::DatabaseSettings;

use crate::dialect::Dialect;
use crate::errors::{DbError, Result};

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
mod sqlite;
mod value;

#[cfg(feature = "mysql")]
pub use mysql::MySql;
#[cfg(feature = "postgres")]
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use value::{Row, SqlValue};

/// Connection pool for backend `B`.
pub type DbPool<B> = r2d2::Pool<<B as Backend>::Manager>;

/// Pooled connection for backend `B`.
pub type Conn<B> = r2d2::PooledConnection<<B as Backend>::Manager>;

/// Open transaction for backend `B`, borrowing a pooled connection.
pub type Tx<'c, B> = <B as Backend>::Tx<'c>;

/// An open database transaction.
pub trait SqlTx {
    /// Run a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a query and collect every row.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Commit. Dropping the transaction instead rolls it back.
    fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Run a query expected to return at most one row.
    fn query_opt(&mut self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Run a query expected to return exactly one row.
    fn query_one(&mut self, sql: &str, params: &[SqlValue]) -> Result<Row> {
        self.query_opt(sql, params)?
            .ok_or_else(|| DbError::Decode("query returned no rows".to_string()))
    }
}

/// A database driver usable by every generic component in this crate.
pub trait Backend: Send + Sync + Sized + 'static {
    /// SQL conventions of this backend.
    const DIALECT: Dialect;

    /// `r2d2` connection manager.
    type Manager: r2d2::ManageConnection;

    /// Transaction borrowed from a pooled connection.
    type Tx<'c>: SqlTx
    where
        Self: 'c;

    /// Build a connection manager for `dsn`.
    fn manager(dsn: &str, settings: &DatabaseSettings) -> Result<Self::Manager>;

    /// Backend-specific pool tweaks, such as per-connection pragmas.
    fn configure(
        builder: r2d2::Builder<Self::Manager>,
        _settings: &DatabaseSettings,
    ) -> r2d2::Builder<Self::Manager> {
        builder
    }

    /// Round-trip a trivial statement.
    fn ping(conn: &mut Conn<Self>) -> Result<()>;

    /// Start a transaction for a mutation.
    fn begin(conn: &mut Conn<Self>) -> Result<Self::Tx<'_>>;

    /// Start a transaction that only reads. Must not block behind, or
    /// block, concurrent writers.
    fn begin_read(conn: &mut Conn<Self>) -> Result<Self::Tx<'_>> {
        Self::begin(conn)
    }
}
