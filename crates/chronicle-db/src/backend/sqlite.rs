//! `SQLite` backend with WAL mode and foreign keys enabled.
//!
//! The [`PragmaCustomizer`] runs on each new connection to ensure WAL mode,
//! foreign keys, and performance pragmas are set. Write transactions begin
//! `IMMEDIATE` so they never have to upgrade their lock mid-transaction;
//! read transactions stay `DEFERRED` and run beside a writer under WAL.

use chronicle_settings::DatabaseSettings;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql, Transaction, TransactionBehavior, params_from_iter};

use super::{Backend, Conn, Row, SqlTx, SqlValue};
use crate::dialect::Dialect;
use crate::errors::Result;

/// In-memory DSN. Each pooled connection gets its own private database.
pub const MEMORY_DSN: &str = ":memory:";

/// Embedded `SQLite` backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sqlite;

/// `SQLite` pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
    cache_size_kib: i64,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA busy_timeout = {};\
             PRAGMA journal_mode = WAL;\
             PRAGMA foreign_keys = ON;\
             PRAGMA cache_size = -{};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms, self.cache_size_kib
        ))
    }
}

impl Backend for Sqlite {
    const DIALECT: Dialect = Dialect::Sqlite;

    type Manager = SqliteConnectionManager;

    type Tx<'c> = Transaction<'c>;

    fn manager(dsn: &str, _settings: &DatabaseSettings) -> Result<Self::Manager> {
        Ok(if dsn == MEMORY_DSN {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(dsn)
        })
    }

    fn configure(
        builder: r2d2::Builder<Self::Manager>,
        settings: &DatabaseSettings,
    ) -> r2d2::Builder<Self::Manager> {
        builder.connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: settings.busy_timeout_ms,
            cache_size_kib: settings.cache_size_kib,
        }))
    }

    fn ping(conn: &mut Conn<Self>) -> Result<()> {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn begin(conn: &mut Conn<Self>) -> Result<Self::Tx<'_>> {
        Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    fn begin_read(conn: &mut Conn<Self>) -> Result<Self::Tx<'_>> {
        Ok(conn.transaction_with_behavior(TransactionBehavior::Deferred)?)
    }
}

impl SqlTx for Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let conn: &Connection = self;
        let changed = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let conn: &Connection = self;
        let mut stmt = conn.prepare(sql)?;
        let columns = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..columns)
                    .map(|i| row.get_ref(i).map(from_value_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(Row::new)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn commit(self) -> Result<()> {
        Transaction::commit(self)?;
        Ok(())
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(n) => ToSqlOutput::Owned(Value::Integer(*n)),
            Self::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(n) => SqlValue::Integer(n),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(b) | ValueRef::Blob(b) => {
            SqlValue::Text(String::from_utf8_lossy(b).into_owned())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn file_pool(dir: &tempfile::TempDir) -> r2d2::Pool<SqliteConnectionManager> {
        file_pool_with_busy_timeout(dir, 30_000)
    }

    fn file_pool_with_busy_timeout(
        dir: &tempfile::TempDir,
        busy_timeout_ms: u32,
    ) -> r2d2::Pool<SqliteConnectionManager> {
        let path = dir.path().join("test.db");
        let settings = DatabaseSettings {
            busy_timeout_ms,
            ..DatabaseSettings::sqlite(path.to_str().unwrap())
        };
        let manager = Sqlite::manager(path.to_str().unwrap(), &settings).unwrap();
        Sqlite::configure(r2d2::Pool::builder().max_size(2), &settings)
            .build(manager)
            .unwrap()
    }

    #[test]
    fn pragmas_applied_on_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir);
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        let fks: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        assert_eq!(fks, 1);
    }

    #[test]
    fn ping_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir);
        let mut conn = pool.get().unwrap();
        Sqlite::ping(&mut conn).unwrap();
    }

    #[test]
    fn execute_and_query_round_trip_values() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir);
        let mut conn = pool.get().unwrap();
        let mut tx = Sqlite::begin(&mut conn).unwrap();
        let _ = tx
            .execute("CREATE TABLE t (a TEXT, b INTEGER, c INTEGER, d REAL)", &[])
            .unwrap();
        let n = tx
            .execute(
                "INSERT INTO t VALUES (?1, ?2, ?3, ?4)",
                &[
                    SqlValue::from("x"),
                    SqlValue::Integer(7),
                    SqlValue::Bool(true),
                    SqlValue::Null,
                ],
            )
            .unwrap();
        assert_eq!(n, 1);

        let row = tx.query_one("SELECT a, b, c, d FROM t", &[]).unwrap();
        assert_eq!(row.text(0).unwrap(), "x");
        assert_eq!(row.integer(1).unwrap(), 7);
        assert!(row.boolean(2).unwrap());
        assert_eq!(row.value(3).unwrap(), &SqlValue::Null);
        tx.commit().unwrap();
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir);
        let mut conn = pool.get().unwrap();
        {
            let mut tx = Sqlite::begin(&mut conn).unwrap();
            let _ = tx.execute("CREATE TABLE t (a TEXT)", &[]).unwrap();
            tx.commit().unwrap();
        }
        {
            let mut tx = Sqlite::begin(&mut conn).unwrap();
            let _ = tx
                .execute("INSERT INTO t VALUES (?1)", &[SqlValue::from("gone")])
                .unwrap();
        }
        let mut tx = Sqlite::begin(&mut conn).unwrap();
        let row = tx.query_one("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(row.integer(0).unwrap(), 0);
    }

    #[test]
    fn query_opt_returns_none_for_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir);
        let mut conn = pool.get().unwrap();
        let mut tx = Sqlite::begin(&mut conn).unwrap();
        assert!(
            tx.query_opt("SELECT 1 WHERE 0", &[])
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn read_transaction_runs_beside_open_writer() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool_with_busy_timeout(&dir, 100);
        let mut writer = pool.get().unwrap();
        let mut reader = pool.get().unwrap();
        {
            let mut tx = Sqlite::begin(&mut writer).unwrap();
            let _ = tx.execute("CREATE TABLE t (a TEXT)", &[]).unwrap();
            tx.commit().unwrap();
        }

        let mut write_tx = Sqlite::begin(&mut writer).unwrap();
        let _ = write_tx
            .execute("INSERT INTO t VALUES (?1)", &[SqlValue::from("pending")])
            .unwrap();

        {
            let mut read_tx = Sqlite::begin_read(&mut reader).unwrap();
            let row = read_tx.query_one("SELECT COUNT(*) FROM t", &[]).unwrap();
            assert_eq!(row.integer(0).unwrap(), 0);
            read_tx.commit().unwrap();
        }
        assert!(Sqlite::begin(&mut reader).is_err());

        write_tx.commit().unwrap();
        let mut read_tx = Sqlite::begin_read(&mut reader).unwrap();
        let row = read_tx.query_one("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(row.integer(0).unwrap(), 1);
    }
}
