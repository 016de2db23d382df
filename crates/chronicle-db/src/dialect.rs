//! Backend-specific SQL conventions.
//!
//! A [`Dialect`] is the small capability every generic component in this
//! crate is parameterized over: placeholder syntax, identifier quoting,
//! column type names, DDL quirks, and ID generation. Nothing outside this
//! module matches on the backend to build SQL.

use std::fmt::Write as _;

use chronicle_settings::DatabaseDriver;
use uuid::Uuid;

use crate::schema::ColumnType;

/// SQL dialect of a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `SQLite` 3.
    Sqlite,
    /// `PostgreSQL`.
    Postgres,
    /// `MySQL` / `MariaDB`.
    MySql,
}

impl Dialect {
    /// Dialect for a configured driver.
    #[must_use]
    pub const fn from_driver(driver: DatabaseDriver) -> Self {
        match driver {
            DatabaseDriver::Sqlite => Self::Sqlite,
            DatabaseDriver::Postgres => Self::Postgres,
            DatabaseDriver::Mysql => Self::MySql,
        }
    }

    /// Driver this dialect belongs to.
    #[must_use]
    pub const fn driver(self) -> DatabaseDriver {
        match self {
            Self::Sqlite => DatabaseDriver::Sqlite,
            Self::Postgres => DatabaseDriver::Postgres,
            Self::MySql => DatabaseDriver::Mysql,
        }
    }

    /// Positional placeholder for the 1-based parameter `n`.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Sqlite => format!("?{n}"),
            Self::Postgres => format!("${n}"),
            Self::MySql => "?".to_string(),
        }
    }

    /// Comma-separated placeholders for parameters `1..=count`.
    #[must_use]
    pub fn placeholders(self, count: usize) -> String {
        (1..=count)
            .map(|n| self.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Quote an identifier.
    #[must_use]
    pub fn quote(self, ident: &str) -> String {
        match self {
            Self::Sqlite | Self::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
        }
    }

    /// Column type name for a portable column type.
    #[must_use]
    pub const fn column_type(self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (Self::Sqlite, ColumnType::Id | ColumnType::Text | ColumnType::Timestamp | ColumnType::Json) => "TEXT",
            (Self::Sqlite, ColumnType::Integer | ColumnType::Bool) => "INTEGER",
            (Self::Postgres, ColumnType::Id | ColumnType::Text | ColumnType::Timestamp | ColumnType::Json) => "TEXT",
            (Self::Postgres, ColumnType::Integer) => "BIGINT",
            (Self::Postgres, ColumnType::Bool) => "BOOLEAN",
            // MySQL cannot index or reference unbounded TEXT columns.
            (Self::MySql, ColumnType::Id) => "VARCHAR(64)",
            (Self::MySql, ColumnType::Text) => "VARCHAR(255)",
            (Self::MySql, ColumnType::Timestamp) => "VARCHAR(40)",
            (Self::MySql, ColumnType::Json) => "LONGTEXT",
            (Self::MySql, ColumnType::Integer) => "BIGINT",
            (Self::MySql, ColumnType::Bool) => "BOOLEAN",
        }
    }

    /// Whether secondary indexes must be declared inside `CREATE TABLE`
    /// (no `CREATE INDEX IF NOT EXISTS`).
    #[must_use]
    pub const fn inline_indexes(self) -> bool {
        matches!(self, Self::MySql)
    }

    /// Suffix appended to `CREATE TABLE (...)`.
    #[must_use]
    pub const fn table_options(self) -> &'static str {
        match self {
            Self::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            Self::Sqlite | Self::Postgres => "",
        }
    }

    /// `DROP TABLE` statement; `tolerant` adds `IF EXISTS`.
    #[must_use]
    pub fn drop_table(self, table: &str, tolerant: bool) -> String {
        let mut sql = String::from("DROP TABLE ");
        if tolerant {
            sql.push_str("IF EXISTS ");
        }
        sql.push_str(&self.quote(table));
        sql
    }

    /// `CREATE INDEX` statement for dialects that support it standalone.
    #[must_use]
    pub fn create_index(self, name: &str, table: &str, columns: &[&str]) -> String {
        let cols = columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = String::new();
        let _ = write!(
            sql,
            "CREATE INDEX IF NOT EXISTS {} ON {} ({cols})",
            self.quote(name),
            self.quote(table)
        );
        sql
    }

    /// Query returning one column: the names of all tables in the current
    /// database/schema.
    #[must_use]
    pub const fn list_tables_sql(self) -> &'static str {
        match self {
            Self::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
            }
            Self::Postgres => {
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'"
            }
            Self::MySql => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'"
            }
        }
    }

    /// Generate a primary key for a new row.
    ///
    /// All dialects store IDs as UUID v7 text, which sorts by creation time.
    #[must_use]
    pub fn new_id(self) -> String {
        Uuid::now_v7().to_string()
    }
}
