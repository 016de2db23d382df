//! Error types for the database layer.
//!
//! [`DbError`] is returned by every operation in this crate. Driver errors
//! are kept as typed sources; [`DbError::Context`] and [`DbError::Schema`]
//! wrap them with the operation that failed so callers see *what* broke
//! while `source()` still yields the original cause.

use std::fmt;

use chronicle_core::ContextError;
use thiserror::Error;

/// Schema lifecycle step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaAction {
    /// `CREATE TABLE`.
    Create,
    /// `DROP TABLE`.
    Drop,
    /// Inserting the bootstrap row.
    Seed,
}

impl fmt::Display for SchemaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Drop => "drop",
            Self::Seed => "seed",
        })
    }
}

/// Errors that can occur in the database layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// `SQLite` driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `PostgreSQL` driver error.
    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] r2d2_postgres::postgres::Error),

    /// `MySQL` driver error.
    #[cfg(feature = "mysql")]
    #[error("mysql error: {0}")]
    MySql(#[from] r2d2_mysql::mysql::Error),

    /// Connection pool error (exhausted, unreachable, build failure).
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON snapshot serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Invalid or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation context's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row (table or entity name).
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// A result column could not be converted to the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// An error annotated with the operation that produced it.
    #[error("{context}: {source}")]
    Context {
        /// What was being done.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<DbError>,
    },

    /// A schema lifecycle step failed on a specific table.
    #[error("{action} {table}: {source}")]
    Schema {
        /// Step that failed.
        action: SchemaAction,
        /// Table it failed on.
        table: String,
        /// The underlying error.
        #[source]
        source: Box<DbError>,
    },

    /// The declared table graph is inconsistent.
    #[error("invalid schema plan: {0}")]
    SchemaPlan(String),

    /// One or more tables failed bootstrap validation.
    #[error("bootstrap validation failed: {}", .failures.join("; "))]
    BootstrapValidation {
        /// One entry per failing table.
        failures: Vec<String>,
    },
}

impl From<ContextError> for DbError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl DbError {
    /// Build a [`DbError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// The innermost error, looking through context wrappers.
    pub fn root_cause(&self) -> &DbError {
        match self {
            Self::Context { source, .. } | Self::Schema { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience type alias for database results.
pub type Result<T> = std::result::Result<T, DbError>;

/// Attach operation context to any error convertible into [`DbError`].
pub trait ResultExt<T> {
    /// Wrap the error with a fixed context string.
    fn context(self, context: &str) -> Result<T>;

    /// Wrap the error with a lazily built context string.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DbError>,
{
    fn context(self, context: &str) -> Result<T> {
        self.with_context(|| context.to_owned())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DbError::Context {
            context: f(),
            source: Box::new(e.into()),
        })
    }
}
