//! Driver-neutral parameter and result values.
//!
//! Statements issued through a [`Backend`](super::Backend) bind positional
//! [`SqlValue`]s and return [`Row`]s of them, so the change-event store and
//! schema manager are written once for every dialect.

use crate::errors::{DbError, Result};

/// A single SQL parameter or result cell.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Boolean; stored as `0`/`1` where the dialect has no native type.
    Bool(bool),
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One result row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    /// Wrap decoded column values.
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `idx`.
    pub fn value(&self, idx: usize) -> Result<&SqlValue> {
        self.values
            .get(idx)
            .ok_or_else(|| DbError::Decode(format!("column {idx} out of range ({})", self.len())))
    }

    /// Non-null text column.
    pub fn text(&self, idx: usize) -> Result<String> {
        self.opt_text(idx)?
            .ok_or_else(|| DbError::Decode(format!("column {idx} is NULL, expected text")))
    }

    /// Nullable text column.
    pub fn opt_text(&self, idx: usize) -> Result<Option<String>> {
        match self.value(idx)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            other => Err(DbError::Decode(format!(
                "column {idx}: expected text, got {other:?}"
            ))),
        }
    }

    /// Non-null integer column.
    pub fn integer(&self, idx: usize) -> Result<i64> {
        match self.value(idx)? {
            SqlValue::Integer(n) => Ok(*n),
            SqlValue::Bool(b) => Ok(i64::from(*b)),
            other => Err(DbError::Decode(format!(
                "column {idx}: expected integer, got {other:?}"
            ))),
        }
    }

    /// Boolean column; accepts native booleans and `0`/`1` integers.
    pub fn boolean(&self, idx: usize) -> Result<bool> {
        match self.value(idx)? {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Integer(n) => Ok(*n != 0),
            other => Err(DbError::Decode(format!(
                "column {idx}: expected boolean, got {other:?}"
            ))),
        }
    }
}
