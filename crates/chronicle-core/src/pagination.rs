//! Limit/offset pagination for listing queries.

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Largest page a single query may return.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// A page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    /// Maximum rows to return (clamped to `1..=MAX_PAGE_LIMIT`).
    pub limit: u32,
    /// Rows to skip.
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Build a page request.
    pub fn new(limit: u32, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Limit clamped into the accepted range.
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    /// The page after this one.
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + u64::from(self.effective_limit()),
        }
    }
}
