//! Change events: the append-only record of one audited mutation.
//!
//! A [`NewChangeEvent`] is the generic shape the executor hands to a
//! recorder. The recorder assigns the ID and timestamp and returns the
//! persisted [`ChangeEvent`]. Only the `consumed` and `synced` flags ever
//! change after insertion; they are flipped independently by the local
//! cache-invalidation subscriber and the cross-node replication agent.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::audit::AuditContext;
use crate::ids::{EventId, NodeId, RequestId, UserId};

/// Kind of mutation a change event describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A row was inserted.
    Create,
    /// A row was modified.
    Update,
    /// A row was removed.
    Delete,
}

impl Operation {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored operation string is not one of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown change operation: {0}")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(ParseOperationError(other.to_owned())),
        }
    }
}

/// An event that has not been persisted yet.
///
/// Constructed through [`NewChangeEvent::create`], [`NewChangeEvent::update`]
/// or [`NewChangeEvent::delete`] so the snapshot shape always matches the
/// operation: creates carry no before image, deletes carry no after image.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChangeEvent {
    /// Table the mutated row lives in.
    pub table_name: String,
    /// Primary key of the mutated row.
    pub record_id: String,
    /// Mutation kind.
    pub operation: Operation,
    /// Row state before the mutation.
    pub before: Option<Value>,
    /// Row state after the mutation.
    pub after: Option<Value>,
    /// Who triggered the mutation.
    pub audit: AuditContext,
}

impl NewChangeEvent {
    /// Event for a freshly inserted row.
    pub fn create(
        table_name: impl Into<String>,
        record_id: impl Into<String>,
        after: Value,
        audit: AuditContext,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            record_id: record_id.into(),
            operation: Operation::Create,
            before: None,
            after: Some(after),
            audit,
        }
    }

    /// Event for a modified row.
    pub fn update(
        table_name: impl Into<String>,
        record_id: impl Into<String>,
        before: Value,
        after: Value,
        audit: AuditContext,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            record_id: record_id.into(),
            operation: Operation::Update,
            before: Some(before),
            after: Some(after),
            audit,
        }
    }

    /// Event for a removed row.
    pub fn delete(
        table_name: impl Into<String>,
        record_id: impl Into<String>,
        before: Value,
        audit: AuditContext,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            record_id: record_id.into(),
            operation: Operation::Delete,
            before: Some(before),
            after: None,
            audit,
        }
    }
}

/// A persisted change event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Event ID (UUID v7, assigned by the recorder).
    pub event_id: EventId,
    /// Table the mutated row lives in.
    pub table_name: String,
    /// Primary key of the mutated row.
    pub record_id: String,
    /// Mutation kind.
    pub operation: Operation,
    /// Row state before the mutation (absent for creates).
    pub before: Option<Value>,
    /// Row state after the mutation (absent for deletes).
    pub after: Option<Value>,
    /// Who triggered the mutation.
    pub actor_user_id: UserId,
    /// Node the mutation originated on.
    pub node_id: NodeId,
    /// Request the mutation belongs to.
    pub request_id: RequestId,
    /// Remote address of the caller.
    pub ip: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Set once the local consumer has processed the event.
    pub consumed: bool,
    /// Set once the event has been replicated to other nodes.
    pub synced: bool,
}

impl ChangeEvent {
    /// Whether both consumers are done with the event.
    ///
    /// Only such events may be garbage collected.
    #[must_use]
    pub fn is_fully_processed(&self) -> bool {
        self.consumed && self.synced
    }

    /// Top-level fields whose value differs between the before and after
    /// snapshots, sorted by name.
    ///
    /// For creates every field of the after image is reported, for deletes
    /// every field of the before image.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<String> {
        let empty = serde_json::Map::new();
        let before = self.before.as_ref().and_then(Value::as_object).unwrap_or(&empty);
        let after = self.after.as_ref().and_then(Value::as_object).unwrap_or(&empty);

        let mut changed: Vec<String> = before
            .keys()
            .chain(after.keys())
            .filter(|key| before.get(*key) != after.get(*key))
            .cloned()
            .collect();
        changed.sort();
        changed.dedup();
        changed
    }
}
