//! Audit context attached to every command invocation.

use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, RequestId, UserId};

/// Actor user ID recorded for mutations performed by the system itself.
pub const SYSTEM_ACTOR: &str = "system";

/// Who and where triggered a mutation.
///
/// Immutable once built; commands hand out a shared reference and the
/// executor clones it into the change event it records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditContext {
    actor_user_id: UserId,
    node_id: NodeId,
    request_id: RequestId,
    ip: String,
}

impl AuditContext {
    /// Build an audit context for a request.
    pub fn new(
        actor_user_id: impl Into<UserId>,
        node_id: impl Into<NodeId>,
        request_id: impl Into<RequestId>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            actor_user_id: actor_user_id.into(),
            node_id: node_id.into(),
            request_id: request_id.into(),
            ip: ip.into(),
        }
    }

    /// Context for mutations the system performs on its own behalf
    /// (bootstrap seeding, maintenance). Gets a fresh request ID.
    pub fn system(node_id: impl Into<NodeId>) -> Self {
        Self::new(SYSTEM_ACTOR, node_id, RequestId::new(), "127.0.0.1")
    }

    /// The user who triggered the mutation.
    pub fn actor_user_id(&self) -> &UserId {
        &self.actor_user_id
    }

    /// The node the mutation originated on.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The request the mutation belongs to.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Remote address of the caller.
    pub fn ip(&self) -> &str {
        &self.ip
    }
}
