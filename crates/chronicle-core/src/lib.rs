//! # chronicle-core
//!
//! Foundation types shared by every Chronicle crate.
//!
//! - **Branded IDs**: `EventId`, `UserId`, `NodeId`, `RequestId` as newtypes
//! - **Audit context**: [`AuditContext`], the who/where attached to every mutation
//! - **Change events**: [`ChangeEvent`], [`NewChangeEvent`], [`Operation`]
//! - **Operation context**: [`OpContext`], cancellation + deadline threaded through every call
//! - **Pagination**: [`Pagination`] for listing queries
//! - **Logging**: `tracing` subscriber setup and test capture utilities

#![deny(unsafe_code)]

pub mod audit;
pub mod change_event;
pub mod context;
pub mod ids;
pub mod logging;
pub mod pagination;

pub use audit::AuditContext;
pub use change_event::{ChangeEvent, NewChangeEvent, Operation, ParseOperationError};
pub use context::{ContextError, OpContext};
pub use ids::{EventId, NodeId, RequestId, UserId};
pub use pagination::Pagination;
