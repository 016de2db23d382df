//! Command contracts for audited mutations.
//!
//! An entity layer implements one command type per operation and entity.
//! A command is built per call, carries everything the executor in
//! [`crate::audited`] needs, and is never persisted.

use chronicle_core::{AuditContext, OpContext};
use serde::Serialize;

use crate::backend::{Backend, DbPool, Tx};
use crate::errors::Result;
use crate::events::ChangeEventRecorder;

/// What every command exposes to the executor.
pub trait Command {
    /// Backend the command's SQL is written for.
    type Backend: Backend;

    /// Cancellation and deadline for this call.
    fn context(&self) -> &OpContext;

    /// Who and where triggered the mutation.
    fn audit_context(&self) -> &AuditContext;

    /// Pool to run the mutation on.
    fn connection(&self) -> &DbPool<Self::Backend>;

    /// Where the change event goes after commit.
    fn recorder(&self) -> &dyn ChangeEventRecorder;

    /// Table the mutated row lives in.
    fn table_name(&self) -> &str;
}

/// Inserts one row.
pub trait CreateCommand: Command {
    /// Domain value returned to the caller and snapshotted as `after`.
    type Entity: Serialize;
    /// Input the row is built from.
    type Params: Serialize;

    /// The input.
    fn params(&self) -> &Self::Params;

    /// Insert the row and return it.
    fn execute(&self, tx: &mut Tx<'_, Self::Backend>) -> Result<Self::Entity>;

    /// Primary key of the inserted row.
    fn get_id(&self, entity: &Self::Entity) -> String;
}

/// Modifies one existing row.
pub trait UpdateCommand: Command {
    /// Domain value snapshotted before and after the change.
    type Entity: Serialize;
    /// The requested changes.
    type Params: Serialize;

    /// The requested changes.
    fn params(&self) -> &Self::Params;

    /// Primary key of the row being changed.
    fn get_id(&self) -> &str;

    /// Read the row's current state. Also used to read the new state
    /// after [`execute`](Self::execute) within the same transaction.
    fn get_before(&self, tx: &mut Tx<'_, Self::Backend>) -> Result<Self::Entity>;

    /// Apply the change.
    fn execute(&self, tx: &mut Tx<'_, Self::Backend>) -> Result<()>;
}

/// Removes one row.
pub trait DeleteCommand: Command {
    /// Domain value snapshotted as `before`.
    type Entity: Serialize;

    /// Primary key of the row being removed.
    fn get_id(&self) -> &str;

    /// Read the row before it is removed.
    fn get_before(&self, tx: &mut Tx<'_, Self::Backend>) -> Result<Self::Entity>;

    /// Remove the row.
    fn execute(&self, tx: &mut Tx<'_, Self::Backend>) -> Result<()>;
}
