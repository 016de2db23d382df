//! Transactional executor for audited mutations.
//!
//! Each entry point runs one command inside a transaction on a pooled
//! connection and, only after the commit succeeds, records a change event
//! through the command's recorder. A failed or cancelled mutation rolls back
//! and records nothing. Recording is best effort: a recorder error is logged
//! and the committed mutation is still reported as successful.

use chronicle_core::{NewChangeEvent, OpContext, Operation};
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::backend::{Backend, SqlTx};
use crate::command::{CreateCommand, DeleteCommand, UpdateCommand};
use crate::errors::{DbError, Result, ResultExt};
use crate::events::ChangeEventRecorder;

/// Insert a row and record a `create` event carrying its after image.
#[instrument(skip_all, fields(table = cmd.table_name()))]
pub fn create<C: CreateCommand>(cmd: &C) -> Result<C::Entity> {
    let table = cmd.table_name();
    let ctx = cmd.context();
    checkpoint(ctx, || format!("create on {table}"))?;
    trace_params(cmd.params());

    let mut conn = cmd
        .connection()
        .get()
        .with_context(|| format!("acquire connection for create on {table}"))?;
    let mut tx = <C::Backend as Backend>::begin(&mut conn)
        .with_context(|| format!("begin create on {table}"))?;

    checkpoint(ctx, || format!("create on {table}"))?;
    let entity = cmd
        .execute(&mut tx)
        .with_context(|| format!("execute create on {table}"))?;

    checkpoint(ctx, || format!("commit create on {table}"))?;
    tx.commit()
        .with_context(|| format!("commit create on {table}"))?;
    drop(conn);

    let id = cmd.get_id(&entity);
    let event = serde_json::to_value(&entity)
        .map(|after| NewChangeEvent::create(table, &id, after, cmd.audit_context().clone()));
    record(cmd.recorder(), event, table, &id, Operation::Create);
    Ok(entity)
}

/// Modify a row and record an `update` event with before and after images.
///
/// Returns the row as read back inside the transaction after the change.
#[instrument(skip_all, fields(table = cmd.table_name(), record_id = cmd.get_id()))]
pub fn update<C: UpdateCommand>(cmd: &C) -> Result<C::Entity> {
    let table = cmd.table_name();
    let id = cmd.get_id();
    let ctx = cmd.context();
    checkpoint(ctx, || format!("update {id} on {table}"))?;
    trace_params(cmd.params());

    let mut conn = cmd
        .connection()
        .get()
        .with_context(|| format!("acquire connection for update on {table}"))?;
    let mut tx = <C::Backend as Backend>::begin(&mut conn)
        .with_context(|| format!("begin update on {table}"))?;

    let before = cmd
        .get_before(&mut tx)
        .with_context(|| format!("read {id} before update on {table}"))?;
    checkpoint(ctx, || format!("update {id} on {table}"))?;
    cmd.execute(&mut tx)
        .with_context(|| format!("execute update {id} on {table}"))?;
    let after = cmd
        .get_before(&mut tx)
        .with_context(|| format!("read {id} after update on {table}"))?;

    checkpoint(ctx, || format!("commit update {id} on {table}"))?;
    tx.commit()
        .with_context(|| format!("commit update {id} on {table}"))?;
    drop(conn);

    let event = serde_json::to_value(&before).and_then(|before| {
        serde_json::to_value(&after).map(|after| {
            NewChangeEvent::update(table, id, before, after, cmd.audit_context().clone())
        })
    });
    record(cmd.recorder(), event, table, id, Operation::Update);
    Ok(after)
}

/// Remove a row and record a `delete` event carrying its before image.
#[instrument(skip_all, fields(table = cmd.table_name(), record_id = cmd.get_id()))]
pub fn delete<C: DeleteCommand>(cmd: &C) -> Result<()> {
    let table = cmd.table_name();
    let id = cmd.get_id();
    let ctx = cmd.context();
    checkpoint(ctx, || format!("delete {id} on {table}"))?;

    let mut conn = cmd
        .connection()
        .get()
        .with_context(|| format!("acquire connection for delete on {table}"))?;
    let mut tx = <C::Backend as Backend>::begin(&mut conn)
        .with_context(|| format!("begin delete on {table}"))?;

    let before = cmd
        .get_before(&mut tx)
        .with_context(|| format!("read {id} before delete on {table}"))?;
    checkpoint(ctx, || format!("delete {id} on {table}"))?;
    cmd.execute(&mut tx)
        .with_context(|| format!("execute delete {id} on {table}"))?;

    checkpoint(ctx, || format!("commit delete {id} on {table}"))?;
    tx.commit()
        .with_context(|| format!("commit delete {id} on {table}"))?;
    drop(conn);

    let event = serde_json::to_value(&before)
        .map(|before| NewChangeEvent::delete(table, id, before, cmd.audit_context().clone()));
    record(cmd.recorder(), event, table, id, Operation::Delete);
    Ok(())
}

fn checkpoint(ctx: &OpContext, what: impl FnOnce() -> String) -> Result<()> {
    ctx.check().with_context(what)
}

fn trace_params<P: Serialize>(params: &P) {
    if tracing::enabled!(tracing::Level::TRACE) {
        if let Ok(json) = serde_json::to_string(params) {
            trace!(params = %json, "command params");
        }
    }
}

fn record(
    recorder: &dyn ChangeEventRecorder,
    event: serde_json::Result<NewChangeEvent>,
    table: &str,
    record_id: &str,
    operation: Operation,
) {
    let result = event
        .map_err(DbError::from)
        .and_then(|event| recorder.record_change_event(&event));
    match result {
        Ok(recorded) => debug!(event_id = %recorded.event_id, %operation, "change event recorded"),
        Err(error) => warn!(
            table,
            record_id,
            %operation,
            error = %error,
            "mutation committed but change event was not recorded"
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
