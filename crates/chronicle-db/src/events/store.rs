//! Change-event persistence.
//!
//! [`ChangeEventStore`] is the one recorder implementation, generic over
//! the backend. Every method runs in its own short transaction on a pooled
//! connection; reads use the backend's read transaction so a consumer
//! polling the queues never waits on an open writer. Listings are ordered by `(created_at, id)`; timestamps are
//! stored as fixed-width RFC 3339 UTC text so that ordering is
//! chronological on every dialect.

use chrono::{DateTime, SecondsFormat, Utc};
use chronicle_core::pagination::MAX_PAGE_LIMIT;
use chronicle_core::{ChangeEvent, EventId, NewChangeEvent, Operation, Pagination};
use serde_json::Value;
use tracing::{debug, instrument};

use super::recorder::ChangeEventRecorder;
use crate::backend::{Backend, DbPool, Row, SqlTx, SqlValue, Tx};
use crate::errors::{DbError, Result};
use crate::schema::{CHANGE_EVENTS, create_table_sql};

const ENTITY: &str = "change event";

const SELECT_COLUMNS: &str = "SELECT id, table_name, record_id, operation, before_snapshot, \
     after_snapshot, actor_user_id, node_id, request_id, ip, created_at, consumed, synced \
     FROM change_events";

const ORDER: &str = "ORDER BY created_at ASC, id ASC";

/// Change-event store over a connection pool.
pub struct ChangeEventStore<B: Backend> {
    pool: DbPool<B>,
}

impl<B: Backend> Clone for ChangeEventStore<B> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<B: Backend> ChangeEventStore<B> {
    /// Store writing through `pool`.
    pub fn new(pool: DbPool<B>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool<B> {
        &self.pool
    }

    /// Create the `change_events` table and its indexes if missing.
    pub fn ensure_table(&self) -> Result<()> {
        self.with_tx(|tx| {
            for sql in create_table_sql(B::DIALECT, &CHANGE_EVENTS) {
                let _ = tx.execute(&sql, &[])?;
            }
            Ok(())
        })
    }

    /// Append an event, assigning its ID and timestamp.
    #[instrument(skip_all, fields(table = %event.table_name, record_id = %event.record_id))]
    pub fn record_change_event(&self, event: &NewChangeEvent) -> Result<ChangeEvent> {
        let recorded = self.with_tx(|tx| insert::<B>(tx, event))?;
        debug!(
            event_id = %recorded.event_id,
            operation = %recorded.operation,
            "change event recorded"
        );
        Ok(recorded)
    }

    /// Fetch a single event.
    pub fn get_change_event(&self, id: &str) -> Result<Option<ChangeEvent>> {
        self.read(|tx| find::<B>(tx, id))
    }

    /// Every event for one row, oldest first.
    pub fn get_change_events_by_record(
        &self,
        table_name: &str,
        record_id: &str,
    ) -> Result<Vec<ChangeEvent>> {
        let d = B::DIALECT;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE table_name = {} AND record_id = {} {ORDER}",
            d.placeholder(1),
            d.placeholder(2)
        );
        self.select(&sql, &[table_name.into(), record_id.into()])
    }

    /// One page of all events, oldest first.
    pub fn list_change_events(&self, page: &Pagination) -> Result<Vec<ChangeEvent>> {
        let d = B::DIALECT;
        let sql = format!(
            "{SELECT_COLUMNS} {ORDER} LIMIT {} OFFSET {}",
            d.placeholder(1),
            d.placeholder(2)
        );
        self.select(
            &sql,
            &[
                SqlValue::Integer(i64::from(page.effective_limit())),
                SqlValue::Integer(i64::try_from(page.offset).unwrap_or(i64::MAX)),
            ],
        )
    }

    /// Oldest events the local consumer has not processed yet.
    pub fn get_unconsumed_events(&self, limit: u32) -> Result<Vec<ChangeEvent>> {
        self.pending("consumed", limit)
    }

    /// Oldest events not yet replicated to other nodes.
    pub fn get_unsynced_events(&self, limit: u32) -> Result<Vec<ChangeEvent>> {
        self.pending("synced", limit)
    }

    /// Mark an event consumed. Marking twice is a no-op.
    pub fn mark_event_consumed(&self, id: &str) -> Result<()> {
        self.mark("consumed", id)
    }

    /// Mark an event synced. Marking twice is a no-op.
    pub fn mark_event_synced(&self, id: &str) -> Result<()> {
        self.mark("synced", id)
    }

    /// Remove an event.
    pub fn delete_change_event(&self, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM change_events WHERE id = {}", B::DIALECT.placeholder(1));
        self.with_tx(|tx| {
            if tx.execute(&sql, &[id.into()])? == 0 {
                return Err(DbError::not_found(ENTITY, id));
            }
            Ok(())
        })
    }

    /// Total number of stored events.
    pub fn count_change_events(&self) -> Result<i64> {
        self.read(|tx| tx.query_one("SELECT COUNT(*) FROM change_events", &[])?.integer(0))
    }

    fn pending(&self, flag: &str, limit: u32) -> Result<Vec<ChangeEvent>> {
        let d = B::DIALECT;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE {flag} = {} {ORDER} LIMIT {}",
            d.placeholder(1),
            d.placeholder(2)
        );
        let limit = limit.min(MAX_PAGE_LIMIT);
        self.select(&sql, &[SqlValue::Bool(false), SqlValue::Integer(i64::from(limit))])
    }

    fn mark(&self, flag: &str, id: &str) -> Result<()> {
        let d = B::DIALECT;
        let sql = format!(
            "UPDATE change_events SET {flag} = {} WHERE id = {}",
            d.placeholder(1),
            d.placeholder(2)
        );
        self.with_tx(|tx| {
            // MySQL reports zero affected rows when the value is unchanged.
            let changed = tx.execute(&sql, &[SqlValue::Bool(true), id.into()])?;
            if changed == 0 && find::<B>(tx, id)?.is_none() {
                return Err(DbError::not_found(ENTITY, id));
            }
            Ok(())
        })
    }

    fn select(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<ChangeEvent>> {
        self.read(|tx| tx.query(sql, params)?.iter().map(decode).collect())
    }

    fn with_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tx<'_, B>) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        let mut tx = B::begin(&mut conn)?;
        let out = f(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tx<'_, B>) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        let mut tx = B::begin_read(&mut conn)?;
        let out = f(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }
}

impl<B: Backend> ChangeEventRecorder for ChangeEventStore<B> {
    fn record_change_event(&self, event: &NewChangeEvent) -> Result<ChangeEvent> {
        ChangeEventStore::record_change_event(self, event)
    }
}

fn insert<B: Backend>(tx: &mut Tx<'_, B>, event: &NewChangeEvent) -> Result<ChangeEvent> {
    let recorded = ChangeEvent {
        event_id: EventId::from(B::DIALECT.new_id()),
        table_name: event.table_name.clone(),
        record_id: event.record_id.clone(),
        operation: event.operation,
        before: event.before.clone(),
        after: event.after.clone(),
        actor_user_id: event.audit.actor_user_id().clone(),
        node_id: event.audit.node_id().clone(),
        request_id: event.audit.request_id().clone(),
        ip: event.audit.ip().to_string(),
        timestamp: Utc::now(),
        consumed: false,
        synced: false,
    };

    let sql = format!(
        "INSERT INTO change_events (id, table_name, record_id, operation, before_snapshot, \
         after_snapshot, actor_user_id, node_id, request_id, ip, created_at, consumed, synced) \
         VALUES ({})",
        B::DIALECT.placeholders(13)
    );
    let _ = tx.execute(
        &sql,
        &[
            recorded.event_id.as_str().into(),
            recorded.table_name.as_str().into(),
            recorded.record_id.as_str().into(),
            recorded.operation.as_str().into(),
            snapshot_text(recorded.before.as_ref())?,
            snapshot_text(recorded.after.as_ref())?,
            recorded.actor_user_id.as_str().into(),
            recorded.node_id.as_str().into(),
            recorded.request_id.as_str().into(),
            recorded.ip.as_str().into(),
            format_timestamp(&recorded.timestamp).into(),
            SqlValue::Bool(false),
            SqlValue::Bool(false),
        ],
    )?;

    // Reflect the stored precision so the returned value equals a re-read.
    parse_timestamp(&format_timestamp(&recorded.timestamp)).map(|timestamp| ChangeEvent {
        timestamp,
        ..recorded
    })
}

fn find<B: Backend>(tx: &mut Tx<'_, B>, id: &str) -> Result<Option<ChangeEvent>> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = {}", B::DIALECT.placeholder(1));
    tx.query_opt(&sql, &[id.into()])?.as_ref().map(decode).transpose()
}

fn snapshot_text(value: Option<&Value>) -> Result<SqlValue> {
    Ok(value
        .map(serde_json::to_string)
        .transpose()?
        .map_or(SqlValue::Null, SqlValue::Text))
}

fn snapshot_value(text: Option<String>) -> Result<Option<Value>> {
    Ok(text.as_deref().map(serde_json::from_str).transpose()?)
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::Decode(format!("invalid timestamp {s:?}: {e}")))
}

fn decode(row: &Row) -> Result<ChangeEvent> {
    let operation: Operation = row
        .text(3)?
        .parse()
        .map_err(|e: chronicle_core::ParseOperationError| DbError::Decode(e.to_string()))?;
    Ok(ChangeEvent {
        event_id: EventId::from(row.text(0)?),
        table_name: row.text(1)?,
        record_id: row.text(2)?,
        operation,
        before: snapshot_value(row.opt_text(4)?)?,
        after: snapshot_value(row.opt_text(5)?)?,
        actor_user_id: row.text(6)?.into(),
        node_id: row.text(7)?.into(),
        request_id: row.text(8)?.into(),
        ip: row.text(9)?,
        timestamp: parse_timestamp(&row.text(10)?)?,
        consumed: row.boolean(11)?,
        synced: row.boolean(12)?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::thread::sleep;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chronicle_core::AuditContext;
    use chronicle_settings::{DatabaseSettings, PoolSettings};
    use serde_json::json;

    use super::*;
    use crate::backend::Sqlite;
    use crate::pool::open_pool;

    fn store() -> (tempfile::TempDir, ChangeEventStore<Sqlite>) {
        let dir = tempfile::tempdir().unwrap();
        let db = DatabaseSettings::sqlite(dir.path().join("events.db").to_str().unwrap());
        let pool = open_pool::<Sqlite>(&db, &PoolSettings::default()).unwrap();
        let store = ChangeEventStore::new(pool);
        store.ensure_table().unwrap();
        (dir, store)
    }

    fn audit() -> AuditContext {
        AuditContext::new("user-1", "node-a", "req-1", "10.0.0.7")
    }

    fn created(store: &ChangeEventStore<Sqlite>, record: &str) -> ChangeEvent {
        store
            .record_change_event(&NewChangeEvent::create(
                "roles",
                record,
                json!({"id": record, "label": "admin"}),
                audit(),
            ))
            .unwrap()
    }

    #[test]
    fn ensure_table_is_idempotent() {
        let (_dir, store) = store();
        store.ensure_table().unwrap();
        assert_eq!(store.count_change_events().unwrap(), 0);
    }

    #[test]
    fn recorded_event_reads_back_identically() {
        let (_dir, store) = store();
        let event = created(&store, "r1");

        assert_eq!(event.operation, Operation::Create);
        assert!(event.before.is_none());
        assert_eq!(event.actor_user_id.as_str(), "user-1");
        assert_eq!(event.ip, "10.0.0.7");
        assert!(!event.consumed && !event.synced);

        let fetched = store.get_change_event(event.event_id.as_str()).unwrap().unwrap();
        assert_eq!(fetched, event);
    }

    #[test]
    fn missing_event_is_none() {
        let (_dir, store) = store();
        assert!(store.get_change_event("nope").unwrap().is_none());
    }

    #[test]
    fn events_by_record_are_oldest_first() {
        let (_dir, store) = store();
        let first = created(&store, "r1");
        sleep(Duration::from_millis(2));
        let _ = created(&store, "r2");
        sleep(Duration::from_millis(2));
        let second = store
            .record_change_event(&NewChangeEvent::delete(
                "roles",
                "r1",
                json!({"id": "r1"}),
                audit(),
            ))
            .unwrap();

        let events = store.get_change_events_by_record("roles", "r1").unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.event_id.clone()).collect();
        assert_eq!(ids, vec![first.event_id, second.event_id]);
        assert!(events[1].after.is_none());
    }

    #[test]
    fn listing_pages_through_all_events() {
        let (_dir, store) = store();
        for i in 0..5 {
            let _ = created(&store, &format!("r{i}"));
        }
        let page = Pagination::new(2, 0);
        let first = store.list_change_events(&page).unwrap();
        let second = store.list_change_events(&page.next()).unwrap();
        let third = store.list_change_events(&page.next().next()).unwrap();
        assert_eq!((first.len(), second.len(), third.len()), (2, 2, 1));
        assert_ne!(first[0].event_id, second[0].event_id);
    }

    #[test]
    fn consumed_and_synced_are_independent() {
        let (_dir, store) = store();
        let a = created(&store, "a");
        let b = created(&store, "b");

        store.mark_event_consumed(a.event_id.as_str()).unwrap();
        store.mark_event_synced(b.event_id.as_str()).unwrap();

        let unconsumed = store.get_unconsumed_events(10).unwrap();
        let unsynced = store.get_unsynced_events(10).unwrap();
        assert_eq!(unconsumed.len(), 1);
        assert_eq!(unconsumed[0].event_id, b.event_id);
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].event_id, a.event_id);

        let a = store.get_change_event(a.event_id.as_str()).unwrap().unwrap();
        assert!(a.consumed && !a.synced && !a.is_fully_processed());
    }

    #[test]
    fn marking_twice_is_a_noop() {
        let (_dir, store) = store();
        let e = created(&store, "a");
        store.mark_event_consumed(e.event_id.as_str()).unwrap();
        store.mark_event_consumed(e.event_id.as_str()).unwrap();
        assert!(store.get_unconsumed_events(10).unwrap().is_empty());
    }

    #[test]
    fn marking_unknown_event_is_not_found() {
        let (_dir, store) = store();
        assert_matches!(store.mark_event_synced("ghost"), Err(DbError::NotFound { .. }));
        assert_matches!(store.mark_event_consumed("ghost"), Err(DbError::NotFound { .. }));
    }

    #[test]
    fn delete_removes_and_reports_missing() {
        let (_dir, store) = store();
        let e = created(&store, "a");
        store.delete_change_event(e.event_id.as_str()).unwrap();
        assert_eq!(store.count_change_events().unwrap(), 0);
        assert_matches!(
            store.delete_change_event(e.event_id.as_str()),
            Err(DbError::NotFound { id, .. }) if id == e.event_id.as_str()
        );
    }

    #[test]
    fn pending_limit_is_clamped() {
        let (_dir, store) = store();
        for i in 0..3 {
            let _ = created(&store, &format!("r{i}"));
        }
        assert!(store.get_unconsumed_events(0).unwrap().is_empty());
        assert!(store.get_unsynced_events(0).unwrap().is_empty());
        assert_eq!(store.get_unconsumed_events(2).unwrap().len(), 2);
        assert_eq!(store.get_unconsumed_events(u32::MAX).unwrap().len(), 3);
    }

    #[test]
    fn reads_do_not_wait_on_open_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        let db = DatabaseSettings {
            busy_timeout_ms: 100,
            ..DatabaseSettings::sqlite(path.to_str().unwrap())
        };
        let store =
            ChangeEventStore::new(open_pool::<Sqlite>(&db, &PoolSettings::default()).unwrap());
        store.ensure_table().unwrap();
        let event = created(&store, "r1");

        let mut conn = store.pool().get().unwrap();
        let mut writer = Sqlite::begin(&mut conn).unwrap();
        let pending = NewChangeEvent::create("roles", "r2", json!({}), audit());
        let _ = insert::<Sqlite>(&mut writer, &pending).unwrap();

        assert_eq!(store.count_change_events().unwrap(), 1);
        assert!(store.get_change_event(event.event_id.as_str()).unwrap().is_some());
        assert_eq!(store.get_unconsumed_events(10).unwrap().len(), 1);
        assert_eq!(store.list_change_events(&Pagination::default()).unwrap().len(), 1);
        assert_matches!(
            store.mark_event_consumed(event.event_id.as_str()),
            Err(DbError::Sqlite(_))
        );

        writer.commit().unwrap();
        assert_eq!(store.count_change_events().unwrap(), 2);
    }

    #[test]
    fn recorder_trait_delegates_to_store() {
        let (_dir, store) = store();
        let recorder: &dyn ChangeEventRecorder = &store;
        let e = recorder
            .record_change_event(&NewChangeEvent::update(
                "roles",
                "r1",
                json!({"label": "a"}),
                json!({"label": "b"}),
                audit(),
            ))
            .unwrap();
        assert_eq!(e.changed_fields(), vec!["label".to_string()]);
        assert_eq!(store.count_change_events().unwrap(), 1);
    }

    #[test]
    fn stored_timestamps_are_fixed_width() {
        let ts = parse_timestamp("2026-03-01T10:00:00.000001Z").unwrap();
        assert_eq!(format_timestamp(&ts), "2026-03-01T10:00:00.000001Z");
        assert_matches!(parse_timestamp("yesterday"), Err(DbError::Decode(_)));
    }
}
