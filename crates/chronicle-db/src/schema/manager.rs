//! Schema lifecycle: create, drop, seed and validate every table.
//!
//! Each table is handled in its own transaction and the first failure
//! stops the walk, so a failed run can leave some tables behind. Use
//! [`SchemaManager::existing_tables`] to see what is left.

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use super::plan::{SchemaPlan, create_table_sql, drop_table_sql, insert_sql};
use super::table::{ColumnType, TableDef};
use crate::backend::{Backend, DbPool, SqlTx, SqlValue, Tx};
use crate::errors::{DbError, Result, SchemaAction};

/// Prefix of every bootstrap primary key.
pub const BOOTSTRAP_ID_PREFIX: &str = "bootstrap-";

/// Creates, drops, seeds and validates the application tables.
pub struct SchemaManager<B: Backend> {
    pool: DbPool<B>,
    plan: SchemaPlan,
}

impl<B: Backend> SchemaManager<B> {
    /// Manager for the application catalogue.
    pub fn new(pool: DbPool<B>) -> Result<Self> {
        Ok(Self::with_plan(pool, SchemaPlan::catalog()?))
    }

    /// Manager for an arbitrary plan.
    pub fn with_plan(pool: DbPool<B>, plan: SchemaPlan) -> Self {
        Self { pool, plan }
    }

    /// The plan being applied.
    pub fn plan(&self) -> &SchemaPlan {
        &self.plan
    }

    /// Create every table in dependency order.
    ///
    /// Idempotent for tables that already exist.
    pub fn create_all_tables(&self) -> Result<()> {
        for table in self.plan.create_order() {
            self.step(SchemaAction::Create, table, |tx| {
                for sql in create_table_sql(B::DIALECT, table) {
                    let _ = tx.execute(&sql, &[])?;
                }
                Ok(())
            })?;
            debug!(table = table.name, tier = %table.tier, "table created");
        }
        info!(tables = self.plan.len(), dialect = ?B::DIALECT, "schema created");
        Ok(())
    }

    /// Drop every table in reverse dependency order.
    pub fn drop_all_tables(&self) -> Result<()> {
        for table in self.plan.drop_order() {
            self.step(SchemaAction::Drop, table, |tx| {
                let _ = tx.execute(&drop_table_sql(B::DIALECT, table), &[])?;
                Ok(())
            })?;
            debug!(table = table.name, "table dropped");
        }
        info!(tables = self.plan.len(), dialect = ?B::DIALECT, "schema dropped");
        Ok(())
    }

    /// Insert one validation row into every seeded table.
    ///
    /// Primary keys are `bootstrap-<table>`; required foreign keys point at
    /// the referenced table's bootstrap row, optional ones are left `NULL`.
    pub fn create_bootstrap_data(&self) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        for table in self.plan.seeded() {
            let sql = insert_sql(B::DIALECT, table);
            let values = bootstrap_row(table, &now);
            self.step(SchemaAction::Seed, table, |tx| {
                let _ = tx.execute(&sql, &values)?;
                Ok(())
            })?;
            debug!(table = table.name, "bootstrap row inserted");
        }
        info!("bootstrap data created");
        Ok(())
    }

    /// Check that every seeded table has at least one row.
    ///
    /// All tables are checked; every failure is reported in a single
    /// [`DbError::BootstrapValidation`].
    pub fn validate_bootstrap_data(&self) -> Result<()> {
        let mut failures = Vec::new();
        for table in self.plan.seeded() {
            match self.count_rows(table.name) {
                Ok(0) => failures.push(format!("{}: expected at least 1 row, found 0", table.name)),
                Ok(_) => {}
                Err(e) => failures.push(format!("{}: {e}", table.name)),
            }
        }

        if failures.is_empty() {
            info!("bootstrap data validated");
            Ok(())
        } else {
            warn!(failed = failures.len(), "bootstrap validation failed");
            Err(DbError::BootstrapValidation { failures })
        }
    }

    /// Rows in `table`.
    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", B::DIALECT.quote(table));
        self.read(|tx| tx.query_one(&sql, &[])?.integer(0))
    }

    /// Application tables present in the database, in creation order.
    pub fn existing_tables(&self) -> Result<Vec<&'static str>> {
        let present: HashSet<String> = self
            .read(|tx| tx.query(B::DIALECT.list_tables_sql(), &[]))?
            .iter()
            .map(|row| row.text(0))
            .collect::<Result<_>>()?;
        Ok(self
            .plan
            .create_order()
            .filter(|t| present.contains(t.name))
            .map(|t| t.name)
            .collect())
    }

    fn step<F>(&self, action: SchemaAction, table: &TableDef, f: F) -> Result<()>
    where
        F: FnOnce(&mut Tx<'_, B>) -> Result<()>,
    {
        self.in_tx(f).map_err(|source| DbError::Schema {
            action,
            table: table.name.to_string(),
            source: Box::new(source),
        })
    }

    fn in_tx<T, F>(&self, f: F) -> Result<T>
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

fn bootstrap_row(table: &TableDef, now: &str) -> Vec<SqlValue> {
    table
        .columns
        .iter()
        .map(|c| match c.references {
            Some(_) if c.nullable => SqlValue::Null,
            Some(target) => SqlValue::Text(format!("{BOOTSTRAP_ID_PREFIX}{target}")),
            None if c.primary_key => SqlValue::Text(format!("{BOOTSTRAP_ID_PREFIX}{}", table.name)),
            None => match c.ty {
                ColumnType::Id | ColumnType::Text => SqlValue::Text("bootstrap".to_string()),
                ColumnType::Integer => SqlValue::Integer(0),
                ColumnType::Bool => SqlValue::Bool(false),
                ColumnType::Timestamp => SqlValue::Text(now.to_string()),
                ColumnType::Json => SqlValue::Text("{}".to_string()),
            },
        })
        .collect()
}
