//! Create/drop ordering and DDL rendering.
//!
//! [`SchemaPlan::build`] orders tables so every foreign key points at a
//! table created earlier. Ties are broken by tier, then declaration order.
//! The drop order is the create order reversed.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::catalog::TABLES;
use super::table::{DropPolicy, TableDef};
use crate::dialect::Dialect;
use crate::errors::{DbError, Result};

/// Validated create order for a set of tables.
#[derive(Clone, Debug)]
pub struct SchemaPlan {
    order: Vec<TableDef>,
}

impl SchemaPlan {
    /// Plan for the application catalogue.
    pub fn catalog() -> Result<Self> {
        Self::build(TABLES)
    }

    /// Order `tables` for creation.
    ///
    /// Fails on duplicate names, references to undeclared tables,
    /// references into a later tier, seeded tables that require a row in
    /// an unseeded table, and dependency cycles.
    pub fn build(tables: &[TableDef]) -> Result<Self> {
        let mut index = HashMap::with_capacity(tables.len());
        for (i, table) in tables.iter().enumerate() {
            if index.insert(table.name, i).is_some() {
                return Err(DbError::SchemaPlan(format!("duplicate table {}", table.name)));
            }
        }

        let mut pending = vec![0usize; tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
        for (i, table) in tables.iter().enumerate() {
            let mut seen = Vec::new();
            for dep in table.dependencies() {
                let Some(&d) = index.get(dep) else {
                    return Err(DbError::SchemaPlan(format!(
                        "{} references unknown table {dep}",
                        table.name
                    )));
                };
                let target = &tables[d];
                if target.tier > table.tier {
                    return Err(DbError::SchemaPlan(format!(
                        "{} ({}) references later-tier table {dep} ({})",
                        table.name, table.tier, target.tier
                    )));
                }
                if seen.contains(&d) {
                    continue;
                }
                seen.push(d);
                pending[i] += 1;
                dependents[d].push(i);
            }
            check_seedable(table, tables, &index)?;
        }

        let mut ready: BinaryHeap<_> = (0..tables.len())
            .filter(|&i| pending[i] == 0)
            .map(|i| Reverse((tables[i].tier, i)))
            .collect();
        let mut order = Vec::with_capacity(tables.len());
        while let Some(Reverse((_, i))) = ready.pop() {
            order.push(tables[i]);
            for &j in &dependents[i] {
                pending[j] -= 1;
                if pending[j] == 0 {
                    ready.push(Reverse((tables[j].tier, j)));
                }
            }
        }

        if order.len() < tables.len() {
            let stuck: Vec<_> = tables
                .iter()
                .enumerate()
                .filter(|(i, _)| pending[*i] > 0)
                .map(|(_, t)| t.name)
                .collect();
            return Err(DbError::SchemaPlan(format!(
                "dependency cycle among {}",
                stuck.join(", ")
            )));
        }
        Ok(Self { order })
    }

    /// Tables in creation order.
    pub fn create_order(&self) -> impl DoubleEndedIterator<Item = &TableDef> {
        self.order.iter()
    }

    /// Tables in drop order (reverse of creation).
    pub fn drop_order(&self) -> impl Iterator<Item = &TableDef> {
        self.order.iter().rev()
    }

    /// Seeded tables in creation order.
    pub fn seeded(&self) -> impl Iterator<Item = &TableDef> {
        self.order.iter().filter(|t| t.seeded)
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.order.iter().find(|t| t.name == name)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn check_seedable(
    table: &TableDef,
    tables: &[TableDef],
    index: &HashMap<&'static str, usize>,
) -> Result<()> {
    if !table.seeded {
        return Ok(());
    }
    for column in table.columns.iter().filter(|c| !c.nullable) {
        let Some(dep) = column.references else { continue };
        let seeded = index.get(dep).is_some_and(|&d| tables[d].seeded);
        if !seeded {
            return Err(DbError::SchemaPlan(format!(
                "seeded table {} requires a row in unseeded table {dep}",
                table.name
            )));
        }
    }
    Ok(())
}

/// `CREATE TABLE` plus any standalone `CREATE INDEX` statements.
pub fn create_table_sql(dialect: Dialect, table: &TableDef) -> Vec<String> {
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("{} {}{null}", dialect.quote(c.name), dialect.column_type(c.ty))
        })
        .collect();

    let pk: Vec<_> = table.primary_key().map(|c| dialect.quote(c.name)).collect();
    if !pk.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }
    for column in table.columns {
        if let Some(target) = column.references {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                dialect.quote(column.name),
                dialect.quote(target),
                dialect.quote("id")
            ));
        }
    }
    if dialect.inline_indexes() {
        for idx in table.indexes {
            let cols: Vec<_> = idx.columns.iter().map(|c| dialect.quote(c)).collect();
            parts.push(format!("INDEX {} ({})", dialect.quote(idx.name), cols.join(", ")));
        }
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({}){}",
        dialect.quote(table.name),
        parts.join(", "),
        dialect.table_options()
    )];
    if !dialect.inline_indexes() {
        statements.extend(
            table
                .indexes
                .iter()
                .map(|idx| dialect.create_index(idx.name, table.name, idx.columns)),
        );
    }
    statements
}

/// `DROP TABLE` honoring the table's drop policy.
pub fn drop_table_sql(dialect: Dialect, table: &TableDef) -> String {
    dialect.drop_table(table.name, table.drop_policy == DropPolicy::Tolerant)
}

/// `INSERT` binding every column positionally.
pub fn insert_sql(dialect: Dialect, table: &TableDef) -> String {
    let cols: Vec<_> = table.columns.iter().map(|c| dialect.quote(c.name)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote(table.name),
        cols.join(", "),
        dialect.placeholders(cols.len())
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
