//! Schema lifecycle: table catalogue, create/drop planning, bootstrap.

mod catalog;
mod manager;
mod plan;
mod table;

pub use catalog::{CHANGE_EVENTS, TABLES};
pub use manager::{BOOTSTRAP_ID_PREFIX, SchemaManager};
pub use plan::{SchemaPlan, create_table_sql, drop_table_sql, insert_sql};
pub use table::{Column, ColumnType, DropPolicy, Index, TableDef, Tier};
