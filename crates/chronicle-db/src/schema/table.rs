//! Declarative table definitions.
//!
//! Tables are plain `'static` data. Column types are portable; each
//! [`Dialect`](crate::Dialect) maps them to concrete SQL types.

use std::fmt;

/// Portable column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Text identifier (UUID v7); also used for foreign keys.
    Id,
    /// Short text.
    Text,
    /// 64-bit integer.
    Integer,
    /// Boolean flag.
    Bool,
    /// RFC 3339 timestamp stored as text.
    Timestamp,
    /// Serialized JSON document.
    Json,
}

/// Creation group. Tables are created in ascending tier order and
/// dropped in descending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// No dependencies: change log, permissions, roles, media dimensions.
    Foundation,
    /// Users and their credentials.
    UserManagement,
    /// Routes, datatypes and media.
    CoreContent,
    /// Field definitions.
    FieldDefinitions,
    /// Content instances and their field values.
    ContentValues,
    /// Many-to-many link tables.
    Junction,
}

impl Tier {
    /// Every tier in creation order.
    pub const ALL: [Self; 6] = [
        Self::Foundation,
        Self::UserManagement,
        Self::CoreContent,
        Self::FieldDefinitions,
        Self::ContentValues,
        Self::Junction,
    ];

    /// Short name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Foundation => "foundation",
            Self::UserManagement => "user_management",
            Self::CoreContent => "core_content",
            Self::FieldDefinitions => "field_definitions",
            Self::ContentValues => "content_values",
            Self::Junction => "junction",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `drop_all_tables` treats a table that is already gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropPolicy {
    /// `DROP TABLE`; a missing table is an error.
    Strict,
    /// `DROP TABLE IF EXISTS`.
    Tolerant,
}

/// One column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Portable type.
    pub ty: ColumnType,
    /// Whether `NULL` is allowed.
    pub nullable: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Table whose `id` this column references.
    pub references: Option<&'static str>,
}

impl Column {
    /// Non-null column of type `ty`.
    #[must_use]
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            primary_key: false,
            references: None,
        }
    }

    /// The conventional `id` primary key.
    #[must_use]
    pub const fn id() -> Self {
        Self::new("id", ColumnType::Id).primary_key()
    }

    /// Foreign key to `table(id)`.
    #[must_use]
    pub const fn foreign(name: &'static str, table: &'static str) -> Self {
        Self {
            references: Some(table),
            ..Self::new(name, ColumnType::Id)
        }
    }

    /// Allow `NULL`.
    #[must_use]
    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Make part of the primary key.
    #[must_use]
    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }
}

/// A secondary index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Index {
    /// Index name, unique per database.
    pub name: &'static str,
    /// Indexed columns in order.
    pub columns: &'static [&'static str],
}

/// A table definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableDef {
    /// Table name.
    pub name: &'static str,
    /// Creation group.
    pub tier: Tier,
    /// Columns in declaration order.
    pub columns: &'static [Column],
    /// Secondary indexes.
    pub indexes: &'static [Index],
    /// Behavior when dropping a missing table.
    pub drop_policy: DropPolicy,
    /// Whether bootstrap inserts and validates a row.
    pub seeded: bool,
}

impl TableDef {
    /// Tables referenced by foreign keys, in column order, without
    /// self-references.
    pub fn dependencies(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter_map(|c| c.references)
            .filter(|t| *t != self.name)
    }

    /// Columns forming the primary key.
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().filter(|c| c.primary_key)
    }
}
