//! Introspected schema snapshots.
//!
//! These types mirror the declared model but are sourced from a live
//! database's catalog. Snapshots are read-only and rebuilt fresh on every
//! comparison; nothing caches them, because the live schema can change
//! between runs.

use serde::{Deserialize, Serialize};

/// A column as reported by the database catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbColumn {
    /// Column name.
    pub name: String,
    /// Declared type (`character varying`, `tinyint(1)`, ...).
    pub data_type: String,
    /// Underlying type name where the catalog distinguishes one
    /// (PostgreSQL `udt_name`, e.g. `int4`, `varchar`, enum type names).
    pub udt_name: Option<String>,
    /// Whether NULL values are allowed.
    pub is_nullable: bool,
    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,
    /// Whether the column carries a single-column UNIQUE constraint.
    pub is_unique: bool,
    /// Default expression, verbatim from the catalog.
    pub column_default: Option<String>,
}

impl DbColumn {
    /// The type string used for comparisons: the underlying type name when
    /// the catalog provides one, otherwise the declared type.
    #[must_use]
    pub fn comparison_type(&self) -> &str {
        self.udt_name.as_deref().unwrap_or(&self.data_type)
    }
}

/// A table as reported by the database catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbTable {
    /// Table name.
    pub name: String,
    /// Columns in ordinal position order.
    pub columns: Vec<DbColumn>,
}

impl DbTable {
    /// Gets a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&DbColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// An index as reported by the database catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbIndex {
    /// Index name.
    pub name: String,
    /// Owning table.
    pub table: String,
    /// Whether the index backs the primary key. Primary-backed indexes are
    /// excluded from independent index comparison.
    pub is_primary: bool,
    /// Whether the index is unique.
    pub is_unique: bool,
}

/// An enum type as reported by the database catalog.
///
/// For dialects without named enum types (MySQL), inline `enum(...)`
/// columns surface here under the synthetic `enum_<table>_<column>` key so
/// both sides of a comparison use the same naming scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbEnum {
    /// Enum type name.
    pub name: String,
    /// Ordered values.
    pub values: Vec<String>,
}

/// A complete snapshot of a live database's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// User tables.
    pub tables: Vec<DbTable>,
    /// Indexes across all tables.
    pub indexes: Vec<DbIndex>,
    /// Enum types.
    pub enums: Vec<DbEnum>,
}

impl SchemaSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&DbTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Gets an enum by name.
    #[must_use]
    pub fn enum_type(&self, name: &str) -> Option<&DbEnum> {
        self.enums.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_type_prefers_udt_name() {
        let col = DbColumn {
            name: "id".into(),
            data_type: "integer".into(),
            udt_name: Some("int4".into()),
            ..DbColumn::default()
        };
        assert_eq!(col.comparison_type(), "int4");

        let col = DbColumn {
            name: "id".into(),
            data_type: "int(11)".into(),
            ..DbColumn::default()
        };
        assert_eq!(col.comparison_type(), "int(11)");
    }
}
