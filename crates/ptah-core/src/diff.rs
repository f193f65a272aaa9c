//! Structural comparison of a declared schema against a live snapshot.
//!
//! The differ builds name-keyed maps on both sides at each level (tables,
//! columns, enums, indexes), computes set differences for additions and
//! removals, and compares attributes through the shared normalization in
//! [`crate::normalize`] for modifications. Output collections are sorted so
//! two runs over the same inputs produce byte-identical, diffable results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::model::{Database, Field, Table};
use crate::normalize;
use crate::snapshot::{DbColumn, DbTable, SchemaSnapshot};

/// Attribute-level changes for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// Column name.
    pub column: String,
    /// Changed attribute to `"old -> new"` description, where `old` is the
    /// live value and `new` the declared one. Attributes: `type`,
    /// `nullable`, `primary_key`, `unique`, `default`.
    pub changes: BTreeMap<String, String>,
}

/// Column-level changes for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    /// Table name.
    pub table: String,
    /// Columns present in the declared schema but not live.
    pub columns_added: Vec<String>,
    /// Columns present live but no longer declared.
    pub columns_removed: Vec<String>,
    /// Columns present on both sides with attribute changes.
    pub columns_modified: Vec<ColumnDiff>,
}

impl TableDiff {
    /// Returns whether this table diff records any change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.columns_added.is_empty()
            || !self.columns_removed.is_empty()
            || !self.columns_modified.is_empty()
    }
}

/// Value-level changes for one enum type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDiff {
    /// Enum name.
    pub name: String,
    /// Values declared but not live.
    pub values_added: Vec<String>,
    /// Values live but no longer declared.
    pub values_removed: Vec<String>,
}

/// The full structural difference between declared and live schemas.
///
/// Empty collections across the board signal schema equivalence;
/// [`SchemaDiff::has_changes`] is `true` iff any collection is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Tables declared but not live.
    pub tables_added: Vec<String>,
    /// Tables live but no longer declared.
    pub tables_removed: Vec<String>,
    /// Tables on both sides with column changes.
    pub tables_modified: Vec<TableDiff>,
    /// Enums declared but not live.
    pub enums_added: Vec<String>,
    /// Enums live but no longer declared.
    pub enums_removed: Vec<String>,
    /// Enums on both sides with value changes.
    pub enums_modified: Vec<EnumDiff>,
    /// Indexes declared but not live.
    pub indexes_added: Vec<String>,
    /// Indexes live but no longer declared.
    pub indexes_removed: Vec<String>,
}

impl SchemaDiff {
    /// Returns whether any difference was detected.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.tables_added.is_empty()
            || !self.tables_removed.is_empty()
            || !self.tables_modified.is_empty()
            || !self.enums_added.is_empty()
            || !self.enums_removed.is_empty()
            || !self.enums_modified.is_empty()
            || !self.indexes_added.is_empty()
            || !self.indexes_removed.is_empty()
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes() {
            return writeln!(f, "schemas are equivalent");
        }
        for name in &self.tables_added {
            writeln!(f, "+ table {name}")?;
        }
        for name in &self.tables_removed {
            writeln!(f, "- table {name}")?;
        }
        for table in &self.tables_modified {
            writeln!(f, "~ table {}", table.table)?;
            for col in &table.columns_added {
                writeln!(f, "  + column {col}")?;
            }
            for col in &table.columns_removed {
                writeln!(f, "  - column {col}")?;
            }
            for col in &table.columns_modified {
                for (attr, change) in &col.changes {
                    writeln!(f, "  ~ column {} {attr}: {change}", col.column)?;
                }
            }
        }
        for name in &self.enums_added {
            writeln!(f, "+ enum {name}")?;
        }
        for name in &self.enums_removed {
            writeln!(f, "- enum {name}")?;
        }
        for e in &self.enums_modified {
            writeln!(
                f,
                "~ enum {} (+{} -{})",
                e.name,
                e.values_added.join(","),
                e.values_removed.join(",")
            )?;
        }
        for name in &self.indexes_added {
            writeln!(f, "+ index {name}")?;
        }
        for name in &self.indexes_removed {
            writeln!(f, "- index {name}")?;
        }
        Ok(())
    }
}

/// Compares the declared schema against a live snapshot.
#[must_use]
pub fn compare_schemas(declared: &Database, live: &SchemaSnapshot, dialect: Dialect) -> SchemaDiff {
    let mut diff = SchemaDiff::default();

    let declared_tables: BTreeMap<&str, &Table> = declared
        .tables
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect();
    let live_tables: BTreeMap<&str, &DbTable> =
        live.tables.iter().map(|t| (t.name.as_str(), t)).collect();

    for (&name, table) in &declared_tables {
        if let Some(db_table) = live_tables.get(name) {
            let table_diff = diff_table(declared, table, db_table, dialect);
            if table_diff.has_changes() {
                diff.tables_modified.push(table_diff);
            }
        } else {
            diff.tables_added.push(name.to_string());
        }
    }
    for &name in live_tables.keys() {
        if !declared_tables.contains_key(name) {
            diff.tables_removed.push(name.to_string());
        }
    }

    diff_enums(declared, live, &mut diff);
    diff_indexes(declared, live, &mut diff);

    diff.tables_added.sort();
    diff.tables_removed.sort();
    diff.tables_modified.sort_by(|a, b| a.table.cmp(&b.table));
    diff
}

fn diff_table(declared: &Database, table: &Table, live: &DbTable, dialect: Dialect) -> TableDiff {
    let mut out = TableDiff {
        table: table.name.clone(),
        ..TableDiff::default()
    };

    let declared_cols: BTreeMap<&str, &Field> = declared
        .fields_of(table)
        .map(|f| (f.name.as_str(), f))
        .collect();
    let live_cols: BTreeMap<&str, &DbColumn> =
        live.columns.iter().map(|c| (c.name.as_str(), c)).collect();

    for (&name, field) in &declared_cols {
        match live_cols.get(name) {
            Some(col) => {
                let changes = diff_column(table, field, col, dialect);
                if !changes.is_empty() {
                    out.columns_modified.push(ColumnDiff {
                        column: name.to_string(),
                        changes,
                    });
                }
            }
            None => out.columns_added.push(name.to_string()),
        }
    }
    for &name in live_cols.keys() {
        if !declared_cols.contains_key(name) {
            out.columns_removed.push(name.to_string());
        }
    }

    out.columns_added.sort();
    out.columns_removed.sort();
    out.columns_modified.sort_by(|a, b| a.column.cmp(&b.column));
    out
}

/// Attribute-by-attribute comparison of one column, normalize-then-compare.
fn diff_column(
    table: &Table,
    field: &Field,
    col: &DbColumn,
    dialect: Dialect,
) -> BTreeMap<String, String> {
    let mut changes = BTreeMap::new();

    let declared_type_raw = field
        .overrides
        .get(dialect.as_str(), "type")
        .unwrap_or(&field.sql_type);
    let declared_type = normalize::sql_type_for(declared_type_raw, dialect);
    let live_type = normalize::sql_type_for(col.comparison_type(), dialect);
    if declared_type != live_type {
        changes.insert("type".to_string(), format!("{live_type} -> {declared_type}"));
    }

    let declared_nullable = field.nullable && !field.primary_key;
    if declared_nullable != col.is_nullable {
        changes.insert(
            "nullable".to_string(),
            format!("{} -> {declared_nullable}", col.is_nullable),
        );
    }

    let declared_primary = field.primary_key || table.primary_key.contains(&field.name);
    if declared_primary != col.is_primary_key {
        changes.insert(
            "primary_key".to_string(),
            format!("{} -> {declared_primary}", col.is_primary_key),
        );
    }

    // Primary keys are implicitly unique; comparing the flag there only
    // produces noise.
    if !declared_primary && field.unique != col.is_unique {
        changes.insert(
            "unique".to_string(),
            format!("{} -> {}", col.is_unique, field.unique),
        );
    }

    let is_boolean = declared_type == "boolean" || live_type == "boolean";
    let declared_default = if field.auto_increment || field.sql_type.to_ascii_lowercase().contains("serial") {
        None
    } else {
        normalize::default_value(
            field.default.as_deref().or(field.default_expr.as_deref()),
            is_boolean,
        )
    };
    let live_default = normalize::default_value(col.column_default.as_deref(), is_boolean);
    if declared_default != live_default {
        changes.insert(
            "default".to_string(),
            format!(
                "{} -> {}",
                live_default.as_deref().unwrap_or("<none>"),
                declared_default.as_deref().unwrap_or("<none>")
            ),
        );
    }

    changes
}

fn diff_enums(declared: &Database, live: &SchemaSnapshot, diff: &mut SchemaDiff) {
    let live_enums: BTreeMap<&str, &crate::snapshot::DbEnum> =
        live.enums.iter().map(|e| (e.name.as_str(), e)).collect();
    let declared_enums: BTreeMap<&str, &crate::model::EnumDef> =
        declared.enums.iter().map(|e| (e.name.as_str(), e)).collect();

    for (&name, def) in &declared_enums {
        match live_enums.get(name) {
            Some(db_enum) => {
                let added: Vec<String> = def
                    .values
                    .iter()
                    .filter(|v| !db_enum.values.contains(v))
                    .cloned()
                    .collect();
                let removed: Vec<String> = db_enum
                    .values
                    .iter()
                    .filter(|v| !def.values.contains(v))
                    .cloned()
                    .collect();
                if !added.is_empty() || !removed.is_empty() {
                    diff.enums_modified.push(EnumDiff {
                        name: name.to_string(),
                        values_added: added,
                        values_removed: removed,
                    });
                }
            }
            None => diff.enums_added.push(name.to_string()),
        }
    }
    for &name in live_enums.keys() {
        if !declared_enums.contains_key(name) {
            diff.enums_removed.push(name.to_string());
        }
    }

    diff.enums_added.sort();
    diff.enums_removed.sort();
    diff.enums_modified.sort_by(|a, b| a.name.cmp(&b.name));
}

fn diff_indexes(declared: &Database, live: &SchemaSnapshot, diff: &mut SchemaDiff) {
    let declared_names: std::collections::BTreeSet<&str> =
        declared.indexes.iter().map(|i| i.name.as_str()).collect();
    // Primary-key-backed indexes are managed with the table itself and are
    // excluded from independent comparison.
    let live_names: std::collections::BTreeSet<&str> = live
        .indexes
        .iter()
        .filter(|i| !i.is_primary)
        .map(|i| i.name.as_str())
        .collect();

    diff.indexes_added = declared_names
        .difference(&live_names)
        .map(ToString::to_string)
        .collect();
    diff.indexes_removed = live_names
        .difference(&declared_names)
        .map(ToString::to_string)
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnumDef;
    use crate::snapshot::{DbEnum, DbIndex};

    fn declared_users() -> Database {
        let mut db = Database::new();
        db.tables.push(Table::new("users", "User"));

        let mut id = Field::new("User", "id", "SERIAL");
        id.primary_key = true;
        id.nullable = false;
        id.auto_increment = true;
        db.fields.push(id);

        let mut email = Field::new("User", "email", "VARCHAR(255)");
        email.nullable = false;
        email.unique = true;
        db.fields.push(email);

        db
    }

    /// A snapshot spelled the way PostgreSQL introspection reports the
    /// schema that `declared_users` would create.
    fn live_users() -> SchemaSnapshot {
        SchemaSnapshot {
            tables: vec![DbTable {
                name: "users".into(),
                columns: vec![
                    DbColumn {
                        name: "id".into(),
                        data_type: "integer".into(),
                        udt_name: Some("int4".into()),
                        is_nullable: false,
                        is_primary_key: true,
                        is_unique: false,
                        column_default: Some("nextval('users_id_seq'::regclass)".into()),
                    },
                    DbColumn {
                        name: "email".into(),
                        data_type: "character varying".into(),
                        udt_name: Some("varchar".into()),
                        is_nullable: false,
                        is_primary_key: false,
                        is_unique: true,
                        column_default: None,
                    },
                ],
            }],
            indexes: vec![DbIndex {
                name: "users_pkey".into(),
                table: "users".into(),
                is_primary: true,
                is_unique: true,
            }],
            enums: vec![],
        }
    }

    #[test]
    fn test_equivalent_schemas_have_no_changes() {
        let diff = compare_schemas(&declared_users(), &live_users(), Dialect::Postgres);
        assert!(!diff.has_changes(), "unexpected diff: {diff}");
    }

    #[test]
    fn test_table_added() {
        let mut db = declared_users();
        db.tables.push(Table::new("orders", "Order"));
        db.fields.push(Field::new("Order", "id", "SERIAL"));

        let diff = compare_schemas(&db, &live_users(), Dialect::Postgres);
        assert_eq!(diff.tables_added, vec!["orders"]);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_table_removed() {
        let mut live = live_users();
        live.tables.push(DbTable {
            name: "legacy".into(),
            columns: vec![],
        });

        let diff = compare_schemas(&declared_users(), &live, Dialect::Postgres);
        assert_eq!(diff.tables_removed, vec!["legacy"]);
    }

    #[test]
    fn test_column_type_change() {
        let mut db = declared_users();
        let mut price = Field::new("User", "price", "DECIMAL");
        price.nullable = true;
        db.fields.push(price);

        let mut live = live_users();
        live.tables[0].columns.push(DbColumn {
            name: "price".into(),
            data_type: "character varying".into(),
            udt_name: Some("varchar".into()),
            is_nullable: true,
            ..DbColumn::default()
        });

        let diff = compare_schemas(&db, &live, Dialect::Postgres);
        let table = &diff.tables_modified[0];
        let col = &table.columns_modified[0];
        assert_eq!(col.column, "price");
        assert_eq!(col.changes.get("type").unwrap(), "varchar -> decimal");
    }

    #[test]
    fn test_enum_added() {
        let mut db = declared_users();
        db.enums.push(EnumDef {
            name: "status".into(),
            values: vec!["active".into(), "inactive".into()],
        });

        let diff = compare_schemas(&db, &live_users(), Dialect::Postgres);
        assert_eq!(diff.enums_added, vec!["status"]);
    }

    #[test]
    fn test_enum_value_changes() {
        let mut db = declared_users();
        db.enums.push(EnumDef {
            name: "enum_users_status".into(),
            values: vec!["active".into(), "banned".into()],
        });
        let mut live = live_users();
        live.enums.push(DbEnum {
            name: "enum_users_status".into(),
            values: vec!["active".into(), "inactive".into()],
        });

        let diff = compare_schemas(&db, &live, Dialect::Postgres);
        let e = &diff.enums_modified[0];
        assert_eq!(e.values_added, vec!["banned"]);
        assert_eq!(e.values_removed, vec!["inactive"]);
    }

    #[test]
    fn test_default_value_equivalences() {
        let mut db = declared_users();
        let mut active = Field::new("User", "active", "BOOLEAN");
        active.nullable = false;
        active.default = Some("true".into());
        db.fields.push(active);

        let mut live = live_users();
        // MySQL-style introspection of the same column.
        live.tables[0].columns.push(DbColumn {
            name: "active".into(),
            data_type: "tinyint(1)".into(),
            is_nullable: false,
            column_default: Some("1".into()),
            ..DbColumn::default()
        });

        let diff = compare_schemas(&db, &live, Dialect::MySql);
        assert!(!diff.has_changes(), "unexpected diff: {diff}");
    }

    #[test]
    fn test_primary_backed_index_excluded() {
        let mut live = live_users();
        live.indexes.push(DbIndex {
            name: "idx_users_email".into(),
            table: "users".into(),
            is_primary: false,
            is_unique: true,
        });

        let diff = compare_schemas(&declared_users(), &live, Dialect::Postgres);
        // users_pkey is primary-backed and must not be reported.
        assert_eq!(diff.indexes_removed, vec!["idx_users_email"]);
    }

    #[test]
    fn test_nullable_change() {
        let mut db = declared_users();
        let Some(email) = db.fields.iter_mut().find(|f| f.name == "email") else {
            panic!("email field");
        };
        email.nullable = true;

        let diff = compare_schemas(&db, &live_users(), Dialect::Postgres);
        let col = &diff.tables_modified[0].columns_modified[0];
        assert_eq!(col.changes.get("nullable").unwrap(), "false -> true");
    }
}
