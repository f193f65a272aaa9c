//! Declared schema model.
//!
//! These types describe the schema as declared by source directives. The
//! model is an aggregate of insertion-ordered collections, rebuilt from
//! scratch on every extraction run, and is the input to both fresh-schema
//! compilation and live-schema diffing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-dialect override values attached to a table or field.
///
/// `platform.<dialect>.<key>="value"` directive attributes land in the
/// dialect slot; the bare `engine` and `comment` keys land in the common
/// slot. A renderer consults its own dialect slot first, then the common
/// one, so overrides never leak into dialects they were not declared for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// Dialect-independent keys (`engine`, `comment`).
    pub common: BTreeMap<String, String>,
    /// Dialect name to key/value map.
    pub per_dialect: BTreeMap<String, BTreeMap<String, String>>,
}

impl Overrides {
    /// Returns whether no override values are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.per_dialect.is_empty()
    }

    /// Looks up a key for a dialect, falling back to the common slot.
    #[must_use]
    pub fn get(&self, dialect: &str, key: &str) -> Option<&str> {
        self.per_dialect
            .get(dialect)
            .and_then(|m| m.get(key))
            .or_else(|| self.common.get(key))
            .map(String::as_str)
    }

    /// Sets a dialect-scoped override value.
    pub fn set_dialect(
        &mut self,
        dialect: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.per_dialect
            .entry(dialect.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Sets a common (dialect-independent) override value.
    pub fn set_common(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.common.insert(key.into(), value.into());
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FkAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl FkAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses a directive value like `CASCADE` or `set_null`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// A foreign key reference declared on a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table name.
    pub table: String,
    /// Referenced column name.
    pub column: String,
    /// Explicit constraint name, if any.
    pub constraint_name: Option<String>,
    /// Action on delete.
    pub on_delete: Option<FkAction>,
    /// Action on update.
    pub on_update: Option<FkAction>,
}

impl ForeignKey {
    /// Parses a `table(column)` reference as written in directives.
    #[must_use]
    pub fn parse(reference: &str) -> Option<Self> {
        let (table, rest) = reference.split_once('(')?;
        let column = rest.strip_suffix(')')?;
        if table.is_empty() || column.is_empty() {
            return None;
        }
        Some(Self {
            table: table.trim().to_string(),
            column: column.trim().to_string(),
            constraint_name: None,
            on_delete: None,
            on_update: None,
        })
    }
}

/// A table declared by a `ptah:schema:table` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name in the database.
    pub name: String,
    /// Name of the Rust type the directive was attached to.
    pub source_type: String,
    /// Composite primary key columns (from `primary_key="a,b"`).
    pub primary_key: Vec<String>,
    /// Table-level check expressions.
    pub checks: Vec<String>,
    /// Raw SQL appended after the table definition.
    pub custom_sql: Option<String>,
    /// Per-dialect overrides (`engine`, `comment`, `platform.*`).
    pub overrides: Overrides,
}

impl Table {
    /// Creates a table declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            primary_key: Vec::new(),
            checks: Vec::new(),
            custom_sql: None,
            overrides: Overrides::default(),
        }
    }

    /// Returns the table comment, if one was declared.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.overrides.common.get("comment").map(String::as_str)
    }
}

/// A column declared by a `ptah:schema:field` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Name of the Rust type the field was declared on.
    pub owner_type: String,
    /// Column name.
    pub name: String,
    /// Declared SQL type, verbatim (`SERIAL`, `VARCHAR(255)`, `ENUM`, ...).
    pub sql_type: String,
    /// Whether NULL values are allowed.
    pub nullable: bool,
    /// Whether this column is the primary key.
    pub primary_key: bool,
    /// Whether this column carries a UNIQUE constraint.
    pub unique: bool,
    /// Unique index expression (from `unique_expr`).
    pub unique_expr: Option<String>,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Literal default value.
    pub default: Option<String>,
    /// SQL expression default (e.g. `now()`).
    pub default_expr: Option<String>,
    /// Foreign key reference, if any.
    pub foreign_key: Option<ForeignKey>,
    /// Enum values for `type="ENUM"` fields.
    pub enum_values: Vec<String>,
    /// Check constraint expression.
    pub check: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
    /// Per-dialect overrides.
    pub overrides: Overrides,
}

impl Field {
    /// Creates a field with the given owner, name and SQL type.
    #[must_use]
    pub fn new(
        owner_type: impl Into<String>,
        name: impl Into<String>,
        sql_type: impl Into<String>,
    ) -> Self {
        Self {
            owner_type: owner_type.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
            unique: false,
            unique_expr: None,
            auto_increment: false,
            default: None,
            default_expr: None,
            foreign_key: None,
            enum_values: Vec::new(),
            check: None,
            comment: None,
            overrides: Overrides::default(),
        }
    }

    /// Returns whether the field declares an enum column.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.sql_type.eq_ignore_ascii_case("ENUM")
    }

    /// Returns the global enum key for this field within the given table.
    ///
    /// Keys follow the `enum_<table>_<field>` convention and must be unique
    /// across the whole model.
    #[must_use]
    pub fn enum_key(&self, table: &str) -> String {
        format!("enum_{}_{}", table, self.name)
    }
}

/// An index declared by a `ptah:schema:index` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Target table.
    pub table: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub unique: bool,
    /// Index comment.
    pub comment: Option<String>,
}

/// A global enum definition, synthesized from `type="ENUM"` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Enum key (`enum_<table>_<field>`).
    pub name: String,
    /// Ordered enum values.
    pub values: Vec<String>,
}

/// How an embedded type's fields fold into the owning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedMode {
    /// Target type's fields are inlined into the owner, optionally prefixed.
    Inline,
    /// Target type is stored as a single JSON column.
    Json,
    /// Target type is referenced through a foreign key column.
    Relation,
}

impl EmbedMode {
    /// Parses a directive `mode` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inline" => Some(Self::Inline),
            "json" => Some(Self::Json),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }
}

/// An embedded-field declaration (`ptah:embedded` directive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedField {
    /// Name of the Rust type the embed was declared on.
    pub owner_type: String,
    /// Name of the embedded Rust type (taken from the field's type).
    pub target_type: String,
    /// Folding mode.
    pub mode: EmbedMode,
    /// Column name prefix for inline mode.
    pub prefix: Option<String>,
    /// Column name for json/relation modes.
    pub name: Option<String>,
    /// Column SQL type override.
    pub sql_type: Option<String>,
    /// Whether the generated column is nullable.
    pub nullable: bool,
    /// Whether to index the generated column.
    pub indexed: bool,
    /// Foreign key column name for relation mode (`field="user_id"`).
    pub field: Option<String>,
    /// Referenced `table(column)` for relation mode.
    pub reference: Option<String>,
    /// Action on delete for relation mode.
    pub on_delete: Option<FkAction>,
    /// Action on update for relation mode.
    pub on_update: Option<FkAction>,
    /// Column comment.
    pub comment: Option<String>,
}

/// The complete declared schema.
///
/// Collections keep directive discovery order; `dependencies` maps a table
/// name to the tables its foreign keys point at and drives topological
/// ordering during compilation and planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    /// Declared tables.
    pub tables: Vec<Table>,
    /// Declared fields, linked to tables via `owner_type`.
    pub fields: Vec<Field>,
    /// Declared indexes.
    pub indexes: Vec<Index>,
    /// Global enum definitions, deduplicated and sorted by key.
    pub enums: Vec<EnumDef>,
    /// Embedded-field declarations (consumed during assembly).
    pub embeds: Vec<EmbeddedField>,
    /// Table name to referenced table names.
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl Database {
    /// Creates an empty declared schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a table by database name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Gets a table by the Rust type it was declared on.
    #[must_use]
    pub fn table_by_source(&self, source_type: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.source_type == source_type)
    }

    /// Returns the fields belonging to a table, in declaration order.
    pub fn fields_of<'a>(&'a self, table: &'a Table) -> impl Iterator<Item = &'a Field> {
        self.fields
            .iter()
            .filter(move |f| f.owner_type == table.source_type)
    }

    /// Gets an enum definition by key.
    #[must_use]
    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Records a foreign key dependency edge.
    pub fn add_dependency(&mut self, from_table: impl Into<String>, to_table: impl Into<String>) {
        let to = to_table.into();
        let deps = self.dependencies.entry(from_table.into()).or_default();
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// Returns tables ordered so that every table appears after the tables
    /// its foreign keys reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DependencyCycle`] if the foreign key graph is cyclic.
    pub fn tables_in_dependency_order(&self) -> Result<Vec<&Table>> {
        let names: Vec<&str> = self.tables.iter().map(|t| t.name.as_str()).collect();
        let order = topo_sort(&names, &self.dependencies)?;
        Ok(order
            .into_iter()
            .filter_map(|name| self.table(name))
            .collect())
    }

    /// Validates model invariants, collecting every violation.
    ///
    /// Checked: every field's owner type resolves to a declared table,
    /// table names are unique, and enum keys are unique.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Multiple`] wrapping one error per violation.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let mut seen_tables = std::collections::BTreeSet::new();
        for table in &self.tables {
            if !seen_tables.insert(table.name.as_str()) {
                errors.push(Error::DuplicateTable(table.name.clone()));
            }
        }

        for field in &self.fields {
            if self.table_by_source(&field.owner_type).is_none() {
                errors.push(Error::UnknownOwner {
                    owner: field.owner_type.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let mut seen_enums = std::collections::BTreeSet::new();
        for def in &self.enums {
            if !seen_enums.insert(def.name.as_str()) {
                errors.push(Error::DuplicateEnum(def.name.clone()));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

/// Kahn's algorithm over the dependency map, with sorted tie-breaking so
/// the order is deterministic.
fn topo_sort<'a>(
    names: &[&'a str],
    dependencies: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<&'a str>> {
    let in_set: std::collections::BTreeSet<&str> = names.iter().copied().collect();
    let mut remaining: Vec<&str> = names.to_vec();
    let mut placed: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    let mut order = Vec::with_capacity(names.len());

    while !remaining.is_empty() {
        let mut ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|name| {
                dependencies.get(*name).is_none_or(|deps| {
                    deps.iter()
                        .all(|d| placed.contains(d.as_str()) || !in_set.contains(d.as_str()))
                })
            })
            .collect();

        if ready.is_empty() {
            let mut cycle: Vec<String> = remaining.iter().map(ToString::to_string).collect();
            cycle.sort();
            return Err(Error::DependencyCycle(cycle));
        }

        ready.sort_unstable();
        for name in &ready {
            placed.insert(*name);
            order.push(*name);
        }
        remaining.retain(|name| !placed.contains(name));
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_orders_model() -> Database {
        let mut db = Database::new();
        db.tables.push(Table::new("users", "User"));
        db.tables.push(Table::new("orders", "Order"));
        db.fields.push(Field::new("User", "id", "SERIAL"));
        let mut fk_field = Field::new("Order", "user_id", "INTEGER");
        fk_field.foreign_key = ForeignKey::parse("users(id)");
        db.fields.push(fk_field);
        db.add_dependency("orders", "users");
        db
    }

    #[test]
    fn test_foreign_key_parse() {
        let fk = ForeignKey::parse("users(id)").unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.column, "id");

        assert!(ForeignKey::parse("users").is_none());
        assert!(ForeignKey::parse("users()").is_none());
    }

    #[test]
    fn test_fk_action_parse() {
        assert_eq!(FkAction::parse("CASCADE"), Some(FkAction::Cascade));
        assert_eq!(FkAction::parse("set_null"), Some(FkAction::SetNull));
        assert_eq!(FkAction::parse("nonsense"), None);
    }

    #[test]
    fn test_overrides_lookup_precedence() {
        let mut o = Overrides::default();
        o.set_common("comment", "shared");
        o.set_dialect("mysql", "comment", "mysql only");

        assert_eq!(o.get("mysql", "comment"), Some("mysql only"));
        assert_eq!(o.get("postgres", "comment"), Some("shared"));
        assert_eq!(o.get("postgres", "engine"), None);
    }

    #[test]
    fn test_dependency_order() {
        let db = users_orders_model();
        let order = db.tables_in_dependency_order().unwrap();
        let names: Vec<&str> = order.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
    }

    #[test]
    fn test_dependency_cycle_detected() {
        let mut db = users_orders_model();
        db.add_dependency("users", "orders");
        assert!(matches!(
            db.tables_in_dependency_order(),
            Err(Error::DependencyCycle(_))
        ));
    }

    #[test]
    fn test_dependency_on_external_table_is_ignored() {
        let mut db = users_orders_model();
        // Edge to a table that is not part of the model (e.g. pre-existing).
        db.add_dependency("users", "legacy_accounts");
        assert!(db.tables_in_dependency_order().is_ok());
    }

    #[test]
    fn test_validate_unknown_owner() {
        let mut db = users_orders_model();
        db.fields.push(Field::new("Ghost", "x", "TEXT"));
        assert!(matches!(
            db.validate(),
            Err(Error::UnknownOwner { owner, .. }) if owner == "Ghost"
        ));
    }

    #[test]
    fn test_validate_duplicate_enum() {
        let mut db = users_orders_model();
        db.enums.push(EnumDef {
            name: "enum_users_status".into(),
            values: vec!["a".into()],
        });
        db.enums.push(EnumDef {
            name: "enum_users_status".into(),
            values: vec!["b".into()],
        });
        assert!(matches!(db.validate(), Err(Error::DuplicateEnum(_))));
    }

    #[test]
    fn test_enum_key() {
        let field = Field::new("User", "status", "ENUM");
        assert!(field.is_enum());
        assert_eq!(field.enum_key("users"), "enum_users_status");
    }
}
