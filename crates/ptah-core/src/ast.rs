//! Database-agnostic DDL node tree.
//!
//! A [`StatementList`] holds the nodes produced by the fluent builder or by
//! the migration planner. Nodes are plain data: dialect renderers walk them
//! to emit SQL text, and nothing mutates a node after construction.

use serde::{Deserialize, Serialize};

use crate::model::{FkAction, Overrides};

/// A SQL data type as understood by the compiler.
///
/// Directive type strings parse into these variants; anything unrecognized
/// becomes [`DataType::Custom`] and is rejected by renderers unless a
/// per-dialect type override supplies the spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Auto-incrementing 32-bit integer key.
    Serial,
    /// Auto-incrementing 64-bit integer key.
    BigSerial,
    /// Single-precision float.
    Real,
    /// Double-precision float.
    Double,
    /// Fixed-point decimal.
    Decimal {
        /// Total digits.
        precision: Option<u16>,
        /// Digits after the point.
        scale: Option<u16>,
    },
    /// Fixed-length character string.
    Char(Option<u32>),
    /// Variable-length character string.
    Varchar(Option<u32>),
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time without timezone.
    Timestamp,
    /// Date and time with timezone.
    TimestampTz,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Raw bytes.
    Bytea,
    /// Enumerated type. Values travel with the type so dialects that have
    /// no named enum types can render them inline.
    Enum {
        /// Global enum key (`enum_<table>_<field>`).
        name: String,
        /// Ordered values.
        values: Vec<String>,
    },
    /// A type the compiler does not know. Renderers refuse these unless a
    /// platform override provides the dialect spelling.
    Custom(String),
}

impl DataType {
    /// Parses a directive type string like `VARCHAR(255)` or `DECIMAL(10,2)`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let upper = trimmed.to_ascii_uppercase();
        let (base, args) = match upper.split_once('(') {
            Some((b, rest)) => (b.trim().to_string(), Some(rest.trim_end_matches(')'))),
            None => (upper.clone(), None),
        };

        let first_u32 = |args: Option<&str>| {
            args.and_then(|a| a.split(',').next())
                .and_then(|n| n.trim().parse::<u32>().ok())
        };

        match base.as_str() {
            "SMALLINT" | "INT2" => Self::SmallInt,
            "INT" | "INTEGER" | "INT4" => Self::Integer,
            "BIGINT" | "INT8" => Self::BigInt,
            "SERIAL" => Self::Serial,
            "BIGSERIAL" => Self::BigSerial,
            "REAL" | "FLOAT" => Self::Real,
            "DOUBLE" | "DOUBLE PRECISION" => Self::Double,
            "DECIMAL" | "NUMERIC" => {
                let mut parts = args.unwrap_or("").split(',');
                let precision = parts.next().and_then(|p| p.trim().parse::<u16>().ok());
                let scale = parts.next().and_then(|s| s.trim().parse::<u16>().ok());
                Self::Decimal { precision, scale }
            }
            "CHAR" => Self::Char(first_u32(args)),
            "VARCHAR" => Self::Varchar(first_u32(args)),
            "TEXT" => Self::Text,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "TIMESTAMP" | "DATETIME" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "JSON" | "JSONB" => Self::Json,
            "UUID" => Self::Uuid,
            "BYTEA" | "BLOB" => Self::Bytea,
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    /// Returns whether this is one of the auto-incrementing key types.
    #[must_use]
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial | Self::BigSerial)
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g. `CURRENT_TIMESTAMP`).
    Expression(String),
}

impl DefaultValue {
    /// Builds a default from a literal directive value, inferring the
    /// narrowest matching variant.
    #[must_use]
    pub fn from_literal(value: &str) -> Self {
        if value.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if value.eq_ignore_ascii_case("true") {
            return Self::Boolean(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return Self::Boolean(false);
        }
        if let Ok(i) = value.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = value.parse::<f64>() {
            return Self::Float(f);
        }
        Self::String(value.to_string())
    }

    /// Returns the SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// A foreign key reference attached to a column node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Explicit constraint name.
    pub constraint_name: Option<String>,
    /// Action on delete.
    pub on_delete: Option<FkAction>,
    /// Action on update.
    pub on_update: Option<FkAction>,
}

/// A column within a `CREATE TABLE` or `ADD COLUMN` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNode {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Whether the column is nullable.
    pub nullable: bool,
    /// Whether this is a primary key column.
    pub primary_key: bool,
    /// Whether this column is unique.
    pub unique: bool,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Foreign key reference.
    pub references: Option<ForeignKeyRef>,
    /// Check constraint expression.
    pub check: Option<String>,
    /// Column comment.
    pub comment: Option<String>,
    /// Per-dialect overrides (e.g. `platform.mysql.type`).
    pub overrides: Overrides,
}

impl ColumnNode {
    /// Creates a column node with defaults matching an unconstrained column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
            references: None,
            check: None,
            comment: None,
            overrides: Overrides::default(),
        }
    }
}

/// Table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintNode {
    /// Composite primary key.
    PrimaryKey {
        /// Optional constraint name.
        name: Option<String>,
        /// Column names.
        columns: Vec<String>,
    },
    /// Composite unique constraint.
    Unique {
        /// Optional constraint name.
        name: Option<String>,
        /// Column names.
        columns: Vec<String>,
    },
    /// Foreign key constraint.
    ForeignKey {
        /// Optional constraint name.
        name: Option<String>,
        /// Columns in this table.
        columns: Vec<String>,
        /// Referenced table.
        references_table: String,
        /// Referenced columns.
        references_columns: Vec<String>,
        /// Action on delete.
        on_delete: Option<FkAction>,
        /// Action on update.
        on_update: Option<FkAction>,
    },
    /// Check constraint.
    Check {
        /// Optional constraint name.
        name: Option<String>,
        /// Check expression.
        expression: String,
    },
}

/// A `CREATE TABLE` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableNode {
    /// Table name.
    pub name: String,
    /// Column definitions, in order.
    pub columns: Vec<ColumnNode>,
    /// Table-level constraints.
    pub constraints: Vec<ConstraintNode>,
    /// Per-dialect overrides (`engine`, `charset`, `comment`, ...).
    pub overrides: Overrides,
}

impl CreateTableNode {
    /// Creates an empty table node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            overrides: Overrides::default(),
        }
    }
}

/// A `CREATE TYPE ... AS ENUM` node (PostgreSQL) or its inline equivalent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumNode {
    /// Enum name.
    pub name: String,
    /// Ordered values.
    pub values: Vec<String>,
}

/// An `ALTER TYPE`-style enum modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlterEnumNode {
    /// Enum name.
    pub name: String,
    /// Complete new value set, in order.
    pub values: Vec<String>,
    /// Values being added (subset of `values`).
    pub added: Vec<String>,
    /// Owning `(table, column)` for dialects with inline enums.
    pub owner: Option<(String, String)>,
}

/// A `CREATE INDEX` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Index name.
    pub name: String,
    /// Target table.
    pub table: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub unique: bool,
    /// Index comment.
    pub comment: Option<String>,
}

/// One alteration within an `ALTER TABLE` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlterAction {
    /// Add a column.
    AddColumn(ColumnNode),
    /// Drop a column.
    DropColumn(String),
    /// Redefine a column. Carries the full target definition plus the list
    /// of changed attributes, so PostgreSQL can emit one `ALTER COLUMN`
    /// statement per change while MySQL emits a single `MODIFY COLUMN`.
    ModifyColumn {
        /// Target column definition.
        column: ColumnNode,
        /// Changed attribute names (`type`, `nullable`, `default`).
        changes: Vec<String>,
    },
}

/// An `ALTER TABLE` node grouping alterations on one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterTableNode {
    /// Table name.
    pub table: String,
    /// Alterations, in execution order.
    pub actions: Vec<AlterAction>,
}

/// A node in the DDL tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// A free-standing SQL comment line.
    Comment(String),
    /// Create an enum type.
    CreateEnum(EnumNode),
    /// Modify an enum type.
    AlterEnum(AlterEnumNode),
    /// Create a table.
    CreateTable(CreateTableNode),
    /// Alter a table.
    AlterTable(AlterTableNode),
    /// Create an index.
    CreateIndex(IndexNode),
    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
        /// Whether to cascade dependent objects.
        cascade: bool,
    },
    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
        /// Owning table, needed by MySQL.
        table: Option<String>,
    },
    /// Drop an enum type.
    DropEnum(String),
    /// Raw SQL passed through verbatim (table `custom` directives).
    Raw(String),
}

/// An ordered list of DDL nodes.
///
/// Renders to valid SQL only if enum definitions referenced by a column
/// appear before the referencing `CREATE TABLE`; the compiler guarantees
/// that ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementList {
    /// Nodes in emission order.
    pub nodes: Vec<Node>,
}

impl StatementList {
    /// Creates an empty statement list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node.
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over the nodes in emission order.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }
}

impl<'a> IntoIterator for &'a StatementList {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parse_plain() {
        assert_eq!(DataType::parse("INTEGER"), DataType::Integer);
        assert_eq!(DataType::parse("int"), DataType::Integer);
        assert_eq!(DataType::parse("SERIAL"), DataType::Serial);
        assert_eq!(DataType::parse("text"), DataType::Text);
        assert_eq!(DataType::parse("TIMESTAMPTZ"), DataType::TimestampTz);
    }

    #[test]
    fn test_data_type_parse_parameterized() {
        assert_eq!(DataType::parse("VARCHAR(255)"), DataType::Varchar(Some(255)));
        assert_eq!(DataType::parse("char(2)"), DataType::Char(Some(2)));
        assert_eq!(
            DataType::parse("DECIMAL(10, 2)"),
            DataType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(
            DataType::parse("NUMERIC"),
            DataType::Decimal {
                precision: None,
                scale: None
            }
        );
    }

    #[test]
    fn test_data_type_parse_unknown_is_custom() {
        assert_eq!(
            DataType::parse("tsvector"),
            DataType::Custom("tsvector".to_string())
        );
    }

    #[test]
    fn test_default_value_from_literal() {
        assert_eq!(DefaultValue::from_literal("true"), DefaultValue::Boolean(true));
        assert_eq!(DefaultValue::from_literal("42"), DefaultValue::Integer(42));
        assert_eq!(DefaultValue::from_literal("3.5"), DefaultValue::Float(3.5));
        assert_eq!(DefaultValue::from_literal("NULL"), DefaultValue::Null);
        assert_eq!(
            DefaultValue::from_literal("pending"),
            DefaultValue::String("pending".to_string())
        );
    }

    #[test]
    fn test_default_value_to_sql_escapes_quotes() {
        assert_eq!(
            DefaultValue::String("it's".to_string()).to_sql(),
            "'it''s'"
        );
    }
}
