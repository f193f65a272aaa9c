//! PostgreSQL renderer.

use crate::ast::{AlterEnumNode, ColumnNode, CreateTableNode, DataType, EnumNode};
use crate::error::Result;

use super::{quote_values, unmapped, Dialect, DialectRenderer};

/// PostgreSQL DDL renderer.
///
/// Enums become `CREATE TYPE ... AS ENUM` statements emitted before the
/// owning table; auto-incrementing integer keys become `SERIAL`/`BIGSERIAL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRenderer;

impl PostgresRenderer {
    /// Creates a new PostgreSQL renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectRenderer for PostgresRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn marker(&self) -> &'static str {
        "POSTGRES"
    }

    fn map_data_type(&self, dt: &DataType) -> Result<String> {
        Ok(match dt {
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Integer => "INTEGER".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Serial => "SERIAL".to_string(),
            DataType::BigSerial => "BIGSERIAL".to_string(),
            DataType::Real => "REAL".to_string(),
            DataType::Double => "DOUBLE PRECISION".to_string(),
            DataType::Decimal { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("DECIMAL({p}, {s})"),
                (Some(p), None) => format!("DECIMAL({p})"),
                _ => "DECIMAL".to_string(),
            },
            DataType::Char(len) => match len {
                Some(n) => format!("CHAR({n})"),
                None => "CHAR".to_string(),
            },
            DataType::Varchar(len) => match len {
                Some(n) => format!("VARCHAR({n})"),
                None => "VARCHAR".to_string(),
            },
            DataType::Text => "TEXT".to_string(),
            DataType::Boolean => "BOOLEAN".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::TimestampTz => "TIMESTAMPTZ".to_string(),
            DataType::Json => "JSONB".to_string(),
            DataType::Uuid => "UUID".to_string(),
            DataType::Bytea => "BYTEA".to_string(),
            // The enum's own type name; the CREATE TYPE statement precedes
            // the table in emission order.
            DataType::Enum { name, .. } => name.clone(),
            DataType::Custom(name) => return Err(unmapped(name.clone(), Dialect::Postgres)),
        })
    }

    fn column_type(&self, col: &ColumnNode) -> Result<String> {
        if let Some(overridden) = col.overrides.get(self.dialect().as_str(), "type") {
            return Ok(overridden.to_string());
        }
        // Auto-incrementing integer keys use the SERIAL pseudo-types.
        if col.auto_increment {
            match col.data_type {
                DataType::Integer | DataType::SmallInt => return Ok("SERIAL".to_string()),
                DataType::BigInt => return Ok("BIGSERIAL".to_string()),
                _ => {}
            }
        }
        self.map_data_type(&col.data_type)
    }

    fn create_enum(&self, node: &EnumNode) -> Result<Option<String>> {
        Ok(Some(format!(
            "CREATE TYPE {} AS ENUM ({});",
            node.name,
            quote_values(&node.values)
        )))
    }

    fn alter_enum(&self, node: &AlterEnumNode) -> Result<Option<String>> {
        if node.added.is_empty() {
            return Ok(None);
        }
        let statements: Vec<String> = node
            .added
            .iter()
            .map(|v| {
                format!(
                    "ALTER TYPE {} ADD VALUE '{}';",
                    node.name,
                    v.replace('\'', "''")
                )
            })
            .collect();
        Ok(Some(statements.join("\n")))
    }

    fn drop_enum(&self, name: &str) -> Option<String> {
        Some(format!("DROP TYPE IF EXISTS {name};"))
    }

    fn post_table_statements(&self, node: &CreateTableNode) -> Vec<String> {
        // Engine/charset are MySQL concerns; table comments become a
        // separate COMMENT ON statement here.
        node.overrides
            .get(self.dialect().as_str(), "comment")
            .map(|comment| {
                format!(
                    "COMMENT ON TABLE {} IS '{}';",
                    self.quote_identifier(&node.name),
                    comment.replace('\'', "''")
                )
            })
            .into_iter()
            .collect()
    }

    fn modify_column(
        &self,
        table: &str,
        column: &ColumnNode,
        changes: &[String],
    ) -> Result<Vec<String>> {
        let table_ident = self.quote_identifier(table);
        let column_ident = self.quote_identifier(&column.name);
        let mut statements = Vec::with_capacity(changes.len());

        for change in changes {
            match change.as_str() {
                "type" => statements.push(format!(
                    "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} TYPE {};",
                    self.column_type(column)?
                )),
                "nullable" => {
                    if column.nullable {
                        statements.push(format!(
                            "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} DROP NOT NULL;"
                        ));
                    } else {
                        statements.push(format!(
                            "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} SET NOT NULL;"
                        ));
                    }
                }
                "default" => {
                    if let Some(ref default) = column.default {
                        statements.push(format!(
                            "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} SET DEFAULT {};",
                            default.to_sql()
                        ));
                    } else {
                        statements.push(format!(
                            "ALTER TABLE {table_ident} ALTER COLUMN {column_ident} DROP DEFAULT;"
                        ));
                    }
                }
                _ => {}
            }
        }

        Ok(statements)
    }

    fn drop_index(&self, name: &str, _table: Option<&str>) -> String {
        format!("DROP INDEX IF EXISTS {};", self.quote_identifier(name))
    }
}
