//! MySQL renderer.
//!
//! MariaDB shares this grammar; the shared pieces live in free functions so
//! [`super::MariaDbRenderer`] can reuse them under its own dialect name.

use crate::ast::{AlterEnumNode, ColumnNode, CreateTableNode, DataType, EnumNode};
use crate::error::Result;

use super::{quote_values, unmapped, Dialect, DialectRenderer};

/// MySQL DDL renderer.
///
/// Enums render inline as `ENUM('a', 'b')` column types; `CREATE TYPE` is
/// never emitted. Generic `SERIAL` maps to `INT AUTO_INCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlRenderer;

impl MySqlRenderer {
    /// Creates a new MySQL renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectRenderer for MySqlRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn marker(&self) -> &'static str {
        "MYSQL"
    }

    fn map_data_type(&self, dt: &DataType) -> Result<String> {
        map_family_type(dt, Dialect::MySql)
    }

    fn create_enum(&self, _node: &EnumNode) -> Result<Option<String>> {
        // No named enum types; values render inline on the column.
        Ok(None)
    }

    fn alter_enum(&self, node: &AlterEnumNode) -> Result<Option<String>> {
        alter_enum_family(self, node)
    }

    fn drop_enum(&self, _name: &str) -> Option<String> {
        None
    }

    fn table_options(&self, node: &CreateTableNode) -> String {
        family_table_options(self, node)
    }

    fn auto_increment_suffix(&self) -> &'static str {
        " AUTO_INCREMENT"
    }

    fn inline_foreign_keys(&self) -> bool {
        // MySQL parses but ignores column-level REFERENCES clauses.
        false
    }

    fn modify_column(
        &self,
        table: &str,
        column: &ColumnNode,
        changes: &[String],
    ) -> Result<Vec<String>> {
        modify_column_family(self, table, column, changes)
    }

    fn drop_index(&self, name: &str, table: Option<&str>) -> String {
        drop_index_family(self, name, table)
    }

    fn quote_char(&self) -> char {
        '`'
    }
}

/// Maps a data type to the MySQL-family spelling.
pub(super) fn map_family_type(dt: &DataType, dialect: Dialect) -> Result<String> {
    Ok(match dt {
        DataType::SmallInt => "SMALLINT".to_string(),
        DataType::Integer => "INT".to_string(),
        DataType::BigInt => "BIGINT".to_string(),
        DataType::Serial => "INT AUTO_INCREMENT".to_string(),
        DataType::BigSerial => "BIGINT AUTO_INCREMENT".to_string(),
        DataType::Real => "FLOAT".to_string(),
        DataType::Double => "DOUBLE".to_string(),
        DataType::Decimal { precision, scale } => match (precision, scale) {
            (Some(p), Some(s)) => format!("DECIMAL({p}, {s})"),
            (Some(p), None) => format!("DECIMAL({p})"),
            _ => "DECIMAL(10, 0)".to_string(),
        },
        DataType::Char(len) => match len {
            Some(n) => format!("CHAR({n})"),
            None => "CHAR".to_string(),
        },
        DataType::Varchar(len) => match len {
            Some(n) => format!("VARCHAR({n})"),
            None => "VARCHAR(255)".to_string(),
        },
        DataType::Text => "TEXT".to_string(),
        DataType::Boolean => "TINYINT(1)".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Time => "TIME".to_string(),
        DataType::Timestamp => "DATETIME".to_string(),
        DataType::TimestampTz => "TIMESTAMP".to_string(),
        DataType::Json => "JSON".to_string(),
        DataType::Uuid => "CHAR(36)".to_string(),
        DataType::Bytea => "BLOB".to_string(),
        DataType::Enum { values, .. } => format!("ENUM({})", quote_values(values)),
        DataType::Custom(name) => return Err(unmapped(name.clone(), dialect)),
    })
}

/// Trailing `ENGINE`/`CHARSET`/`COMMENT` table options from overrides.
pub(super) fn family_table_options<R: DialectRenderer>(
    renderer: &R,
    node: &CreateTableNode,
) -> String {
    let dialect = renderer.dialect().as_str();
    let mut options = String::new();
    if let Some(engine) = node.overrides.get(dialect, "engine") {
        options.push_str(&format!(" ENGINE={engine}"));
    }
    if let Some(charset) = node.overrides.get(dialect, "charset") {
        options.push_str(&format!(" DEFAULT CHARSET={charset}"));
    }
    if let Some(comment) = node.overrides.get(dialect, "comment") {
        options.push_str(&format!(" COMMENT='{}'", comment.replace('\'', "''")));
    }
    options
}

/// Enum value changes rewrite the owning column's inline `ENUM(...)` type.
pub(super) fn alter_enum_family<R: DialectRenderer>(
    renderer: &R,
    node: &AlterEnumNode,
) -> Result<Option<String>> {
    let Some((table, column)) = node.owner.as_ref() else {
        return Ok(None);
    };
    Ok(Some(format!(
        "ALTER TABLE {} MODIFY COLUMN {} ENUM({});",
        renderer.quote_identifier(table),
        renderer.quote_identifier(column),
        quote_values(&node.values)
    )))
}

/// One `MODIFY COLUMN` statement carrying the full target definition.
///
/// Key and constraint attributes are omitted: `MODIFY` would otherwise
/// try to re-add an existing PRIMARY KEY or UNIQUE index.
pub(super) fn modify_column_family<R: DialectRenderer>(
    renderer: &R,
    table: &str,
    column: &ColumnNode,
    _changes: &[String],
) -> Result<Vec<String>> {
    let mut definition = format!(
        "{} {}",
        renderer.quote_identifier(&column.name),
        renderer.column_type(column)?
    );
    if !column.nullable || column.primary_key {
        definition.push_str(" NOT NULL");
    }
    if column.auto_increment && !column.data_type.is_serial() {
        definition.push_str(" AUTO_INCREMENT");
    }
    if let Some(ref default) = column.default {
        definition.push_str(" DEFAULT ");
        definition.push_str(&default.to_sql());
    }
    Ok(vec![format!(
        "ALTER TABLE {} MODIFY COLUMN {definition};",
        renderer.quote_identifier(table)
    )])
}

/// MySQL requires the owning table in `DROP INDEX`; without one the drop
/// cannot be expressed and degrades to a warning comment.
pub(super) fn drop_index_family<R: DialectRenderer>(
    renderer: &R,
    name: &str,
    table: Option<&str>,
) -> String {
    match table {
        Some(t) => format!(
            "DROP INDEX {} ON {};",
            renderer.quote_identifier(name),
            renderer.quote_identifier(t)
        ),
        None => format!("-- DROP INDEX {name}: owning table unknown, drop manually --"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SchemaBuilder;

    fn enum_schema() -> crate::ast::StatementList {
        SchemaBuilder::new()
            .enum_type("enum_users_status", &["active", "inactive"])
            .table("users")
            .column(
                "status",
                DataType::Enum {
                    name: "enum_users_status".into(),
                    values: vec!["active".into(), "inactive".into()],
                },
            )
            .not_null()
            .end()
            .end()
            .build()
    }

    #[test]
    fn test_no_create_type_ever() {
        let sql = MySqlRenderer::new().render(&enum_schema()).unwrap();
        assert!(!sql.contains("CREATE TYPE"));
        assert!(sql.contains("`status` ENUM('active', 'inactive') NOT NULL"));
    }

    #[test]
    fn test_serial_maps_to_int_auto_increment() {
        let r = MySqlRenderer::new();
        assert_eq!(
            r.map_data_type(&DataType::Serial).unwrap(),
            "INT AUTO_INCREMENT"
        );
        assert_eq!(r.map_data_type(&DataType::Boolean).unwrap(), "TINYINT(1)");
    }

    #[test]
    fn test_table_options_from_overrides() {
        let list = SchemaBuilder::new()
            .table("users")
            .column("id", DataType::Serial)
            .primary_key()
            .end()
            .override_common("engine", "InnoDB")
            .override_dialect("mysql", "charset", "utf8mb4")
            .end()
            .build();

        let sql = MySqlRenderer::new().render(&list).unwrap();
        assert!(sql.contains(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
    }

    #[test]
    fn test_overrides_do_not_leak_across_dialects() {
        let list = SchemaBuilder::new()
            .table("users")
            .column("id", DataType::Serial)
            .primary_key()
            .end()
            .override_dialect("mariadb", "charset", "utf8mb4")
            .end()
            .build();

        let sql = MySqlRenderer::new().render(&list).unwrap();
        assert!(!sql.contains("CHARSET"));
    }

    #[test]
    fn test_modify_column_single_statement() {
        let r = MySqlRenderer::new();
        let mut col = ColumnNode::new("price", DataType::Decimal {
            precision: Some(10),
            scale: Some(2),
        });
        col.nullable = false;
        let statements = r
            .modify_column("products", &col, &["type".to_string()])
            .unwrap();
        assert_eq!(
            statements,
            vec!["ALTER TABLE `products` MODIFY COLUMN `price` DECIMAL(10, 2) NOT NULL;"]
        );
    }

    #[test]
    fn test_foreign_keys_render_as_table_constraints() {
        use crate::model::FkAction;

        let list = SchemaBuilder::new()
            .table("orders")
            .column("user_id", DataType::BigInt)
            .not_null()
            .foreign_key("users", "id", None)
            .on_delete(FkAction::Cascade)
            .end()
            .end()
            .build();

        let sql = MySqlRenderer::new().render(&list).unwrap();
        // Column-level REFERENCES is ignored by MySQL, so the clause must
        // appear as a named table-level constraint instead.
        assert!(!sql.contains("`user_id` BIGINT NOT NULL REFERENCES"));
        assert!(sql.contains(
            "CONSTRAINT `fk_orders_user_id` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_drop_index_names_table() {
        let r = MySqlRenderer::new();
        assert_eq!(
            r.drop_index("idx_users_email", Some("users")),
            "DROP INDEX `idx_users_email` ON `users`;"
        );
    }

    #[test]
    fn test_alter_enum_rewrites_column() {
        let r = MySqlRenderer::new();
        let sql = r
            .alter_enum(&AlterEnumNode {
                name: "enum_users_status".into(),
                values: vec!["active".into(), "inactive".into(), "banned".into()],
                added: vec!["banned".into()],
                owner: Some(("users".into(), "status".into())),
            })
            .unwrap()
            .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE `users` MODIFY COLUMN `status` ENUM('active', 'inactive', 'banned');"
        );
    }
}
