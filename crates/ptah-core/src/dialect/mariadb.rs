//! MariaDB renderer.
//!
//! MariaDB speaks the MySQL DDL grammar; this renderer reuses the shared
//! family functions from [`super::mysql`] but reports its own dialect, so
//! `platform.mariadb.*` overrides resolve correctly and never leak from or
//! into plain MySQL.

use crate::ast::{AlterEnumNode, ColumnNode, CreateTableNode, DataType, EnumNode};
use crate::error::Result;

use super::mysql::{
    alter_enum_family, drop_index_family, family_table_options, map_family_type,
    modify_column_family,
};
use super::{Dialect, DialectRenderer};

/// MariaDB DDL renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MariaDbRenderer;

impl MariaDbRenderer {
    /// Creates a new MariaDB renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DialectRenderer for MariaDbRenderer {
    fn dialect(&self) -> Dialect {
        Dialect::MariaDb
    }

    fn marker(&self) -> &'static str {
        "MARIADB"
    }

    fn map_data_type(&self, dt: &DataType) -> Result<String> {
        map_family_type(dt, Dialect::MariaDb)
    }

    fn create_enum(&self, _node: &EnumNode) -> Result<Option<String>> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SchemaBuilder;

    #[test]
    fn test_mariadb_marker_and_overrides() {
        let list = SchemaBuilder::new()
            .table("users")
            .column("id", DataType::Serial)
            .primary_key()
            .end()
            .override_dialect("mariadb", "engine", "Aria")
            .override_dialect("mysql", "engine", "InnoDB")
            .end()
            .build();

        let sql = MariaDbRenderer::new().render(&list).unwrap();
        assert!(sql.starts_with("-- MARIADB TABLE: users --"));
        assert!(sql.contains("ENGINE=Aria"));
        assert!(!sql.contains("InnoDB"));
    }

    #[test]
    fn test_mariadb_inline_enum() {
        let list = SchemaBuilder::new()
            .enum_type("enum_users_status", &["a", "b"])
            .table("users")
            .column(
                "status",
                DataType::Enum {
                    name: "enum_users_status".into(),
                    values: vec!["a".into(), "b".into()],
                },
            )
            .end()
            .end()
            .build();

        let sql = MariaDbRenderer::new().render(&list).unwrap();
        assert!(!sql.contains("CREATE TYPE"));
        assert!(sql.contains("ENUM('a', 'b')"));
    }
}
