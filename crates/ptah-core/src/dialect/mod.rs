//! Dialect-specific SQL rendering.
//!
//! Each supported dialect implements [`DialectRenderer`], a visitor over the
//! DDL node tree. Shared DDL grammar lives in the trait's default methods;
//! the per-dialect modules override only what genuinely differs (type
//! mapping, enum strategy, identifier quoting, table options).

mod mariadb;
mod mysql;
mod postgres;

pub use mariadb::MariaDbRenderer;
pub use mysql::MySqlRenderer;
pub use postgres::PostgresRenderer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{
    AlterAction, AlterEnumNode, AlterTableNode, ColumnNode, ConstraintNode, CreateTableNode,
    EnumNode, IndexNode, Node, StatementList,
};
use crate::error::{Error, Result};

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    MySql,
    /// MariaDB.
    MariaDb,
}

impl Dialect {
    /// Returns the lowercase dialect identifier used in directives and CLI.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
        }
    }

    /// Parses a dialect identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::MySql),
            "mariadb" => Some(Self::MariaDb),
            _ => None,
        }
    }

    /// Returns the renderer for this dialect.
    #[must_use]
    pub fn renderer(self) -> Box<dyn DialectRenderer> {
        match self {
            Self::Postgres => Box::new(PostgresRenderer::new()),
            Self::MySql => Box::new(MySqlRenderer::new()),
            Self::MariaDb => Box::new(MariaDbRenderer::new()),
        }
    }

    /// Returns whether this dialect uses the MySQL grammar family.
    #[must_use]
    pub fn is_mysql_family(self) -> bool {
        matches!(self, Self::MySql | Self::MariaDb)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visitor emitting dialect-specific SQL for DDL nodes.
pub trait DialectRenderer {
    /// The dialect this renderer targets.
    fn dialect(&self) -> Dialect;

    /// Uppercase marker used in leading block comments.
    fn marker(&self) -> &'static str;

    /// Maps a data type to its dialect spelling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedType`] for types this dialect cannot express.
    fn map_data_type(&self, dt: &crate::ast::DataType) -> Result<String>;

    /// Renders an enum definition, or `None` if the dialect has no named
    /// enum types (MySQL renders enums inline on the column).
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be rendered.
    fn create_enum(&self, node: &EnumNode) -> Result<Option<String>>;

    /// Renders an enum modification.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be rendered.
    fn alter_enum(&self, node: &AlterEnumNode) -> Result<Option<String>>;

    /// Renders an enum drop, or `None` if there is nothing to drop.
    fn drop_enum(&self, name: &str) -> Option<String>;

    /// Renders a whole statement list to one SQL text blob.
    ///
    /// # Errors
    ///
    /// Propagates the first rendering error.
    fn render(&self, statements: &StatementList) -> Result<String> {
        let mut blocks = Vec::with_capacity(statements.len());
        for node in statements {
            if let Some(sql) = self.render_node(node)? {
                blocks.push(sql);
            }
        }
        let mut out = blocks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }

    /// Renders a single node, or `None` if the dialect skips it.
    ///
    /// # Errors
    ///
    /// Propagates rendering errors.
    fn render_node(&self, node: &Node) -> Result<Option<String>> {
        match node {
            Node::Comment(text) => Ok(Some(format!("-- {text}"))),
            Node::CreateEnum(e) => self.create_enum(e),
            Node::AlterEnum(e) => self.alter_enum(e),
            Node::CreateTable(t) => self.create_table(t).map(Some),
            Node::AlterTable(a) => self.alter_table(a).map(Some),
            Node::CreateIndex(i) => self.create_index(i).map(Some),
            Node::DropTable { name, cascade } => Ok(Some(self.drop_table(name, *cascade))),
            Node::DropIndex { name, table } => Ok(Some(self.drop_index(name, table.as_deref()))),
            Node::DropEnum(name) => Ok(self.drop_enum(name)),
            Node::Raw(sql) => Ok(Some(sql.clone())),
        }
    }

    /// Renders a `CREATE TABLE` statement with its leading marker comment.
    ///
    /// # Errors
    ///
    /// Propagates column rendering errors.
    fn create_table(&self, node: &CreateTableNode) -> Result<String> {
        let mut sql = format!("-- {} TABLE: {} --\n", self.marker(), node.name);
        sql.push_str("CREATE TABLE ");
        sql.push_str(&self.quote_identifier(&node.name));
        sql.push_str(" (\n");

        let mut lines = Vec::with_capacity(node.columns.len() + node.constraints.len());
        for col in &node.columns {
            lines.push(format!("    {}", self.column_definition(col)?));
        }
        // Dialects that ignore column-level REFERENCES clauses (the MySQL
        // family) get their foreign keys as table-level constraints.
        if !self.inline_foreign_keys() {
            for col in &node.columns {
                if let Some(fk) = &col.references {
                    let constraint = ConstraintNode::ForeignKey {
                        name: Some(
                            fk.constraint_name
                                .clone()
                                .unwrap_or_else(|| format!("fk_{}_{}", node.name, col.name)),
                        ),
                        columns: vec![col.name.clone()],
                        references_table: fk.table.clone(),
                        references_columns: vec![fk.column.clone()],
                        on_delete: fk.on_delete,
                        on_update: fk.on_update,
                    };
                    lines.push(format!("    {}", self.table_constraint(&constraint)));
                }
            }
        }
        for constraint in &node.constraints {
            lines.push(format!("    {}", self.table_constraint(constraint)));
        }
        sql.push_str(&lines.join(",\n"));

        sql.push_str("\n)");
        sql.push_str(&self.table_options(node));
        sql.push(';');
        for statement in self.post_table_statements(node) {
            sql.push('\n');
            sql.push_str(&statement);
        }
        Ok(sql)
    }

    /// Renders trailing table options (engine, charset, comment).
    ///
    /// Empty by default; MySQL overrides this.
    fn table_options(&self, _node: &CreateTableNode) -> String {
        String::new()
    }

    /// Extra statements emitted after a `CREATE TABLE` (e.g. PostgreSQL
    /// `COMMENT ON TABLE`).
    fn post_table_statements(&self, _node: &CreateTableNode) -> Vec<String> {
        Vec::new()
    }

    /// Resolves a column's rendered type, honoring per-dialect overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnmappedType`] if the type has no dialect mapping
    /// and no override supplies one.
    fn column_type(&self, col: &ColumnNode) -> Result<String> {
        if let Some(overridden) = col.overrides.get(self.dialect().as_str(), "type") {
            return Ok(overridden.to_string());
        }
        self.map_data_type(&col.data_type)
    }

    /// Suffix appended to auto-incrementing columns (MySQL `AUTO_INCREMENT`).
    fn auto_increment_suffix(&self) -> &'static str {
        ""
    }

    /// Whether column-level `REFERENCES` clauses take effect in this
    /// dialect. The MySQL family parses but ignores them, so its foreign
    /// keys render as table-level constraints instead.
    fn inline_foreign_keys(&self) -> bool {
        true
    }

    /// Renders a full column definition.
    ///
    /// # Errors
    ///
    /// Propagates type mapping errors.
    fn column_definition(&self, col: &ColumnNode) -> Result<String> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&col.name),
            self.column_type(col)?
        );

        if col.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else {
            if !col.nullable {
                sql.push_str(" NOT NULL");
            }
            if col.unique {
                sql.push_str(" UNIQUE");
            }
        }

        if col.auto_increment && !col.data_type.is_serial() {
            sql.push_str(self.auto_increment_suffix());
        }

        if let Some(ref default) = col.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }

        if self.inline_foreign_keys() {
            if let Some(ref fk) = col.references {
                if let Some(ref name) = fk.constraint_name {
                    sql.push_str(&format!(" CONSTRAINT {}", self.quote_identifier(name)));
                }
                sql.push_str(" REFERENCES ");
                sql.push_str(&self.quote_identifier(&fk.table));
                sql.push_str(" (");
                sql.push_str(&self.quote_identifier(&fk.column));
                sql.push(')');
                if let Some(action) = fk.on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_sql());
                }
                if let Some(action) = fk.on_update {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.as_sql());
                }
            }
        }

        if let Some(ref check) = col.check {
            sql.push_str(&format!(" CHECK ({check})"));
        }

        Ok(sql)
    }

    /// Renders a table-level constraint.
    fn table_constraint(&self, constraint: &ConstraintNode) -> String {
        match constraint {
            ConstraintNode::PrimaryKey { name, columns } => {
                let mut sql = String::new();
                if let Some(n) = name {
                    sql.push_str(&format!("CONSTRAINT {} ", self.quote_identifier(n)));
                }
                sql.push_str("PRIMARY KEY (");
                sql.push_str(&self.quoted_list(columns));
                sql.push(')');
                sql
            }
            ConstraintNode::Unique { name, columns } => {
                let mut sql = String::new();
                if let Some(n) = name {
                    sql.push_str(&format!("CONSTRAINT {} ", self.quote_identifier(n)));
                }
                sql.push_str("UNIQUE (");
                sql.push_str(&self.quoted_list(columns));
                sql.push(')');
                sql
            }
            ConstraintNode::ForeignKey {
                name,
                columns,
                references_table,
                references_columns,
                on_delete,
                on_update,
            } => {
                let mut sql = String::new();
                if let Some(n) = name {
                    sql.push_str(&format!("CONSTRAINT {} ", self.quote_identifier(n)));
                }
                sql.push_str("FOREIGN KEY (");
                sql.push_str(&self.quoted_list(columns));
                sql.push_str(") REFERENCES ");
                sql.push_str(&self.quote_identifier(references_table));
                sql.push_str(" (");
                sql.push_str(&self.quoted_list(references_columns));
                sql.push(')');
                if let Some(action) = on_delete {
                    sql.push_str(" ON DELETE ");
                    sql.push_str(action.as_sql());
                }
                if let Some(action) = on_update {
                    sql.push_str(" ON UPDATE ");
                    sql.push_str(action.as_sql());
                }
                sql
            }
            ConstraintNode::Check { name, expression } => {
                let mut sql = String::new();
                if let Some(n) = name {
                    sql.push_str(&format!("CONSTRAINT {} ", self.quote_identifier(n)));
                }
                sql.push_str(&format!("CHECK ({expression})"));
                sql
            }
        }
    }

    /// Renders an `ALTER TABLE` node, one statement per line.
    ///
    /// # Errors
    ///
    /// Propagates column rendering errors.
    fn alter_table(&self, node: &AlterTableNode) -> Result<String> {
        let mut statements = Vec::with_capacity(node.actions.len());
        for action in &node.actions {
            match action {
                AlterAction::AddColumn(col) => {
                    statements.push(format!(
                        "ALTER TABLE {} ADD COLUMN {};",
                        self.quote_identifier(&node.table),
                        self.column_definition(col)?
                    ));
                    if !self.inline_foreign_keys() {
                        if let Some(fk) = &col.references {
                            let constraint = ConstraintNode::ForeignKey {
                                name: Some(fk.constraint_name.clone().unwrap_or_else(|| {
                                    format!("fk_{}_{}", node.table, col.name)
                                })),
                                columns: vec![col.name.clone()],
                                references_table: fk.table.clone(),
                                references_columns: vec![fk.column.clone()],
                                on_delete: fk.on_delete,
                                on_update: fk.on_update,
                            };
                            statements.push(format!(
                                "ALTER TABLE {} ADD {};",
                                self.quote_identifier(&node.table),
                                self.table_constraint(&constraint)
                            ));
                        }
                    }
                }
                AlterAction::DropColumn(column) => {
                    statements.push(format!(
                        "ALTER TABLE {} DROP COLUMN {};",
                        self.quote_identifier(&node.table),
                        self.quote_identifier(column)
                    ));
                }
                AlterAction::ModifyColumn { column, changes } => {
                    statements.extend(self.modify_column(&node.table, column, changes)?);
                }
            }
        }
        Ok(statements.join("\n"))
    }

    /// Renders a column redefinition for this dialect.
    ///
    /// # Errors
    ///
    /// Propagates type mapping errors.
    fn modify_column(
        &self,
        table: &str,
        column: &ColumnNode,
        changes: &[String],
    ) -> Result<Vec<String>>;

    /// Renders a `CREATE INDEX` statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be rendered.
    fn create_index(&self, node: &IndexNode) -> Result<String> {
        let mut sql = String::from("CREATE ");
        if node.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&node.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(&node.table));
        sql.push_str(" (");
        sql.push_str(&self.quoted_list(&node.columns));
        sql.push_str(");");
        Ok(sql)
    }

    /// Renders a `DROP TABLE` statement.
    fn drop_table(&self, name: &str, cascade: bool) -> String {
        let mut sql = format!("DROP TABLE IF EXISTS {}", self.quote_identifier(name));
        if cascade && self.dialect() == Dialect::Postgres {
            sql.push_str(" CASCADE");
        }
        sql.push(';');
        sql
    }

    /// Renders a `DROP INDEX` statement.
    fn drop_index(&self, name: &str, table: Option<&str>) -> String;

    /// Returns the identifier quote character.
    fn quote_char(&self) -> char {
        '"'
    }

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        let q = self.quote_char();
        format!("{q}{name}{q}")
    }

    /// Quotes and joins a list of identifiers.
    fn quoted_list(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|n| self.quote_identifier(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Convenience: renders a statement list for a dialect.
///
/// # Errors
///
/// Propagates rendering errors from the dialect renderer.
pub fn render_statements(statements: &StatementList, dialect: Dialect) -> Result<String> {
    dialect.renderer().render(statements)
}

/// Quotes enum values for an `ENUM(...)` or `CREATE TYPE` value list.
pub(crate) fn quote_values(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shared unmapped-type error constructor.
pub(crate) fn unmapped(sql_type: impl Into<String>, dialect: Dialect) -> Error {
    Error::UnmappedType {
        sql_type: sql_type.into(),
        dialect,
    }
}
