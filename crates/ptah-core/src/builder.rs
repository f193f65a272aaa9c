//! Fluent construction API for the DDL node tree.
//!
//! [`SchemaBuilder`] accumulates top-level statements in call order. Child
//! builders ([`TableBuilder`], [`ColumnBuilder`], [`IndexBuilder`]) take
//! ownership of their parent and hand it back from `.end()`, so there is no
//! shared mutable state and an unclosed child can never commit a partial
//! statement: dropping it discards the whole chain, and [`SchemaBuilder::build`]
//! exists only at the top level.
//!
//! # Example
//!
//! ```rust
//! use ptah_core::builder::SchemaBuilder;
//! use ptah_core::ast::DataType;
//!
//! let statements = SchemaBuilder::new()
//!     .enum_type("enum_users_status", &["active", "inactive"])
//!     .table("users")
//!     .column("id", DataType::Serial)
//!     .primary_key()
//!     .end()
//!     .column("email", DataType::Varchar(Some(255)))
//!     .not_null()
//!     .unique()
//!     .end()
//!     .end()
//!     .index("idx_users_email", "users", &["email"])
//!     .unique()
//!     .end()
//!     .build();
//!
//! assert_eq!(statements.len(), 3);
//! ```

use crate::ast::{
    ColumnNode, ConstraintNode, CreateTableNode, DataType, DefaultValue, EnumNode, ForeignKeyRef,
    IndexNode, Node, StatementList,
};
use crate::model::FkAction;

/// Top-level builder accumulating DDL statements in call order.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    nodes: Vec<Node>,
}

impl SchemaBuilder {
    /// Creates an empty schema builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a free-standing comment line.
    #[must_use]
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.nodes.push(Node::Comment(text.into()));
        self
    }

    /// Appends an enum type definition.
    #[must_use]
    pub fn enum_type(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.nodes.push(Node::CreateEnum(EnumNode {
            name: name.into(),
            values: values.iter().map(ToString::to_string).collect(),
        }));
        self
    }

    /// Appends raw SQL passed through verbatim.
    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.nodes.push(Node::Raw(sql.into()));
        self
    }

    /// Opens a table builder; call `.end()` on it to commit the table.
    #[must_use]
    pub fn table(self, name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            parent: self,
            node: CreateTableNode::new(name),
        }
    }

    /// Opens an index builder; call `.end()` on it to commit the index.
    #[must_use]
    pub fn index(self, name: impl Into<String>, table: impl Into<String>, columns: &[&str]) -> IndexBuilder {
        IndexBuilder {
            parent: self,
            node: IndexNode {
                name: name.into(),
                table: table.into(),
                columns: columns.iter().map(ToString::to_string).collect(),
                unique: false,
                comment: None,
            },
        }
    }

    /// Finalizes the accumulated statements.
    #[must_use]
    pub fn build(self) -> StatementList {
        StatementList { nodes: self.nodes }
    }
}

/// Builder for one `CREATE TABLE` statement.
#[derive(Debug)]
pub struct TableBuilder {
    parent: SchemaBuilder,
    node: CreateTableNode,
}

impl TableBuilder {
    /// Opens a column builder; call `.end()` on it to commit the column.
    #[must_use]
    pub fn column(self, name: impl Into<String>, data_type: DataType) -> ColumnBuilder {
        ColumnBuilder {
            parent: self,
            col: ColumnNode::new(name, data_type),
        }
    }

    /// Adds a prebuilt column node.
    #[must_use]
    pub fn push_column(mut self, column: ColumnNode) -> Self {
        self.node.columns.push(column);
        self
    }

    /// Adds a composite primary key constraint.
    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.node.constraints.push(ConstraintNode::PrimaryKey {
            name: None,
            columns: columns.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// Adds a table-level check constraint.
    #[must_use]
    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.node.constraints.push(ConstraintNode::Check {
            name: None,
            expression: expression.into(),
        });
        self
    }

    /// Adds a table-level constraint node.
    #[must_use]
    pub fn constraint(mut self, constraint: ConstraintNode) -> Self {
        self.node.constraints.push(constraint);
        self
    }

    /// Sets a common override value (`engine`, `comment`).
    #[must_use]
    pub fn override_common(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.node.overrides.set_common(key, value);
        self
    }

    /// Sets a dialect-scoped override value.
    #[must_use]
    pub fn override_dialect(
        mut self,
        dialect: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.node.overrides.set_dialect(dialect, key, value);
        self
    }

    /// Commits the table to the schema and returns the schema builder.
    #[must_use]
    pub fn end(mut self) -> SchemaBuilder {
        self.parent.nodes.push(Node::CreateTable(self.node));
        self.parent
    }
}

/// Builder for one column within a table.
#[derive(Debug)]
pub struct ColumnBuilder {
    parent: TableBuilder,
    col: ColumnNode,
}

impl ColumnBuilder {
    /// Marks the column as PRIMARY KEY (implies NOT NULL).
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.col.primary_key = true;
        self.col.nullable = false;
        self
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.col.nullable = false;
        self
    }

    /// Marks the column as UNIQUE.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.col.unique = true;
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.col.auto_increment = true;
        self
    }

    /// Sets a literal default value.
    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.col.default = Some(value);
        self
    }

    /// Sets a raw SQL expression as default (e.g. `CURRENT_TIMESTAMP`).
    #[must_use]
    pub fn default_expression(mut self, expr: impl Into<String>) -> Self {
        self.col.default = Some(DefaultValue::Expression(expr.into()));
        self
    }

    /// Adds a CHECK constraint.
    #[must_use]
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.col.check = Some(expr.into());
        self
    }

    /// Sets a foreign key reference.
    #[must_use]
    pub fn foreign_key(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        constraint_name: Option<String>,
    ) -> Self {
        self.col.references = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
            constraint_name,
            on_delete: None,
            on_update: None,
        });
        self
    }

    /// Sets the ON DELETE action of the foreign key reference.
    ///
    /// No-op unless `foreign_key` was called first.
    #[must_use]
    pub fn on_delete(mut self, action: FkAction) -> Self {
        if let Some(fk) = self.col.references.as_mut() {
            fk.on_delete = Some(action);
        }
        self
    }

    /// Sets the ON UPDATE action of the foreign key reference.
    ///
    /// No-op unless `foreign_key` was called first.
    #[must_use]
    pub fn on_update(mut self, action: FkAction) -> Self {
        if let Some(fk) = self.col.references.as_mut() {
            fk.on_update = Some(action);
        }
        self
    }

    /// Sets the column comment.
    #[must_use]
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.col.comment = Some(text.into());
        self
    }

    /// Sets a dialect-scoped override (e.g. a type override).
    #[must_use]
    pub fn override_dialect(
        mut self,
        dialect: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.col.overrides.set_dialect(dialect, key, value);
        self
    }

    /// Commits the column and returns the table builder.
    #[must_use]
    pub fn end(mut self) -> TableBuilder {
        self.parent.node.columns.push(self.col);
        self.parent
    }
}

/// Builder for one `CREATE INDEX` statement.
#[derive(Debug)]
pub struct IndexBuilder {
    parent: SchemaBuilder,
    node: IndexNode,
}

impl IndexBuilder {
    /// Marks the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.node.unique = true;
        self
    }

    /// Sets the index comment.
    #[must_use]
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.node.comment = Some(text.into());
        self
    }

    /// Commits the index to the schema and returns the schema builder.
    #[must_use]
    pub fn end(mut self) -> SchemaBuilder {
        self.parent.nodes.push(Node::CreateIndex(self.node));
        self.parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_keep_call_order() {
        let list = SchemaBuilder::new()
            .comment("schema for tests")
            .enum_type("enum_users_status", &["active", "inactive"])
            .table("users")
            .column("id", DataType::Serial)
            .primary_key()
            .end()
            .end()
            .build();

        assert_eq!(list.len(), 3);
        assert!(matches!(list.nodes[0], Node::Comment(_)));
        assert!(matches!(list.nodes[1], Node::CreateEnum(_)));
        assert!(matches!(list.nodes[2], Node::CreateTable(_)));
    }

    #[test]
    fn test_column_modifiers_accumulate() {
        let list = SchemaBuilder::new()
            .table("orders")
            .column("user_id", DataType::BigInt)
            .not_null()
            .foreign_key("users", "id", Some("fk_orders_user".to_string()))
            .on_delete(FkAction::Cascade)
            .end()
            .end()
            .build();

        let Node::CreateTable(table) = &list.nodes[0] else {
            panic!("expected CreateTable");
        };
        let col = &table.columns[0];
        assert!(!col.nullable);
        let fk = col.references.as_ref().unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.on_delete, Some(FkAction::Cascade));
        assert_eq!(fk.constraint_name.as_deref(), Some("fk_orders_user"));
    }

    #[test]
    fn test_unclosed_child_commits_nothing() {
        let builder = SchemaBuilder::new();
        let table = builder.table("ghost");
        // Dropping the table builder without `.end()` discards the chain;
        // a fresh builder shows nothing was shared or leaked.
        drop(table);
        let list = SchemaBuilder::new().build();
        assert!(list.is_empty());
    }

    #[test]
    fn test_index_builder() {
        let list = SchemaBuilder::new()
            .index("idx_orders_status", "orders", &["status", "created_at"])
            .unique()
            .end()
            .build();

        let Node::CreateIndex(idx) = &list.nodes[0] else {
            panic!("expected CreateIndex");
        };
        assert_eq!(idx.columns, vec!["status", "created_at"]);
        assert!(idx.unique);
    }
}
