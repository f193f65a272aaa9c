//! Lowering from the declared model to the DDL node tree.
//!
//! Compilation fixes the emission order the renderers rely on: enum
//! definitions first, tables in foreign-key dependency order, indexes after
//! every table exists.

use crate::ast::{
    ColumnNode, ConstraintNode, CreateTableNode, DataType, DefaultValue, ForeignKeyRef, Node,
    StatementList,
};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::model::{Database, Field, Table};

/// Compiles and renders the whole declared schema for a dialect, the
/// fresh-schema-creation path.
///
/// # Errors
///
/// Returns compilation or rendering errors.
pub fn render_schema(db: &Database, dialect: Dialect) -> Result<String> {
    let statements = compile_database(db)?;
    crate::dialect::render_statements(&statements, dialect)
}

/// Compiles the whole declared schema into a statement list.
///
/// # Errors
///
/// Returns [`crate::Error::DependencyCycle`] if table foreign keys are
/// cyclic.
pub fn compile_database(db: &Database) -> Result<StatementList> {
    let mut statements = StatementList::new();

    for def in &db.enums {
        statements.push(Node::CreateEnum(crate::ast::EnumNode {
            name: def.name.clone(),
            values: def.values.clone(),
        }));
    }

    for table in db.tables_in_dependency_order()? {
        statements.push(Node::CreateTable(compile_table(db, table)));
        if let Some(custom) = &table.custom_sql {
            statements.push(Node::Raw(custom.clone()));
        }
        for field in db.fields_of(table) {
            if let Some(expr) = &field.unique_expr {
                statements.push(Node::Raw(format!(
                    "CREATE UNIQUE INDEX uq_{}_{} ON {} ({expr});",
                    table.name, field.name, table.name
                )));
            }
        }
    }

    for index in &db.indexes {
        statements.push(Node::CreateIndex(crate::ast::IndexNode {
            name: index.name.clone(),
            table: index.table.clone(),
            columns: index.columns.clone(),
            unique: index.unique,
            comment: index.comment.clone(),
        }));
    }

    Ok(statements)
}

/// Compiles one table into a `CREATE TABLE` node.
#[must_use]
pub fn compile_table(db: &Database, table: &Table) -> CreateTableNode {
    let mut node = CreateTableNode::new(&table.name);
    node.overrides = table.overrides.clone();

    for field in db.fields_of(table) {
        node.columns.push(compile_field(table, field));
    }

    if !table.primary_key.is_empty() {
        node.constraints.push(ConstraintNode::PrimaryKey {
            name: None,
            columns: table.primary_key.clone(),
        });
    }
    for check in &table.checks {
        node.constraints.push(ConstraintNode::Check {
            name: None,
            expression: check.clone(),
        });
    }

    node
}

/// Compiles one field into a column node.
#[must_use]
pub fn compile_field(table: &Table, field: &Field) -> ColumnNode {
    let data_type = if field.is_enum() {
        DataType::Enum {
            name: field.enum_key(&table.name),
            values: field.enum_values.clone(),
        }
    } else {
        DataType::parse(&field.sql_type)
    };

    let mut col = ColumnNode::new(&field.name, data_type);
    col.nullable = field.nullable;
    col.primary_key = field.primary_key;
    col.unique = field.unique;
    col.auto_increment = field.auto_increment;
    col.check = field.check.clone();
    col.comment = field.comment.clone();
    col.overrides = field.overrides.clone();

    if let Some(expr) = &field.default_expr {
        col.default = Some(DefaultValue::Expression(expr.clone()));
    } else if let Some(literal) = &field.default {
        col.default = Some(DefaultValue::from_literal(literal));
    }

    if let Some(fk) = &field.foreign_key {
        col.references = Some(ForeignKeyRef {
            table: fk.table.clone(),
            column: fk.column.clone(),
            constraint_name: fk.constraint_name.clone(),
            on_delete: fk.on_delete,
            on_update: fk.on_update,
        });
    }

    col
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumDef, ForeignKey};

    fn model_with_fk() -> Database {
        let mut db = Database::new();
        // Insertion order deliberately puts the dependent table first; the
        // compiler must still create "users" before "orders".
        db.tables.push(Table::new("orders", "Order"));
        db.tables.push(Table::new("users", "User"));

        let mut id = Field::new("User", "id", "SERIAL");
        id.primary_key = true;
        id.nullable = false;
        db.fields.push(id);

        let mut order_id = Field::new("Order", "id", "SERIAL");
        order_id.primary_key = true;
        order_id.nullable = false;
        db.fields.push(order_id);

        let mut user_id = Field::new("Order", "user_id", "INTEGER");
        user_id.nullable = false;
        user_id.foreign_key = ForeignKey::parse("users(id)");
        db.fields.push(user_id);

        db.add_dependency("orders", "users");
        db
    }

    #[test]
    fn test_tables_emitted_in_dependency_order() {
        let db = model_with_fk();
        let statements = compile_database(&db).unwrap();

        let table_names: Vec<&str> = statements
            .iter()
            .filter_map(|n| match n {
                Node::CreateTable(t) => Some(t.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(table_names, vec!["users", "orders"]);
    }

    #[test]
    fn test_enums_precede_tables() {
        let mut db = model_with_fk();
        let mut status = Field::new("User", "status", "ENUM");
        status.enum_values = vec!["active".into(), "inactive".into()];
        db.fields.push(status);
        db.enums.push(EnumDef {
            name: "enum_users_status".into(),
            values: vec!["active".into(), "inactive".into()],
        });

        let statements = compile_database(&db).unwrap();
        assert!(matches!(statements.nodes[0], Node::CreateEnum(_)));

        let Node::CreateTable(users) = statements
            .iter()
            .find(|n| matches!(n, Node::CreateTable(t) if t.name == "users"))
            .unwrap()
        else {
            unreachable!();
        };
        let status_col = users.columns.iter().find(|c| c.name == "status").unwrap();
        assert_eq!(
            status_col.data_type,
            DataType::Enum {
                name: "enum_users_status".into(),
                values: vec!["active".into(), "inactive".into()],
            }
        );
    }

    #[test]
    fn test_composite_primary_key_constraint() {
        let mut db = Database::new();
        let mut table = Table::new("tenant_items", "TenantItem");
        table.primary_key = vec!["tenant_id".into(), "item_id".into()];
        db.tables.push(table);
        db.fields.push(Field::new("TenantItem", "tenant_id", "INTEGER"));
        db.fields.push(Field::new("TenantItem", "item_id", "INTEGER"));

        let statements = compile_database(&db).unwrap();
        let Node::CreateTable(node) = &statements.nodes[0] else {
            panic!("expected table");
        };
        assert!(matches!(
            &node.constraints[0],
            ConstraintNode::PrimaryKey { columns, .. } if columns.len() == 2
        ));
    }

    #[test]
    fn test_defaults_compiled() {
        let table = Table::new("users", "User");
        let mut field = Field::new("User", "created_at", "TIMESTAMP");
        field.default_expr = Some("CURRENT_TIMESTAMP".into());
        let col = compile_field(&table, &field);
        assert_eq!(
            col.default,
            Some(DefaultValue::Expression("CURRENT_TIMESTAMP".into()))
        );

        let mut field = Field::new("User", "active", "BOOLEAN");
        field.default = Some("true".into());
        let col = compile_field(&table, &field);
        assert_eq!(col.default, Some(DefaultValue::Boolean(true)));
    }
}
