//! Migration planning.
//!
//! Turns a [`SchemaDiff`] plus the full declared schema into an ordered
//! sequence of DDL steps: new enums before the tables referencing them, new
//! tables in foreign-key dependency order, column additions and
//! modifications before removals, indexes after their target table, and all
//! drops last. Destructive steps are marked so callers can require explicit
//! confirmation before execution.

use serde::{Deserialize, Serialize};

use crate::ast::{AlterAction, AlterEnumNode, AlterTableNode, EnumNode, IndexNode, Node};
use crate::compile;
use crate::diff::{SchemaDiff, TableDiff};
use crate::error::Result;
use crate::model::Database;

/// How dangerous a planned step is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Purely additive; safe to apply.
    Safe,
    /// Removes data (column, table, index or enum drop); requires explicit
    /// confirmation before execution.
    Destructive,
    /// Cannot be expressed as a migration statement (e.g. PostgreSQL enum
    /// value removal); surfaced as a warning, never executed.
    Unsupported,
}

/// One planned DDL step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// The DDL node to render.
    pub node: Node,
    /// Step severity.
    pub severity: Severity,
    /// Human-readable summary (`create table users`).
    pub summary: String,
}

impl PlannedStep {
    fn safe(node: Node, summary: impl Into<String>) -> Self {
        Self {
            node,
            severity: Severity::Safe,
            summary: summary.into(),
        }
    }

    fn destructive(node: Node, summary: impl Into<String>) -> Self {
        Self {
            node,
            severity: Severity::Destructive,
            summary: summary.into(),
        }
    }

    fn unsupported(summary: impl Into<String>) -> Self {
        let summary = summary.into();
        Self {
            node: Node::Comment(format!("UNSUPPORTED: {summary}")),
            severity: Severity::Unsupported,
            summary,
        }
    }
}

/// An ordered migration plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Steps in execution order.
    pub steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    /// Returns whether the plan contains no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns whether any step removes data.
    #[must_use]
    pub fn has_destructive(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.severity == Severity::Destructive)
    }

    /// Returns whether any step could not be expressed as a statement.
    #[must_use]
    pub fn has_unsupported(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.severity == Severity::Unsupported)
    }
}

/// Plans the steps reconciling a live schema with the declared one.
///
/// # Errors
///
/// Returns [`crate::Error::DependencyCycle`] if new tables' foreign keys
/// are cyclic.
pub fn plan_migration(diff: &SchemaDiff, declared: &Database) -> Result<MigrationPlan> {
    let mut plan = MigrationPlan::default();

    plan_enum_additions(diff, declared, &mut plan);
    plan_enum_modifications(diff, declared, &mut plan);
    plan_new_tables(diff, declared, &mut plan)?;
    for table_diff in &diff.tables_modified {
        plan_table_changes(table_diff, declared, &mut plan);
    }
    plan_index_changes(diff, declared, &mut plan);
    plan_removals(diff, &mut plan);

    Ok(plan)
}

fn plan_enum_additions(diff: &SchemaDiff, declared: &Database, plan: &mut MigrationPlan) {
    for name in &diff.enums_added {
        let Some(def) = declared.enum_def(name) else {
            continue;
        };
        plan.steps.push(PlannedStep::safe(
            Node::CreateEnum(EnumNode {
                name: def.name.clone(),
                values: def.values.clone(),
            }),
            format!("create enum {name}"),
        ));
    }
}

fn plan_enum_modifications(diff: &SchemaDiff, declared: &Database, plan: &mut MigrationPlan) {
    for change in &diff.enums_modified {
        if !change.values_added.is_empty() {
            let Some(def) = declared.enum_def(&change.name) else {
                continue;
            };
            plan.steps.push(PlannedStep::safe(
                Node::AlterEnum(AlterEnumNode {
                    name: change.name.clone(),
                    values: def.values.clone(),
                    added: change.values_added.clone(),
                    owner: enum_owner(declared, &change.name),
                }),
                format!(
                    "add enum values {} to {}",
                    change.values_added.join(", "),
                    change.name
                ),
            ));
        }
        if !change.values_removed.is_empty() {
            // PostgreSQL cannot remove enum values without recreating the
            // type; surfaced as a warning instead of executed.
            plan.steps.push(PlannedStep::unsupported(format!(
                "enum {} removes values {}; value removal requires recreating the type",
                change.name,
                change.values_removed.join(", ")
            )));
        }
    }
}

/// Finds the `(table, column)` owning an enum key, for dialects that render
/// enums inline on the column.
fn enum_owner(declared: &Database, enum_name: &str) -> Option<(String, String)> {
    declared.tables.iter().find_map(|table| {
        declared
            .fields_of(table)
            .find(|f| f.is_enum() && f.enum_key(&table.name) == enum_name)
            .map(|f| (table.name.clone(), f.name.clone()))
    })
}

fn plan_new_tables(diff: &SchemaDiff, declared: &Database, plan: &mut MigrationPlan) -> Result<()> {
    let ordered = declared.tables_in_dependency_order()?;
    for table in ordered {
        if !diff.tables_added.contains(&table.name) {
            continue;
        }
        plan.steps.push(PlannedStep::safe(
            Node::CreateTable(compile::compile_table(declared, table)),
            format!("create table {}", table.name),
        ));
        if let Some(custom) = &table.custom_sql {
            plan.steps.push(PlannedStep::safe(
                Node::Raw(custom.clone()),
                format!("custom SQL for table {}", table.name),
            ));
        }
    }
    Ok(())
}

fn plan_table_changes(table_diff: &TableDiff, declared: &Database, plan: &mut MigrationPlan) {
    let Some(table) = declared.table(&table_diff.table) else {
        return;
    };

    // Additions and modifications first, removals after, so a rename
    // expressed as add+drop never leaves the table without the column.
    let mut actions = Vec::new();
    for column in &table_diff.columns_added {
        if let Some(field) = declared.fields_of(table).find(|f| &f.name == column) {
            actions.push(AlterAction::AddColumn(compile::compile_field(table, field)));
        }
    }
    for change in &table_diff.columns_modified {
        let Some(field) = declared.fields_of(table).find(|f| f.name == change.column) else {
            continue;
        };
        let supported: Vec<String> = change
            .changes
            .keys()
            .filter(|k| matches!(k.as_str(), "type" | "nullable" | "default"))
            .cloned()
            .collect();
        if !supported.is_empty() {
            actions.push(AlterAction::ModifyColumn {
                column: compile::compile_field(table, field),
                changes: supported,
            });
        }
        for attr in change.changes.keys() {
            if matches!(attr.as_str(), "primary_key" | "unique") {
                plan.steps.push(PlannedStep::unsupported(format!(
                    "column {}.{} changes {attr}; adjust the constraint manually",
                    table_diff.table, change.column
                )));
            }
        }
    }
    if !actions.is_empty() {
        let summary = format!("alter table {}", table_diff.table);
        plan.steps.push(PlannedStep::safe(
            Node::AlterTable(AlterTableNode {
                table: table_diff.table.clone(),
                actions,
            }),
            summary,
        ));
    }

    for column in &table_diff.columns_removed {
        plan.steps.push(PlannedStep::destructive(
            Node::AlterTable(AlterTableNode {
                table: table_diff.table.clone(),
                actions: vec![AlterAction::DropColumn(column.clone())],
            }),
            format!("drop column {}.{column}", table_diff.table),
        ));
    }
}

fn plan_index_changes(diff: &SchemaDiff, declared: &Database, plan: &mut MigrationPlan) {
    for name in &diff.indexes_added {
        let Some(index) = declared.indexes.iter().find(|i| &i.name == name) else {
            continue;
        };
        plan.steps.push(PlannedStep::safe(
            Node::CreateIndex(IndexNode {
                name: index.name.clone(),
                table: index.table.clone(),
                columns: index.columns.clone(),
                unique: index.unique,
                comment: index.comment.clone(),
            }),
            format!("create index {name}"),
        ));
    }
    for name in &diff.indexes_removed {
        plan.steps.push(PlannedStep::destructive(
            Node::DropIndex {
                name: name.clone(),
                table: None,
            },
            format!("drop index {name}"),
        ));
    }
}

fn plan_removals(diff: &SchemaDiff, plan: &mut MigrationPlan) {
    // Foreign key edges are unknown for tables absent from the declared
    // model, so drops run in reverse name order with CASCADE.
    let mut removed = diff.tables_removed.clone();
    removed.sort_by(|a, b| b.cmp(a));
    for name in removed {
        plan.steps.push(PlannedStep::destructive(
            Node::DropTable {
                name: name.clone(),
                cascade: true,
            },
            format!("drop table {name}"),
        ));
    }
    for name in &diff.enums_removed {
        plan.steps.push(PlannedStep::destructive(
            Node::DropEnum(name.clone()),
            format!("drop enum {name}"),
        ));
    }
}
