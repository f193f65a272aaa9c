//! Migration file generation and discovery.
//!
//! Each migration is a pair of files in the migrations directory:
//! `<10-digit-sequence>_<snake_description>.up.sql` and the matching
//! `.down.sql`. The zero-padded prefix guarantees lexical sort order equals
//! chronological order; the next sequence is one past the highest existing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use ptah_core::ast::{AlterAction, Node};
use ptah_core::plan::{MigrationPlan, PlannedStep, Severity};
use ptah_core::Dialect;

use crate::error::{MigrateError, Result};

/// Marker line prefixed to destructive statements in generated SQL. The
/// executor refuses files containing it unless destruction is confirmed.
pub const DESTRUCTIVE_MARKER: &str = "-- DESTRUCTIVE:";

/// A migration file pair on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Sequence number from the filename prefix.
    pub version: u64,
    /// Description from the filename.
    pub description: String,
    /// Path to the forward SQL file.
    pub up_path: PathBuf,
    /// Path to the backward SQL file, if present.
    pub down_path: Option<PathBuf>,
}

impl MigrationFile {
    /// Returns the migration identifier (`0000000003_add_orders`).
    #[must_use]
    pub fn id(&self) -> String {
        format!("{:010}_{}", self.version, self.description)
    }
}

/// Parses `<seq>_<description>.up.sql` into its parts.
#[must_use]
pub fn parse_filename(name: &str) -> Option<(u64, String)> {
    let stem = name.strip_suffix(".up.sql")?;
    let (seq, description) = stem.split_once('_')?;
    if seq.len() != 10 {
        return None;
    }
    let version = seq.parse::<u64>().ok()?;
    Some((version, description.to_string()))
}

/// Discovers migration file pairs in a directory, ordered by version.
///
/// # Errors
///
/// Returns [`MigrateError::BadMigrationFilename`] for `.up.sql` files that
/// do not follow the naming scheme.
pub fn discover_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    let mut migrations = Vec::new();
    if !dir.exists() {
        return Ok(migrations);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".up.sql") {
            continue;
        }
        let (version, description) = parse_filename(name)
            .ok_or_else(|| MigrateError::BadMigrationFilename(path.clone()))?;
        let down_path = path.with_file_name(format!("{:010}_{description}.down.sql", version));
        migrations.push(MigrationFile {
            version,
            description,
            up_path: path,
            down_path: down_path.exists().then_some(down_path),
        });
    }
    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

/// Returns the next free sequence number in a directory.
///
/// # Errors
///
/// Propagates discovery errors.
pub fn next_sequence(dir: &Path) -> Result<u64> {
    Ok(discover_migrations(dir)?
        .last()
        .map_or(1, |m| m.version + 1))
}

/// Lowercases a description into a filename-safe snake_case slug.
#[must_use]
pub fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    let mut last_was_separator = true;
    for c in description.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Writes migration file pairs for a plan.
#[derive(Debug)]
pub struct MigrationWriter {
    dir: PathBuf,
    dialect: Dialect,
}

impl MigrationWriter {
    /// Creates a writer targeting a directory and dialect.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            dir: dir.into(),
            dialect,
        }
    }

    /// Writes the `.up.sql`/`.down.sql` pair for a plan and returns the
    /// created migration file record.
    ///
    /// # Errors
    ///
    /// Returns rendering or IO errors.
    pub fn write(&self, plan: &MigrationPlan, description: &str) -> Result<MigrationFile> {
        let version = next_sequence(&self.dir)?;
        let slug = slugify(description);

        let up = render_up(plan, self.dialect)?;
        let down = render_down(plan, self.dialect)?;

        fs::create_dir_all(&self.dir)?;
        let up_path = self.dir.join(format!("{version:010}_{slug}.up.sql"));
        let down_path = self.dir.join(format!("{version:010}_{slug}.down.sql"));
        fs::write(&up_path, up)?;
        fs::write(&down_path, down)?;

        info!(
            version,
            up = %up_path.display(),
            down = %down_path.display(),
            "Wrote migration pair"
        );

        Ok(MigrationFile {
            version,
            description: slug,
            up_path,
            down_path: Some(down_path),
        })
    }
}

/// Renders the forward SQL for a plan, annotating destructive steps.
///
/// # Errors
///
/// Propagates dialect rendering errors.
pub fn render_up(plan: &MigrationPlan, dialect: Dialect) -> Result<String> {
    let renderer = dialect.renderer();
    let mut blocks = Vec::with_capacity(plan.steps.len());
    for step in &plan.steps {
        let Some(sql) = renderer.render_node(&step.node).map_err(MigrateError::Core)? else {
            continue;
        };
        match step.severity {
            Severity::Safe => blocks.push(sql),
            Severity::Destructive => {
                blocks.push(format!("{DESTRUCTIVE_MARKER} {}\n{sql}", step.summary));
            }
            // Unsupported steps are already rendered as warning comments.
            Severity::Unsupported => blocks.push(sql),
        }
    }
    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

/// Renders the backward SQL for a plan: reversible steps in reverse order,
/// irreversible ones as explanatory comments.
///
/// # Errors
///
/// Propagates dialect rendering errors.
pub fn render_down(plan: &MigrationPlan, dialect: Dialect) -> Result<String> {
    let renderer = dialect.renderer();
    let mut blocks = Vec::with_capacity(plan.steps.len());
    for step in plan.steps.iter().rev() {
        match reverse_step(step) {
            Some(node) => {
                if let Some(sql) = renderer.render_node(&node).map_err(MigrateError::Core)? {
                    blocks.push(sql);
                }
            }
            None => blocks.push(format!("-- irreversible: {}", step.summary)),
        }
    }
    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

/// Derives the reverse of a planned step, where one exists.
fn reverse_step(step: &PlannedStep) -> Option<Node> {
    match &step.node {
        Node::CreateTable(t) => Some(Node::DropTable {
            name: t.name.clone(),
            cascade: false,
        }),
        Node::CreateEnum(e) => Some(Node::DropEnum(e.name.clone())),
        Node::CreateIndex(i) => Some(Node::DropIndex {
            name: i.name.clone(),
            table: Some(i.table.clone()),
        }),
        Node::AlterTable(alter) => {
            // Only pure column additions reverse mechanically.
            let mut reversed = Vec::with_capacity(alter.actions.len());
            for action in alter.actions.iter().rev() {
                match action {
                    AlterAction::AddColumn(col) => {
                        reversed.push(AlterAction::DropColumn(col.name.clone()));
                    }
                    AlterAction::DropColumn(_) | AlterAction::ModifyColumn { .. } => return None,
                }
            }
            Some(Node::AlterTable(ptah_core::ast::AlterTableNode {
                table: alter.table.clone(),
                actions: reversed,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptah_core::ast::{ColumnNode, CreateTableNode, DataType, EnumNode};
    use ptah_core::plan::PlannedStep;

    fn create_users_plan() -> MigrationPlan {
        let mut table = CreateTableNode::new("users");
        let mut id = ColumnNode::new("id", DataType::Serial);
        id.primary_key = true;
        id.nullable = false;
        table.columns.push(id);

        MigrationPlan {
            steps: vec![
                PlannedStep {
                    node: Node::CreateEnum(EnumNode {
                        name: "enum_users_status".into(),
                        values: vec!["active".into(), "inactive".into()],
                    }),
                    severity: Severity::Safe,
                    summary: "create enum enum_users_status".into(),
                },
                PlannedStep {
                    node: Node::CreateTable(table),
                    severity: Severity::Safe,
                    summary: "create table users".into(),
                },
            ],
        }
    }

    #[test]
    fn test_parse_filename() {
        assert_eq!(
            parse_filename("0000000001_create_users.up.sql"),
            Some((1, "create_users".to_string()))
        );
        assert_eq!(parse_filename("1_create_users.up.sql"), None);
        assert_eq!(parse_filename("0000000001_create_users.down.sql"), None);
        assert_eq!(parse_filename("notes.txt"), None);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Add orders table"), "add_orders_table");
        assert_eq!(slugify("fix: price -> decimal!"), "fix_price_decimal");
        assert_eq!(slugify("already_snake"), "already_snake");
    }

    #[test]
    fn test_write_pair_and_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MigrationWriter::new(dir.path(), Dialect::Postgres);

        let first = writer.write(&create_users_plan(), "create users").unwrap();
        assert_eq!(first.version, 1);
        assert!(first.up_path.ends_with("0000000001_create_users.up.sql"));
        assert!(first.down_path.as_ref().unwrap().exists());

        let second = writer.write(&create_users_plan(), "again").unwrap();
        assert_eq!(second.version, 2);

        let discovered = discover_migrations(dir.path()).unwrap();
        assert_eq!(discovered.len(), 2);
        assert_eq!(discovered[0].version, 1);
        assert_eq!(discovered[1].version, 2);
        // Lexical order equals chronological order.
        let mut names: Vec<String> = discovered
            .iter()
            .map(|m| m.up_path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        let chronological = names.clone();
        names.sort();
        assert_eq!(names, chronological);
    }

    #[test]
    fn test_up_contains_enum_before_table() {
        let up = render_up(&create_users_plan(), Dialect::Postgres).unwrap();
        let enum_pos = up.find("CREATE TYPE").unwrap();
        let table_pos = up.find("CREATE TABLE").unwrap();
        assert!(enum_pos < table_pos);
    }

    #[test]
    fn test_down_reverses_in_reverse_order() {
        let down = render_down(&create_users_plan(), Dialect::Postgres).unwrap();
        let drop_table = down.find("DROP TABLE IF EXISTS \"users\"").unwrap();
        let drop_type = down.find("DROP TYPE IF EXISTS enum_users_status").unwrap();
        assert!(drop_table < drop_type);
    }

    #[test]
    fn test_destructive_steps_are_marked() {
        let plan = MigrationPlan {
            steps: vec![PlannedStep {
                node: Node::DropTable {
                    name: "legacy".into(),
                    cascade: true,
                },
                severity: Severity::Destructive,
                summary: "drop table legacy".into(),
            }],
        };
        let up = render_up(&plan, Dialect::Postgres).unwrap();
        assert!(up.contains(DESTRUCTIVE_MARKER));
        assert!(up.contains("DROP TABLE IF EXISTS \"legacy\" CASCADE;"));

        let safe = render_up(&create_users_plan(), Dialect::Postgres).unwrap();
        assert!(!safe.contains(DESTRUCTIVE_MARKER));
    }

    #[test]
    fn test_mysql_up_skips_enum_nodes() {
        let up = render_up(&create_users_plan(), Dialect::MySql).unwrap();
        assert!(!up.contains("CREATE TYPE"));
        assert!(up.contains("CREATE TABLE `users`"));
    }
}
