//! Transactional migration executor.
//!
//! Applies pending migration files against a target database. Each file
//! runs in its own transaction: begin, execute the forward SQL, record the
//! version in the ledger, commit. Any failure rolls the whole file back and
//! halts without attempting later files, so the target is always either
//! fully before or fully after a given migration.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::generate::{discover_migrations, MigrationFile, DESTRUCTIVE_MARKER};
use crate::ledger::{AppliedMigration, Ledger};
use crate::pool::DbPool;

use ptah_core::Dialect;

/// Executes migration files against a database.
pub struct MigrationExecutor {
    pool: DbPool,
    ledger: Ledger,
    dry_run: bool,
    confirm_destructive: bool,
}

impl MigrationExecutor {
    /// Creates an executor over a pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        let ledger = Ledger::new(pool.clone());
        Self {
            pool,
            ledger,
            dry_run: false,
            confirm_destructive: false,
        }
    }

    /// Enables dry-run mode: plan and report, touch nothing.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Confirms execution of destructive statements.
    #[must_use]
    pub fn confirm_destructive(mut self, enabled: bool) -> Self {
        self.confirm_destructive = enabled;
        self
    }

    /// Ensures the ledger table exists (skipped in dry-run mode).
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn init(&self) -> Result<()> {
        if !self.dry_run {
            self.ledger.ensure_table().await?;
        }
        Ok(())
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the connected pool.
    #[must_use]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Returns migration files not yet recorded in the ledger, in order.
    ///
    /// # Errors
    ///
    /// Returns discovery or database errors.
    pub async fn pending(&self, dir: &Path) -> Result<Vec<MigrationFile>> {
        let files = discover_migrations(dir)?;
        let applied = self.ledger.applied_versions().await?;
        Ok(pending_of(files, &applied))
    }

    /// Returns every discovered migration with its applied flag.
    ///
    /// # Errors
    ///
    /// Returns discovery or database errors.
    pub async fn status(&self, dir: &Path) -> Result<Vec<(MigrationFile, bool)>> {
        let files = discover_migrations(dir)?;
        let applied = self.ledger.applied_versions().await?;
        Ok(files
            .into_iter()
            .map(|f| {
                let version = i64::try_from(f.version).unwrap_or(i64::MAX);
                let is_applied = applied.contains(&version);
                (f, is_applied)
            })
            .collect())
    }

    /// Lists applied migrations from the ledger.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn applied(&self) -> Result<Vec<AppliedMigration>> {
        self.ledger.list().await
    }

    /// Applies all pending migrations and returns the applied versions.
    ///
    /// Halts at the first failing file, after rolling its transaction back.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ConfirmationRequired`] for unconfirmed
    /// destructive files and [`MigrateError::Execution`] for SQL failures.
    pub async fn apply_pending(&self, dir: &Path) -> Result<Vec<u64>> {
        let pending = self.pending(dir).await?;
        if pending.is_empty() {
            info!("No pending migrations");
            return Ok(Vec::new());
        }

        let mut applied = Vec::with_capacity(pending.len());
        for file in &pending {
            self.apply_file(file).await?;
            applied.push(file.version);
        }
        Ok(applied)
    }

    /// Applies one migration file in a single transaction.
    async fn apply_file(&self, file: &MigrationFile) -> Result<()> {
        let sql = fs::read_to_string(&file.up_path)?;

        if requires_confirmation(&sql) && !self.confirm_destructive && !self.dry_run {
            return Err(MigrateError::ConfirmationRequired(format!(
                "migration {} contains destructive statements; pass --confirm-destructive",
                file.id()
            )));
        }

        let statements = split_statements(&sql);

        if self.dry_run {
            info!(migration = %file.id(), "Dry run, would execute:");
            for statement in &statements {
                println!("{statement}");
            }
            return Ok(());
        }

        info!(migration = %file.id(), "Applying migration");
        let mut tx = self.pool.begin().await?;
        for statement in &statements {
            debug!(sql = %statement, "Executing statement");
            if let Err(e) = tx.execute(statement).await {
                let message = e.to_string();
                warn!(migration = %file.id(), error = %message, "Rolling back");
                tx.rollback().await?;
                return Err(MigrateError::Execution {
                    file: file.id(),
                    message,
                });
            }
        }

        let version = i64::try_from(file.version).unwrap_or(i64::MAX);
        if let Err(e) = self.ledger.record_in(&mut tx, version, &file.description).await {
            let message = e.to_string();
            tx.rollback().await?;
            return Err(MigrateError::Execution {
                file: file.id(),
                message,
            });
        }
        tx.commit().await?;

        info!(migration = %file.id(), "Migration applied");
        Ok(())
    }

    /// Reverts the most recently applied migration using its down file.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::MissingDownFile`] if the matching
    /// `.down.sql` is absent, or execution errors.
    pub async fn revert_last(&self, dir: &Path) -> Result<Option<u64>> {
        let applied = self.ledger.applied_versions().await?;
        let Some(&last) = applied.iter().next_back() else {
            info!("Nothing to revert");
            return Ok(None);
        };

        let files = discover_migrations(dir)?;
        let file = files
            .iter()
            .find(|f| i64::try_from(f.version).is_ok_and(|v| v == last))
            .ok_or_else(|| MigrateError::MissingDownFile(format!("{last:010}")))?;
        let down_path = file
            .down_path
            .as_ref()
            .ok_or_else(|| MigrateError::MissingDownFile(file.id()))?;
        let sql = fs::read_to_string(down_path)?;
        let statements = split_statements(&sql);

        if self.dry_run {
            info!(migration = %file.id(), "Dry run, would revert:");
            for statement in &statements {
                println!("{statement}");
            }
            return Ok(Some(file.version));
        }

        info!(migration = %file.id(), "Reverting migration");
        let mut tx = self.pool.begin().await?;
        for statement in &statements {
            if let Err(e) = tx.execute(statement).await {
                let message = e.to_string();
                tx.rollback().await?;
                return Err(MigrateError::Execution {
                    file: file.id(),
                    message,
                });
            }
        }
        if let Err(e) = self.ledger.remove_in(&mut tx, last).await {
            let message = e.to_string();
            tx.rollback().await?;
            return Err(MigrateError::Execution {
                file: file.id(),
                message,
            });
        }
        tx.commit().await?;

        info!(migration = %file.id(), "Migration reverted");
        Ok(Some(file.version))
    }

    /// Drops every user table (and, on PostgreSQL, every enum type) in the
    /// target database, including the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ConfirmationRequired`] unless confirmed or
    /// in dry-run mode.
    pub async fn reset(&self, confirm: bool) -> Result<()> {
        if !confirm && !self.dry_run {
            return Err(MigrateError::ConfirmationRequired(
                "reset drops every table in the target database; pass --confirm".into(),
            ));
        }

        let snapshot = self.pool.introspect().await?;
        let mut statements = Vec::new();
        if self.pool.dialect().is_mysql_family() {
            statements.push("SET FOREIGN_KEY_CHECKS = 0;".to_string());
        }
        for table in &snapshot.tables {
            statements.push(match self.pool.dialect() {
                Dialect::Postgres => format!("DROP TABLE IF EXISTS \"{}\" CASCADE;", table.name),
                Dialect::MySql | Dialect::MariaDb => {
                    format!("DROP TABLE IF EXISTS `{}`;", table.name)
                }
            });
        }
        if self.pool.dialect() == Dialect::Postgres {
            for e in &snapshot.enums {
                statements.push(format!("DROP TYPE IF EXISTS {};", e.name));
            }
        }
        statements.push(match self.pool.dialect() {
            Dialect::Postgres => format!("DROP TABLE IF EXISTS \"{}\";", crate::ledger::LEDGER_TABLE),
            Dialect::MySql | Dialect::MariaDb => {
                format!("DROP TABLE IF EXISTS `{}`;", crate::ledger::LEDGER_TABLE)
            }
        });
        if self.pool.dialect().is_mysql_family() {
            statements.push("SET FOREIGN_KEY_CHECKS = 1;".to_string());
        }

        if self.dry_run {
            info!("Dry run, would execute:");
            for statement in &statements {
                println!("{statement}");
            }
            return Ok(());
        }

        warn!(
            tables = snapshot.tables.len(),
            "Dropping all tables in target database"
        );
        for statement in &statements {
            self.pool.execute(statement).await?;
        }
        Ok(())
    }

    /// Drops a whole database, terminating active server-side connections
    /// to it first so the drop cannot hang on lock contention.
    ///
    /// The connected pool must point at a different (maintenance)
    /// database.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::ConfirmationRequired`] unless confirmed or
    /// in dry-run mode.
    pub async fn drop_database(&self, name: &str, confirm: bool) -> Result<()> {
        if !confirm && !self.dry_run {
            return Err(MigrateError::ConfirmationRequired(format!(
                "dropping database '{name}'; pass --confirm"
            )));
        }
        if self.dry_run {
            info!(database = name, "Dry run, would drop database");
            return Ok(());
        }

        if self.pool.dialect() == Dialect::Postgres {
            let terminate = format!(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                 WHERE datname = '{name}' AND pid <> pg_backend_pid();"
            );
            self.pool.execute(&terminate).await?;
            self.pool
                .execute(&format!("DROP DATABASE IF EXISTS \"{name}\";"))
                .await?;
        } else {
            self.pool
                .execute(&format!("DROP DATABASE IF EXISTS `{name}`;"))
                .await?;
        }
        warn!(database = name, "Database dropped");
        Ok(())
    }
}

/// Filters the not-yet-applied files out of a discovered list.
#[must_use]
pub fn pending_of(
    files: Vec<MigrationFile>,
    applied: &std::collections::BTreeSet<i64>,
) -> Vec<MigrationFile> {
    files
        .into_iter()
        .filter(|f| {
            i64::try_from(f.version)
                .map(|v| !applied.contains(&v))
                .unwrap_or(true)
        })
        .collect()
}

/// Returns whether a migration file carries the destructive marker.
#[must_use]
pub fn requires_confirmation(sql: &str) -> bool {
    sql.contains(DESTRUCTIVE_MARKER)
}

/// Splits SQL text into executable statements on line-terminating
/// semicolons, dropping comment-only chunks.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        current.push_str(line);
        current.push('\n');
        if trimmed.ends_with(';') {
            push_statement(&mut statements, &mut current);
        }
    }
    push_statement(&mut statements, &mut current);

    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    // Chunks made only of comment lines carry no executable SQL.
    let executable = statement
        .lines()
        .any(|l| !l.trim().is_empty() && !l.trim().starts_with("--"));
    if executable {
        statements.push(statement.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn file(version: u64) -> MigrationFile {
        MigrationFile {
            version,
            description: format!("step{version}"),
            up_path: PathBuf::from(format!("{version:010}_step{version}.up.sql")),
            down_path: None,
        }
    }

    #[test]
    fn test_pending_of_filters_applied() {
        let files = vec![file(1), file(2), file(3)];
        let applied: BTreeSet<i64> = [1, 2].into_iter().collect();
        let pending = pending_of(files, &applied);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].version, 3);
    }

    #[test]
    fn test_split_statements() {
        let sql = "-- POSTGRES TABLE: users --\nCREATE TABLE users (\n    id SERIAL PRIMARY KEY\n);\n\nCREATE INDEX idx ON users (id);\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("-- POSTGRES TABLE"));
        assert!(statements[0].ends_with(");"));
        assert!(statements[1].starts_with("CREATE INDEX"));
    }

    #[test]
    fn test_split_statements_drops_comment_only_chunks() {
        let sql = "-- UNSUPPORTED: enum value removal\n\n-- irreversible: drop column\n";
        assert!(split_statements(sql).is_empty());
    }

    #[test]
    fn test_requires_confirmation() {
        assert!(requires_confirmation(
            "-- DESTRUCTIVE: drop column users.legacy\nALTER TABLE users DROP COLUMN legacy;"
        ));
        assert!(!requires_confirmation("CREATE TABLE t (id INT);"));
    }

    #[test]
    fn test_statement_without_trailing_semicolon_still_executes() {
        let statements = split_statements("CREATE TABLE t (id INT)");
        assert_eq!(statements.len(), 1);
    }
}

#[cfg(test)]
mod live_tests {
    //! Transactional-atomicity tests against a real server. Run with a
    //! DATABASE_URL pointing at a disposable database and `--ignored`.

    use super::*;

    async fn executor_from_env() -> Option<MigrationExecutor> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = DbPool::connect(&url).await.ok()?;
        Some(MigrationExecutor::new(pool))
    }

    #[tokio::test]
    #[ignore = "requires a running database via DATABASE_URL"]
    async fn failing_migration_leaves_schema_unchanged() {
        let Some(executor) = executor_from_env().await else {
            return;
        };
        executor.init().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("0000000001_bad.up.sql"),
            "CREATE TABLE atomicity_probe (id INT);\nTHIS IS NOT SQL;\n",
        )
        .unwrap();

        let result = executor.apply_pending(dir.path()).await;
        assert!(matches!(result, Err(MigrateError::Execution { .. })));

        // The first statement must have been rolled back with the second.
        let snapshot = executor.pool().introspect().await.unwrap();
        assert!(snapshot.table("atomicity_probe").is_none());
        assert!(executor.ledger().applied_versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running database via DATABASE_URL"]
    async fn apply_then_status_marks_applied() {
        let Some(executor) = executor_from_env().await else {
            return;
        };
        executor.init().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("0000000001_probe.up.sql"),
            "CREATE TABLE status_probe (id INT);\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("0000000001_probe.down.sql"),
            "DROP TABLE IF EXISTS status_probe;\n",
        )
        .unwrap();

        let applied = executor.apply_pending(dir.path()).await.unwrap();
        assert_eq!(applied, vec![1]);

        let status = executor.status(dir.path()).await.unwrap();
        assert!(status.iter().all(|(_, applied)| *applied));

        executor.revert_last(dir.path()).await.unwrap();
        assert!(executor.ledger().applied_versions().await.unwrap().is_empty());
    }
}
