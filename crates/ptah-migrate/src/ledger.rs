//! Applied-migrations ledger.
//!
//! The `_ptah_migrations` table records which migration versions have been
//! applied to a database. Records are written inside the same transaction
//! as the migration's own statements, so a rolled-back migration leaves no
//! ledger entry behind.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ptah_core::Dialect;

use crate::error::Result;
use crate::pool::{DbPool, DbTransaction, PoolKind};

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "_ptah_migrations";

/// SQL to create the ledger table (PostgreSQL).
pub const CREATE_LEDGER_TABLE_POSTGRES: &str = r"
CREATE TABLE IF NOT EXISTS _ptah_migrations (
    version BIGINT PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
";

/// SQL to create the ledger table (MySQL/MariaDB).
pub const CREATE_LEDGER_TABLE_MYSQL: &str = r"
CREATE TABLE IF NOT EXISTS _ptah_migrations (
    version BIGINT PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)
";

/// A record of an applied migration.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    /// Migration sequence number.
    pub version: i64,
    /// Human description from the filename.
    pub description: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// Manages the applied-versions ledger in the target database.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: DbPool,
}

impl Ledger {
    /// Creates a ledger manager over a pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ensures the ledger table exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = match self.pool.dialect() {
            Dialect::Postgres => CREATE_LEDGER_TABLE_POSTGRES,
            Dialect::MySql | Dialect::MariaDb => CREATE_LEDGER_TABLE_MYSQL,
        };
        self.pool.execute(sql).await
    }

    /// Returns the set of applied version numbers.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn applied_versions(&self) -> Result<BTreeSet<i64>> {
        const SQL: &str = "SELECT version FROM _ptah_migrations ORDER BY version";
        let rows: Vec<(i64,)> = match &self.pool.kind {
            PoolKind::Postgres(pool) => sqlx::query_as(SQL).fetch_all(pool).await?,
            PoolKind::MySql(pool) => sqlx::query_as(SQL).fetch_all(pool).await?,
        };
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    /// Lists all applied migrations in application order.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn list(&self) -> Result<Vec<AppliedMigration>> {
        const SQL: &str =
            "SELECT version, description, applied_at FROM _ptah_migrations ORDER BY version";
        let rows: Vec<(i64, String, DateTime<Utc>)> = match &self.pool.kind {
            PoolKind::Postgres(pool) => sqlx::query_as(SQL).fetch_all(pool).await?,
            PoolKind::MySql(pool) => sqlx::query_as(SQL).fetch_all(pool).await?,
        };
        Ok(rows
            .into_iter()
            .map(|(version, description, applied_at)| AppliedMigration {
                version,
                description,
                applied_at,
            })
            .collect())
    }

    /// Records a migration as applied, inside the caller's transaction.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn record_in(
        &self,
        tx: &mut DbTransaction,
        version: i64,
        description: &str,
    ) -> sqlx::Result<()> {
        match tx {
            DbTransaction::Postgres(tx) => {
                sqlx::query("INSERT INTO _ptah_migrations (version, description) VALUES ($1, $2)")
                    .bind(version)
                    .bind(description)
                    .execute(&mut **tx)
                    .await?;
            }
            DbTransaction::MySql(tx) => {
                sqlx::query("INSERT INTO _ptah_migrations (version, description) VALUES (?, ?)")
                    .bind(version)
                    .bind(description)
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }

    /// Removes a migration record, inside the caller's transaction (used
    /// when reverting).
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn remove_in(&self, tx: &mut DbTransaction, version: i64) -> sqlx::Result<()> {
        match tx {
            DbTransaction::Postgres(tx) => {
                sqlx::query("DELETE FROM _ptah_migrations WHERE version = $1")
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }
            DbTransaction::MySql(tx) => {
                sqlx::query("DELETE FROM _ptah_migrations WHERE version = ?")
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }
}
