//! Connection pooling across the supported database drivers.
//!
//! One [`DbPool`] wraps either a PostgreSQL or a MySQL sqlx pool, chosen
//! from the URL scheme (`mariadb://` connects through the MySQL driver but
//! keeps the MariaDB dialect for rendering and normalization).

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{MySql, Postgres, Transaction};

use ptah_core::Dialect;

use crate::error::{MigrateError, Result};

/// The underlying driver pool.
#[derive(Debug, Clone)]
pub enum PoolKind {
    /// PostgreSQL pool.
    Postgres(PgPool),
    /// MySQL/MariaDB pool.
    MySql(MySqlPool),
}

/// A dialect-tagged connection pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    pub(crate) kind: PoolKind,
    dialect: Dialect,
}

impl DbPool {
    /// Connects to a database URL, inferring the dialect from the scheme.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::UnsupportedUrl`] for unknown schemes and
    /// database errors for failed connections.
    pub async fn connect(url: &str) -> Result<Self> {
        let dialect = dialect_of(url).ok_or_else(|| MigrateError::UnsupportedUrl(url.into()))?;
        let kind = match dialect {
            Dialect::Postgres => {
                PoolKind::Postgres(PgPoolOptions::new().max_connections(5).connect(url).await?)
            }
            Dialect::MySql | Dialect::MariaDb => {
                // The MySQL driver speaks to MariaDB; only the scheme differs.
                let driver_url = url.replacen("mariadb://", "mysql://", 1);
                PoolKind::MySql(
                    MySqlPoolOptions::new()
                        .max_connections(5)
                        .connect(&driver_url)
                        .await?,
                )
            }
        };
        Ok(Self { kind, dialect })
    }

    /// Wraps an existing PostgreSQL pool.
    #[must_use]
    pub fn from_postgres(pool: PgPool) -> Self {
        Self {
            kind: PoolKind::Postgres(pool),
            dialect: Dialect::Postgres,
        }
    }

    /// Wraps an existing MySQL pool.
    #[must_use]
    pub fn from_mysql(pool: MySqlPool, dialect: Dialect) -> Self {
        Self {
            kind: PoolKind::MySql(pool),
            dialect,
        }
    }

    /// Returns the SQL dialect of the connected database.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Executes raw SQL (possibly several statements) outside a transaction.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        match &self.kind {
            PoolKind::Postgres(pool) => {
                sqlx::raw_sql(sql).execute(pool).await?;
            }
            PoolKind::MySql(pool) => {
                sqlx::raw_sql(sql).execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn begin(&self) -> Result<DbTransaction> {
        Ok(match &self.kind {
            PoolKind::Postgres(pool) => DbTransaction::Postgres(pool.begin().await?),
            PoolKind::MySql(pool) => DbTransaction::MySql(pool.begin().await?),
        })
    }
}

/// Infers the dialect from a database URL scheme.
#[must_use]
pub fn dialect_of(url: &str) -> Option<Dialect> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Some(Dialect::Postgres)
    } else if url.starts_with("mysql://") {
        Some(Dialect::MySql)
    } else if url.starts_with("mariadb://") {
        Some(Dialect::MariaDb)
    } else {
        None
    }
}

/// An in-flight transaction on either driver.
///
/// Dropping it without [`DbTransaction::commit`] rolls back server-side, so
/// a cancelled future can never leave a migration half-applied.
pub enum DbTransaction {
    /// PostgreSQL transaction.
    Postgres(Transaction<'static, Postgres>),
    /// MySQL transaction.
    MySql(Transaction<'static, MySql>),
}

impl DbTransaction {
    /// Executes one SQL statement inside the transaction.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn execute(&mut self, sql: &str) -> sqlx::Result<()> {
        match self {
            Self::Postgres(tx) => {
                sqlx::raw_sql(sql).execute(&mut **tx).await?;
            }
            Self::MySql(tx) => {
                sqlx::raw_sql(sql).execute(&mut **tx).await?;
            }
        }
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn commit(self) -> sqlx::Result<()> {
        match self {
            Self::Postgres(tx) => tx.commit().await,
            Self::MySql(tx) => tx.commit().await,
        }
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn rollback(self) -> sqlx::Result<()> {
        match self {
            Self::Postgres(tx) => tx.rollback().await,
            Self::MySql(tx) => tx.rollback().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_of_url() {
        assert_eq!(dialect_of("postgres://localhost/app"), Some(Dialect::Postgres));
        assert_eq!(
            dialect_of("postgresql://localhost/app"),
            Some(Dialect::Postgres)
        );
        assert_eq!(dialect_of("mysql://localhost/app"), Some(Dialect::MySql));
        assert_eq!(dialect_of("mariadb://localhost/app"), Some(Dialect::MariaDb));
        assert_eq!(dialect_of("sqlite::memory:"), None);
    }
}
