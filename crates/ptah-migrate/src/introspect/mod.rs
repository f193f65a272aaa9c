//! Live-schema introspection.
//!
//! Reads a connected database's catalog into a
//! [`ptah_core::SchemaSnapshot`] with the same shape as the declared model,
//! for comparison purposes only. Nothing here mutates the database, and
//! snapshots are never cached: the live schema can change between runs.

mod mysql;
mod postgres;

use ptah_core::SchemaSnapshot;
use tracing::debug;

use crate::error::Result;
use crate::ledger::LEDGER_TABLE;
use crate::pool::{DbPool, PoolKind};

impl DbPool {
    /// Introspects the connected database into a fresh snapshot.
    ///
    /// The Ptah ledger table is filtered out, so a database whose schema
    /// was fully applied by Ptah diffs clean against its declared model.
    ///
    /// # Errors
    ///
    /// Returns the underlying database error.
    pub async fn introspect(&self) -> Result<SchemaSnapshot> {
        let mut snapshot = match &self.kind {
            PoolKind::Postgres(pool) => postgres::introspect(pool).await?,
            PoolKind::MySql(pool) => mysql::introspect(pool).await?,
        };
        snapshot.tables.retain(|t| t.name != LEDGER_TABLE);
        snapshot.indexes.retain(|i| i.table != LEDGER_TABLE);
        debug!(
            tables = snapshot.tables.len(),
            indexes = snapshot.indexes.len(),
            enums = snapshot.enums.len(),
            "Introspected live schema"
        );
        Ok(snapshot)
    }
}

/// Parses the value list out of a MySQL inline `enum('a','b')` column type.
pub(crate) fn parse_inline_enum(column_type: &str) -> Option<Vec<String>> {
    let lower = column_type.trim();
    let body = lower
        .strip_prefix("enum(")
        .or_else(|| lower.strip_prefix("ENUM("))?
        .strip_suffix(')')?;
    Some(
        body.split(',')
            .map(|v| v.trim().trim_matches('\'').to_string())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inline_enum() {
        assert_eq!(
            parse_inline_enum("enum('active','inactive')"),
            Some(vec!["active".to_string(), "inactive".to_string()])
        );
        assert_eq!(parse_inline_enum("varchar(255)"), None);
    }
}
