//! PostgreSQL catalog introspection.

use std::collections::{BTreeMap, BTreeSet};

use sqlx::postgres::PgPool;

use ptah_core::snapshot::{DbColumn, DbEnum, DbIndex, DbTable, SchemaSnapshot};

/// Reads the `public` schema into a snapshot.
pub(super) async fn introspect(pool: &PgPool) -> sqlx::Result<SchemaSnapshot> {
    let mut snapshot = SchemaSnapshot::new();

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .fetch_all(pool)
    .await?;

    for (table_name,) in tables {
        let primary = primary_key_columns(pool, &table_name).await?;
        let unique = unique_columns(pool, &table_name).await?;

        let columns: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT column_name, data_type, udt_name, is_nullable, column_default \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(&table_name)
        .fetch_all(pool)
        .await?;

        let table = DbTable {
            name: table_name.clone(),
            columns: columns
                .into_iter()
                .map(
                    |(name, data_type, udt_name, is_nullable, column_default)| DbColumn {
                        is_primary_key: primary.contains(&name),
                        is_unique: unique.contains(&name),
                        name,
                        data_type,
                        udt_name: Some(udt_name),
                        is_nullable: is_nullable == "YES",
                        column_default,
                    },
                )
                .collect(),
        };

        let indexes: Vec<(String, bool, bool)> = sqlx::query_as(
            "SELECT i.relname, ix.indisprimary, ix.indisunique \
             FROM pg_class t \
             JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             WHERE t.relname = $1 \
             ORDER BY i.relname",
        )
        .bind(&table_name)
        .fetch_all(pool)
        .await?;
        for (name, is_primary, is_unique) in indexes {
            snapshot.indexes.push(DbIndex {
                name,
                table: table_name.clone(),
                is_primary,
                is_unique,
            });
        }

        snapshot.tables.push(table);
    }

    snapshot.enums = enum_types(pool).await?;
    Ok(snapshot)
}

async fn primary_key_columns(pool: &PgPool, table: &str) -> sqlx::Result<BTreeSet<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_name = kcu.table_name \
         WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
           AND tc.constraint_type = 'PRIMARY KEY'",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}

/// Columns backed by a single-column UNIQUE constraint. Multi-column
/// constraints do not make any one of their columns unique on its own.
async fn unique_columns(pool: &PgPool, table: &str) -> sqlx::Result<BTreeSet<String>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT tc.constraint_name, kcu.column_name \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name AND tc.table_name = kcu.table_name \
         WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
           AND tc.constraint_type = 'UNIQUE'",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    let mut by_constraint: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (constraint, column) in rows {
        by_constraint.entry(constraint).or_default().push(column);
    }
    Ok(by_constraint
        .into_values()
        .filter(|columns| columns.len() == 1)
        .flatten()
        .collect())
}

async fn enum_types(pool: &PgPool) -> sqlx::Result<Vec<DbEnum>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT t.typname, e.enumlabel \
         FROM pg_type t \
         JOIN pg_enum e ON t.oid = e.enumtypid \
         JOIN pg_namespace n ON n.oid = t.typnamespace \
         WHERE n.nspname = 'public' \
         ORDER BY t.typname, e.enumsortorder",
    )
    .fetch_all(pool)
    .await?;

    let mut enums: Vec<DbEnum> = Vec::new();
    for (name, label) in rows {
        match enums.last_mut() {
            Some(last) if last.name == name => last.values.push(label),
            _ => enums.push(DbEnum {
                name,
                values: vec![label],
            }),
        }
    }
    Ok(enums)
}
