//! MySQL/MariaDB catalog introspection.

use sqlx::mysql::MySqlPool;

use ptah_core::snapshot::{DbColumn, DbEnum, DbIndex, DbTable, SchemaSnapshot};

use super::parse_inline_enum;

/// Reads the connection's default schema into a snapshot.
///
/// MySQL has no standalone enum types; inline `enum(...)` columns surface
/// as synthetic `DbEnum`s keyed `enum_<table>_<column>` so both sides of a
/// comparison share the declared model's naming scheme.
pub(super) async fn introspect(pool: &MySqlPool) -> sqlx::Result<SchemaSnapshot> {
    let mut snapshot = SchemaSnapshot::new();

    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .fetch_all(pool)
    .await?;

    for (table_name,) in tables {
        let columns: Vec<(String, String, String, String, Option<String>)> = sqlx::query_as(
            "SELECT column_name, column_type, is_nullable, column_key, column_default \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .bind(&table_name)
        .fetch_all(pool)
        .await?;

        let mut table = DbTable {
            name: table_name.clone(),
            columns: Vec::with_capacity(columns.len()),
        };
        for (name, column_type, is_nullable, column_key, column_default) in columns {
            if let Some(values) = parse_inline_enum(&column_type) {
                snapshot.enums.push(DbEnum {
                    name: format!("enum_{table_name}_{name}"),
                    values,
                });
            }
            table.columns.push(DbColumn {
                name,
                data_type: column_type,
                udt_name: None,
                is_nullable: is_nullable == "YES",
                is_primary_key: column_key == "PRI",
                is_unique: column_key == "UNI",
                column_default,
            });
        }
        snapshot.tables.push(table);

        let indexes: Vec<(String, i64)> = sqlx::query_as(
            "SELECT DISTINCT index_name, non_unique \
             FROM information_schema.statistics \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY index_name",
        )
        .bind(&table_name)
        .fetch_all(pool)
        .await?;
        for (name, non_unique) in indexes {
            snapshot.indexes.push(DbIndex {
                is_primary: name == "PRIMARY",
                is_unique: non_unique == 0,
                name,
                table: table_name.clone(),
            });
        }
    }

    snapshot.enums.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(snapshot)
}
