//! Type and default-value normalization for cross-dialect comparison.
//!
//! The same logical type has different spellings per dialect and per
//! introspection source (a declared `SERIAL` introspects as `int4` on
//! PostgreSQL and as `int(11)` on MySQL), so both sides of a comparison
//! pass through the same bucketing before equality testing.

use crate::dialect::Dialect;

/// Normalizes a SQL type string into a comparison bucket.
///
/// Case-insensitive, substring-based: any spelling containing `varchar`
/// buckets to `varchar`, `serial`/`int` to `integer`, and so on.
/// Unrecognized names pass through lowercased.
#[must_use]
pub fn sql_type(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    if lower.contains("varchar") || lower.contains("character varying") {
        return "varchar".to_string();
    }
    if lower.contains("text") {
        return "text".to_string();
    }
    if lower.contains("enum") {
        return "enum".to_string();
    }
    if lower.contains("bool") {
        return "boolean".to_string();
    }
    if lower.contains("serial") || lower.contains("int") {
        return "integer".to_string();
    }
    if lower.contains("timestamp") || lower.contains("datetime") {
        return "timestamp".to_string();
    }
    if lower.contains("decimal") || lower.contains("numeric") {
        return "decimal".to_string();
    }
    lower
}

/// Dialect-parameterized type normalization.
///
/// MySQL and MariaDB have no boolean type; `tinyint(1)` is the canonical
/// boolean spelling there and must bucket accordingly (before the generic
/// `int` rule would claim it).
#[must_use]
pub fn sql_type_for(raw: &str, dialect: Dialect) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    if dialect.is_mysql_family() && lower.starts_with("tinyint(1)") {
        return "boolean".to_string();
    }
    sql_type(raw)
}

/// Normalizes a default-value expression for comparison.
///
/// Returns `None` for "no default": an absent value, an empty string and an
/// explicit `NULL` literal are all equivalent. PostgreSQL introspection
/// artifacts are stripped (type casts like `'x'::character varying`,
/// `nextval(...)` sequence defaults backing SERIAL columns), and for
/// boolean columns the `1`/`0` spellings fold to `true`/`false`.
#[must_use]
pub fn default_value(raw: Option<&str>, is_boolean: bool) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let mut value = raw.to_string();

    // Sequence-backed defaults describe auto-increment, not a user default.
    if value.contains("nextval(") {
        return None;
    }

    // Strip a trailing '::type' cast (possibly quoted, possibly spaced).
    if let Some(pos) = value.find("::") {
        value.truncate(pos);
    }

    let value = value.trim().trim_matches('\'').trim();
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        return None;
    }

    let lower = value.to_ascii_lowercase();
    if is_boolean {
        return Some(match lower.as_str() {
            "1" | "true" | "t" => "true".to_string(),
            "0" | "false" | "f" => "false".to_string(),
            _ => lower,
        });
    }

    Some(lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varchar_bucket() {
        assert_eq!(sql_type("VARCHAR(255)"), "varchar");
        assert_eq!(sql_type("varchar"), "varchar");
        assert_eq!(sql_type("character varying"), "varchar");
        assert_eq!(sql_type("VARCHAR(255)"), sql_type("varchar"));
    }

    #[test]
    fn test_integer_bucket() {
        assert_eq!(sql_type("SERIAL"), "integer");
        assert_eq!(sql_type("INTEGER"), "integer");
        assert_eq!(sql_type("int4"), "integer");
        assert_eq!(sql_type("int(11)"), "integer");
        assert_eq!(sql_type("BIGINT"), "integer");
        assert_eq!(sql_type("SERIAL"), sql_type("INTEGER"));
    }

    #[test]
    fn test_boolean_bucket_is_dialect_specific() {
        assert_eq!(sql_type("BOOLEAN"), "boolean");
        assert_eq!(sql_type("bool"), "boolean");
        // Generic bucketing sends tinyint(1) to integer...
        assert_eq!(sql_type("TINYINT(1)"), "integer");
        // ...but under the MySQL family it is the boolean spelling.
        assert_eq!(sql_type_for("TINYINT(1)", Dialect::MySql), "boolean");
        assert_eq!(sql_type_for("TINYINT(1)", Dialect::MariaDb), "boolean");
        assert_eq!(
            sql_type_for("TINYINT(1)", Dialect::MySql),
            sql_type_for("BOOLEAN", Dialect::MySql)
        );
    }

    #[test]
    fn test_timestamp_and_decimal_buckets() {
        assert_eq!(sql_type("TIMESTAMP"), "timestamp");
        assert_eq!(sql_type("timestamp without time zone"), "timestamp");
        assert_eq!(sql_type("datetime"), "timestamp");
        assert_eq!(sql_type("DECIMAL(10,2)"), "decimal");
        assert_eq!(sql_type("numeric"), "decimal");
    }

    #[test]
    fn test_unrecognized_passes_through() {
        assert_eq!(sql_type("UUID"), "uuid");
        assert_eq!(sql_type("tsvector"), "tsvector");
    }

    #[test]
    fn test_default_absent_null_empty_equivalent() {
        assert_eq!(default_value(None, false), None);
        assert_eq!(default_value(Some(""), false), None);
        assert_eq!(default_value(Some("NULL"), false), None);
        assert_eq!(default_value(Some("''"), false), None);
    }

    #[test]
    fn test_default_strips_postgres_casts() {
        assert_eq!(
            default_value(Some("'active'::character varying"), false),
            Some("active".to_string())
        );
        assert_eq!(
            default_value(Some("nextval('users_id_seq'::regclass)"), false),
            None
        );
    }

    #[test]
    fn test_default_boolean_folding() {
        assert_eq!(default_value(Some("1"), true), Some("true".to_string()));
        assert_eq!(default_value(Some("0"), true), Some("false".to_string()));
        assert_eq!(default_value(Some("true"), true), Some("true".to_string()));
        assert_eq!(default_value(Some("1"), false), Some("1".to_string()));
    }
}
