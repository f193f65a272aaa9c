//! Directive comment parsing.
//!
//! A directive is a single-line comment whose body starts with one of the
//! fixed `ptah:` tags, followed by space-separated `key=value` or
//! `key="quoted value"` pairs. Trailing bare words matching a known
//! boolean-attribute name read as `key=true`, so directives can be written
//! naturally (`not_null primary` instead of `not_null=true primary=true`).
//!
//! `platform.<dialect>.<attr>` keys and the bare `engine`/`comment` keys are
//! routed into the override map instead of the main attribute set.

use std::collections::BTreeMap;

use crate::model::{EmbedMode, FkAction, Overrides};

/// Tag introducing a table directive.
pub const TABLE_TAG: &str = "ptah:schema:table";
/// Tag introducing a field directive.
pub const FIELD_TAG: &str = "ptah:schema:field";
/// Tag introducing an index directive.
pub const INDEX_TAG: &str = "ptah:schema:index";
/// Tag introducing an embedded-field directive.
pub const EMBEDDED_TAG: &str = "ptah:embedded";

/// Boolean attribute names accepted as bare words on field directives.
const FIELD_BOOLS: &[&str] = &["not_null", "primary", "unique", "auto_increment"];
/// Boolean attribute names accepted as bare words on index directives.
const INDEX_BOOLS: &[&str] = &["unique"];
/// Boolean attribute names accepted as bare words on embedded directives.
const EMBEDDED_BOOLS: &[&str] = &["nullable", "index"];

/// A parsed, typed directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `ptah:schema:table`.
    Table(TableDirective),
    /// `ptah:schema:field`.
    Field(FieldDirective),
    /// `ptah:schema:index`.
    Index(IndexDirective),
    /// `ptah:embedded`.
    Embedded(EmbeddedDirective),
}

/// A table directive.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDirective {
    /// Table name.
    pub name: String,
    /// Composite primary key columns.
    pub primary_key: Vec<String>,
    /// Table-level check expressions.
    pub checks: Vec<String>,
    /// Raw SQL appended after the table.
    pub custom: Option<String>,
    /// Overrides (`engine`, `comment`, `platform.*`).
    pub overrides: Overrides,
}

/// A field directive.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDirective {
    /// Column name; falls back to the Rust field name when absent.
    pub name: Option<String>,
    /// Declared SQL type.
    pub sql_type: String,
    /// NOT NULL flag.
    pub not_null: bool,
    /// Primary key flag.
    pub primary: bool,
    /// Unique flag.
    pub unique: bool,
    /// Unique index expression.
    pub unique_expr: Option<String>,
    /// Auto-increment flag.
    pub auto_increment: bool,
    /// Literal default value.
    pub default: Option<String>,
    /// Expression default.
    pub default_fn: Option<String>,
    /// `table(column)` foreign key reference.
    pub foreign: Option<String>,
    /// Explicit foreign key constraint name.
    pub foreign_key_name: Option<String>,
    /// Enum values for `type="ENUM"`.
    pub enum_values: Vec<String>,
    /// Check expression.
    pub check: Option<String>,
    /// Overrides (`comment`, `platform.*`).
    pub overrides: Overrides,
}

/// An index directive.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDirective {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub fields: Vec<String>,
    /// Unique flag.
    pub unique: bool,
    /// Overrides (`comment`).
    pub overrides: Overrides,
}

/// An embedded-field directive.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedDirective {
    /// Folding mode.
    pub mode: EmbedMode,
    /// Column prefix for inline mode.
    pub prefix: Option<String>,
    /// Column name for json/relation modes.
    pub name: Option<String>,
    /// Column SQL type override.
    pub sql_type: Option<String>,
    /// Nullable flag.
    pub nullable: bool,
    /// Index-the-column flag.
    pub indexed: bool,
    /// Foreign key column name for relation mode.
    pub field: Option<String>,
    /// Referenced `table(column)` for relation mode.
    pub reference: Option<String>,
    /// ON DELETE action.
    pub on_delete: Option<FkAction>,
    /// ON UPDATE action.
    pub on_update: Option<FkAction>,
    /// Overrides (`comment`).
    pub overrides: Overrides,
}

/// Parses one comment line.
///
/// Returns `None` when the line is not a directive comment at all, and
/// `Some(Err(message))` when it is one but is malformed.
pub fn parse(line: &str) -> Option<Result<Directive, String>> {
    let body = line.trim().strip_prefix("//")?.trim_start();
    let (kind, rest) = if let Some(rest) = body.strip_prefix(TABLE_TAG) {
        (Kind::Table, rest)
    } else if let Some(rest) = body.strip_prefix(FIELD_TAG) {
        (Kind::Field, rest)
    } else if let Some(rest) = body.strip_prefix(INDEX_TAG) {
        (Kind::Index, rest)
    } else if let Some(rest) = body.strip_prefix(EMBEDDED_TAG) {
        (Kind::Embedded, rest)
    } else {
        return None;
    };

    Some(parse_body(kind, rest))
}

#[derive(Clone, Copy)]
enum Kind {
    Table,
    Field,
    Index,
    Embedded,
}

impl Kind {
    const fn bools(self) -> &'static [&'static str] {
        match self {
            Self::Table => &[],
            Self::Field => FIELD_BOOLS,
            Self::Index => INDEX_BOOLS,
            Self::Embedded => EMBEDDED_BOOLS,
        }
    }
}

fn parse_body(kind: Kind, body: &str) -> Result<Directive, String> {
    let (attrs, overrides) = parse_attrs(body, kind.bools())?;
    match kind {
        Kind::Table => build_table(&attrs, overrides).map(Directive::Table),
        Kind::Field => build_field(&attrs, overrides).map(Directive::Field),
        Kind::Index => build_index(&attrs, overrides).map(Directive::Index),
        Kind::Embedded => build_embedded(&attrs, overrides).map(Directive::Embedded),
    }
}

/// Splits the attribute text into key/value pairs and the override map.
fn parse_attrs(
    body: &str,
    bools: &[&str],
) -> Result<(BTreeMap<String, String>, Overrides), String> {
    let mut attrs = BTreeMap::new();
    let mut overrides = Overrides::default();
    let mut chars = body.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }

        let value = if chars.next_if(|&c| c == '=').is_some() {
            if chars.next_if(|&c| c == '"').is_some() {
                let mut v = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => v.push(c),
                        None => return Err(format!("unterminated quote in '{key}'")),
                    }
                }
                v
            } else {
                let mut v = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    v.push(c);
                    chars.next();
                }
                v
            }
        } else {
            // Bare word: a known boolean attribute name reads as true.
            if !bools.contains(&key.as_str()) {
                return Err(format!("unknown attribute '{key}'"));
            }
            if attrs.contains_key(&key) {
                continue;
            }
            "true".to_string()
        };

        if let Some(rest) = key.strip_prefix("platform.") {
            let Some((dialect, attr)) = rest.split_once('.') else {
                return Err(format!("malformed platform key '{key}'"));
            };
            overrides.set_dialect(dialect, attr, value);
        } else if key == "engine" || key == "comment" {
            overrides.set_common(key, value);
        } else {
            attrs.insert(key, value);
        }
    }

    Ok((attrs, overrides))
}

fn require<'a>(attrs: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str, String> {
    attrs
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("missing required attribute '{key}'"))
}

fn flag(attrs: &BTreeMap<String, String>, key: &str) -> bool {
    attrs.get(key).is_some_and(|v| v == "true")
}

fn csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn build_table(
    attrs: &BTreeMap<String, String>,
    overrides: Overrides,
) -> Result<TableDirective, String> {
    Ok(TableDirective {
        name: require(attrs, "name")?.to_string(),
        primary_key: attrs.get("primary_key").map(|v| csv(v)).unwrap_or_default(),
        checks: attrs.get("checks").map(|v| csv(v)).unwrap_or_default(),
        custom: attrs.get("custom").cloned(),
        overrides,
    })
}

fn build_field(
    attrs: &BTreeMap<String, String>,
    overrides: Overrides,
) -> Result<FieldDirective, String> {
    let sql_type = require(attrs, "type")?.to_string();
    let enum_values = attrs.get("enum").map(|v| csv(v)).unwrap_or_default();
    if sql_type.eq_ignore_ascii_case("ENUM") && enum_values.is_empty() {
        return Err("type=\"ENUM\" requires enum=\"v1,v2,...\"".to_string());
    }
    Ok(FieldDirective {
        name: attrs.get("name").cloned(),
        sql_type,
        not_null: flag(attrs, "not_null"),
        primary: flag(attrs, "primary"),
        unique: flag(attrs, "unique"),
        unique_expr: attrs.get("unique_expr").cloned(),
        auto_increment: flag(attrs, "auto_increment"),
        default: attrs.get("default").cloned(),
        default_fn: attrs.get("default_fn").cloned(),
        foreign: attrs.get("foreign").cloned(),
        foreign_key_name: attrs.get("foreign_key_name").cloned(),
        enum_values,
        check: attrs.get("check").cloned(),
        overrides,
    })
}

fn build_index(
    attrs: &BTreeMap<String, String>,
    overrides: Overrides,
) -> Result<IndexDirective, String> {
    let fields = csv(require(attrs, "fields")?);
    if fields.is_empty() {
        return Err("index requires at least one field".to_string());
    }
    Ok(IndexDirective {
        name: require(attrs, "name")?.to_string(),
        fields,
        unique: flag(attrs, "unique"),
        overrides,
    })
}

fn build_embedded(
    attrs: &BTreeMap<String, String>,
    overrides: Overrides,
) -> Result<EmbeddedDirective, String> {
    let mode_value = require(attrs, "mode")?;
    let mode = EmbedMode::parse(mode_value)
        .ok_or_else(|| format!("unknown embedded mode '{mode_value}'"))?;
    let parse_action = |key: &str| -> Result<Option<FkAction>, String> {
        attrs
            .get(key)
            .map(|v| FkAction::parse(v).ok_or_else(|| format!("unknown {key} action '{v}'")))
            .transpose()
    };
    Ok(EmbeddedDirective {
        mode,
        prefix: attrs.get("prefix").cloned(),
        name: attrs.get("name").cloned(),
        sql_type: attrs.get("type").cloned(),
        nullable: flag(attrs, "nullable"),
        indexed: flag(attrs, "index"),
        field: attrs.get("field").cloned(),
        reference: attrs.get("ref").cloned(),
        on_delete: parse_action("on_delete")?,
        on_update: parse_action("on_update")?,
        overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(line: &str) -> Directive {
        parse(line).expect("directive").expect("parse")
    }

    #[test]
    fn test_non_directive_lines_ignored() {
        assert!(parse("let x = 1;").is_none());
        assert!(parse("// a plain comment").is_none());
        assert!(parse("/// doc comment").is_none());
    }

    #[test]
    fn test_table_directive() {
        let d = parse_ok(
            "//ptah:schema:table name=\"orders\" engine=\"InnoDB\" comment=\"customer orders\" primary_key=\"tenant_id,id\"",
        );
        let Directive::Table(t) = d else {
            panic!("expected table");
        };
        assert_eq!(t.name, "orders");
        assert_eq!(t.primary_key, vec!["tenant_id", "id"]);
        assert_eq!(t.overrides.common.get("engine").unwrap(), "InnoDB");
        assert_eq!(
            t.overrides.common.get("comment").unwrap(),
            "customer orders"
        );
    }

    #[test]
    fn test_field_directive_bare_booleans() {
        let d = parse_ok("//ptah:schema:field name=\"id\" type=\"SERIAL\" not_null primary");
        let Directive::Field(f) = d else {
            panic!("expected field");
        };
        assert_eq!(f.name.as_deref(), Some("id"));
        assert_eq!(f.sql_type, "SERIAL");
        assert!(f.not_null);
        assert!(f.primary);
        assert!(!f.unique);
    }

    #[test]
    fn test_explicit_value_wins_over_bare_word() {
        // key=value parsing sets unique first; the bare word must not
        // overwrite it.
        let d = parse_ok("//ptah:schema:field name=\"a\" type=\"TEXT\" unique=false unique");
        let Directive::Field(f) = d else {
            panic!("expected field");
        };
        assert!(!f.unique);
    }

    #[test]
    fn test_platform_overrides_routed() {
        let d = parse_ok(
            "//ptah:schema:field name=\"id\" type=\"SERIAL\" platform.mysql.type=\"INT AUTO_INCREMENT\"",
        );
        let Directive::Field(f) = d else {
            panic!("expected field");
        };
        assert_eq!(
            f.overrides.get("mysql", "type"),
            Some("INT AUTO_INCREMENT")
        );
        assert_eq!(f.overrides.get("postgres", "type"), None);
    }

    #[test]
    fn test_quoted_values_keep_spaces() {
        let d = parse_ok("//ptah:schema:field name=\"note\" type=\"TEXT\" comment=\"free form text\"");
        let Directive::Field(f) = d else {
            panic!("expected field");
        };
        assert_eq!(
            f.overrides.common.get("comment").map(String::as_str),
            Some("free form text")
        );
    }

    #[test]
    fn test_enum_field_requires_values() {
        let err = parse("//ptah:schema:field name=\"status\" type=\"ENUM\"")
            .unwrap()
            .unwrap_err();
        assert!(err.contains("enum"));

        let d = parse_ok("//ptah:schema:field name=\"status\" type=\"ENUM\" enum=\"active,inactive\"");
        let Directive::Field(f) = d else {
            panic!("expected field");
        };
        assert_eq!(f.enum_values, vec!["active", "inactive"]);
    }

    #[test]
    fn test_index_directive() {
        let d = parse_ok("//ptah:schema:index name=\"idx_orders_status\" fields=\"status,created_at\" unique");
        let Directive::Index(i) = d else {
            panic!("expected index");
        };
        assert_eq!(i.name, "idx_orders_status");
        assert_eq!(i.fields, vec!["status", "created_at"]);
        assert!(i.unique);
    }

    #[test]
    fn test_embedded_directive() {
        let d = parse_ok(
            "//ptah:embedded mode=\"relation\" field=\"user_id\" ref=\"users(id)\" on_delete=\"CASCADE\" index",
        );
        let Directive::Embedded(e) = d else {
            panic!("expected embedded");
        };
        assert_eq!(e.mode, EmbedMode::Relation);
        assert_eq!(e.field.as_deref(), Some("user_id"));
        assert_eq!(e.reference.as_deref(), Some("users(id)"));
        assert_eq!(e.on_delete, Some(FkAction::Cascade));
        assert!(e.indexed);
    }

    #[test]
    fn test_unknown_bare_word_is_error() {
        let err = parse("//ptah:schema:field name=\"a\" type=\"TEXT\" shiny")
            .unwrap()
            .unwrap_err();
        assert!(err.contains("shiny"));
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        let err = parse("//ptah:schema:table name=\"orders")
            .unwrap()
            .unwrap_err();
        assert!(err.contains("unterminated"));
    }
}
