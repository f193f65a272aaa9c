//! Directive extraction from application source files.
//!
//! The extractor parses a source file with `syn` to locate struct and field
//! declarations, reads the run of `//` comment lines immediately above each
//! one, and turns `ptah:` directives into the declared schema model.
//! Unparseable source syntax is fatal for the offending file; an `embedded`
//! directive whose target type is never found contributes no fields and
//! logs a warning, so one dangling reference cannot sink a directory scan.

pub mod directive;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use syn::spanned::Spanned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{
    Database, EmbedMode, EmbeddedField, EnumDef, Field, ForeignKey, Index, Table,
};

use directive::{Directive, EmbeddedDirective, FieldDirective, IndexDirective, TableDirective};

/// The five directive collections extracted from a single source file,
/// before embedded-type resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileExtraction {
    /// Embedded-field directives.
    pub embeds: Vec<EmbeddedField>,
    /// Field directives, keyed to their owner struct via `owner_type`.
    pub fields: Vec<Field>,
    /// Index directives.
    pub indexes: Vec<Index>,
    /// Table directives.
    pub tables: Vec<Table>,
    /// Deduplicated global enum directives, sorted by key.
    pub enums: Vec<EnumDef>,
}

impl FileExtraction {
    fn merge(&mut self, other: Self) {
        self.embeds.extend(other.embeds);
        self.fields.extend(other.fields);
        self.indexes.extend(other.indexes);
        self.tables.extend(other.tables);
        self.enums.extend(other.enums);
    }
}

/// Extracts the directive collections from one source file.
///
/// # Errors
///
/// Returns [`Error::Parse`] for invalid source syntax and
/// [`Error::Directive`] for malformed directive comments.
pub fn extract_file(path: &Path) -> Result<FileExtraction> {
    let source = fs::read_to_string(path)?;
    scan_source(path, &source)
}

/// Extracts a whole directory into an assembled [`Database`].
///
/// Every `.rs` file is scanned (in sorted order, for determinism) and
/// `embedded` directives with `mode=relation` or `mode=inline` are resolved
/// against struct declarations from any scanned file.
///
/// # Errors
///
/// Returns the first fatal parse error, or a validation error from the
/// assembled model.
pub fn extract_dir(dir: &Path) -> Result<Database> {
    let mut merged = FileExtraction::default();
    for path in source_files(dir)? {
        debug!(path = %path.display(), "Extracting directives");
        merged.merge(extract_file(&path)?);
    }
    let resolver = merged.fields.clone();
    assemble(merged, &resolver)
}

/// Extracts one file into an assembled [`Database`], resolving embedded
/// types against the sibling files in the same directory.
///
/// # Errors
///
/// Returns the first fatal parse error, or a validation error from the
/// assembled model.
pub fn extract_file_resolved(path: &Path) -> Result<Database> {
    let primary = extract_file(path)?;

    let mut sibling_fields = primary.fields.clone();
    if let Some(dir) = path.parent() {
        for sibling in source_files(dir)? {
            if sibling.as_path() == path {
                continue;
            }
            let extraction = extract_file(&sibling)?;
            sibling_fields.extend(extraction.fields);
        }
    }

    assemble(primary, &sibling_fields)
}

/// Lists `.rs` files in a directory, sorted by path.
fn source_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "rs"))
        .collect();
    files.sort();
    Ok(files)
}

/// Parses one source text and attaches directives to declarations.
fn scan_source(path: &Path, source: &str) -> Result<FileExtraction> {
    let file = syn::parse_file(source).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let lines: Vec<&str> = source.lines().collect();

    let mut out = FileExtraction::default();

    for item in &file.items {
        let syn::Item::Struct(item) = item else {
            continue;
        };
        let struct_name = item.ident.to_string();
        let struct_line = item.span().start().line;

        let mut table: Option<Table> = None;
        let mut pending_indexes: Vec<IndexDirective> = Vec::new();

        for (line_no, text) in comment_block(&lines, struct_line) {
            match parse_at(path, line_no, text)? {
                None => {}
                Some(Directive::Table(t)) => {
                    table = Some(attach_table(t, &struct_name));
                }
                Some(Directive::Index(i)) => pending_indexes.push(i),
                Some(other) => {
                    return Err(directive_error(
                        path,
                        line_no,
                        format!("directive {} not valid on a struct", describe(&other)),
                    ));
                }
            }
        }

        if let Some(table) = table {
            for idx in pending_indexes {
                out.indexes.push(attach_index(idx, &table.name));
            }
            out.tables.push(table);
        } else if !pending_indexes.is_empty() {
            warn!(
                struct_name = %struct_name,
                "index directives on a struct without a table directive are ignored"
            );
        }

        let syn::Fields::Named(fields) = &item.fields else {
            continue;
        };
        for field in &fields.named {
            let Some(ident) = &field.ident else { continue };
            let field_line = field.span().start().line;
            for (line_no, text) in comment_block(&lines, field_line) {
                match parse_at(path, line_no, text)? {
                    None => {}
                    Some(Directive::Field(f)) => {
                        out.fields
                            .push(attach_field(f, &struct_name, &ident.to_string()));
                    }
                    Some(Directive::Embedded(e)) => {
                        let target = type_ident(&field.ty).ok_or_else(|| {
                            directive_error(
                                path,
                                line_no,
                                "embedded directive on a field without a named type".to_string(),
                            )
                        })?;
                        out.embeds.push(attach_embedded(e, &struct_name, &target));
                    }
                    Some(other) => {
                        return Err(directive_error(
                            path,
                            line_no,
                            format!("directive {} not valid on a field", describe(&other)),
                        ));
                    }
                }
            }
        }
    }

    out.enums = synthesize_enums(&out.tables, &out.fields);
    Ok(out)
}

fn parse_at(path: &Path, line_no: usize, text: &str) -> Result<Option<Directive>> {
    match directive::parse(text) {
        None => Ok(None),
        Some(Ok(d)) => Ok(Some(d)),
        Some(Err(message)) => Err(directive_error(path, line_no, message)),
    }
}

fn directive_error(path: &Path, line: usize, message: String) -> Error {
    Error::Directive {
        path: path.to_path_buf(),
        line,
        message,
    }
}

const fn describe(directive: &Directive) -> &'static str {
    match directive {
        Directive::Table(_) => "schema:table",
        Directive::Field(_) => "schema:field",
        Directive::Index(_) => "schema:index",
        Directive::Embedded(_) => "embedded",
    }
}

/// Collects the run of full-line comments immediately above a declaration,
/// skipping attribute lines, in top-down order with 1-based line numbers.
fn comment_block<'a>(lines: &[&'a str], decl_line: usize) -> Vec<(usize, &'a str)> {
    let mut block = Vec::new();
    let mut cursor = decl_line.saturating_sub(1);
    while cursor > 0 {
        let text = lines[cursor - 1].trim();
        if text.starts_with("//") {
            block.push((cursor, lines[cursor - 1]));
        } else if !text.starts_with('#') {
            break;
        }
        cursor -= 1;
    }
    block.reverse();
    block
}

/// Resolves the trailing type identifier of a field, unwrapping common
/// single-parameter wrappers.
fn type_ident(ty: &syn::Type) -> Option<String> {
    if let syn::Type::Path(p) = ty {
        let segment = p.path.segments.last()?;
        let ident = segment.ident.to_string();
        if matches!(ident.as_str(), "Option" | "Vec" | "Box") {
            if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
                for arg in &args.args {
                    if let syn::GenericArgument::Type(inner) = arg {
                        return type_ident(inner);
                    }
                }
            }
        }
        Some(ident)
    } else {
        None
    }
}

fn attach_table(d: TableDirective, struct_name: &str) -> Table {
    let mut table = Table::new(d.name, struct_name);
    table.primary_key = d.primary_key;
    table.checks = d.checks;
    table.custom_sql = d.custom;
    table.overrides = d.overrides;
    table
}

fn attach_field(d: FieldDirective, struct_name: &str, rust_field: &str) -> Field {
    let name = d.name.unwrap_or_else(|| rust_field.to_string());
    let mut field = Field::new(struct_name, name, d.sql_type);
    field.nullable = !d.not_null && !d.primary;
    field.primary_key = d.primary;
    field.unique = d.unique;
    field.unique_expr = d.unique_expr;
    field.auto_increment = d.auto_increment;
    field.default = d.default;
    field.default_expr = d.default_fn;
    field.enum_values = d.enum_values;
    field.check = d.check;
    field.comment = d.overrides.common.get("comment").cloned();
    if let Some(reference) = &d.foreign {
        if let Some(mut fk) = ForeignKey::parse(reference) {
            fk.constraint_name = d.foreign_key_name.clone();
            field.foreign_key = Some(fk);
        } else {
            warn!(
                field = %field.name,
                reference = %reference,
                "malformed foreign reference, expected table(column)"
            );
        }
    }
    field.overrides = d.overrides;
    field
}

fn attach_index(d: IndexDirective, table: &str) -> Index {
    Index {
        name: d.name,
        table: table.to_string(),
        columns: d.fields,
        unique: d.unique,
        comment: d.overrides.common.get("comment").cloned(),
    }
}

fn attach_embedded(d: EmbeddedDirective, struct_name: &str, target: &str) -> EmbeddedField {
    EmbeddedField {
        owner_type: struct_name.to_string(),
        target_type: target.to_string(),
        mode: d.mode,
        prefix: d.prefix,
        name: d.name,
        sql_type: d.sql_type,
        nullable: d.nullable,
        indexed: d.indexed,
        field: d.field,
        reference: d.reference,
        on_delete: d.on_delete,
        on_update: d.on_update,
        comment: d.overrides.common.get("comment").cloned(),
    }
}

/// Generates the deduplicated, key-sorted global enum set for fields whose
/// owner struct declares a table.
fn synthesize_enums(tables: &[Table], fields: &[Field]) -> Vec<EnumDef> {
    let by_source: BTreeMap<&str, &Table> =
        tables.iter().map(|t| (t.source_type.as_str(), t)).collect();

    let mut enums: Vec<EnumDef> = Vec::new();
    for field in fields {
        if !field.is_enum() {
            continue;
        }
        let Some(table) = by_source.get(field.owner_type.as_str()) else {
            continue;
        };
        let def = EnumDef {
            name: field.enum_key(&table.name),
            values: field.enum_values.clone(),
        };
        if !enums.contains(&def) {
            enums.push(def);
        }
    }
    enums.sort_by(|a, b| a.name.cmp(&b.name));
    enums
}

/// Assembles an extraction into a validated [`Database`], resolving
/// embedded directives against `target_fields`.
fn assemble(extraction: FileExtraction, target_fields: &[Field]) -> Result<Database> {
    let mut db = Database::new();
    db.tables = extraction.tables;
    db.indexes = extraction.indexes;
    db.embeds = extraction.embeds.clone();

    // Keep only fields whose owner declares a table; the rest belong to
    // embedded target types and are folded below (or dropped).
    db.fields = extraction
        .fields
        .into_iter()
        .filter(|f| {
            db.tables
                .iter()
                .any(|t| t.source_type == f.owner_type)
        })
        .collect();

    for embed in &extraction.embeds {
        let Some(owner_table) = db.table_by_source(&embed.owner_type).cloned() else {
            warn!(
                owner = %embed.owner_type,
                target = %embed.target_type,
                "embedded directive on a type without a table directive, skipping"
            );
            continue;
        };
        resolve_embed(&mut db, embed, &owner_table, target_fields);
    }

    // Enum keys are only known once every field has found its owner table.
    db.enums = synthesize_enums(&db.tables, &db.fields);

    let edges: Vec<(String, String)> = db
        .fields
        .iter()
        .filter_map(|field| {
            let fk = field.foreign_key.as_ref()?;
            let table = db.table_by_source(&field.owner_type)?;
            Some((table.name.clone(), fk.table.clone()))
        })
        .collect();
    for (from, to) in edges {
        db.add_dependency(from, to);
    }

    db.validate()?;
    Ok(db)
}

/// Folds one embedded directive into the owning table.
fn resolve_embed(db: &mut Database, embed: &EmbeddedField, owner: &Table, target_fields: &[Field]) {
    match embed.mode {
        EmbedMode::Json => {
            let name = embed
                .name
                .clone()
                .unwrap_or_else(|| embed.target_type.to_lowercase());
            let sql_type = embed.sql_type.clone().unwrap_or_else(|| "JSON".to_string());
            let mut field = Field::new(&embed.owner_type, name, sql_type);
            field.nullable = embed.nullable;
            field.comment = embed.comment.clone();
            maybe_index(db, embed, owner, &field.name);
            db.fields.push(field);
        }
        EmbedMode::Relation => {
            let Some(reference) = embed.reference.as_deref().and_then(ForeignKey::parse) else {
                warn!(
                    owner = %embed.owner_type,
                    target = %embed.target_type,
                    "relation embed without a valid ref=\"table(column)\", skipping"
                );
                return;
            };
            let name = embed
                .field
                .clone()
                .unwrap_or_else(|| format!("{}_id", embed.target_type.to_lowercase()));
            let sql_type = embed
                .sql_type
                .clone()
                .unwrap_or_else(|| "INTEGER".to_string());
            let mut field = Field::new(&embed.owner_type, name, sql_type);
            field.nullable = embed.nullable;
            field.comment = embed.comment.clone();
            field.foreign_key = Some(ForeignKey {
                on_delete: embed.on_delete,
                on_update: embed.on_update,
                ..reference
            });
            maybe_index(db, embed, owner, &field.name);
            db.fields.push(field);
        }
        EmbedMode::Inline => {
            let folded: Vec<Field> = target_fields
                .iter()
                .filter(|f| f.owner_type == embed.target_type)
                .cloned()
                .collect();
            if folded.is_empty() {
                warn!(
                    owner = %embed.owner_type,
                    target = %embed.target_type,
                    "embedded type not found in scanned sources, no fields contributed"
                );
                return;
            }
            let prefix = embed.prefix.clone().unwrap_or_default();
            for mut field in folded {
                field.owner_type = embed.owner_type.clone();
                field.name = format!("{prefix}{}", field.name);
                db.fields.push(field);
            }
        }
    }
}

fn maybe_index(db: &mut Database, embed: &EmbeddedField, owner: &Table, column: &str) {
    if embed.indexed {
        db.indexes.push(Index {
            name: format!("idx_{}_{column}", owner.name),
            table: owner.name.clone(),
            columns: vec![column.to_string()],
            unique: false,
            comment: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(dir: &Path, name: &str, source: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(source.as_bytes()).unwrap();
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ptah-extract-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const USERS_SOURCE: &str = r#"
//ptah:schema:table name="users" comment="application accounts"
//ptah:schema:index name="idx_users_email" fields="email" unique
#[derive(Debug)]
pub struct User {
    //ptah:schema:field name="id" type="SERIAL" primary auto_increment
    pub id: i32,
    //ptah:schema:field name="email" type="VARCHAR(255)" not_null unique
    pub email: String,
    //ptah:schema:field name="status" type="ENUM" enum="active,inactive" not_null default="active"
    pub status: String,
}
"#;

    #[test]
    fn test_extract_file_collections() {
        let dir = temp_dir("file");
        write_source(&dir, "users.rs", USERS_SOURCE);

        let extraction = extract_file(&dir.join("users.rs")).unwrap();
        assert_eq!(extraction.tables.len(), 1);
        assert_eq!(extraction.tables[0].name, "users");
        assert_eq!(extraction.tables[0].source_type, "User");
        assert_eq!(extraction.fields.len(), 3);
        assert_eq!(extraction.indexes.len(), 1);
        assert_eq!(extraction.enums.len(), 1);
        assert_eq!(extraction.enums[0].name, "enum_users_status");
        assert_eq!(extraction.enums[0].values, vec!["active", "inactive"]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let dir = temp_dir("determinism");
        write_source(&dir, "users.rs", USERS_SOURCE);

        let first = extract_file(&dir.join("users.rs")).unwrap();
        let second = extract_file(&dir.join("users.rs")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_syntax_is_fatal() {
        let dir = temp_dir("syntax");
        write_source(&dir, "broken.rs", "pub struct {{{");
        assert!(matches!(
            extract_file(&dir.join("broken.rs")),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_malformed_directive_reports_line() {
        let dir = temp_dir("badline");
        write_source(
            &dir,
            "bad.rs",
            "//ptah:schema:table name=\"t\"\npub struct T {\n    //ptah:schema:field name=\"x\"\n    pub x: i32,\n}\n",
        );
        let err = extract_file(&dir.join("bad.rs")).unwrap_err();
        assert!(matches!(err, Error::Directive { line: 3, .. }));
    }

    #[test]
    fn test_field_name_falls_back_to_rust_ident() {
        let dir = temp_dir("fallback");
        write_source(
            &dir,
            "t.rs",
            "//ptah:schema:table name=\"things\"\npub struct Thing {\n    //ptah:schema:field type=\"TEXT\"\n    pub label: String,\n}\n",
        );
        let extraction = extract_file(&dir.join("t.rs")).unwrap();
        assert_eq!(extraction.fields[0].name, "label");
    }

    #[test]
    fn test_extract_dir_resolves_inline_embed() {
        let dir = temp_dir("inline");
        write_source(&dir, "users.rs", USERS_SOURCE);
        write_source(
            &dir,
            "orders.rs",
            r#"
//ptah:schema:table name="orders"
pub struct Order {
    //ptah:schema:field name="id" type="SERIAL" primary
    pub id: i32,
    //ptah:embedded mode="inline" prefix="billing_"
    pub billing: Address,
}

pub struct Address {
    //ptah:schema:field name="street" type="VARCHAR(255)" not_null
    pub street: String,
    //ptah:schema:field name="city" type="VARCHAR(100)" not_null
    pub city: String,
}
"#,
        );

        let db = extract_dir(&dir).unwrap();
        let orders = db.table("orders").unwrap();
        let names: Vec<&str> = db.fields_of(orders).map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "billing_street", "billing_city"]);
        // Address declares no table, so its raw fields must not remain.
        assert!(db.fields.iter().all(|f| f.owner_type != "Address"));
    }

    #[test]
    fn test_extract_dir_resolves_relation_embed() {
        let dir = temp_dir("relation");
        write_source(&dir, "users.rs", USERS_SOURCE);
        write_source(
            &dir,
            "orders.rs",
            r#"
//ptah:schema:table name="orders"
pub struct Order {
    //ptah:schema:field name="id" type="SERIAL" primary
    pub id: i32,
    //ptah:embedded mode="relation" field="user_id" ref="users(id)" on_delete="CASCADE" index
    pub user: User,
}
"#,
        );

        let db = extract_dir(&dir).unwrap();
        let orders = db.table("orders").unwrap();
        let user_id = db
            .fields_of(orders)
            .find(|f| f.name == "user_id")
            .expect("fk column");
        let fk = user_id.foreign_key.as_ref().unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.on_delete, Some(crate::model::FkAction::Cascade));
        assert_eq!(db.dependencies.get("orders").unwrap(), &vec!["users".to_string()]);
        assert!(db.indexes.iter().any(|i| i.name == "idx_orders_user_id"));
    }

    #[test]
    fn test_unknown_embedded_type_contributes_nothing() {
        let dir = temp_dir("unknown-embed");
        write_source(
            &dir,
            "orders.rs",
            r#"
//ptah:schema:table name="orders"
pub struct Order {
    //ptah:schema:field name="id" type="SERIAL" primary
    pub id: i32,
    //ptah:embedded mode="inline"
    pub shipping: Shipping,
}
"#,
        );

        let db = extract_dir(&dir).unwrap();
        let orders = db.table("orders").unwrap();
        assert_eq!(db.fields_of(orders).count(), 1);
    }

    #[test]
    fn test_json_embed_creates_single_column() {
        let dir = temp_dir("json-embed");
        write_source(
            &dir,
            "orders.rs",
            r#"
//ptah:schema:table name="orders"
pub struct Order {
    //ptah:schema:field name="id" type="SERIAL" primary
    pub id: i32,
    //ptah:embedded mode="json" name="metadata" nullable
    pub metadata: Metadata,
}
"#,
        );

        let db = extract_dir(&dir).unwrap();
        let orders = db.table("orders").unwrap();
        let metadata = db
            .fields_of(orders)
            .find(|f| f.name == "metadata")
            .expect("json column");
        assert_eq!(metadata.sql_type, "JSON");
        assert!(metadata.nullable);
    }

    #[test]
    fn test_extract_file_resolved_uses_siblings() {
        let dir = temp_dir("siblings");
        write_source(
            &dir,
            "address.rs",
            r#"
pub struct Address {
    //ptah:schema:field name="street" type="VARCHAR(255)"
    pub street: String,
}
"#,
        );
        write_source(
            &dir,
            "orders.rs",
            r#"
//ptah:schema:table name="orders"
pub struct Order {
    //ptah:schema:field name="id" type="SERIAL" primary
    pub id: i32,
    //ptah:embedded mode="inline" prefix="ship_"
    pub shipping: Address,
}
"#,
        );

        let db = extract_file_resolved(&dir.join("orders.rs")).unwrap();
        let orders = db.table("orders").unwrap();
        let names: Vec<&str> = db.fields_of(orders).map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "ship_street"]);
    }
}
