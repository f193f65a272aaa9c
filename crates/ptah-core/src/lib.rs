//! # ptah-core
//!
//! The Ptah schema compiler: declarative directives attached to Rust type
//! declarations compile into dialect-specific DDL, and a declared schema
//! diffs against a live database snapshot into an ordered migration plan.
//!
//! The pipeline is pure and synchronous; everything touching a real
//! database (introspection, execution) lives in the `ptah-migrate` crate.
//!
//! ## From directives to SQL
//!
//! ```rust,ignore
//! use ptah_core::{compile, dialect, extract};
//!
//! let db = extract::extract_dir(std::path::Path::new("src/models"))?;
//! let statements = compile::compile_database(&db)?;
//! let sql = dialect::render_statements(&statements, dialect::Dialect::Postgres)?;
//! ```
//!
//! ## From a live snapshot to a plan
//!
//! ```rust,ignore
//! use ptah_core::{diff, plan};
//!
//! let changes = diff::compare_schemas(&db, &snapshot, dialect::Dialect::Postgres);
//! if changes.has_changes() {
//!     let migration = plan::plan_migration(&changes, &db)?;
//! }
//! ```

pub mod ast;
pub mod builder;
pub mod compile;
pub mod dialect;
pub mod diff;
mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod plan;
pub mod snapshot;

pub use ast::{DataType, DefaultValue, Node, StatementList};
pub use builder::SchemaBuilder;
pub use compile::render_schema;
pub use dialect::{render_statements, Dialect, DialectRenderer};
pub use diff::{compare_schemas, ColumnDiff, EnumDiff, SchemaDiff, TableDiff};
pub use error::{Error, Result};
pub use extract::{extract_dir, extract_file, extract_file_resolved, FileExtraction};
pub use model::{Database, EmbeddedField, EnumDef, Field, Index, Table};
pub use plan::{plan_migration, MigrationPlan, PlannedStep, Severity};
pub use snapshot::{DbColumn, DbEnum, DbIndex, DbTable, SchemaSnapshot};
