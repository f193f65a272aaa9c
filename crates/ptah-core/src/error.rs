//! Error types for the schema compiler.

use std::path::PathBuf;

use crate::dialect::Dialect;

/// Errors that can occur while extracting, compiling or diffing schemas.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source file could not be parsed. Fatal for the offending file.
    #[error("Failed to parse source file '{}': {message}", .path.display())]
    Parse {
        /// Path to the source file.
        path: PathBuf,
        /// Parser error message.
        message: String,
    },

    /// A directive line is malformed.
    #[error("Invalid directive at {}:{line}: {message}", .path.display())]
    Directive {
        /// Path to the source file.
        path: PathBuf,
        /// Line number of the directive comment.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A column type has no mapping for the requested dialect.
    #[error("No {dialect} mapping for column type '{sql_type}'")]
    UnmappedType {
        /// The declared SQL type.
        sql_type: String,
        /// The dialect that was asked to render it.
        dialect: Dialect,
    },

    /// Foreign keys between tables form a cycle.
    #[error("Foreign key dependency cycle involving tables: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// Two fields generated the same global enum key.
    #[error("Duplicate enum definition '{0}'")]
    DuplicateEnum(String),

    /// A field's owner type does not correspond to any declared table.
    #[error("Field '{field}' belongs to type '{owner}' which declares no table")]
    UnknownOwner {
        /// The Rust type the field was declared on.
        owner: String,
        /// The field's column name.
        field: String,
    },

    /// Two tables share a name.
    #[error("Duplicate table '{0}'")]
    DuplicateTable(String),

    /// IO error while reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

/// Result type for schema compiler operations.
pub type Result<T> = std::result::Result<T, Error>;
