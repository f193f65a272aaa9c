//! Error types for the migration engine.

use std::path::PathBuf;

/// Errors that can occur while introspecting, generating or applying
/// migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Error from the schema compiler.
    #[error(transparent)]
    Core(#[from] ptah_core::Error),

    /// Database error outside a migration transaction.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A migration file failed mid-transaction; the transaction was rolled
    /// back and execution halted.
    #[error("Migration '{file}' failed and was rolled back: {message}")]
    Execution {
        /// The migration file identifier.
        file: String,
        /// The underlying database error message.
        message: String,
    },

    /// A file in the migrations directory does not follow the
    /// `<sequence>_<description>.up.sql` naming scheme.
    #[error("Unrecognized migration filename: {}", .0.display())]
    BadMigrationFilename(PathBuf),

    /// An applied migration has no corresponding down file to revert with.
    #[error("Migration {0} has no .down.sql file")]
    MissingDownFile(String),

    /// A destructive operation was requested without explicit confirmation.
    #[error("Refusing without confirmation: {0}")]
    ConfirmationRequired(String),

    /// The database URL scheme is not one of the supported dialects.
    #[error("Unsupported database URL (expected postgres://, mysql:// or mariadb://): {0}")]
    UnsupportedUrl(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
