//! # ptah-migrate
//!
//! The Ptah migration engine: introspects a live PostgreSQL or
//! MySQL/MariaDB schema, diffs it against the model declared in source
//! directives (via `ptah-core`), serializes the resulting plan to paired
//! `.up.sql`/`.down.sql` files, and applies pending files transactionally
//! while tracking applied versions in a ledger table.
//!
//! # Architecture
//!
//! - **Pool** - one connection pool across the supported drivers
//! - **Introspect** - reads the live catalog into a `SchemaSnapshot`
//! - **Generate** - migration file naming, discovery and rendering
//! - **Executor** - per-file transactions, halt-on-failure, dry-run
//! - **Ledger** - the `_ptah_migrations` applied-versions table
//!
//! # Example
//!
//! ```rust,ignore
//! use ptah_migrate::prelude::*;
//!
//! let pool = DbPool::connect("postgres://localhost/app").await?;
//! let declared = ptah_core::extract_dir(std::path::Path::new("src/models"))?;
//! let snapshot = pool.introspect().await?;
//!
//! let diff = ptah_core::compare_schemas(&declared, &snapshot, pool.dialect());
//! if diff.has_changes() {
//!     let plan = ptah_core::plan_migration(&diff, &declared)?;
//!     let writer = MigrationWriter::new("migrations", pool.dialect());
//!     writer.write(&plan, "sync schema")?;
//!
//!     let executor = MigrationExecutor::new(pool);
//!     executor.init().await?;
//!     executor.apply_pending(std::path::Path::new("migrations")).await?;
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Render the declared schema as SQL
//! ptah sql --dialect postgres
//!
//! # Show the difference against the live database
//! ptah diff
//!
//! # Generate a migration pair from the difference
//! ptah make-migration --name "add orders"
//!
//! # Apply pending migrations
//! ptah migrate
//! ```

pub mod error;
pub mod executor;
pub mod generate;
pub mod introspect;
pub mod ledger;
pub mod pool;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::MigrationExecutor;
    pub use crate::generate::{discover_migrations, MigrationFile, MigrationWriter};
    pub use crate::ledger::{AppliedMigration, Ledger};
    pub use crate::pool::{DbPool, DbTransaction};
}

pub use error::{MigrateError, Result};
pub use executor::MigrationExecutor;
pub use generate::{MigrationFile, MigrationWriter};
pub use ledger::Ledger;
pub use pool::DbPool;
