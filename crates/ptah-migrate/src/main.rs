//! ptah CLI
//!
//! Command-line front-end for the schema compiler and migration engine.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ptah_core::{compare_schemas, extract_dir, plan_migration, render_schema, Dialect};
use ptah_migrate::prelude::*;

/// Schema compiler and migration engine driven by source directives.
#[derive(Parser)]
#[command(name = "ptah")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (postgres://, mysql:// or mariadb://).
    #[arg(short, long, env = "DATABASE_URL", default_value = "postgres://localhost/app")]
    database: String,

    /// Directory scanned for directive-annotated source files.
    #[arg(short, long, default_value = "src")]
    source_dir: PathBuf,

    /// Migrations directory.
    #[arg(short, long, default_value = "migrations")]
    migrations_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// CLI spelling of the supported dialects.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DialectArg {
    /// PostgreSQL.
    Postgres,
    /// MySQL.
    Mysql,
    /// MariaDB.
    Mariadb,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Postgres => Self::Postgres,
            DialectArg::Mysql => Self::MySql,
            DialectArg::Mariadb => Self::MariaDb,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the schema model extracted from source directives.
    Extract,

    /// Render the full declared schema as SQL for a dialect.
    Sql {
        /// Target dialect.
        #[arg(short = 'D', long, value_enum)]
        dialect: DialectArg,
    },

    /// Compare the declared schema against the live database.
    Diff {
        /// Emit the diff as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a migration file pair from the live-schema difference.
    MakeMigration {
        /// Migration description (becomes part of the filename).
        #[arg(short, long)]
        name: String,

        /// Print the SQL without writing files.
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending migrations.
    Migrate {
        /// Show SQL without executing.
        #[arg(long)]
        dry_run: bool,

        /// Allow execution of destructive statements.
        #[arg(long)]
        confirm_destructive: bool,
    },

    /// Revert the most recently applied migration.
    Revert {
        /// Show SQL without executing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status.
    Status,

    /// Drop every table in the target database.
    Reset {
        /// Required acknowledgement that data will be destroyed.
        #[arg(long)]
        confirm: bool,

        /// Show what would be dropped without executing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Drop a whole database (connect to a maintenance database first).
    DropDatabase {
        /// Database name to drop.
        name: String,

        /// Required acknowledgement that the database will be destroyed.
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Extract => {
            let db = extract_dir(&cli.source_dir)?;
            println!(
                "{} tables, {} fields, {} indexes, {} enums",
                db.tables.len(),
                db.fields.len(),
                db.indexes.len(),
                db.enums.len()
            );
            for table in &db.tables {
                println!("\ntable {} (from {})", table.name, table.source_type);
                for field in db.fields_of(table) {
                    println!("    {} {}", field.name, field.sql_type);
                }
            }
            for e in &db.enums {
                println!("\nenum {} ({})", e.name, e.values.join(", "));
            }
        }

        Commands::Sql { dialect } => {
            let db = extract_dir(&cli.source_dir)?;
            print!("{}", render_schema(&db, dialect.into())?);
        }

        Commands::Diff { json } => {
            let pool = DbPool::connect(&cli.database).await?;
            let db = extract_dir(&cli.source_dir)?;
            let snapshot = pool.introspect().await?;
            let diff = compare_schemas(&db, &snapshot, pool.dialect());
            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else {
                print!("{diff}");
            }
        }

        Commands::MakeMigration { name, dry_run } => {
            let pool = DbPool::connect(&cli.database).await?;
            let db = extract_dir(&cli.source_dir)?;
            let snapshot = pool.introspect().await?;
            let diff = compare_schemas(&db, &snapshot, pool.dialect());
            if !diff.has_changes() {
                info!("Schemas are equivalent, nothing to generate");
                return Ok(());
            }

            let plan = plan_migration(&diff, &db)?;
            if dry_run {
                println!(
                    "{}",
                    ptah_migrate::generate::render_up(&plan, pool.dialect())?
                );
            } else {
                let writer = MigrationWriter::new(&cli.migrations_dir, pool.dialect());
                let file = writer.write(&plan, &name)?;
                info!(migration = %file.id(), "Created migration pair");
                if plan.has_destructive() {
                    info!("Plan contains destructive steps; review before applying");
                }
            }
        }

        Commands::Migrate {
            dry_run,
            confirm_destructive,
        } => {
            let pool = DbPool::connect(&cli.database).await?;
            let executor = MigrationExecutor::new(pool)
                .dry_run(dry_run)
                .confirm_destructive(confirm_destructive);
            executor.init().await?;
            let applied = executor.apply_pending(&cli.migrations_dir).await?;
            if !applied.is_empty() {
                info!(count = applied.len(), "Migrations applied");
            }
        }

        Commands::Revert { dry_run } => {
            let pool = DbPool::connect(&cli.database).await?;
            let executor = MigrationExecutor::new(pool).dry_run(dry_run);
            executor.init().await?;
            executor.revert_last(&cli.migrations_dir).await?;
        }

        Commands::Status => {
            let pool = DbPool::connect(&cli.database).await?;
            let executor = MigrationExecutor::new(pool);
            executor.init().await?;

            let status = executor.status(&cli.migrations_dir).await?;
            if status.is_empty() {
                info!("No migration files found");
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");
                for (file, applied) in &status {
                    let mark = if *applied { "X" } else { " " };
                    println!(" [{mark}] {}", file.id());
                }
                println!();
            }
        }

        Commands::Reset { confirm, dry_run } => {
            let pool = DbPool::connect(&cli.database).await?;
            let executor = MigrationExecutor::new(pool).dry_run(dry_run);
            executor.reset(confirm).await?;
        }

        Commands::DropDatabase { name, confirm } => {
            let pool = DbPool::connect(&cli.database).await?;
            let executor = MigrationExecutor::new(pool);
            executor.drop_database(&name, confirm).await?;
        }
    }

    Ok(())
}
