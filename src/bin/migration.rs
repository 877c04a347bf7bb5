//! Applies or rolls back the schema migrations.

use clap::{Parser, Subcommand};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use epv_workflow::migrator::{run_migration, Migrator};

#[derive(Parser)]
#[command(name = "migration", about = "EPV workflow schema migrations")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://epv.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the given number of migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print applied and pending migrations
    Status,
}

async fn connect(database_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("Connecting to database");
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);
    Ok(Database::connect(options).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Up) {
        Command::Up => run_migration(&cli.database_url).await?,
        Command::Down { steps } => {
            let db = connect(&cli.database_url).await?;
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Rolled back migrations");
        }
        Command::Status => {
            let db = connect(&cli.database_url).await?;
            Migrator::status(&db).await?;
        }
    }

    Ok(())
}
