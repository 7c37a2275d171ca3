//! Operator CLI for the lunch ledger
//!
//! Opens one ledger against the configured database and runs a single
//! command. Results are printed as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lunch_ledger::{LedgerConfig, PermissionLedger, SqliteStore, SqliteStudentDirectory};

mod commands;

use commands::{DeliveryCommand, PermissionCommand, StudentCommand};

#[derive(Parser)]
#[command(name = "lunch")]
#[command(about = "Lunch permissions and delivery confirmation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (optional; defaults apply when missing)
    #[arg(short, long, global = true, default_value = "lunch.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the student directory
    #[command(subcommand)]
    Student(StudentCommand),

    /// Grant, change, revoke and list lunch permissions
    #[command(subcommand)]
    Permission(PermissionCommand),

    /// Confirm that a lunch was handed over
    Deliver(DeliveryCommand),

    /// List delivered lunches
    Deliveries {
        /// Only this release date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,
    },
}

/// Handles shared by every command
pub struct Services {
    /// The permission ledger
    pub ledger: PermissionLedger,
    /// The student directory in the same store
    pub directory: Arc<SqliteStudentDirectory>,
}

fn load_config(path: &Path) -> Result<LedgerConfig> {
    let mut config = if path.exists() {
        LedgerConfig::load_from_file(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        LedgerConfig::default()
    };
    config.merge_with_env()?;
    config.validate()?;
    Ok(config)
}

fn open_services(config: &LedgerConfig) -> Result<Services> {
    let store = SqliteStore::from_config(config).with_context(|| {
        format!(
            "failed to open ledger database {}",
            config.database_path.display()
        )
    })?;
    let directory = Arc::new(SqliteStudentDirectory::new(store.clone()));
    let ledger = PermissionLedger::new(store, directory.clone(), config.fulfilled_records);
    Ok(Services { ledger, directory })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.config)?;
    tracing::debug!(?config, "configuration loaded");
    let services = open_services(&config)?;

    match cli.command {
        Commands::Student(cmd) => commands::handle_student_command(&services, cmd).await?,
        Commands::Permission(cmd) => commands::handle_permission_command(&services, cmd).await?,
        Commands::Deliver(cmd) => commands::handle_delivery_command(&services, cmd).await?,
        Commands::Deliveries { date } => {
            let rows = services.ledger.list_deliveries(date).await?;
            commands::print_json(&rows)?;
        }
    }

    Ok(())
}
