// src/main.rs
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sheet_sync::cloud_handler::CloudHandler;
use sheet_sync::config::SyncConfig;
use sheet_sync::runner::{self, RunOptions};
use sheet_sync::{Result, SyncError};
use tracing_subscriber::EnvFilter;

const DEFAULT_CREDENTIALS: &str = "credentials.json";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.verbose) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    if let Err(error) = run(cli).await {
        tracing::error!(%error, "run aborted");
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| SyncError::Config(format!("failed to initialise logging: {e}")))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args).await,
    }
}

async fn execute_run(args: RunArgs) -> Result<()> {
    let mut config = SyncConfig::from_file(&args.config)?;
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;

    let credentials = args
        .credentials
        .or_else(|| config.credentials.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS));
    let client = CloudHandler::connect(&credentials).await?;

    let options = RunOptions {
        dry_run: args.dry_run,
    };
    let report = runner::run(&client, &config, options).await?;

    for target in &report.targets {
        println!("{target}");
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Push local CSV/workbook files to Google Sheets tabs, replacing only changed tabs."
)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Synchronise every configured tab.
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// JSON file listing spreadsheets, tabs and source paths.
    #[arg(long, short)]
    config: PathBuf,

    /// Service account key; overrides the config file.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Rows per write request; overrides the config file.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Compare only, report what would be replaced.
    #[arg(long)]
    dry_run: bool,
}
