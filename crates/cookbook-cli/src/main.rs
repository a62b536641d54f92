//! Cookbook - browse a sous vide and kamado recipe catalog from the terminal.
//!
//! Searches the catalog with the same filters as the web app and manages
//! the offline cache that keeps the app usable without a connection.

mod cli;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use cookbook_core::Config;

/// Log file name when `--log-file` points at a directory-less path
const DEFAULT_LOG_FILE: &str = "cookbook.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file on drop.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());
    info!("Cookbook starting");

    let mut config = Config::load()?;
    if let Some(ref catalog) = cli.catalog {
        config.catalog = Some(catalog.clone());
    }

    match &cli.command {
        Commands::Search(args) => commands::recipes::search(&config, args).await,
        Commands::Toc => commands::recipes::toc(&config).await,
        Commands::Show(args) => commands::recipes::show(&config, args).await,
        Commands::Offline(args) => commands::offline::run(&config, &args.action).await,
    }
}
