//! CLI argument definitions using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Cookbook - sous vide and kamado recipes, searchable offline
#[derive(Parser, Debug)]
#[command(name = "cookbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Catalog file path or URL (overrides config)
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search and filter recipes
    Search(SearchArgs),

    /// Show sections and proteins with entry counts
    Toc,

    /// Show one recipe in full
    Show(ShowArgs),

    /// Manage the offline cache
    Offline(OfflineArgs),
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Free text matched against title, badge and body
    pub query: Option<String>,

    /// Section key, e.g. sous-vide or kamado ("all" for any)
    #[arg(long, alias = "category")]
    pub section: Option<String>,

    /// Protein key, e.g. beef or poultry ("all" for any)
    #[arg(long)]
    pub protein: Option<String>,

    /// Cooking method, e.g. smoke or sear
    #[arg(long)]
    pub method: Option<String>,

    /// Minimum temperature, °F
    #[arg(long)]
    pub min_temp: Option<f64>,

    /// Maximum temperature, °F
    #[arg(long)]
    pub max_temp: Option<f64>,

    /// Minimum cook time, hours
    #[arg(long)]
    pub min_time: Option<f64>,

    /// Maximum cook time, hours
    #[arg(long)]
    pub max_time: Option<f64>,

    /// Print matches as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Recipe id
    pub id: String,
}

#[derive(Args, Debug)]
pub struct OfflineArgs {
    #[command(subcommand)]
    pub action: OfflineAction,
}

#[derive(Subcommand, Debug)]
pub enum OfflineAction {
    /// Install the current version and remove older caches
    Install,

    /// Request a path through the offline cache
    Fetch {
        /// Path relative to the app scope, e.g. recipes.json
        path: String,
    },

    /// List cache buckets and cached entries
    Status,

    /// Delete every cache bucket
    Clear,
}
