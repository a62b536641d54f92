//! Offline cache commands.
//!
//! Each invocation is a fresh process, so the worker is either installed
//! from scratch or resumed on top of a bucket an earlier run activated.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use cookbook_core::offline::{
    register, CacheStorage, DiskStorage, HttpNetwork, Intercept, Network, Request, ServiceWorker,
    WorkerHandle, SCRIPT_PATH,
};
use cookbook_core::Config;

use crate::cli::OfflineAction;

fn open_storage(config: &Config) -> Result<Arc<DiskStorage>> {
    let root = config.cache_dir()?;
    let storage = DiskStorage::new(root.clone())
        .with_context(|| format!("Failed to open offline cache at {}", root.display()))?;
    Ok(Arc::new(storage))
}

pub async fn run(config: &Config, action: &OfflineAction) -> Result<()> {
    match action {
        OfflineAction::Install => install(config).await,
        OfflineAction::Fetch { path } => fetch(config, path).await,
        OfflineAction::Status => status(config),
        OfflineAction::Clear => clear(config),
    }
}

async fn install(config: &Config) -> Result<()> {
    let worker_config = config.worker_config()?;
    if register(&worker_config.scope, SCRIPT_PATH).is_none() {
        return Ok(());
    }

    let storage = open_storage(config)?;
    let network = Arc::new(HttpNetwork::new()?);
    let worker = ServiceWorker::spawn(worker_config, storage, network);

    let report = worker.deploy().await?;
    worker.settle().await?;

    println!(
        "Installed {} ({} cached, {} failed)",
        worker.config().cache_name,
        report.install.cached.len(),
        report.install.failed.len()
    );
    for (url, reason) in &report.install.failed {
        println!("  failed  {} ({})", url, reason);
    }
    for name in &report.deleted_buckets {
        println!("  removed {}", name);
    }
    Ok(())
}

/// Resume the worker if this version is already installed, otherwise deploy it
async fn start_worker(config: &Config, network: Arc<dyn Network>) -> Result<WorkerHandle> {
    let worker_config = config.worker_config()?;
    let storage = open_storage(config)?;

    let installed = storage.buckets()?.contains(&worker_config.cache_name);
    if installed {
        return Ok(ServiceWorker::resume(worker_config, storage, network));
    }

    info!(cache = %worker_config.cache_name, "Offline cache not installed yet, installing");
    let worker = ServiceWorker::spawn(worker_config, storage, network);
    worker.deploy().await?;
    Ok(worker)
}

async fn fetch(config: &Config, path: &str) -> Result<()> {
    let network: Arc<dyn Network> = Arc::new(HttpNetwork::new()?);
    let worker = start_worker(config, network.clone()).await?;

    let url = worker
        .config()
        .scope
        .join(path)
        .with_context(|| format!("Invalid path: {}", path))?;
    let request = Request::get(url);

    let (response, source) = match worker.fetch(request.clone()).await? {
        Intercept::Respond { response, source } => (response, source.to_string()),
        Intercept::Passthrough => {
            warn!(url = %request.url, "Request not handled by the offline cache");
            (network.fetch(&request).await?, "passthrough".to_string())
        }
    };
    worker.settle().await?;

    eprintln!("{} {} ({})", response.status, response.status_text, source);
    println!("{}", response.text());
    Ok(())
}

fn status(config: &Config) -> Result<()> {
    let storage = open_storage(config)?;
    let current = config.cache_name();
    let buckets = storage.buckets()?;

    if buckets.is_empty() {
        println!("No offline cache installed");
        return Ok(());
    }

    for bucket in buckets {
        let marker = if bucket == current { " (current)" } else { "" };
        let entries = storage.entries(&bucket)?;
        println!("{}{} - {} entries", bucket, marker, entries.len());
        for entry in entries {
            println!("    {:>3}  {:<10} {}", entry.response.status, entry.age_display(), entry.url);
        }
    }
    Ok(())
}

fn clear(config: &Config) -> Result<()> {
    let storage = open_storage(config)?;
    for bucket in storage.buckets()? {
        storage.delete(&bucket)?;
        println!("Deleted {}", bucket);
    }
    Ok(())
}
