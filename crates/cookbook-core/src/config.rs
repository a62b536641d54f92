//! Application configuration management.
//!
//! Configuration covers where the catalog lives, the origin the offline
//! cache serves, and the cache bucket name. It is stored at
//! `~/.config/cookbook/config.json`; environment variables override it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSource;
use crate::offline::{WorkerConfig, CACHE_NAME};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "cookbook";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin used when nothing is configured (the dev server)
const DEFAULT_SCOPE: &str = "http://localhost:3000/";

/// Catalog document path relative to the scope
const CATALOG_DOCUMENT: &str = "recipes.json";

pub const ENV_CATALOG: &str = "COOKBOOK_CATALOG";
pub const ENV_SCOPE: &str = "COOKBOOK_SCOPE";
pub const ENV_CACHE_NAME: &str = "COOKBOOK_CACHE_NAME";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// File path or URL of the catalog document
    pub catalog: Option<String>,
    /// Origin (and base path) of the deployed app
    pub scope: Option<String>,
    pub cache_name: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from the environment; `lookup` is `std::env::var` outside tests
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(catalog) = non_empty(ENV_CATALOG) {
            self.catalog = Some(catalog);
        }
        if let Some(scope) = non_empty(ENV_SCOPE) {
            self.scope = Some(scope);
        }
        if let Some(cache_name) = non_empty(ENV_CACHE_NAME) {
            self.cache_name = Some(cache_name);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root of the on-disk offline cache
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("offline"))
    }

    pub fn scope_url(&self) -> Result<Url> {
        let scope = self.scope.as_deref().unwrap_or(DEFAULT_SCOPE);
        Url::parse(scope).with_context(|| format!("Invalid scope URL: {}", scope))
    }

    /// Configured catalog, or `recipes.json` under the scope
    pub fn catalog_source(&self) -> Result<CatalogSource> {
        match self.catalog.as_deref() {
            Some(catalog) => Ok(catalog.parse()?),
            None => {
                let worker = self.worker_config()?;
                let url = worker
                    .scope
                    .join(CATALOG_DOCUMENT)
                    .context("Failed to build catalog URL")?;
                Ok(CatalogSource::Url(url))
            }
        }
    }

    pub fn worker_config(&self) -> Result<WorkerConfig> {
        let mut config = WorkerConfig::cookbook(self.scope_url()?);
        if let Some(ref name) = self.cache_name {
            config.cache_name = name.clone();
        }
        Ok(config)
    }

    pub fn cache_name(&self) -> &str {
        self.cache_name.as_deref().unwrap_or(CACHE_NAME)
    }
}
