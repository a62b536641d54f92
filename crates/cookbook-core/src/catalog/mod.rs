//! Recipe catalog loading.
//!
//! The catalog is one static JSON document, read once at startup from a
//! local file or fetched over HTTP. A failed load leaves the catalog in the
//! `NotLoaded` state rather than surfacing an error, so the search engine
//! only ever sees a (possibly empty) list of recipes.

pub mod client;
pub mod error;
pub mod import;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use reqwest::Url;
use tracing::{info, warn};

use crate::models::Recipe;

pub use client::CatalogClient;
pub use error::CatalogError;
pub use import::parse_catalog;

/// Where the catalog document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Path(PathBuf),
    Url(Url),
}

impl FromStr for CatalogSource {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CatalogError::InvalidSource("empty catalog location".to_string()));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            let url = Url::parse(s).map_err(|e| CatalogError::InvalidSource(format!("{}: {}", s, e)))?;
            Ok(CatalogSource::Url(url))
        } else {
            Ok(CatalogSource::Path(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::Path(p) => write!(f, "{}", p.display()),
            CatalogSource::Url(u) => write!(f, "{}", u),
        }
    }
}

/// Read the catalog from a local file
pub fn read_catalog(path: &Path) -> Result<Vec<Recipe>, CatalogError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&contents)
}

/// Loaded recipe collection.
///
/// `NotLoaded` is distinct from `Loaded` with no entries: the first means
/// "no data yet", the second is a catalog that genuinely has no recipes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Catalog {
    #[default]
    NotLoaded,
    Loaded(Vec<Recipe>),
}

impl Catalog {
    /// Load from `source`, logging failures and falling back to `NotLoaded`
    pub async fn load(source: &CatalogSource) -> Self {
        match Self::try_load(source).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(source = %source, error = %e, "Failed to load recipes");
                Catalog::NotLoaded
            }
        }
    }

    pub async fn try_load(source: &CatalogSource) -> Result<Self, CatalogError> {
        let recipes = match source {
            CatalogSource::Path(path) => read_catalog(path)?,
            CatalogSource::Url(url) => CatalogClient::new()?.fetch(url).await?,
        };
        info!(source = %source, count = recipes.len(), "Loaded recipe catalog");
        Ok(Catalog::Loaded(recipes))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Catalog::Loaded(_))
    }

    /// Recipes in catalog order; empty when not loaded
    pub fn recipes(&self) -> &[Recipe] {
        match self {
            Catalog::NotLoaded => &[],
            Catalog::Loaded(recipes) => recipes,
        }
    }

    pub fn len(&self) -> usize {
        self.recipes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes().is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&Recipe> {
        self.recipes().iter().find(|r| r.id == id)
    }
}
