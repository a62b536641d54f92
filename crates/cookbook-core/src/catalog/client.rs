//! HTTP client for fetching the published catalog document.

use std::time::Duration;

use reqwest::{header, Client, Url};
use tracing::debug;

use crate::models::Recipe;

use super::{parse_catalog, CatalogError};

/// HTTP request timeout in seconds.
/// The catalog is a single static document, so anything slower is treated as offline.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the static catalog document.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
}

impl CatalogClient {
    pub fn new() -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the catalog with a plain GET
    pub async fn fetch(&self, url: &Url) -> Result<Vec<Recipe>, CatalogError> {
        debug!(url = %url, "Fetching catalog");

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CatalogError::from_status(status, &body));
        }

        let recipes = parse_catalog(&body)?;
        debug!(count = recipes.len(), "Fetched catalog");
        Ok(recipes)
    }
}
