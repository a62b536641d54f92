use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use super::http::{Request, Response, ResponseKind};

/// HTTP request timeout in seconds.
/// A hung request only delays the offline fallback, so keep it short.
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),
}

/// Where cache misses go
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. HTTP error statuses are responses, not errors;
    /// only transport failures return `Err`.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Network backed by a real HTTP client
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new() -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            kind: ResponseKind::Basic,
        })
    }
}
