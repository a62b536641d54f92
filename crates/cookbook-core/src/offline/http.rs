use std::borrow::Cow;

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

/// Body of the synthesized response for uncached requests while offline
pub const OFFLINE_BODY: &str = "Offline - this content is not available";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Key used to store the response; fragments never reach the server
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

/// Response type, mirroring what a browser fetch reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Basic,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "OK", body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Placeholder returned when a request misses the cache and the network fails
    pub fn offline() -> Self {
        Self::new(503, "Service Unavailable", OFFLINE_BODY).with_header("Content-Type", "text/plain")
    }

    /// Only plain 200 responses are worth keeping
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Error
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_drops_fragment() {
        let url = Url::parse("https://cook.example/index.html#brisket").unwrap();
        assert_eq!(Request::get(url).cache_key(), "https://cook.example/index.html");
    }

    #[test]
    fn test_offline_response() {
        let response = Response::offline();
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.text(), OFFLINE_BODY);
        assert!(!response.is_cacheable());
    }

    #[test]
    fn test_is_cacheable() {
        assert!(Response::ok("x").is_cacheable());
        assert!(!Response::new(404, "Not Found", "").is_cacheable());
        assert!(!Response::new(204, "No Content", "").is_cacheable());

        let mut errored = Response::ok("");
        errored.kind = ResponseKind::Error;
        assert!(!errored.is_cacheable());
    }
}
