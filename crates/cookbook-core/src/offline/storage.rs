use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::http::Response;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid cache bucket name: {0:?}")]
    InvalidBucketName(String),

    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A stored response plus when it was stored
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub url: String,
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(url: impl Into<String>, response: Response) -> Self {
        Self {
            url: url.into(),
            response,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

/// Named buckets of cached responses.
///
/// Writes are idempotent: storing the same response under the same key
/// twice leaves one entry. Lookups in a bucket that doesn't exist return
/// `None`; puts create the bucket.
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it doesn't exist yet
    fn open(&self, bucket: &str) -> Result<(), StorageError>;

    /// Names of every existing bucket, sorted
    fn buckets(&self) -> Result<Vec<String>, StorageError>;

    /// Remove a bucket and everything in it. Returns false if it didn't exist.
    fn delete(&self, bucket: &str) -> Result<bool, StorageError>;

    fn lookup(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>, StorageError>;

    fn put(&self, bucket: &str, key: &str, response: &Response) -> Result<(), StorageError>;

    /// Every entry in a bucket, sorted by key
    fn entries(&self, bucket: &str) -> Result<Vec<CachedResponse>, StorageError>;
}

/// Reject names that can't double as a directory name
pub fn validate_bucket_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidBucketName(name.to_string()));
    }
    Ok(())
}

/// Process-local storage, lost on exit
#[derive(Default)]
pub struct MemoryStorage {
    buckets: Mutex<BTreeMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, HashMap<String, CachedResponse>>> {
        // A panicked writer can't leave a half-written entry behind
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, bucket: &str) -> Result<(), StorageError> {
        validate_bucket_name(bucket)?;
        self.lock().entry(bucket.to_string()).or_default();
        Ok(())
    }

    fn buckets(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock().keys().cloned().collect())
    }

    fn delete(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.lock().remove(bucket).is_some())
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>, StorageError> {
        Ok(self.lock().get(bucket).and_then(|b| b.get(key)).cloned())
    }

    fn put(&self, bucket: &str, key: &str, response: &Response) -> Result<(), StorageError> {
        validate_bucket_name(bucket)?;
        self.lock()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), CachedResponse::new(key, response.clone()));
        Ok(())
    }

    fn entries(&self, bucket: &str) -> Result<Vec<CachedResponse>, StorageError> {
        let mut entries: Vec<CachedResponse> = self
            .lock()
            .get(bucket)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(entries)
    }
}
