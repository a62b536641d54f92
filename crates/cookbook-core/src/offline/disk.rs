//! Filesystem-backed cache storage.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<bucket>/<sha256(key)>.json   entry metadata
//! <root>/<bucket>/<sha256(key)>.body   raw response body
//! ```
//!
//! Both files are written to a temporary file in the bucket directory and
//! renamed into place, so a reader never sees a partially written file.
//! The body is renamed before the metadata, and the metadata records the
//! body's SHA-256. A reader that catches the metadata of one put and the
//! body of another sees the digest mismatch and reads again.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use super::http::{Response, ResponseKind};
use super::storage::{validate_bucket_name, CacheStorage, CachedResponse, StorageError};

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// Reads of an entry that is being replaced before giving up and
/// reporting a miss
const READ_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    status_text: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    kind: ResponseKind,
    cached_at: DateTime<Utc>,
    #[serde(default)]
    body_sha256: Option<String>,
}

pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        validate_bucket_name(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn entry_stem(key: &str) -> String {
        digest(key.as_bytes())
    }

    fn read_entry(meta_path: &Path) -> Result<Option<CachedResponse>, StorageError> {
        for _ in 0..READ_ATTEMPTS {
            if let Some(read) = Self::try_read_entry(meta_path)? {
                return Ok(read);
            }
        }
        debug!(path = %meta_path.display(), "Entry kept changing while read, treating as miss");
        Ok(None)
    }

    /// `None` when the metadata and body came from different writes
    fn try_read_entry(meta_path: &Path) -> Result<Option<Option<CachedResponse>>, StorageError> {
        let contents = match fs::read_to_string(meta_path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Some(None)),
            Err(source) => {
                return Err(StorageError::Io {
                    path: meta_path.to_path_buf(),
                    source,
                })
            }
        };
        let meta: EntryMeta = serde_json::from_str(&contents)?;

        let body_path = meta_path.with_extension(BODY_EXT);
        let body = fs::read(&body_path).map_err(|source| StorageError::Io {
            path: body_path,
            source,
        })?;
        if let Some(ref expected) = meta.body_sha256 {
            if *expected != digest(&body) {
                return Ok(None);
            }
        }

        Ok(Some(Some(CachedResponse {
            url: meta.url,
            response: Response {
                status: meta.status,
                status_text: meta.status_text,
                headers: meta.headers,
                body,
                kind: meta.kind,
            },
            cached_at: meta.cached_at,
        })))
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Replace `path` with `contents` in one rename
fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err(dir))?;
    tmp.write_all(contents).map_err(io_err(path))?;
    tmp.persist(path).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl CacheStorage for DiskStorage {
    fn open(&self, bucket: &str) -> Result<(), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        fs::create_dir_all(&dir).map_err(io_err(&dir))
    }

    fn buckets(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let entry = entry.map_err(io_err(&self.root))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, bucket: &str) -> Result<bool, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(bucket, "Deleted cache bucket");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io { path: dir, source }),
        }
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>, StorageError> {
        let meta_path = self
            .bucket_dir(bucket)?
            .join(Self::entry_stem(key))
            .with_extension(META_EXT);
        Self::read_entry(&meta_path)
    }

    fn put(&self, bucket: &str, key: &str, response: &Response) -> Result<(), StorageError> {
        let dir = self.bucket_dir(bucket)?;
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let stem = dir.join(Self::entry_stem(key));
        let body_path = stem.with_extension(BODY_EXT);
        write_atomic(&dir, &body_path, &response.body)?;

        let meta = EntryMeta {
            url: key.to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            kind: response.kind,
            cached_at: Utc::now(),
            body_sha256: Some(digest(&response.body)),
        };
        let meta_path = stem.with_extension(META_EXT);
        let contents = serde_json::to_string_pretty(&meta)?;
        write_atomic(&dir, &meta_path, contents.as_bytes())
    }

    fn entries(&self, bucket: &str) -> Result<Vec<CachedResponse>, StorageError> {
        let dir = self.bucket_dir(bucket)?;
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path: dir, source }),
        };

        let mut entries = Vec::new();
        for entry in listing {
            let path = entry.map_err(io_err(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            if let Some(cached) = Self::read_entry(&path)? {
                entries.push(cached);
            }
        }
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> (tempfile::TempDir, DiskStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().join("offline")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_put_and_lookup_round_trip() {
        let (_dir, storage) = storage();
        let response = Response::ok(vec![0u8, 159, 146, 150]).with_header("Content-Type", "image/jpeg");

        storage.put("v1", "https://cook.example/hero.jpg", &response).unwrap();
        let hit = storage
            .lookup("v1", "https://cook.example/hero.jpg")
            .unwrap()
            .unwrap();

        assert_eq!(hit.response, response);
        assert_eq!(hit.url, "https://cook.example/hero.jpg");
        assert!(storage.lookup("v1", "https://cook.example/other").unwrap().is_none());
    }

    #[test]
    fn test_lookup_during_replace_never_sees_partial_entry() {
        let (_dir, storage) = storage();
        let key = "https://cook.example/recipes.json";
        let old = Response::ok(vec![b'a'; 1 << 20]).with_header("X-Revision", "a");
        let new = Response::ok(vec![b'b'; 1 << 20]).with_header("X-Revision", "b");
        storage.put("v1", key, &old).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..200 {
                    let next = if i % 2 == 0 { &new } else { &old };
                    storage.put("v1", key, next).unwrap();
                }
            });

            for _ in 0..2000 {
                let hit = storage.lookup("v1", key).unwrap();
                // A miss is allowed while the entry keeps changing; a torn hit is not
                if let Some(hit) = hit {
                    let expected = match hit.response.header("X-Revision") {
                        Some("a") => &old,
                        Some("b") => &new,
                        other => panic!("unexpected revision {:?}", other),
                    };
                    assert_eq!(hit.response.body.len(), expected.body.len());
                    assert!(hit.response.body == expected.body);
                }
            }
        });

        let entries = storage.entries("v1").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].response.status, 200);
    }

    #[test]
    fn test_replacing_identical_entry_keeps_it_readable() {
        let (_dir, storage) = storage();
        let key = "https://cook.example/index.html";
        let shell = Response::ok(vec![b'x'; 1 << 20]);
        storage.put("v1", key, &shell).unwrap();

        std::thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..100 {
                    storage.put("v1", key, &shell).unwrap();
                }
            });

            for _ in 0..1000 {
                let hit = storage.lookup("v1", key).unwrap().unwrap();
                assert!(hit.response.body == shell.body);
            }
        });
    }

    #[test]
    fn test_reads_metadata_written_without_digest() {
        let (_dir, storage) = storage();
        let key = "https://cook.example/a";
        storage.put("v1", key, &Response::ok("a")).unwrap();

        let meta_path = storage
            .root()
            .join("v1")
            .join(DiskStorage::entry_stem(key))
            .with_extension(META_EXT);
        let mut meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        meta.as_object_mut().unwrap().remove("body_sha256");
        fs::write(&meta_path, meta.to_string()).unwrap();

        assert_eq!(storage.lookup("v1", key).unwrap().unwrap().response.text(), "a");
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = DiskStorage::new(dir.path().to_path_buf()).unwrap();
            storage.put("v1", "https://cook.example/a", &Response::ok("a")).unwrap();
            storage.put("v1", "https://cook.example/b", &Response::ok("b")).unwrap();
        }

        let reopened = DiskStorage::new(dir.path().to_path_buf()).unwrap();
        let urls: Vec<_> = reopened.entries("v1").unwrap().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://cook.example/a", "https://cook.example/b"]);
    }

    #[test]
    fn test_buckets_and_delete() {
        let (_dir, storage) = storage();
        storage.open("sous-vide-cookbook-v1").unwrap();
        storage.open("sous-vide-cookbook-v2").unwrap();
        assert_eq!(
            storage.buckets().unwrap(),
            vec!["sous-vide-cookbook-v1", "sous-vide-cookbook-v2"]
        );

        assert!(storage.delete("sous-vide-cookbook-v1").unwrap());
        assert!(!storage.delete("sous-vide-cookbook-v1").unwrap());
        assert_eq!(storage.buckets().unwrap(), vec!["sous-vide-cookbook-v2"]);
        assert!(storage.entries("sous-vide-cookbook-v1").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_bucket_names() {
        let (_dir, storage) = storage();
        assert!(matches!(
            storage.open("../escape"),
            Err(StorageError::InvalidBucketName(_))
        ));
    }
}
