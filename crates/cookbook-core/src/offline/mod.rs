//! Offline cache for the app shell and catalog.
//!
//! A `ServiceWorker` owns one versioned cache bucket. Installing it caches
//! a fixed list of essential assets; activating it deletes buckets left by
//! earlier versions; after that every same-origin GET is answered from the
//! cache first, falling back to the network and finally to a 503 placeholder.
//!
//! # Cache states
//!
//! | Event | Bucket | Description |
//! |-------|--------|-------------|
//! | install | created | Asset list cached best-effort |
//! | activate | others deleted | At most one live bucket |
//! | fetch (miss) | grows | Successful responses stored |

pub mod disk;
pub mod http;
pub mod network;
pub mod registration;
pub mod storage;
pub mod worker;

pub use disk::DiskStorage;
pub use http::{Request, Response, ResponseKind, OFFLINE_BODY};
pub use network::{HttpNetwork, Network, NetworkError};
pub use registration::{register, Registration, SCRIPT_PATH};
pub use storage::{CacheStorage, CachedResponse, MemoryStorage, StorageError};
pub use worker::{
    DeployReport, InstallReport, Intercept, ResponseSource, ServiceWorker, WorkerConfig,
    WorkerError, WorkerHandle, WorkerState, ASSETS, CACHE_NAME,
};
