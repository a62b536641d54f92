//! Offline cache worker.
//!
//! The worker is an actor running on tokio. The host drives it with three
//! lifecycle events (install, activate, fetch) plus `settle`, and every
//! event carries a oneshot completion token so the host knows when the work
//! behind it is done.
//!
//! ```text
//! Uninstalled -> Installing -> Installed -> Activating -> Active
//! ```
//!
//! Lifecycle work runs in order; fetches run concurrently with each other
//! and with lifecycle work. The only shared resource is the cache storage,
//! and every write to it is idempotent.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use reqwest::{Method, Url};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::http::{Request, Response};
use super::network::Network;
use super::storage::CacheStorage;

/// Cache bucket name for the current deployment.
/// Bump the version to invalidate everything cached by earlier deployments.
pub const CACHE_NAME: &str = "sous-vide-cookbook-v1";

/// Assets needed to run offline, relative to the worker scope
pub const ASSETS: &[&str] = &[
    "./",
    "index.html",
    "recipes.json",
    "manifest.json",
    "assets/index-W82P3Hg4.js",
    "assets/index-BZxvxeNz.css",
    "images/hero-banner.jpg",
    "images/food-showcase.jpg",
    "images/pattern-accent.jpg",
];

/// Inbound event queue depth
const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker has shut down")]
    Closed,

    #[error("Cannot {event} while {state}")]
    InvalidTransition {
        event: &'static str,
        state: WorkerState,
    },

    #[error("Invalid asset path {path:?}: {reason}")]
    InvalidAsset { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Uninstalled => write!(f, "uninstalled"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Active => write!(f, "active"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub cache_name: String,
    pub scope: Url,
    pub assets: Vec<String>,
}

impl WorkerConfig {
    pub fn new(cache_name: impl Into<String>, scope: Url, assets: Vec<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            scope: directory_url(scope),
            assets,
        }
    }

    /// The cookbook's bucket name and asset list under `scope`
    pub fn cookbook(scope: Url) -> Self {
        Self::new(
            CACHE_NAME,
            scope,
            ASSETS.iter().map(|a| a.to_string()).collect(),
        )
    }

    /// Resolve the asset list against the scope
    pub fn asset_urls(&self) -> Result<Vec<Url>, WorkerError> {
        self.assets
            .iter()
            .map(|path| {
                self.scope.join(path).map_err(|e| WorkerError::InvalidAsset {
                    path: path.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Same scheme, host and port as the scope
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.scope.origin()
    }
}

/// Relative joins need the scope to end in a slash
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub install: InstallReport,
    pub deleted_buckets: Vec<String>,
}

/// Where an intercepted response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    Offline,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intercept {
    /// Not handled; the host performs the request itself
    Passthrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl Intercept {
    pub fn into_response(self) -> Option<Response> {
        match self {
            Intercept::Passthrough => None,
            Intercept::Respond { response, .. } => Some(response),
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Intercept::Passthrough => None,
            Intercept::Respond { source, .. } => Some(*source),
        }
    }
}

enum Event {
    Install {
        done: oneshot::Sender<Result<InstallReport, WorkerError>>,
    },
    Activate {
        done: oneshot::Sender<Result<Vec<String>, WorkerError>>,
    },
    Fetch {
        request: Request,
        done: oneshot::Sender<Intercept>,
    },
    Settle {
        done: oneshot::Sender<()>,
    },
}

/// State shared between the actor and the tasks it spawns
struct Shared {
    config: WorkerConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    state: watch::Sender<WorkerState>,
    claimed: AtomicBool,
}

impl Shared {
    fn transition(&self, to: WorkerState) {
        let from = self.state.send_replace(to);
        info!(cache = %self.config.cache_name, %from, %to, "Worker state changed");
    }
}

pub struct ServiceWorker {
    shared: Arc<Shared>,
    events: mpsc::Receiver<Event>,
    /// Most recent install/activate task; the next one waits for it
    lifecycle: Option<JoinHandle<()>>,
    /// In-flight fetches, including their cache writes
    fetches: JoinSet<()>,
}

impl ServiceWorker {
    /// Start the worker on the current tokio runtime
    pub fn spawn(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> WorkerHandle {
        Self::start(config, storage, network, WorkerState::Uninstalled)
    }

    /// Start a worker whose bucket was installed and activated by an
    /// earlier process. It controls requests immediately.
    pub fn resume(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> WorkerHandle {
        Self::start(config, storage, network, WorkerState::Active)
    }

    fn start(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        initial: WorkerState,
    ) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (state_tx, state_rx) = watch::channel(initial);

        let shared = Arc::new(Shared {
            config,
            storage,
            network,
            state: state_tx,
            claimed: AtomicBool::new(initial == WorkerState::Active),
        });

        let worker = ServiceWorker {
            shared: shared.clone(),
            events: rx,
            lifecycle: None,
            fetches: JoinSet::new(),
        };
        tokio::spawn(worker.run());

        WorkerHandle {
            events: tx,
            state: state_rx,
            shared,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
                Some(result) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Fetch task failed");
                    }
                }
            }
        }

        self.settle().await;
        debug!(cache = %self.shared.config.cache_name, "Worker stopped");
    }

    async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Install { done } => self.on_install(done),
            Event::Activate { done } => self.on_activate(done),
            Event::Fetch { request, done } => self.on_fetch(request, done),
            Event::Settle { done } => {
                self.settle().await;
                let _ = done.send(());
            }
        }
    }

    fn on_install(&mut self, done: oneshot::Sender<Result<InstallReport, WorkerError>>) {
        let state = *self.shared.state.borrow();
        if state != WorkerState::Uninstalled {
            let _ = done.send(Err(WorkerError::InvalidTransition {
                event: "install",
                state,
            }));
            return;
        }

        self.shared.transition(WorkerState::Installing);
        let shared = self.shared.clone();
        let previous = self.lifecycle.take();
        self.lifecycle = Some(tokio::spawn(async move {
            wait_for(previous).await;
            let report = install(&shared).await;
            match report {
                Ok(_) => shared.transition(WorkerState::Installed),
                Err(ref e) => {
                    warn!(cache = %shared.config.cache_name, error = %e, "Install failed");
                    shared.transition(WorkerState::Uninstalled);
                }
            }
            let _ = done.send(report);
        }));
    }

    fn on_activate(&mut self, done: oneshot::Sender<Result<Vec<String>, WorkerError>>) {
        let state = *self.shared.state.borrow();
        if !matches!(state, WorkerState::Installing | WorkerState::Installed) {
            let _ = done.send(Err(WorkerError::InvalidTransition {
                event: "activate",
                state,
            }));
            return;
        }

        let shared = self.shared.clone();
        let previous = self.lifecycle.take();
        self.lifecycle = Some(tokio::spawn(async move {
            // An install still in flight finishes first
            wait_for(previous).await;
            let state = *shared.state.borrow();
            if state != WorkerState::Installed {
                let _ = done.send(Err(WorkerError::InvalidTransition {
                    event: "activate",
                    state,
                }));
                return;
            }
            shared.transition(WorkerState::Activating);
            let deleted = activate(&shared);
            shared.claimed.store(true, Ordering::SeqCst);
            shared.transition(WorkerState::Active);
            let _ = done.send(Ok(deleted));
        }));
    }

    fn on_fetch(&mut self, request: Request, done: oneshot::Sender<Intercept>) {
        if request.method != Method::GET {
            let _ = done.send(Intercept::Passthrough);
            return;
        }
        if !self.shared.config.is_same_origin(&request.url) {
            let _ = done.send(Intercept::Passthrough);
            return;
        }
        // Only an active worker controls requests
        if *self.shared.state.borrow() != WorkerState::Active {
            let _ = done.send(Intercept::Passthrough);
            return;
        }

        let shared = self.shared.clone();
        self.fetches.spawn(async move {
            respond(&shared, request, done).await;
        });
    }

    async fn settle(&mut self) {
        wait_for(self.lifecycle.take()).await;
        while let Some(result) = self.fetches.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Fetch task failed");
            }
        }
    }
}

async fn wait_for(task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        if let Err(e) = task.await {
            warn!(error = %e, "Lifecycle task failed");
        }
    }
}

/// Cache every asset that can be fetched. Failures are logged and skipped.
async fn install(shared: &Shared) -> Result<InstallReport, WorkerError> {
    let cache_name = &shared.config.cache_name;
    let urls = shared.config.asset_urls()?;
    let mut report = InstallReport::default();

    if let Err(e) = shared.storage.open(cache_name) {
        warn!(cache = %cache_name, error = %e, "Failed to open cache, continuing without it");
        report.failed = urls
            .into_iter()
            .map(|u| (u.to_string(), e.to_string()))
            .collect();
        return Ok(report);
    }

    info!(cache = %cache_name, count = urls.len(), "Caching app shell");

    let fetches = urls.into_iter().map(|url| async move {
        let request = Request::get(url);
        let result = shared.network.fetch(&request).await;
        (request, result)
    });

    for (request, result) in join_all(fetches).await {
        let key = request.cache_key();
        let outcome = match result {
            Ok(response) if response.is_success() => shared
                .storage
                .put(cache_name, &key, &response)
                .map_err(|e| e.to_string()),
            Ok(response) => Err(format!("HTTP {}", response.status)),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(()) => report.cached.push(key),
            Err(reason) => {
                warn!(url = %key, error = %reason, "Asset failed to cache");
                report.failed.push((key, reason));
            }
        }
    }

    Ok(report)
}

/// Delete every bucket except the current one
fn activate(shared: &Shared) -> Vec<String> {
    let current = &shared.config.cache_name;
    let names = match shared.storage.buckets() {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "Failed to list cache buckets");
            return Vec::new();
        }
    };

    let mut deleted = Vec::new();
    for name in names.into_iter().filter(|n| n != current) {
        info!(cache = %name, "Deleting old cache");
        match shared.storage.delete(&name) {
            Ok(_) => deleted.push(name),
            Err(e) => warn!(cache = %name, error = %e, "Failed to delete old cache"),
        }
    }
    deleted
}

/// Cache first, then network, then the offline placeholder
async fn respond(shared: &Shared, request: Request, done: oneshot::Sender<Intercept>) {
    let cache_name = &shared.config.cache_name;
    let key = request.cache_key();

    match shared.storage.lookup(cache_name, &key) {
        Ok(Some(hit)) => {
            debug!(url = %key, "Cache hit");
            let _ = done.send(Intercept::Respond {
                response: hit.response,
                source: ResponseSource::Cache,
            });
            return;
        }
        Ok(None) => debug!(url = %key, "Cache miss"),
        Err(e) => warn!(url = %key, error = %e, "Cache lookup failed, treating as miss"),
    }

    let response = match shared.network.fetch(&request).await {
        Ok(response) => response,
        Err(e) => {
            info!(url = %key, error = %e, "Offline - no cached response");
            let _ = done.send(Intercept::Respond {
                response: Response::offline(),
                source: ResponseSource::Offline,
            });
            return;
        }
    };

    if !response.is_cacheable() {
        let _ = done.send(Intercept::Respond {
            response,
            source: ResponseSource::Network,
        });
        return;
    }

    let copy = response.clone();
    let _ = done.send(Intercept::Respond {
        response,
        source: ResponseSource::Network,
    });

    // Stored after replying; `settle` waits for this
    if let Err(e) = shared.storage.put(cache_name, &key, &copy) {
        warn!(url = %key, error = %e, "Failed to cache response");
    }
}

/// Cheap to clone; every clone talks to the same worker
#[derive(Clone)]
pub struct WorkerHandle {
    events: mpsc::Sender<Event>,
    state: watch::Receiver<WorkerState>,
    shared: Arc<Shared>,
}

impl WorkerHandle {
    pub fn config(&self) -> &WorkerConfig {
        &self.shared.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// True once activation has claimed open clients
    pub fn is_controlling(&self) -> bool {
        self.shared.claimed.load(Ordering::SeqCst)
    }

    /// Wait until the worker reaches `target`
    pub async fn wait_for_state(&self, target: WorkerState) -> Result<(), WorkerError> {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| WorkerError::Closed)
    }

    async fn send<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Event,
    ) -> Result<T, WorkerError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(make(tx))
            .await
            .map_err(|_| WorkerError::Closed)?;
        rx.await.map_err(|_| WorkerError::Closed)
    }

    pub async fn install(&self) -> Result<InstallReport, WorkerError> {
        self.send(|done| Event::Install { done }).await?
    }

    /// Returns the names of the buckets that were deleted
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        self.send(|done| Event::Activate { done }).await?
    }

    /// Install and activate straight away, without waiting for clients of
    /// an earlier version to go away
    pub async fn deploy(&self) -> Result<DeployReport, WorkerError> {
        let install = self.install().await?;
        let deleted_buckets = self.activate().await?;
        Ok(DeployReport {
            install,
            deleted_buckets,
        })
    }

    pub async fn fetch(&self, request: Request) -> Result<Intercept, WorkerError> {
        self.send(|done| Event::Fetch { request, done }).await
    }

    /// Wait for all in-flight work, including background cache writes
    pub async fn settle(&self) -> Result<(), WorkerError> {
        self.send(|done| Event::Settle { done }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::disk::DiskStorage;
    use crate::offline::network::NetworkError;
    use crate::offline::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    /// Serves a fixed set of paths and counts every request it sees
    #[derive(Default)]
    struct MockNetwork {
        routes: HashMap<String, Response>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockNetwork {
        fn with_assets(paths: &[&str]) -> Self {
            let routes = paths
                .iter()
                .map(|p| (format!("https://cook.example{}", p), Response::ok(format!("body of {}", p))))
                .collect();
            Self {
                routes,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn go_offline(&self) {
            self.offline.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Network for MockNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(NetworkError::Unreachable("offline".to_string()));
            }
            Ok(self
                .routes
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| Response::new(404, "Not Found", "")))
        }
    }

    fn scope() -> Url {
        Url::parse("https://cook.example/").unwrap()
    }

    fn config() -> WorkerConfig {
        WorkerConfig::new(
            "cookbook-v2",
            scope(),
            vec!["index.html".to_string(), "recipes.json".to_string()],
        )
    }

    fn url(path: &str) -> Url {
        scope().join(path).unwrap()
    }

    #[test]
    fn test_cookbook_config_resolves_assets_under_scope() {
        let config = WorkerConfig::cookbook(Url::parse("https://cook.example/app").unwrap());
        assert_eq!(config.cache_name, CACHE_NAME);
        let urls = config.asset_urls().unwrap();
        assert_eq!(urls[0].as_str(), "https://cook.example/app/");
        assert_eq!(urls[2].as_str(), "https://cook.example/app/recipes.json");
        assert_eq!(urls.len(), ASSETS.len());
    }

    #[test]
    fn test_same_origin() {
        let config = config();
        assert!(config.is_same_origin(&url("images/a.jpg")));
        assert!(!config.is_same_origin(&Url::parse("https://cdn.example/a.jpg").unwrap()));
        assert!(!config.is_same_origin(&Url::parse("http://cook.example/").unwrap()));
    }

    #[tokio::test]
    async fn test_install_tolerates_missing_assets() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::with_assets(&["/index.html"]));
        let worker = ServiceWorker::spawn(config(), storage.clone(), network);

        let report = worker.install().await.unwrap();
        assert_eq!(report.cached, vec!["https://cook.example/index.html"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "https://cook.example/recipes.json");
        assert_eq!(worker.state(), WorkerState::Installed);
        assert!(storage
            .lookup("cookbook-v2", "https://cook.example/index.html")
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_activate_deletes_stale_buckets_and_claims_clients() {
        let storage = Arc::new(MemoryStorage::new());
        storage.open("cookbook-v1").unwrap();
        storage.open("unrelated").unwrap();
        let network = Arc::new(MockNetwork::with_assets(&["/index.html", "/recipes.json"]));
        let worker = ServiceWorker::spawn(config(), storage.clone(), network);

        assert!(!worker.is_controlling());
        let report = worker.deploy().await.unwrap();
        assert_eq!(report.install.cached.len(), 2);
        assert_eq!(report.deleted_buckets, vec!["cookbook-v1", "unrelated"]);
        assert_eq!(storage.buckets().unwrap(), vec!["cookbook-v2"]);
        assert_eq!(worker.state(), WorkerState::Active);
        assert!(worker.is_controlling());
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let worker = ServiceWorker::spawn(
            config(),
            Arc::new(MemoryStorage::new()),
            Arc::new(MockNetwork::default()),
        );
        assert!(matches!(
            worker.activate().await,
            Err(WorkerError::InvalidTransition { event: "activate", .. })
        ));
    }

    #[tokio::test]
    async fn test_install_twice_is_rejected() {
        let worker = ServiceWorker::spawn(
            config(),
            Arc::new(MemoryStorage::new()),
            Arc::new(MockNetwork::default()),
        );
        worker.install().await.unwrap();
        assert!(matches!(
            worker.install().await,
            Err(WorkerError::InvalidTransition { event: "install", .. })
        ));
    }

    #[tokio::test]
    async fn test_activate_queued_behind_install() {
        let network = Arc::new(MockNetwork::with_assets(&["/index.html", "/recipes.json"]));
        let worker = ServiceWorker::spawn(config(), Arc::new(MemoryStorage::new()), network);

        let (install, activate) = tokio::join!(worker.install(), worker.activate());
        assert_eq!(install.unwrap().cached.len(), 2);
        assert!(activate.is_ok());
        worker.wait_for_state(WorkerState::Active).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_install_returns_to_uninstalled() {
        let config = WorkerConfig::new("cookbook-v2", scope(), vec!["http://[bad".to_string()]);
        let worker = ServiceWorker::spawn(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(MockNetwork::default()),
        );

        let (install, activate) = tokio::join!(worker.install(), worker.activate());
        assert!(matches!(install, Err(WorkerError::InvalidAsset { .. })));
        assert!(matches!(
            activate,
            Err(WorkerError::InvalidTransition { event: "activate", .. })
        ));
        assert_eq!(worker.state(), WorkerState::Uninstalled);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::with_assets(&["/index.html", "/recipes.json"]));
        let worker = ServiceWorker::spawn(config(), storage, network.clone());
        worker.deploy().await.unwrap();
        let after_install = network.calls();

        let intercept = worker.fetch(Request::get(url("index.html"))).await.unwrap();
        assert_eq!(intercept.source(), Some(ResponseSource::Cache));
        assert_eq!(intercept.into_response().unwrap().text(), "body of /index.html");
        assert_eq!(network.calls(), after_install);
    }

    #[tokio::test]
    async fn test_miss_is_fetched_and_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let mut network = MockNetwork::with_assets(&["/index.html", "/recipes.json"]);
        network.routes.insert(
            "https://cook.example/images/extra.jpg".to_string(),
            Response::ok("jpeg"),
        );
        let network = Arc::new(network);
        let worker = ServiceWorker::spawn(config(), storage.clone(), network.clone());
        worker.deploy().await.unwrap();

        let intercept = worker.fetch(Request::get(url("images/extra.jpg"))).await.unwrap();
        assert_eq!(intercept.source(), Some(ResponseSource::Network));
        worker.settle().await.unwrap();
        assert!(storage
            .lookup("cookbook-v2", "https://cook.example/images/extra.jpg")
            .unwrap()
            .is_some());

        // Second request is served from the cache
        let calls = network.calls();
        let again = worker.fetch(Request::get(url("images/extra.jpg"))).await.unwrap();
        assert_eq!(again.source(), Some(ResponseSource::Cache));
        assert_eq!(network.calls(), calls);
    }

    /// Fetches racing the install, then many concurrent misses for one URL.
    /// Every response is whole and each URL ends up stored once.
    async fn concurrent_fetches_store_each_url_once(storage: Arc<dyn CacheStorage>) {
        let mut network = MockNetwork::with_assets(&["/index.html", "/recipes.json"]);
        let photo = Response::ok(vec![7u8; 256 * 1024]);
        network.routes.insert(
            "https://cook.example/images/extra.jpg".to_string(),
            photo.clone(),
        );
        let network = Arc::new(network);
        let worker = ServiceWorker::spawn(config(), storage.clone(), network.clone());

        let during_deploy = (0..16).map(|_| worker.fetch(Request::get(url("recipes.json"))));
        let (deployed, intercepts) = tokio::join!(worker.deploy(), join_all(during_deploy));
        deployed.unwrap();
        for intercept in intercepts {
            match intercept.unwrap() {
                Intercept::Passthrough => {}
                Intercept::Respond { response, .. } => {
                    assert_eq!(response.text(), "body of /recipes.json")
                }
            }
        }

        let misses = (0..16).map(|_| worker.fetch(Request::get(url("images/extra.jpg"))));
        for intercept in join_all(misses).await {
            let response = intercept.unwrap().into_response().unwrap();
            assert_eq!(response.status, 200);
            assert!(response.body == photo.body);
        }
        worker.settle().await.unwrap();

        let urls: Vec<_> = storage
            .entries("cookbook-v2")
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://cook.example/images/extra.jpg",
                "https://cook.example/index.html",
                "https://cook.example/recipes.json",
            ]
        );

        let calls = network.calls();
        for path in ["images/extra.jpg", "recipes.json"] {
            let again = worker.fetch(Request::get(url(path))).await.unwrap();
            assert_eq!(again.source(), Some(ResponseSource::Cache));
        }
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_with_memory_storage() {
        concurrent_fetches_store_each_url_once(Arc::new(MemoryStorage::new())).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fetches_with_disk_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().join("offline")).unwrap();
        concurrent_fetches_store_each_url_once(Arc::new(storage)).await;
    }

    #[tokio::test]
    async fn test_non_200_responses_are_not_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::with_assets(&["/index.html", "/recipes.json"]));
        let worker = ServiceWorker::spawn(config(), storage.clone(), network);
        worker.deploy().await.unwrap();

        let intercept = worker.fetch(Request::get(url("missing.html"))).await.unwrap();
        let response = intercept.into_response().unwrap();
        assert_eq!(response.status, 404);
        worker.settle().await.unwrap();
        assert!(storage
            .lookup("cookbook-v2", "https://cook.example/missing.html")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_offline_miss_gets_503() {
        let network = Arc::new(MockNetwork::with_assets(&["/index.html", "/recipes.json"]));
        let worker = ServiceWorker::spawn(config(), Arc::new(MemoryStorage::new()), network.clone());
        worker.deploy().await.unwrap();
        network.go_offline();

        let intercept = worker.fetch(Request::get(url("never-seen.html"))).await.unwrap();
        assert_eq!(intercept.source(), Some(ResponseSource::Offline));
        let response = intercept.into_response().unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.header("Content-Type"), Some("text/plain"));

        // Cached assets still work offline
        let cached = worker.fetch(Request::get(url("recipes.json"))).await.unwrap();
        assert_eq!(cached.source(), Some(ResponseSource::Cache));
    }

    #[tokio::test]
    async fn test_non_get_and_cross_origin_pass_through() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(MockNetwork::with_assets(&["/index.html", "/recipes.json"]));
        let worker = ServiceWorker::spawn(config(), storage.clone(), network.clone());
        worker.deploy().await.unwrap();
        let calls = network.calls();

        let post = Request::new(Method::POST, url("index.html"));
        assert_eq!(worker.fetch(post).await.unwrap(), Intercept::Passthrough);

        let cdn = Request::get(Url::parse("https://cdn.example/font.woff2").unwrap());
        assert_eq!(worker.fetch(cdn).await.unwrap(), Intercept::Passthrough);

        worker.settle().await.unwrap();
        assert_eq!(network.calls(), calls);
        assert_eq!(storage.entries("cookbook-v2").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resumed_worker_serves_existing_bucket() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .put("cookbook-v2", "https://cook.example/index.html", &Response::ok("shell"))
            .unwrap();
        let network = Arc::new(MockNetwork::default());
        let worker = ServiceWorker::resume(config(), storage, network.clone());

        assert_eq!(worker.state(), WorkerState::Active);
        assert!(worker.is_controlling());
        let intercept = worker.fetch(Request::get(url("index.html"))).await.unwrap();
        assert_eq!(intercept.source(), Some(ResponseSource::Cache));
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let network = Arc::new(MockNetwork::with_assets(&["/index.html"]));
        let worker = ServiceWorker::spawn(config(), Arc::new(MemoryStorage::new()), network.clone());

        let intercept = worker.fetch(Request::get(url("index.html"))).await.unwrap();
        assert_eq!(intercept, Intercept::Passthrough);
        assert_eq!(network.calls(), 0);
    }
}
