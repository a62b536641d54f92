use reqwest::Url;
use tracing::{info, warn};

/// Script path the host page registers the worker under
pub const SCRIPT_PATH: &str = "sw.js";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub script_url: Url,
    pub scope: Url,
}

/// Register the worker script for `scope`.
///
/// The outcome is only logged; a page without a worker still works, just
/// not offline.
pub fn register(scope: &Url, script_path: &str) -> Option<Registration> {
    let script_url = match scope.join(script_path) {
        Ok(url) => url,
        Err(e) => {
            warn!(script = script_path, error = %e, "Service Worker registration failed");
            return None;
        }
    };

    if script_url.origin() != scope.origin() {
        warn!(script = %script_url, "Service Worker registration failed: script is cross-origin");
        return None;
    }

    info!(script = %script_url, scope = %scope, "Service Worker registered successfully");
    Some(Registration {
        script_url,
        scope: scope.clone(),
    })
}
