#![forbid(unsafe_code)]

use std::path::PathBuf;

use quiver_net::{Headers, NetOptions};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Configuration for a [`BundleLoader`](crate::BundleLoader).
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Bundle directory URL. Bundles live at `<base_url>/<bundle_name>` and
    /// the index at `<base_url>/<index_path>`, so the URL should end with a
    /// trailing slash.
    pub base_url: Url,
    /// Directory for persistent cache storage.
    pub cache_dir: PathBuf,
    /// Whether downloaded bundles are written to disk.
    ///
    /// When `false`, downloads materialize straight from the in-memory
    /// buffer and nothing survives a restart.
    pub cache_to_disk: bool,
    /// Path of the remote index, relative to `base_url`.
    pub index_path: String,
    /// Concurrency cap for tasks submitted to the scheduler surface.
    pub max_concurrent_tasks: usize,
    /// Headers to include in all origin requests.
    pub headers: Option<Headers>,
    /// Network configuration.
    pub net: NetOptions,
    /// Cancellation token for graceful shutdown.
    pub cancel: Option<CancellationToken>,
}

impl LoaderConfig {
    /// Create a config with defaults for the given bundle directory URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            cache_dir: std::env::temp_dir().join("quiver"),
            cache_to_disk: true,
            index_path: "index.txt".to_string(),
            max_concurrent_tasks: 4,
            headers: None,
            net: NetOptions::default(),
            cancel: None,
        }
    }

    /// Set the cache directory.
    pub fn with_cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Enable or disable the disk cache.
    pub fn with_cache_to_disk(mut self, enabled: bool) -> Self {
        self.cache_to_disk = enabled;
        self
    }

    /// Set the remote index path relative to the base URL.
    pub fn with_index_path<S: Into<String>>(mut self, path: S) -> Self {
        self.index_path = path.into();
        self
    }

    /// Set the scheduler concurrency cap.
    pub fn with_max_concurrent_tasks(mut self, cap: usize) -> Self {
        self.max_concurrent_tasks = cap;
        self
    }

    /// Set headers included in all origin requests.
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Set network options.
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}
