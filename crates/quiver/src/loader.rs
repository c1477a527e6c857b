#![forbid(unsafe_code)]

//! The public bundle-loading facade.
//!
//! [`BundleLoader`] ties the pieces together: it consults the manifest,
//! drives each bundle's transport state machine, funnels asset requests
//! through the per-bundle operation cache, and exposes the task-scheduler
//! surface for cap-bounded work.
//!
//! The advance loop is the single driver of a record: it inspects the
//! transport state under the lock, performs exactly one awaited step outside
//! the lock, applies the outcome, and loops until the record is loaded and no
//! pending operations remain. Re-entrant calls that observe a busy record
//! return immediately; the in-flight drive picks up operations added
//! meanwhile because the loop re-inspects after every step.

use std::sync::Arc;

use parking_lot::Mutex;
use quiver_net::{Headers, HttpClient, Net};
use quiver_storage::{read_opt, write_atomic, CacheLayout};
use quiver_tasks::{LoadTask, TaskScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    config::LoaderConfig,
    container::{Asset, Container, Materializer},
    error::{LoaderError, LoaderResult},
    index::parse_index,
    manifest::{ManifestStore, ResourceManifest},
    ops::{AssetOp, OpKey, OpOutput, OpReceiver, OpStatus, ResultKind},
    record::{BundleRecord, TransportStatus},
};

struct LoaderInner<N> {
    net: N,
    materializer: Arc<dyn Materializer>,
    layout: CacheLayout,
    store: ManifestStore,
    base_url: Url,
    index_path: String,
    cache_to_disk: bool,
    headers: Option<Headers>,
    cancel: CancellationToken,
    state: Mutex<ResourceManifest>,
    scheduler: Arc<TaskScheduler>,
}

/// Bundle retrieval, caching, and materialization engine.
///
/// Cheap to clone; clones share all state.
pub struct BundleLoader<N = HttpClient> {
    inner: Arc<LoaderInner<N>>,
}

impl<N> Clone for BundleLoader<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub type DefaultLoader = BundleLoader<HttpClient>;

impl DefaultLoader {
    /// Construct a loader over a plain HTTP client built from the config's
    /// network options.
    pub fn with_http(config: LoaderConfig, materializer: Arc<dyn Materializer>) -> Self {
        let net = HttpClient::new(config.net.clone());
        Self::new(config, net, materializer)
    }
}

/// One decided step of the advance loop.
enum Step {
    Download { check_cache: bool },
    ReadCache,
    Extract {
        payload: Arc<dyn Container>,
        keys: Vec<OpKey>,
    },
    Restart,
}

impl<N: Net + 'static> BundleLoader<N> {
    pub fn new(config: LoaderConfig, net: N, materializer: Arc<dyn Materializer>) -> Self {
        let layout = CacheLayout::new(config.cache_dir.clone());
        Self {
            inner: Arc::new(LoaderInner {
                net,
                materializer,
                store: ManifestStore::new(layout.clone()),
                layout,
                base_url: config.base_url,
                index_path: config.index_path,
                cache_to_disk: config.cache_to_disk,
                headers: config.headers,
                cancel: config.cancel.unwrap_or_default(),
                state: Mutex::new(ResourceManifest::new()),
                scheduler: TaskScheduler::new(config.max_concurrent_tasks),
            }),
        }
    }

    // Setup

    /// Load the local manifest, then reconcile it against the remote index
    /// and persist the result.
    ///
    /// On failure the manifest keeps whatever state it had before the
    /// attempt: reconciliation only runs once the index has been fetched and
    /// parsed.
    pub async fn setup(&self) -> LoaderResult<()> {
        let persisted = self.inner.store.load().await?;
        {
            let mut state = self.inner.state.lock();
            state.load_local(persisted);
        }

        let url = self.join_url(&self.inner.index_path)?;
        debug!(url = %url, "fetching remote index");
        let bytes = self
            .inner
            .net
            .get_bytes(url, self.inner.headers.clone())
            .await?;
        let remote = parse_index(&String::from_utf8_lossy(&bytes));
        debug!(entries = remote.len(), "reconciling remote index");

        let snapshot = {
            let mut state = self.inner.state.lock();
            state.reconcile(&remote);
            state.snapshot()
        };
        self.inner.store.save(&snapshot).await
    }

    // Load APIs

    /// Load a single named asset out of a bundle.
    ///
    /// Unknown bundle names resolve to `None` immediately and create no
    /// state. Concurrent requests for the same asset share one extraction.
    pub async fn load_asset(&self, bundle: &str, asset: &str) -> Option<Asset> {
        match self.request(bundle, OpKey::single(asset)).await {
            Some(OpOutput::Single(asset)) => asset,
            _ => None,
        }
    }

    /// Load every asset in a bundle.
    pub async fn load_all_assets(&self, bundle: &str) -> Option<Vec<Asset>> {
        match self.request(bundle, OpKey::all()).await {
            Some(OpOutput::All(assets)) => Some(assets),
            _ => None,
        }
    }

    /// Load the sub-objects of a named asset.
    pub async fn load_sub_assets(&self, bundle: &str, asset: &str) -> Option<Vec<Asset>> {
        match self.request(bundle, OpKey::sub(asset)).await {
            Some(OpOutput::Sub(assets)) => Some(assets),
            _ => None,
        }
    }

    /// Load the scene paths carried by a bundle.
    pub async fn load_scene_paths(&self, bundle: &str) -> Option<Vec<String>> {
        match self.request(bundle, OpKey::scene_paths()).await {
            Some(OpOutput::ScenePaths(paths)) => Some(paths),
            _ => None,
        }
    }

    // Synchronous accessors over already-completed operations

    pub fn loaded_asset(&self, bundle: &str, asset: &str) -> Option<Asset> {
        match self.loaded_result(bundle, &OpKey::single(asset)) {
            Some(OpOutput::Single(asset)) => asset,
            _ => None,
        }
    }

    pub fn loaded_assets(&self, bundle: &str) -> Option<Vec<Asset>> {
        match self.loaded_result(bundle, &OpKey::all()) {
            Some(OpOutput::All(assets)) => Some(assets),
            _ => None,
        }
    }

    pub fn loaded_sub_assets(&self, bundle: &str, asset: &str) -> Option<Vec<Asset>> {
        match self.loaded_result(bundle, &OpKey::sub(asset)) {
            Some(OpOutput::Sub(assets)) => Some(assets),
            _ => None,
        }
    }

    pub fn loaded_scene_paths(&self, bundle: &str) -> Option<Vec<String>> {
        match self.loaded_result(bundle, &OpKey::scene_paths()) {
            Some(OpOutput::ScenePaths(paths)) => Some(paths),
            _ => None,
        }
    }

    // Lifecycle management

    /// Pin or unpin a bundle. Pinned bundles ignore unload requests.
    /// Returns false for unknown names.
    pub fn set_pinned(&self, bundle: &str, pinned: bool) -> bool {
        let mut state = self.inner.state.lock();
        match state.get_mut(bundle) {
            Some(record) => {
                record.set_pinned(pinned);
                true
            }
            None => false,
        }
    }

    /// Release a bundle's in-memory state.
    ///
    /// No-op on pinned or busy records; returns whether the unload happened.
    pub fn unload(&self, bundle: &str) -> bool {
        let mut state = self.inner.state.lock();
        state.get_mut(bundle).is_some_and(BundleRecord::unload)
    }

    /// Unload every record that is neither pinned nor busy.
    pub fn unload_all(&self) {
        let mut state = self.inner.state.lock();
        for record in state.records_mut() {
            record.unload();
        }
    }

    /// Whether the named bundle (or, with `None`, any bundle) has in-flight
    /// work.
    pub fn is_busy(&self, bundle: Option<&str>) -> bool {
        let state = self.inner.state.lock();
        match bundle {
            Some(name) => state.get(name).is_some_and(BundleRecord::busy),
            None => state.records().any(BundleRecord::busy),
        }
    }

    // Introspection

    pub fn bundle_names(&self) -> Vec<String> {
        self.inner.state.lock().names()
    }

    pub fn transport_status(&self, bundle: &str) -> Option<TransportStatus> {
        self.inner.state.lock().get(bundle).map(BundleRecord::transport)
    }

    pub fn version(&self, bundle: &str) -> Option<u64> {
        self.inner.state.lock().get(bundle).map(BundleRecord::version)
    }

    // Scheduler surface

    /// Drive one bundle through download → cache → materialize without
    /// requesting any asset.
    pub async fn preload(&self, bundle: &str) -> LoaderResult<()> {
        self.advance(bundle).await
    }

    /// Wrap a full advance of one bundle as a schedulable task.
    pub fn bundle_task(&self, bundle: &str) -> Arc<LoadTask> {
        let loader = self.clone();
        let bundle = bundle.to_string();
        LoadTask::new(async move {
            if let Err(e) = loader.preload(&bundle).await {
                warn!(bundle = %bundle, error = %e, "queued bundle load failed");
            }
        })
    }

    pub fn submit_task(&self, task: Arc<LoadTask>) {
        self.inner.scheduler.submit(task);
    }

    pub fn pump(&self) {
        self.inner.scheduler.pump();
    }

    pub fn task_count(&self) -> usize {
        self.inner.scheduler.len()
    }

    pub fn clear_tasks(&self) {
        self.inner.scheduler.clear();
    }

    // Request path

    async fn request(&self, bundle: &str, key: OpKey) -> Option<OpOutput> {
        enum Joined {
            Ready(OpOutput),
            Wait { rx: OpReceiver, created: bool },
        }

        let joined = {
            let mut state = self.inner.state.lock();
            let Some(record) = state.get_mut(bundle) else {
                trace!(bundle, "request for unknown bundle");
                return None;
            };
            match record.ops.find_mut(&key) {
                Some(op) => {
                    let ready = if op.status() == OpStatus::Loaded {
                        op.result().cloned()
                    } else {
                        None
                    };
                    match ready {
                        Some(result) => Joined::Ready(result),
                        None => Joined::Wait {
                            rx: op.subscribe(),
                            created: false,
                        },
                    }
                }
                None => {
                    let mut op = AssetOp::new(key.clone());
                    let rx = op.subscribe();
                    record.ops.insert(op);
                    Joined::Wait { rx, created: true }
                }
            }
        };

        match joined {
            Joined::Ready(output) => Some(output),
            Joined::Wait { rx, created } => {
                if created {
                    if let Err(e) = self.advance(bundle).await {
                        warn!(bundle, error = %e, "bundle advance failed");
                    }
                }
                rx.await.ok().flatten()
            }
        }
    }

    // Advance loop

    pub(crate) async fn advance(&self, bundle: &str) -> LoaderResult<()> {
        loop {
            if self.inner.cancel.is_cancelled() {
                return Err(self.fail_record(bundle, LoaderError::Cancelled));
            }

            let step = {
                let mut state = self.inner.state.lock();
                let Some(record) = state.get_mut(bundle) else {
                    return Err(LoaderError::UnknownBundle(bundle.to_string()));
                };
                if record.transport_busy {
                    // Another drive owns this record and will pick up any
                    // pending operations added meanwhile.
                    return Ok(());
                }
                match record.transport() {
                    TransportStatus::NeedsDownload => {
                        record.transport_busy = true;
                        Step::Download {
                            check_cache: record.cached() && self.inner.cache_to_disk,
                        }
                    }
                    TransportStatus::Downloaded => {
                        record.transport_busy = true;
                        Step::ReadCache
                    }
                    TransportStatus::Loaded => {
                        let keys = record.ops.pending_keys();
                        if keys.is_empty() {
                            return Ok(());
                        }
                        match record.payload() {
                            Some(payload) => {
                                for key in &keys {
                                    if let Some(op) = record.ops.find_mut(key) {
                                        op.set_loading();
                                    }
                                }
                                record.transport_busy = true;
                                Step::Extract { payload, keys }
                            }
                            None => {
                                // Loaded without a payload only happens when a
                                // version bump raced in-flight work; re-drive.
                                record.reset_transport();
                                Step::Restart
                            }
                        }
                    }
                }
            };

            match step {
                Step::Restart => {}
                Step::Download { check_cache } => self.step_download(bundle, check_cache).await?,
                Step::ReadCache => self.step_read_cache(bundle).await?,
                Step::Extract { payload, keys } => self.step_extract(bundle, payload, keys).await,
            }
        }
    }

    async fn step_download(&self, bundle: &str, check_cache: bool) -> LoaderResult<()> {
        if check_cache {
            let path = match self.inner.layout.bundle_path(bundle) {
                Ok(path) => path,
                Err(e) => return Err(self.fail_record(bundle, e.into())),
            };
            if matches!(tokio::fs::try_exists(&path).await, Ok(true)) {
                trace!(bundle, "cache hit, skipping download");
                let mut state = self.inner.state.lock();
                if let Some(record) = state.get_mut(bundle) {
                    record.mark_cached();
                    record.transport_busy = false;
                }
                return Ok(());
            }
            trace!(bundle, "cache flag stale, fetching from origin");
        }

        let url = match self.join_url(bundle) {
            Ok(url) => url,
            Err(e) => return Err(self.fail_record(bundle, e)),
        };
        debug!(bundle, url = %url, "cache miss -> fetching from origin");
        let bytes = match self
            .inner
            .net
            .get_bytes(url, self.inner.headers.clone())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail_record(bundle, e.into())),
        };

        if !self.inner.cache_to_disk {
            // No-disk-cache mode: materialize straight from the buffer,
            // skipping the Downloaded state.
            let container = match self.inner.materializer.materialize(bundle, bytes).await {
                Ok(container) => container,
                Err(e) => return Err(self.fail_record(bundle, e)),
            };
            let mut state = self.inner.state.lock();
            if let Some(record) = state.get_mut(bundle) {
                record.mark_loaded(container);
                record.transport_busy = false;
            }
            return Ok(());
        }

        let path = match self.inner.layout.bundle_path(bundle) {
            Ok(path) => path,
            Err(e) => return Err(self.fail_record(bundle, e.into())),
        };
        if let Err(e) = write_atomic(&path, bytes).await {
            return Err(self.fail_record(bundle, e.into()));
        }

        let snapshot = {
            let mut state = self.inner.state.lock();
            if let Some(record) = state.get_mut(bundle) {
                record.mark_cached();
                record.transport_busy = false;
            }
            state.snapshot()
        };
        debug!(bundle, "downloaded and cached");
        if let Err(e) = self.inner.store.save(&snapshot).await {
            // The bytes are cached; reconciliation can rebuild the manifest
            // from the remote index on the next setup.
            warn!(bundle, error = %e, "manifest persist failed after download");
        }
        Ok(())
    }

    async fn step_read_cache(&self, bundle: &str) -> LoaderResult<()> {
        let path = match self.inner.layout.bundle_path(bundle) {
            Ok(path) => path,
            Err(e) => return Err(self.fail_record(bundle, e.into())),
        };
        let bytes = match read_opt(&path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                // No silent fallback to re-download within this attempt; the
                // caller's retry policy decides. Dropping the cache flag and
                // resetting transport lets that retry recover.
                {
                    let mut state = self.inner.state.lock();
                    if let Some(record) = state.get_mut(bundle) {
                        record.mark_uncached();
                        record.reset_transport();
                    }
                }
                return Err(self.fail_record(bundle, LoaderError::MissingCacheFile(path)));
            }
            Err(e) => return Err(self.fail_record(bundle, e.into())),
        };

        trace!(bundle, len = bytes.len(), "materializing cached bundle");
        let container = match self.inner.materializer.materialize(bundle, bytes).await {
            Ok(container) => container,
            Err(e) => return Err(self.fail_record(bundle, e)),
        };

        let mut state = self.inner.state.lock();
        if let Some(record) = state.get_mut(bundle) {
            record.mark_loaded(container);
            record.transport_busy = false;
        }
        Ok(())
    }

    async fn step_extract(&self, bundle: &str, payload: Arc<dyn Container>, keys: Vec<OpKey>) {
        for key in keys {
            let output = run_extraction(payload.as_ref(), &key).await;
            let mut state = self.inner.state.lock();
            if let Some(record) = state.get_mut(bundle) {
                if let Some(op) = record.ops.find_mut(&key) {
                    op.complete(output);
                }
            }
        }

        let mut state = self.inner.state.lock();
        if let Some(record) = state.get_mut(bundle) {
            record.transport_busy = false;
        }
    }

    // Helpers

    fn loaded_result(&self, bundle: &str, key: &OpKey) -> Option<OpOutput> {
        let state = self.inner.state.lock();
        let op = state.get(bundle)?.ops.find(key)?;
        if op.status() == OpStatus::Loaded {
            op.result().cloned()
        } else {
            None
        }
    }

    /// Abort the current attempt: clear the busy flag and answer every
    /// incomplete operation's waiters with an absent result.
    fn fail_record(&self, bundle: &str, error: LoaderError) -> LoaderError {
        let mut state = self.inner.state.lock();
        if let Some(record) = state.get_mut(bundle) {
            record.transport_busy = false;
            record.ops.fail_incomplete();
        }
        error
    }

    fn join_url(&self, path: &str) -> LoaderResult<Url> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| LoaderError::InvalidUrl(format!("{path}: {e}")))
    }
}

async fn run_extraction(container: &dyn Container, key: &OpKey) -> OpOutput {
    let selector = key.selector.as_deref().unwrap_or_default();
    match key.kind {
        ResultKind::SingleAsset => OpOutput::Single(container.asset(selector).await),
        ResultKind::AllAssets => OpOutput::All(container.assets().await),
        ResultKind::SubAssets => OpOutput::Sub(container.sub_assets(selector).await),
        ResultKind::ScenePaths => OpOutput::ScenePaths(container.scene_paths().await),
    }
}
