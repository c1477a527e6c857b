#![forbid(unsafe_code)]

//! Per-bundle runtime record.
//!
//! A [`BundleRecord`] carries the manifest facts (name, version, checksum,
//! cache presence) plus the runtime transport state, the pin flag, and the
//! operation cache. Transitions are driven by the loader's advance loop; this
//! module only owns the state rules.

use std::sync::Arc;

use tracing::debug;

use crate::{container::Container, ops::OpCache};

/// Transport progress of a bundle.
///
/// Advances forward through the three states and never regresses, except when
/// a version bump forces a re-download or an explicit unload resets the
/// record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportStatus {
    NeedsDownload,
    Downloaded,
    Loaded,
}

pub struct BundleRecord {
    name: String,
    version: u64,
    checksum: u32,
    cached: bool,
    transport: TransportStatus,
    pinned: bool,
    /// True while a download, disk read, or materialization is outstanding.
    pub(crate) transport_busy: bool,
    pub(crate) ops: OpCache,
    pub(crate) payload: Option<Arc<dyn Container>>,
}

impl BundleRecord {
    /// Fresh record discovered from the remote index.
    pub fn new<S: Into<String>>(name: S, version: u64, checksum: u32) -> Self {
        Self {
            name: name.into(),
            version,
            checksum,
            cached: false,
            transport: TransportStatus::NeedsDownload,
            pinned: false,
            transport_busy: false,
            ops: OpCache::default(),
            payload: None,
        }
    }

    /// Record restored from the persisted manifest.
    ///
    /// In-memory load state never survives a restart: a cached record resumes
    /// at `Downloaded`, everything else at `NeedsDownload`.
    pub fn restored<S: Into<String>>(name: S, version: u64, checksum: u32, cached: bool) -> Self {
        let mut record = Self::new(name, version, checksum);
        record.cached = cached;
        if cached {
            record.transport = TransportStatus::Downloaded;
        }
        record
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn cached(&self) -> bool {
        self.cached
    }

    pub fn transport(&self) -> TransportStatus {
        self.transport
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    /// True while any transport step or asset extraction is in flight.
    ///
    /// Unload is refused while busy; this is what keeps an in-flight payload
    /// alive until its work completes.
    pub fn busy(&self) -> bool {
        self.transport_busy || self.ops.any_loading()
    }

    pub(crate) fn payload(&self) -> Option<Arc<dyn Container>> {
        self.payload.clone()
    }

    pub(crate) fn mark_cached(&mut self) {
        self.cached = true;
        self.transport = TransportStatus::Downloaded;
    }

    pub(crate) fn mark_uncached(&mut self) {
        self.cached = false;
    }

    pub(crate) fn mark_loaded(&mut self, payload: Arc<dyn Container>) {
        self.payload = Some(payload);
        self.transport = TransportStatus::Loaded;
    }

    pub(crate) fn reset_transport(&mut self) {
        self.transport = TransportStatus::NeedsDownload;
    }

    /// Apply a remote index row to this record.
    ///
    /// A version increase invalidates the cached payload and forces a
    /// re-download regardless of prior transport state. When the record is
    /// busy, releasing the in-memory payload is deferred: outstanding work
    /// completes against the old payload, and the next advance or unload
    /// replaces it.
    pub(crate) fn apply_remote(&mut self, version: u64, checksum: u32) {
        let bumped = version > self.version;
        self.version = version;
        self.checksum = checksum;

        if bumped {
            debug!(
                bundle = %self.name,
                version,
                "remote version bump, forcing re-download"
            );
            self.cached = false;
            self.transport = TransportStatus::NeedsDownload;
            if !self.busy() {
                self.payload = None;
                self.ops.clear();
            }
        }
    }

    /// Release the record's in-memory state.
    ///
    /// No-op (returns false) while pinned or busy. Otherwise clears all
    /// operations, drops the payload, and resets transport to
    /// `NeedsDownload`.
    pub(crate) fn unload(&mut self) -> bool {
        if self.pinned || self.busy() {
            return false;
        }
        debug!(bundle = %self.name, "unloading bundle");
        self.ops.clear();
        self.payload = None;
        self.transport = TransportStatus::NeedsDownload;
        true
    }
}

impl std::fmt::Debug for BundleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleRecord")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("checksum", &self.checksum)
            .field("cached", &self.cached)
            .field("transport", &self.transport)
            .field("pinned", &self.pinned)
            .field("busy", &self.busy())
            .field("ops", &self.ops.len())
            .finish()
    }
}
