#![forbid(unsafe_code)]

//! The versioned resource manifest.
//!
//! [`ResourceManifest`] owns the mapping from bundle name to
//! [`BundleRecord`] and reconciles it against the remote index.
//! [`ManifestStore`] persists the transport-relevant facts (name, version,
//! checksum, cache presence) to `<cache_root>/manifest.idx`, one serialized
//! record per line, written atomically as a whole-file rewrite. In-memory
//! load state is never persisted.

use std::collections::{hash_map::Entry, HashMap};

use bytes::Bytes;
use quiver_storage::{read_opt, write_atomic, CacheLayout};
use tracing::{debug, warn};

use crate::{
    error::LoaderResult,
    index::IndexEntry,
    record::BundleRecord,
};

/// On-disk schema, one JSON object per line. Private to keep the file format
/// an implementation detail of this crate.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub(crate) struct PersistedEntry {
    pub(crate) name: String,
    pub(crate) version: u64,
    pub(crate) checksum: u32,
    pub(crate) cached: bool,
}

/// Loads and saves the persisted manifest.
#[derive(Clone, Debug)]
pub(crate) struct ManifestStore {
    layout: CacheLayout,
}

impl ManifestStore {
    pub(crate) fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    /// Read all persisted entries.
    ///
    /// A missing file is an empty manifest. Reading stops at the first
    /// unreadable record: the valid prefix is kept, the rest is dropped with
    /// a warning, and no error reaches the caller.
    pub(crate) async fn load(&self) -> LoaderResult<Vec<PersistedEntry>> {
        let path = self.layout.manifest_path();
        let Some(bytes) = read_opt(&path).await? else {
            return Ok(Vec::new());
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PersistedEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(
                        lineno,
                        error = %e,
                        "manifest truncated at unreadable record, keeping valid prefix"
                    );
                    break;
                }
            }
        }

        debug!(entries = entries.len(), "loaded local manifest");
        Ok(entries)
    }

    /// Atomically rewrite the manifest file with the given entries.
    pub(crate) async fn save(&self, entries: &[PersistedEntry]) -> LoaderResult<()> {
        let mut out = String::new();
        for entry in entries {
            match serde_json::to_string(entry) {
                Ok(line) => {
                    out.push_str(&line);
                    out.push('\n');
                }
                Err(e) => {
                    warn!(bundle = %entry.name, error = %e, "skipping unserializable entry");
                }
            }
        }

        write_atomic(&self.layout.manifest_path(), Bytes::from(out)).await?;
        debug!(entries = entries.len(), "persisted manifest");
        Ok(())
    }
}

/// In-memory map from bundle name to record.
#[derive(Default)]
pub(crate) struct ResourceManifest {
    records: HashMap<String, BundleRecord>,
}

impl ResourceManifest {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&BundleRecord> {
        self.records.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut BundleRecord> {
        self.records.get_mut(name)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &BundleRecord> {
        self.records.values()
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut BundleRecord> {
        self.records.values_mut()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort();
        names
    }

    /// Populate records from persisted entries.
    ///
    /// Names already present are left untouched, so a repeated setup never
    /// regresses live runtime state.
    pub(crate) fn load_local(&mut self, entries: Vec<PersistedEntry>) {
        for entry in entries {
            if self.records.contains_key(&entry.name) {
                continue;
            }
            let record =
                BundleRecord::restored(entry.name.clone(), entry.version, entry.checksum, entry.cached);
            self.records.insert(entry.name, record);
        }
    }

    /// Apply the remote index: create unknown records at `NeedsDownload`,
    /// update known ones in place (version bumps force re-download). Entries
    /// absent from the remote index are left untouched.
    pub(crate) fn reconcile(&mut self, remote: &[IndexEntry]) {
        for entry in remote {
            match self.records.entry(entry.name.clone()) {
                Entry::Occupied(mut occupied) => {
                    occupied.get_mut().apply_remote(entry.version, entry.checksum);
                }
                Entry::Vacant(vacant) => {
                    debug!(bundle = %entry.name, version = entry.version, "new bundle from remote index");
                    vacant.insert(BundleRecord::new(
                        entry.name.clone(),
                        entry.version,
                        entry.checksum,
                    ));
                }
            }
        }
    }

    /// Transport-relevant facts for persistence, in stable name order.
    pub(crate) fn snapshot(&self) -> Vec<PersistedEntry> {
        let mut entries: Vec<PersistedEntry> = self
            .records
            .values()
            .map(|record| PersistedEntry {
                name: record.name().to_string(),
                version: record.version(),
                checksum: record.checksum(),
                cached: record.cached(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}
