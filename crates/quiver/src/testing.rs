#![forbid(unsafe_code)]

//! In-memory container and materializer for tests and examples.
//!
//! [`MemContainer`] serves a fixed set of named byte objects;
//! [`MemMaterializer`] hands out pre-registered containers by bundle name and
//! records every call, so tests can assert deduplication and observe the
//! bytes that flowed through the pipeline.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    container::{Asset, Container, Materializer},
    error::{LoaderError, LoaderResult},
};

/// Container over a fixed set of named byte objects.
///
/// Sub-objects follow a `parent.child` naming convention: `sub_assets("hero")`
/// returns every asset named `hero.*`.
#[derive(Clone, Debug, Default)]
pub struct MemContainer {
    assets: Vec<Asset>,
    scene_paths: Vec<String>,
}

impl MemContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset<S: Into<String>>(mut self, name: S, data: Bytes) -> Self {
        self.assets.push(Asset::new(name, data));
        self
    }

    pub fn with_scene_path<S: Into<String>>(mut self, path: S) -> Self {
        self.scene_paths.push(path.into());
        self
    }
}

#[async_trait]
impl Container for MemContainer {
    async fn asset(&self, name: &str) -> Option<Asset> {
        self.assets.iter().find(|a| a.name == name).cloned()
    }

    async fn assets(&self) -> Vec<Asset> {
        self.assets.clone()
    }

    async fn sub_assets(&self, name: &str) -> Vec<Asset> {
        let prefix = format!("{name}.");
        self.assets
            .iter()
            .filter(|a| a.name.starts_with(&prefix))
            .cloned()
            .collect()
    }

    async fn scene_paths(&self) -> Vec<String> {
        self.scene_paths.clone()
    }
}

/// Materializer returning pre-registered containers by bundle name.
#[derive(Default)]
pub struct MemMaterializer {
    containers: Mutex<HashMap<String, Arc<MemContainer>>>,
    calls: Mutex<Vec<(String, Bytes)>>,
}

impl MemMaterializer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the container returned for `bundle`.
    pub fn register<S: Into<String>>(&self, bundle: S, container: MemContainer) {
        self.containers
            .lock()
            .insert(bundle.into(), Arc::new(container));
    }

    /// Number of materialize calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every `(bundle, bytes)` pair that reached the materializer.
    pub fn calls(&self) -> Vec<(String, Bytes)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Materializer for MemMaterializer {
    async fn materialize(&self, bundle: &str, bytes: Bytes) -> LoaderResult<Arc<dyn Container>> {
        self.calls.lock().push((bundle.to_string(), bytes));
        match self.containers.lock().get(bundle) {
            Some(container) => Ok(Arc::clone(container) as Arc<dyn Container>),
            None => Err(LoaderError::Materialize(format!(
                "no container registered for {bundle}"
            ))),
        }
    }
}
