#![allow(dead_code)]

use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use quiver::{
    testing::{MemContainer, MemMaterializer},
    Container, LoaderConfig, LoaderResult, Materializer,
};
use quiver_net::{Headers, Net, NetError};
use url::Url;

/// Canned origin serving fixed responses by URL path.
///
/// Manual test double rather than a mock framework: the loader owns its
/// transport, so the double is cloned in and inspected from the outside.
#[derive(Clone, Default)]
pub struct StaticNet {
    inner: Arc<StaticNetInner>,
}

#[derive(Default)]
struct StaticNetInner {
    responses: Mutex<HashMap<String, Result<Bytes, NetError>>>,
    hits: Mutex<Vec<String>>,
}

impl StaticNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` at the given URL path.
    pub fn serve<B: Into<Bytes>>(&self, path: &str, bytes: B) {
        self.inner
            .responses
            .lock()
            .insert(path.to_string(), Ok(bytes.into()));
    }

    /// Fail requests to the given URL path.
    pub fn fail(&self, path: &str, error: NetError) {
        self.inner
            .responses
            .lock()
            .insert(path.to_string(), Err(error));
    }

    /// How many requests hit the given URL path.
    pub fn hits(&self, path: &str) -> usize {
        self.inner.hits.lock().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl Net for StaticNet {
    async fn get_bytes(&self, url: Url, _headers: Option<Headers>) -> Result<Bytes, NetError> {
        let path = url.path().to_string();
        self.inner.hits.lock().push(path.clone());
        match self.inner.responses.lock().get(&path) {
            Some(Ok(bytes)) => Ok(bytes.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(NetError::http_status(404, url.to_string())),
        }
    }
}

/// Materializer that blocks until the test releases a permit.
pub struct GatedMaterializer {
    inner: Arc<MemMaterializer>,
    gate: tokio::sync::Semaphore,
}

impl GatedMaterializer {
    pub fn new(inner: Arc<MemMaterializer>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            gate: tokio::sync::Semaphore::new(0),
        })
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

#[async_trait]
impl Materializer for GatedMaterializer {
    async fn materialize(&self, bundle: &str, bytes: Bytes) -> LoaderResult<Arc<dyn Container>> {
        self.gate
            .acquire()
            .await
            .expect("gate semaphore closed")
            .forget();
        self.inner.materialize(bundle, bytes).await
    }
}

pub fn base_url() -> Url {
    Url::parse("http://origin.test/bundles/").unwrap()
}

pub fn config(cache_dir: &Path) -> LoaderConfig {
    LoaderConfig::new(base_url()).with_cache_dir(cache_dir)
}

/// A characters bundle with a hero asset, two sub-objects, and a scene.
pub fn characters_container() -> MemContainer {
    MemContainer::new()
        .with_asset("hero", Bytes::from_static(b"hero bytes"))
        .with_asset("hero.sword", Bytes::from_static(b"sword bytes"))
        .with_asset("hero.shield", Bytes::from_static(b"shield bytes"))
        .with_scene_path("scenes/tavern")
}

pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}
