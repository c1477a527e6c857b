#![forbid(unsafe_code)]

//! Collaborator traits for the binary container format.
//!
//! The engine never interprets bundle bytes itself. A [`Materializer`]
//! (supplied by the embedder) decodes downloaded bytes into a [`Container`],
//! and the container answers the four extraction shapes the loader supports.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::LoaderResult;

/// A single named object extracted from a loaded bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct Asset {
    pub name: String,
    pub data: Bytes,
}

impl Asset {
    pub fn new<S: Into<String>>(name: S, data: Bytes) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// An in-memory bundle payload.
///
/// Extraction is asynchronous: decoding a large object out of the container
/// may itself be deferred work in the embedder's format.
#[async_trait]
pub trait Container: Send + Sync {
    /// Fetch a single named asset, `None` when the name is absent.
    async fn asset(&self, name: &str) -> Option<Asset>;

    /// Enumerate every asset in the bundle.
    async fn assets(&self) -> Vec<Asset>;

    /// Enumerate the sub-objects of a named asset.
    async fn sub_assets(&self, name: &str) -> Vec<Asset>;

    /// Enumerate the scene paths carried by the bundle.
    async fn scene_paths(&self) -> Vec<String>;
}

/// Decodes raw bundle bytes into an in-memory [`Container`].
#[async_trait]
pub trait Materializer: Send + Sync {
    async fn materialize(&self, bundle: &str, bytes: Bytes) -> LoaderResult<Arc<dyn Container>>;
}
