#![forbid(unsafe_code)]

//! Per-bundle asset-operation cache.
//!
//! Every distinct request shape against a bundle (a single asset, the whole
//! bundle, the sub-objects of an asset, or the scene paths) is one
//! [`AssetOp`], keyed by `(selector, kind)`. Concurrent requests for the same
//! key join the same operation: the underlying extraction runs once, and each
//! waiter receives its own copy of the result through a one-shot channel,
//! drained in arrival order.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::container::Asset;

/// The shape of an extraction result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultKind {
    SingleAsset,
    AllAssets,
    SubAssets,
    ScenePaths,
}

/// Identity of an operation within one bundle.
///
/// `selector` is the asset name; whole-bundle shapes carry no selector.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpKey {
    pub selector: Option<String>,
    pub kind: ResultKind,
}

impl OpKey {
    pub fn single<S: Into<String>>(asset: S) -> Self {
        Self {
            selector: Some(asset.into()),
            kind: ResultKind::SingleAsset,
        }
    }

    pub fn all() -> Self {
        Self {
            selector: None,
            kind: ResultKind::AllAssets,
        }
    }

    pub fn sub<S: Into<String>>(asset: S) -> Self {
        Self {
            selector: Some(asset.into()),
            kind: ResultKind::SubAssets,
        }
    }

    pub fn scene_paths() -> Self {
        Self {
            selector: None,
            kind: ResultKind::ScenePaths,
        }
    }
}

/// Extraction result, tagged by shape.
#[derive(Clone, Debug)]
pub enum OpOutput {
    Single(Option<Asset>),
    All(Vec<Asset>),
    Sub(Vec<Asset>),
    ScenePaths(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpStatus {
    Pending,
    Loading,
    Loaded,
}

/// Delivery channel payload: `None` means the attempt failed before a result
/// existed (the waiter is answered with an absent outcome, never left
/// hanging).
pub type OpReceiver = oneshot::Receiver<Option<OpOutput>>;
type OpWaiter = oneshot::Sender<Option<OpOutput>>;

/// One deduplicated extraction against a loaded bundle.
pub struct AssetOp {
    key: OpKey,
    status: OpStatus,
    waiters: Vec<OpWaiter>,
    result: Option<OpOutput>,
}

impl AssetOp {
    pub fn new(key: OpKey) -> Self {
        Self {
            key,
            status: OpStatus::Pending,
            waiters: Vec::new(),
            result: None,
        }
    }

    pub fn key(&self) -> &OpKey {
        &self.key
    }

    pub fn status(&self) -> OpStatus {
        self.status
    }

    pub fn result(&self) -> Option<&OpOutput> {
        self.result.as_ref()
    }

    /// Join this operation; the receiver resolves when the result lands.
    pub fn subscribe(&mut self) -> OpReceiver {
        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        rx
    }

    pub(crate) fn set_loading(&mut self) {
        self.status = OpStatus::Loading;
    }

    /// Store the result exactly once and drain waiters in arrival order.
    pub(crate) fn complete(&mut self, output: OpOutput) {
        debug_assert!(self.result.is_none(), "operation result set twice");
        self.status = OpStatus::Loaded;
        self.result = Some(output.clone());
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Some(output.clone()));
        }
    }

    /// Answer all waiters with an absent outcome (failed attempt).
    fn fail(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(None);
        }
    }
}

impl std::fmt::Debug for AssetOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetOp")
            .field("key", &self.key)
            .field("status", &self.status)
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

/// Map of in-flight and completed operations for one bundle.
#[derive(Debug, Default)]
pub struct OpCache {
    ops: HashMap<OpKey, AssetOp>,
}

impl OpCache {
    pub fn find(&self, key: &OpKey) -> Option<&AssetOp> {
        self.ops.get(key)
    }

    pub fn find_mut(&mut self, key: &OpKey) -> Option<&mut AssetOp> {
        self.ops.get_mut(key)
    }

    /// Insert a new operation; duplicates of an existing key are rejected.
    pub fn insert(&mut self, op: AssetOp) -> bool {
        if self.ops.contains_key(op.key()) {
            return false;
        }
        self.ops.insert(op.key().clone(), op);
        true
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn any_loading(&self) -> bool {
        self.ops.values().any(|op| op.status == OpStatus::Loading)
    }

    pub fn pending_keys(&self) -> Vec<OpKey> {
        self.ops
            .values()
            .filter(|op| op.status == OpStatus::Pending)
            .map(|op| op.key.clone())
            .collect()
    }

    /// Remove every operation that has not reached `Loaded`, answering their
    /// waiters with absent results. A later retry starts from a clean slate.
    pub(crate) fn fail_incomplete(&mut self) {
        self.ops.retain(|_, op| {
            if op.status == OpStatus::Loaded {
                true
            } else {
                op.fail();
                false
            }
        });
    }

    /// Drop every operation, answering any leftover waiters with absent
    /// results.
    pub(crate) fn clear(&mut self) {
        for op in self.ops.values_mut() {
            op.fail();
        }
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut cache = OpCache::default();
        assert!(cache.insert(AssetOp::new(OpKey::single("hero"))));
        assert!(!cache.insert(AssetOp::new(OpKey::single("hero"))));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn selector_and_kind_form_the_identity() {
        let mut cache = OpCache::default();
        assert!(cache.insert(AssetOp::new(OpKey::single("hero"))));
        assert!(cache.insert(AssetOp::new(OpKey::sub("hero"))));
        assert!(cache.insert(AssetOp::new(OpKey::all())));
        assert!(cache.insert(AssetOp::new(OpKey::scene_paths())));
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn waiters_are_drained_in_arrival_order() {
        let mut op = AssetOp::new(OpKey::scene_paths());
        let mut receivers = Vec::new();
        for _ in 0..3 {
            receivers.push(op.subscribe());
        }

        op.complete(OpOutput::ScenePaths(vec!["scenes/intro".to_string()]));

        for rx in receivers {
            match rx.await.unwrap() {
                Some(OpOutput::ScenePaths(paths)) => {
                    assert_eq!(paths, vec!["scenes/intro".to_string()]);
                }
                other => panic!("unexpected delivery: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn failed_attempt_answers_waiters_with_absent() {
        let mut cache = OpCache::default();
        let mut op = AssetOp::new(OpKey::single("hero"));
        let rx = op.subscribe();
        cache.insert(op);

        cache.fail_incomplete();

        assert!(rx.await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn fail_incomplete_keeps_loaded_results() {
        let mut cache = OpCache::default();

        let mut loaded = AssetOp::new(OpKey::single("hero"));
        loaded.complete(OpOutput::Single(None));
        cache.insert(loaded);
        cache.insert(AssetOp::new(OpKey::single("villain")));

        cache.fail_incomplete();

        assert_eq!(cache.len(), 1);
        assert!(cache.find(&OpKey::single("hero")).is_some());
    }

    #[test]
    fn pending_keys_excludes_loading_and_loaded() {
        let mut cache = OpCache::default();
        cache.insert(AssetOp::new(OpKey::single("a")));

        let mut loading = AssetOp::new(OpKey::single("b"));
        loading.set_loading();
        cache.insert(loading);

        let mut loaded = AssetOp::new(OpKey::single("c"));
        loaded.complete(OpOutput::Single(None));
        cache.insert(loaded);

        let keys = cache.pending_keys();
        assert_eq!(keys, vec![OpKey::single("a")]);
        assert!(cache.any_loading());
    }
}
