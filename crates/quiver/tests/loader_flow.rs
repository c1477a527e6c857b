mod common;

use bytes::Bytes;
use common::{characters_container, config, settle, GatedMaterializer, StaticNet};
use quiver::{
    testing::{MemContainer, MemMaterializer},
    BundleLoader, TransportStatus,
};

#[tokio::test]
async fn unknown_bundles_resolve_absent_and_create_no_state() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");

    let materializer = MemMaterializer::new();
    let loader = BundleLoader::new(config(dir.path()), net, materializer.clone());
    loader.setup().await.unwrap();

    assert!(loader.load_asset("nope", "hero").await.is_none());
    assert!(loader.load_all_assets("nope").await.is_none());
    assert!(loader.load_sub_assets("nope", "hero").await.is_none());
    assert!(loader.load_scene_paths("nope").await.is_none());

    assert_eq!(loader.bundle_names(), vec!["characters".to_string()]);
    assert_eq!(materializer.call_count(), 0);
}

#[tokio::test]
async fn setup_then_first_request_drives_the_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");
    net.serve("/bundles/characters", Bytes::from_static(b"container blob"));

    let materializer = MemMaterializer::new();
    materializer.register("characters", characters_container());

    let loader = BundleLoader::new(config(dir.path()), net.clone(), materializer.clone());
    loader.setup().await.unwrap();

    assert_eq!(
        loader.transport_status("characters"),
        Some(TransportStatus::NeedsDownload)
    );
    assert_eq!(loader.version("characters"), Some(1));

    let asset = loader.load_asset("characters", "hero").await.unwrap();
    assert_eq!(asset.name, "hero");
    assert_eq!(asset.data, Bytes::from_static(b"hero bytes"));

    assert_eq!(
        loader.transport_status("characters"),
        Some(TransportStatus::Loaded)
    );
    assert!(!loader.is_busy(None));

    // The downloaded bytes flowed through the disk cache into the
    // materializer, exactly once.
    assert_eq!(materializer.call_count(), 1);
    assert_eq!(
        materializer.calls()[0],
        ("characters".to_string(), Bytes::from_static(b"container blob"))
    );
    assert_eq!(net.hits("/bundles/characters"), 1);
    assert!(dir.path().join("bundles").join("characters").exists());
}

#[tokio::test]
async fn every_result_shape_loads() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");
    net.serve("/bundles/characters", Bytes::from_static(b"blob"));

    let materializer = MemMaterializer::new();
    materializer.register("characters", characters_container());

    let loader = BundleLoader::new(config(dir.path()), net, materializer);
    loader.setup().await.unwrap();

    let all = loader.load_all_assets("characters").await.unwrap();
    assert_eq!(all.len(), 3);

    let subs = loader.load_sub_assets("characters", "hero").await.unwrap();
    let names: Vec<&str> = subs.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["hero.sword", "hero.shield"]);

    let scenes = loader.load_scene_paths("characters").await.unwrap();
    assert_eq!(scenes, vec!["scenes/tavern".to_string()]);

    // A present single asset and an absent one.
    assert!(loader.load_asset("characters", "hero").await.is_some());
    assert!(loader.load_asset("characters", "ghost").await.is_none());
}

#[tokio::test]
async fn concurrent_requests_share_one_materialization() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");
    net.serve("/bundles/characters", Bytes::from_static(b"blob"));

    let inner = MemMaterializer::new();
    inner.register("characters", characters_container());
    let gated = GatedMaterializer::new(inner.clone());

    let loader = BundleLoader::new(config(dir.path()), net, gated.clone());
    loader.setup().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let loader = loader.clone();
        handles.push(tokio::spawn(async move {
            loader.load_asset("characters", "hero").await
        }));
    }

    settle().await;
    assert!(loader.is_busy(Some("characters")));
    assert_eq!(inner.call_count(), 0);

    gated.release(1);

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(inner.call_count(), 1);
    assert!(results.iter().all(|a| *a == results[0]));
    assert_eq!(results[0].data, Bytes::from_static(b"hero bytes"));
}

#[tokio::test]
async fn loaded_results_are_stable_and_answer_sync_accessors() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");
    net.serve("/bundles/characters", Bytes::from_static(b"blob"));

    let materializer = MemMaterializer::new();
    materializer.register("characters", characters_container());

    let loader = BundleLoader::new(config(dir.path()), net, materializer.clone());
    loader.setup().await.unwrap();

    assert!(loader.loaded_asset("characters", "hero").is_none());

    let first = loader.load_asset("characters", "hero").await.unwrap();
    let second = loader.load_asset("characters", "hero").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(materializer.call_count(), 1);

    assert_eq!(loader.loaded_asset("characters", "hero"), Some(first));
    assert!(loader.loaded_assets("characters").is_none());

    loader.load_all_assets("characters").await.unwrap();
    assert_eq!(loader.loaded_assets("characters").unwrap().len(), 3);
    loader.load_scene_paths("characters").await.unwrap();
    assert_eq!(
        loader.loaded_scene_paths("characters").unwrap(),
        vec!["scenes/tavern".to_string()]
    );
}

#[tokio::test]
async fn no_disk_cache_mode_skips_the_cache_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");
    net.serve("/bundles/characters", Bytes::from_static(b"blob"));

    let materializer = MemMaterializer::new();
    materializer.register("characters", characters_container());

    let loader = BundleLoader::new(
        config(dir.path()).with_cache_to_disk(false),
        net,
        materializer.clone(),
    );
    loader.setup().await.unwrap();

    let asset = loader.load_asset("characters", "hero").await.unwrap();
    assert_eq!(asset.data, Bytes::from_static(b"hero bytes"));

    assert_eq!(
        loader.transport_status("characters"),
        Some(TransportStatus::Loaded)
    );
    assert!(!dir.path().join("bundles").join("characters").exists());
    // The materializer saw the network buffer directly.
    assert_eq!(
        materializer.calls()[0],
        ("characters".to_string(), Bytes::from_static(b"blob"))
    );
}

#[tokio::test]
async fn restart_reuses_the_disk_cache_without_refetching() {
    let dir = tempfile::tempdir().unwrap();

    // First session: download and cache.
    {
        let net = StaticNet::new();
        net.serve("/bundles/index.txt", "characters,1,111\n");
        net.serve("/bundles/characters", Bytes::from_static(b"blob"));

        let materializer = MemMaterializer::new();
        materializer.register("characters", characters_container());

        let loader = BundleLoader::new(config(dir.path()), net, materializer);
        loader.setup().await.unwrap();
        loader.load_asset("characters", "hero").await.unwrap();
    }

    // Second session over the same cache dir: the origin only serves the
    // index (unchanged version); the bundle bytes must come from disk.
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\n");

    let materializer = MemMaterializer::new();
    materializer.register("characters", characters_container());

    let loader = BundleLoader::new(config(dir.path()), net.clone(), materializer.clone());
    loader.setup().await.unwrap();

    assert_eq!(
        loader.transport_status("characters"),
        Some(TransportStatus::Downloaded)
    );

    let asset = loader.load_asset("characters", "hero").await.unwrap();
    assert_eq!(asset.data, Bytes::from_static(b"hero bytes"));

    assert_eq!(net.hits("/bundles/characters"), 0);
    assert_eq!(
        materializer.calls()[0],
        ("characters".to_string(), Bytes::from_static(b"blob"))
    );
}

#[tokio::test]
async fn bundle_tasks_preload_through_the_scheduler() {
    let dir = tempfile::tempdir().unwrap();
    let net = StaticNet::new();
    net.serve("/bundles/index.txt", "characters,1,111\nenvironment,2,222\n");
    net.serve("/bundles/characters", Bytes::from_static(b"blob a"));
    net.serve("/bundles/environment", Bytes::from_static(b"blob b"));

    let materializer = MemMaterializer::new();
    materializer.register("characters", characters_container());
    materializer.register("environment", MemContainer::new());

    let loader = BundleLoader::new(config(dir.path()), net, materializer);
    loader.setup().await.unwrap();

    loader.submit_task(loader.bundle_task("characters"));
    loader.submit_task(loader.bundle_task("environment"));
    assert_eq!(loader.task_count(), 2);

    loader.pump();
    settle().await;

    assert_eq!(loader.task_count(), 0);
    assert_eq!(
        loader.transport_status("characters"),
        Some(TransportStatus::Loaded)
    );
    assert_eq!(
        loader.transport_status("environment"),
        Some(TransportStatus::Loaded)
    );

    // Already-loaded bundles answer without another materialization.
    assert!(loader.load_asset("characters", "hero").await.is_some());
}
