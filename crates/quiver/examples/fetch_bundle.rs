//! Fetch one bundle from an origin and print its assets.
//!
//! ```sh
//! cargo run --example fetch_bundle -- http://localhost:8000/bundles/ characters
//! ```
//!
//! The origin must serve `index.txt` next to the bundles. The materializer
//! here treats a bundle as a flat blob with a single asset named after the
//! bundle; real embedders decode their own container format.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use quiver::{
    Asset, BundleLoader, Container, LoaderConfig, LoaderResult, Materializer,
};
use url::Url;

struct BlobContainer {
    asset: Asset,
}

#[async_trait]
impl Container for BlobContainer {
    async fn asset(&self, name: &str) -> Option<Asset> {
        (self.asset.name == name).then(|| self.asset.clone())
    }

    async fn assets(&self) -> Vec<Asset> {
        vec![self.asset.clone()]
    }

    async fn sub_assets(&self, _name: &str) -> Vec<Asset> {
        Vec::new()
    }

    async fn scene_paths(&self) -> Vec<String> {
        Vec::new()
    }
}

struct BlobMaterializer;

#[async_trait]
impl Materializer for BlobMaterializer {
    async fn materialize(&self, bundle: &str, bytes: Bytes) -> LoaderResult<Arc<dyn Container>> {
        Ok(Arc::new(BlobContainer {
            asset: Asset::new(bundle, bytes),
        }))
    }
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let base = args.next().expect("usage: fetch_bundle <base-url> <bundle>");
    let bundle = args.next().expect("usage: fetch_bundle <base-url> <bundle>");

    let base_url = Url::parse(&base).expect("invalid base URL");
    let config = LoaderConfig::new(base_url);
    let loader = BundleLoader::with_http(config, Arc::new(BlobMaterializer));

    loader.setup().await.expect("setup failed");
    println!("known bundles: {:?}", loader.bundle_names());

    match loader.load_all_assets(&bundle).await {
        Some(assets) => {
            for asset in assets {
                println!("{} ({} bytes)", asset.name, asset.data.len());
            }
        }
        None => println!("bundle {bundle:?} not in the remote index"),
    }
}
