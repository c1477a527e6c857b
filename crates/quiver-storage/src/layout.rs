#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use crate::error::{StorageError, StorageResult};

const BUNDLE_DIR: &str = "bundles";
const MANIFEST_FILE: &str = "manifest.idx";

/// Deterministic filesystem layout under a configured cache root.
///
/// Disk mapping is:
/// - `<cache_root>/bundles/<bundle_name>` for bundle payloads
/// - `<cache_root>/manifest.idx` for the persisted manifest
///
/// The layout does not invent paths; it only enforces safety (no path
/// separators, no `..`, no empty names).
#[derive(Clone, Debug)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// Path of the cached payload for `bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] when the name is empty or would
    /// escape the cache root.
    pub fn bundle_path(&self, bundle: &str) -> StorageResult<PathBuf> {
        validate_key(bundle)?;
        Ok(self.root.join(BUNDLE_DIR).join(bundle))
    }
}

fn validate_key(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidKey("empty bundle name".to_string()));
    }
    if name == "." || name == ".." {
        return Err(StorageError::InvalidKey(format!(
            "bundle name {name:?} is a path component"
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "bundle name {name:?} contains a path separator"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn bundle_path_is_deterministic() {
        let layout = CacheLayout::new("/tmp/quiver");
        let a = layout.bundle_path("characters").unwrap();
        let b = layout.bundle_path("characters").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, PathBuf::from("/tmp/quiver/bundles/characters"));
    }

    #[test]
    fn manifest_path_lives_at_root() {
        let layout = CacheLayout::new("/tmp/quiver");
        assert_eq!(layout.manifest_path(), PathBuf::from("/tmp/quiver/manifest.idx"));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("..\\up")]
    fn unsafe_names_are_rejected(#[case] name: &str) {
        let layout = CacheLayout::new("/tmp/quiver");
        assert!(matches!(
            layout.bundle_path(name),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn dotted_file_names_are_allowed() {
        let layout = CacheLayout::new("/tmp/quiver");
        assert!(layout.bundle_path("ui.assets").is_ok());
    }
}
