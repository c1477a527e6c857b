#![forbid(unsafe_code)]

//! Crash-safe whole-file writes.
//!
//! `write_atomic` writes to a uniquely-named temp file in the target's parent
//! directory (same filesystem, so the rename is atomic), then renames over the
//! target path. The target file is either the old version or the new version,
//! never a partial write.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{StorageError, StorageResult};

/// Atomically replace the file at `path` with `data`.
pub async fn write_atomic(path: &Path, data: Bytes) -> StorageResult<()> {
    let path: PathBuf = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::Failed("atomic write: no parent dir".to_string()))?;
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| StorageError::Failed(format!("atomic write tmpfile: {e}")))?;

        std::io::Write::write_all(&mut tmp, &data)
            .map_err(|e| StorageError::Failed(format!("atomic write: {e}")))?;

        // `persist()` does `rename(tmp, target)` and disarms the
        // auto-delete on drop.
        tmp.persist(&path)
            .map_err(|e| StorageError::Failed(format!("atomic rename: {e}")))?;

        Ok(())
    })
    .await
    .map_err(|e| StorageError::Failed(format!("atomic write task: {e}")))?
}

/// Read the whole file at `path`; `None` when it does not exist.
pub async fn read_opt(path: &Path) -> StorageResult<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(Bytes::from(data))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
