//! Durable local key-value store.
//!
//! Per-device, unsynced storage used when remote writes fail and for the
//! upload-history ledger. Each key is one file under the root directory,
//! written atomically. Keys in use:
//!
//! - `department_{code}` — serialized department document (remote write failed)
//! - `uploadHistory` — the import ledger, capped at 10 entries
//! - `registrationCount` — stringified integer
//! - `registrationStats` — serialized registration statistics

use std::path::PathBuf;

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// File-backed key-value store.
#[derive(Debug, Clone)]
pub struct LocalKvStore {
    root_dir: PathBuf,
}

impl LocalKvStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{key}.json"))
    }

    /// Store a value for a key, overwriting any existing value.
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(value.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read a key's value, or `None` if it was never set.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.key_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Remove a key. Removing a missing key is fine.
    pub async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}
