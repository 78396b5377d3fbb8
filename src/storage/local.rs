//! Local filesystem blob store.
//!
//! Each bucket is a subdirectory under the root; objects are plain files.
//! Used for development and testing; production deployments should use
//! `S3BlobStore`.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── department-data/
//! │   └── cse.json
//! ├── registrations/
//! │   └── 2025-05-01T10-00-00-000Z-registration.csv
//! ├── registration-data/
//! │   └── current-count.json
//! └── event-images/
//!     └── cse/1746093600000-poster.png
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{BlobStore, BucketSpec, ObjectEntry};

/// Filesystem-backed blob store.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root_dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Full path for an object.
    fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        self.root_dir.join(bucket).join(path)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, target: &PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = target.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, target).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn ensure_buckets(&self, buckets: &[BucketSpec]) {
        for spec in buckets {
            let dir = self.root_dir.join(&spec.name);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                log::warn!("Could not create bucket directory {:?}: {}", dir, e);
            }
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String> {
        let target = self.object_path(bucket, path);
        self.write_bytes(&target, bytes).await?;
        Ok(format!("file://{}", target.display()))
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.object_path(bucket, path);
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let dir = self.root_dir.join(bucket);

        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(AppError::Io(e)),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(prefix) || name.ends_with(".tmp") {
                continue;
            }

            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }

            let created_at: DateTime<Utc> = meta
                .created()
                .or_else(|_| meta.modified())
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());

            entries.push(ObjectEntry {
                name,
                created_at,
                size: meta.len(),
            });
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        for path in paths {
            let target = self.object_path(bucket, path);
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        Ok(())
    }
}
