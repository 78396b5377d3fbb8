//! Storage abstractions for the festival data partitions.
//!
//! Four logical partitions back the application:
//!
//! ```text
//! department-data/      # {code}.json, one document per department
//! registrations/        # {timestamp}-registration.csv uploads
//! registration-data/    # current-count.json
//! event-images/         # {code}/{epoch_ms}-{file_name} posters
//! ```
//!
//! All reads and writes are whole-object; there is no partial update.
//! `LocalBlobStore` backs development and tests; production uses
//! `S3BlobStore` (feature `s3`). `LocalKvStore` is the separate per-device
//! durable key-value store used when remote writes fail.

pub mod kv;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

// Re-export for convenience
pub use kv::LocalKvStore;
pub use local::LocalBlobStore;
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;

/// Requirements for one bucket, used by `ensure_buckets`.
#[derive(Debug, Clone)]
pub struct BucketSpec {
    /// Bucket name
    pub name: String,
    /// Restrict uploads to this MIME type, where the backend supports it
    pub allowed_mime: Option<String>,
    /// Object size limit in bytes, where the backend supports it
    pub size_limit: Option<u64>,
}

impl BucketSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_mime: None,
            size_limit: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.allowed_mime = Some(mime.into());
        self
    }

    pub fn with_size_limit(mut self, bytes: u64) -> Self {
        self.size_limit = Some(bytes);
        self
    }
}

/// A stored object as returned by `list`.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    /// Object name relative to the bucket root
    pub name: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Object size in bytes
    pub size: u64,
}

/// Trait for remote blob storage backends.
///
/// Download treats "not found" and "access denied" identically: both are
/// `Ok(None)`, and callers must not try to tell them apart.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Make sure all required buckets exist.
    ///
    /// Idempotent and best-effort: individual creation failures are logged
    /// and never surfaced to the caller.
    async fn ensure_buckets(&self, buckets: &[BucketSpec]);

    /// Upload an object, overwriting any existing one at the same path.
    /// Returns a public retrieval URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String>;

    /// Download an object, or `None` if it is absent (or denied).
    async fn download(&self, bucket: &str, path: &str) -> Result<Option<Vec<u8>>>;

    /// List objects under a prefix, sorted by creation time descending.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Bulk delete. Missing objects are not an error.
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;
}

/// Bucket specs for the application's partitions.
pub fn required_buckets(config: &crate::config::BucketConfig) -> Vec<BucketSpec> {
    vec![
        BucketSpec::new(&config.department_data),
        // CSV uploads are capped at 5 MiB
        BucketSpec::new(&config.registrations)
            .with_mime("text/csv")
            .with_size_limit(5 * 1024 * 1024),
        BucketSpec::new(&config.registration_data),
        BucketSpec::new(&config.event_images),
    ]
}
