//! AWS S3 blob store implementation.
//!
//! Each logical partition maps to one S3 bucket. Downloads treat
//! `NoSuchKey` and access-denied responses identically as absence, matching
//! the `BlobStore` contract.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::storage::{BlobStore, BucketSpec, ObjectEntry};

/// S3-based blob store.
pub struct S3BlobStore {
    client: Client,
    region: String,
}

impl S3BlobStore {
    /// Create a new S3 store from an existing client.
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Create S3 storage from environment configuration.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());
        let client = Client::new(&config);

        Ok(Self::new(client, region))
    }

    /// Public retrieval URL for an object.
    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
    }

    /// Names of all buckets visible to this client.
    async fn existing_bucket_names(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn ensure_buckets(&self, buckets: &[BucketSpec]) {
        log::info!("Checking that {} storage buckets exist...", buckets.len());

        let existing = match self.existing_bucket_names().await {
            Ok(names) => names,
            Err(e) => {
                log::error!("Could not list buckets: {}", e);
                return;
            }
        };

        for spec in buckets {
            if existing.contains(&spec.name) {
                log::debug!("Bucket {} already exists", spec.name);
                continue;
            }

            log::info!("Bucket {} does not exist, creating...", spec.name);
            // MIME/size restrictions are enforced by bucket policy out of
            // band; the `BucketSpec` hints are advisory here.
            if let Err(e) = self.client.create_bucket().bucket(&spec.name).send().await {
                log::warn!("Could not create bucket {}: {}", spec.name, e);
            } else {
                log::info!("Created bucket: {}", spec.name);
            }
        }

        // Re-verify and warn about anything still missing, but carry on.
        if let Ok(final_names) = self.existing_bucket_names().await {
            let missing: Vec<_> = buckets
                .iter()
                .filter(|s| !final_names.contains(&s.name))
                .map(|s| s.name.as_str())
                .collect();
            if !missing.is_empty() {
                log::warn!("Buckets still missing after creation attempts: {:?}", missing);
            }
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(path)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;

        log::info!("Uploaded {} bytes to s3://{}/{}", bytes.len(), bucket, path);
        Ok(self.public_url(bucket, path))
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::storage(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                let code = service_err.code().unwrap_or_default();
                // Absence and denial look the same to callers.
                if service_err.is_no_such_key() || code == "AccessDenied" || code == "NoSuchBucket"
                {
                    log::debug!("No object at s3://{}/{} ({})", bucket, path, code);
                    Ok(None)
                } else {
                    Err(AppError::storage(service_err.to_string()))
                }
            }
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;

        let mut entries: Vec<ObjectEntry> = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let name = obj.key()?.to_string();
                let created_at: DateTime<Utc> = obj
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_else(Utc::now);
                Some(ObjectEntry {
                    name,
                    created_at,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let mut objects = Vec::with_capacity(paths.len());
        for path in paths {
            let id = ObjectIdentifier::builder()
                .key(path)
                .build()
                .map_err(|e| AppError::storage(e.to_string()))?;
            objects.push(id);
        }

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| AppError::storage(e.to_string()))?;

        self.client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| AppError::storage(e.to_string()))?;

        log::info!("Deleted {} objects from s3://{}", paths.len(), bucket);
        Ok(())
    }
}
