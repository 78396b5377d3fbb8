// src/services/images.rs

//! Event poster image helpers.
//!
//! Posters live in the `event-images` partition under
//! `{department_code}/{epoch_ms}-{file_name}`; the timestamp disambiguates
//! re-uploads of the same file name. Both operations are best-effort: any
//! failure is logged and reported as a sentinel, never propagated.

use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::storage::BlobStore;

/// Poster upload/delete helpers over the `event-images` bucket.
#[derive(Clone)]
pub struct ImageService {
    store: Arc<dyn BlobStore>,
    bucket: String,
}

impl ImageService {
    pub fn new(store: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Object path for a new poster upload.
    pub fn poster_path(department_code: &str, file_name: &str, now_ms: i64) -> String {
        format!("{department_code}/{now_ms}-{file_name}")
    }

    /// Upload a poster image and return its public URL, or `None` on any
    /// failure.
    pub async fn upload_event_image(
        &self,
        department_code: &str,
        file_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Option<String> {
        let path = Self::poster_path(department_code, file_name, Utc::now().timestamp_millis());
        log::info!("Uploading event image: {}", path);

        match self
            .store
            .upload(&self.bucket, &path, bytes, content_type)
            .await
        {
            Ok(url) => {
                log::info!("Image uploaded successfully: {}", url);
                Some(url)
            }
            Err(e) => {
                log::error!("Error uploading event image: {}", e);
                None
            }
        }
    }

    /// Delete a poster by its public URL. The object name is the last path
    /// segment of the URL. Best-effort.
    pub async fn delete_event_image(&self, image_url: &str) -> bool {
        let Some(file_path) = Self::object_name_from_url(image_url) else {
            log::warn!("Could not extract object name from URL: {}", image_url);
            return false;
        };

        log::info!("Deleting event image: {}", file_path);
        match self.store.remove(&self.bucket, &[file_path]).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Error deleting event image: {}", e);
                false
            }
        }
    }

    fn object_name_from_url(image_url: &str) -> Option<String> {
        let parsed = Url::parse(image_url).ok()?;
        parsed
            .path_segments()?
            .next_back()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
