// src/services/history.rs

//! Upload-history ledger.
//!
//! Append-only in spirit, but persisted as a whole-list rewrite: each record
//! prepends the new entry, truncates to the most recent 10, and writes the
//! list back. Last writer wins; there is no concurrent-writer protection.

use chrono::Local;

use crate::error::Result;
use crate::models::{UploadHistoryItem, format_file_size};
use crate::storage::LocalKvStore;

const HISTORY_KEY: &str = "uploadHistory";

/// Maximum retained history entries.
pub const MAX_HISTORY_ENTRIES: usize = 10;

/// Size-bounded record of past CSV imports.
#[derive(Debug, Clone)]
pub struct UploadHistory {
    kv: LocalKvStore,
}

impl UploadHistory {
    pub fn new(kv: LocalKvStore) -> Self {
        Self { kv }
    }

    /// Record an import. Newest entries sit at index 0.
    pub async fn record(&self, file_name: &str, size_bytes: u64) -> Result<()> {
        let item = UploadHistoryItem {
            name: file_name.to_string(),
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            size: format_file_size(size_bytes),
        };

        let mut history = self.list().await;
        history.insert(0, item);
        history.truncate(MAX_HISTORY_ENTRIES);

        let json = serde_json::to_string(&history)?;
        self.kv.set(HISTORY_KEY, &json).await
    }

    /// The persisted list, newest first; empty if nothing was recorded yet
    /// or the stored value is unreadable.
    pub async fn list(&self) -> Vec<UploadHistoryItem> {
        match self.kv.get(HISTORY_KEY).await {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Stored upload history is corrupt: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Could not read upload history: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_history() {
        let tmp = TempDir::new().unwrap();
        let history = UploadHistory::new(LocalKvStore::new(tmp.path()));

        assert!(history.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_newest_first() {
        let tmp = TempDir::new().unwrap();
        let history = UploadHistory::new(LocalKvStore::new(tmp.path()));

        history.record("first.csv", 1024).await.unwrap();
        history.record("second.csv", 2048).await.unwrap();

        let items = history.list().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "second.csv");
        assert_eq!(items[0].size, "2.00 KB");
        assert_eq!(items[1].name, "first.csv");
    }

    #[tokio::test]
    async fn test_capped_at_ten() {
        let tmp = TempDir::new().unwrap();
        let history = UploadHistory::new(LocalKvStore::new(tmp.path()));

        for i in 0..15 {
            history
                .record(&format!("file{i}.csv"), 100)
                .await
                .unwrap();
        }

        let items = history.list().await;
        assert_eq!(items.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(items[0].name, "file14.csv");
        assert_eq!(items[9].name, "file5.csv");
    }
}
