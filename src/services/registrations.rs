// src/services/registrations.rs

//! Registration CSV import and aggregate statistics.
//!
//! Each import is destructive: once the uploaded file is confirmed to hold
//! at least one usable line, all previously stored registration artifacts
//! are deleted, then fresh statistics are computed wholesale. Only two
//! conditions fail the import (no usable lines, no event-name column);
//! every persistence step afterwards is best-effort and degrades to the
//! in-process mirror.
//!
//! The CSV format contract is raw comma splitting with no quoting: a line
//! is usable when it is non-blank and splits into at least two fields, and
//! rows shorter than the event-name column are silently skipped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CsvFileEntry, DepartmentCount, RegistrationData, RegistrationStats, StoredCount};
use crate::services::event_map::EventDepartmentMap;
use crate::services::history::UploadHistory;
use crate::storage::{BlobStore, BucketSpec, LocalKvStore, required_buckets};

const COUNT_OBJECT: &str = "current-count.json";
const COUNT_KEY: &str = "registrationCount";
const STATS_KEY: &str = "registrationStats";

/// Most mirror file entries retained in-process.
const MIRROR_FILE_CAP: usize = 10;

/// In-process mirror of registration state.
///
/// Populated on every import before any remote write is attempted, so
/// reads keep working when the store is unavailable. Explicit context
/// object: create per session, clear on logout.
#[derive(Default)]
pub struct RegistrationMirror {
    stats: Mutex<Option<RegistrationStats>>,
    files: Mutex<Vec<CsvFileEntry>>,
}

impl RegistrationMirror {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, Option<RegistrationStats>> {
        self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, Vec<CsvFileEntry>> {
        self.files.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_stats(&self, stats: RegistrationStats) {
        *self.lock_stats() = Some(stats);
    }

    pub fn stats(&self) -> Option<RegistrationStats> {
        self.lock_stats().clone()
    }

    /// Prepend a file entry, keeping the newest `MIRROR_FILE_CAP`.
    pub fn push_file(&self, entry: CsvFileEntry) {
        let mut files = self.lock_files();
        files.insert(0, entry);
        files.truncate(MIRROR_FILE_CAP);
    }

    pub fn files(&self) -> Vec<CsvFileEntry> {
        self.lock_files().clone()
    }

    pub fn clear(&self) {
        *self.lock_stats() = None;
        self.lock_files().clear();
    }
}

/// Registration import pipeline and read paths.
pub struct RegistrationService {
    store: Arc<dyn BlobStore>,
    kv: LocalKvStore,
    history: UploadHistory,
    mirror: Arc<RegistrationMirror>,
    event_map: EventDepartmentMap,
    bucket_specs: Vec<BucketSpec>,
    csv_bucket: String,
    data_bucket: String,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn BlobStore>,
        kv: LocalKvStore,
        mirror: Arc<RegistrationMirror>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            kv: kv.clone(),
            history: UploadHistory::new(kv),
            mirror,
            event_map: EventDepartmentMap::from_config(config),
            bucket_specs: required_buckets(&config.buckets),
            csv_bucket: config.buckets.registrations.clone(),
            data_bucket: config.buckets.registration_data.clone(),
        }
    }

    /// Import a registration CSV and return the computed statistics.
    ///
    /// Hard failures: no usable lines (`EmptyCsv`), no event-name column
    /// (`MissingEventColumn`). Prior registration data is deleted as soon
    /// as at least one usable line exists, before the column check; this
    /// ordering is part of the import contract.
    pub async fn import_csv(&self, file_name: &str, text: &str) -> Result<RegistrationStats> {
        log::info!("Starting CSV import of {}", file_name);
        self.store.ensure_buckets(&self.bucket_specs).await;

        let valid_lines = usable_lines(text);
        if valid_lines.is_empty() {
            return Err(AppError::EmptyCsv);
        }

        // Destructive import: clear out the previous artifacts first.
        if !self.delete_all_registration_data().await {
            log::warn!("Could not fully delete previous registration data, continuing");
        }

        let event_idx = find_event_column(valid_lines[0]).ok_or(AppError::MissingEventColumn)?;
        let stats = compute_stats(&valid_lines[1..], event_idx, &self.event_map);

        log::info!(
            "Counted {} registrations across {} departments",
            stats.total,
            stats.department_breakdown.len()
        );

        // Mirror first so reads work even if every write below fails.
        self.mirror.set_stats(stats.clone());
        self.mirror.push_file(CsvFileEntry {
            name: file_name.to_string(),
            created_at: Utc::now(),
            size: text.len() as u64,
        });

        self.persist_best_effort(file_name, text, &stats).await;

        Ok(stats)
    }

    /// Step 7 of the import: every write is downgraded to a warning.
    async fn persist_best_effort(&self, file_name: &str, text: &str, stats: &RegistrationStats) {
        let object = format!(
            "{}-registration.csv",
            Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ")
        );
        match self
            .store
            .upload(&self.csv_bucket, &object, text.as_bytes(), "text/csv")
            .await
        {
            Ok(url) => log::info!("CSV file uploaded to {}", url),
            Err(e) => log::warn!(
                "File processed successfully but couldn't be saved to cloud storage: {}",
                e
            ),
        }

        let count = StoredCount {
            total: stats.total,
            updated_at: Utc::now(),
        };
        match serde_json::to_vec(&count) {
            Ok(bytes) => {
                if let Err(e) = self
                    .store
                    .upload(&self.data_bucket, COUNT_OBJECT, &bytes, "application/json")
                    .await
                {
                    log::warn!("Could not store registration count: {}", e);
                }
            }
            Err(e) => log::warn!("Could not serialize registration count: {}", e),
        }

        if let Err(e) = self.kv.set(COUNT_KEY, &stats.total.to_string()).await {
            log::warn!("Could not store registration count locally: {}", e);
        }
        match serde_json::to_string(stats) {
            Ok(json) => {
                if let Err(e) = self.kv.set(STATS_KEY, &json).await {
                    log::warn!("Could not store registration stats locally: {}", e);
                }
            }
            Err(e) => log::warn!("Could not serialize registration stats: {}", e),
        }

        if let Err(e) = self.history.record(file_name, text.len() as u64).await {
            log::warn!("Could not record upload history: {}", e);
        }
    }

    /// Current registration total: mirror first, then the remote count
    /// document, else 0. Never fails.
    pub async fn current_count(&self) -> u64 {
        if let Some(stats) = self.mirror.stats() {
            return stats.total;
        }

        match self.store.download(&self.data_bucket, COUNT_OBJECT).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<StoredCount>(&bytes) {
                Ok(count) => count.total,
                Err(e) => {
                    log::warn!("Stored count document is corrupt: {}", e);
                    0
                }
            },
            Ok(None) => 0,
            Err(e) => {
                log::warn!("Could not read registration count: {}", e);
                0
            }
        }
    }

    /// Combined dashboard view: total count plus the CSV file listing,
    /// merging mirror entries with the remote listing (de-duplicated by
    /// name, newest first).
    pub async fn registration_data(&self) -> RegistrationData {
        let count = self.current_count().await;
        let mut files = self.mirror.files();

        match self.store.list(&self.csv_bucket, "").await {
            Ok(entries) => {
                let known: std::collections::HashSet<String> =
                    files.iter().map(|f| f.name.clone()).collect();
                files.extend(
                    entries
                        .into_iter()
                        .filter(|e| e.name.ends_with(".csv") && !known.contains(&e.name))
                        .map(|e| CsvFileEntry {
                            name: e.name,
                            created_at: e.created_at,
                            size: e.size,
                        }),
                );
                files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
            Err(e) => {
                log::warn!("Could not list registration CSV files: {}", e);
            }
        }

        RegistrationData { count, files }
    }

    /// List of past import entries from the durable ledger.
    pub async fn upload_history(&self) -> Vec<crate::models::UploadHistoryItem> {
        self.history.list().await
    }

    /// Remove every stored registration artifact: all CSV uploads, the
    /// count document, and the local keys. Best-effort; reports failure
    /// through the return value, never by panicking or propagating.
    pub async fn delete_all_registration_data(&self) -> bool {
        let files = match self.store.list(&self.csv_bucket, "").await {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Error listing files for deletion: {}", e);
                return false;
            }
        };

        if !files.is_empty() {
            let paths: Vec<String> = files.into_iter().map(|e| e.name).collect();
            if let Err(e) = self.store.remove(&self.csv_bucket, &paths).await {
                log::error!("Error deleting registration files: {}", e);
                return false;
            }
        }

        if let Err(e) = self
            .store
            .remove(&self.data_bucket, &[COUNT_OBJECT.to_string()])
            .await
        {
            log::warn!("Could not delete count document: {}", e);
        }

        if let Err(e) = self.kv.remove(COUNT_KEY).await {
            log::warn!("Could not remove local count key: {}", e);
        }
        if let Err(e) = self.kv.remove(STATS_KEY).await {
            log::warn!("Could not remove local stats key: {}", e);
        }

        true
    }
}

/// Lines that are non-blank and split into at least two comma-separated
/// fields.
fn usable_lines(text: &str) -> Vec<&str> {
    text.lines()
        .filter(|line| !line.trim().is_empty() && line.split(',').count() >= 2)
        .collect()
}

/// Index of the first header cell whose lower-cased text contains
/// "event name" or "event".
fn find_event_column(header_line: &str) -> Option<usize> {
    header_line
        .to_lowercase()
        .split(',')
        .position(|col| col.contains("event name") || col.contains("event"))
}

/// Count data rows into per-department totals and build the breakdown.
fn compute_stats(
    data_lines: &[&str],
    event_idx: usize,
    event_map: &EventDepartmentMap,
) -> RegistrationStats {
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut total: u64 = 0;

    for line in data_lines {
        let values: Vec<&str> = line.split(',').collect();
        if values.len() <= event_idx {
            continue;
        }

        let event_name = values[event_idx].trim();
        if event_name.is_empty() {
            continue;
        }

        let department = event_map.department_for(event_name);
        *counts.entry(department.to_string()).or_insert(0) += 1;
        total += 1;
    }

    let mut department_breakdown: Vec<DepartmentCount> = counts
        .into_iter()
        .map(|(department, count)| DepartmentCount {
            department,
            count,
            // Rounded independently per row; the column may not sum to 100.
            percent: ((count as f64 / total as f64) * 100.0).round() as u32,
        })
        .collect();

    department_breakdown.sort_by(|a, b| b.count.cmp(&a.count));

    RegistrationStats {
        total,
        department_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as AppResult;
    use crate::storage::{LocalBlobStore, ObjectEntry};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn service(tmp: &TempDir) -> RegistrationService {
        let store = Arc::new(LocalBlobStore::new(tmp.path().join("blobs")));
        let kv = LocalKvStore::new(tmp.path().join("kv"));
        RegistrationService::new(
            store,
            kv,
            Arc::new(RegistrationMirror::new()),
            &Config::default(),
        )
    }

    fn percent_of(stats: &RegistrationStats, department: &str) -> Option<(u64, u32)> {
        stats
            .department_breakdown
            .iter()
            .find(|d| d.department == department)
            .map(|d| (d.count, d.percent))
    }

    /// Store where every operation fails.
    struct DownStore;

    #[async_trait]
    impl BlobStore for DownStore {
        async fn ensure_buckets(&self, _: &[BucketSpec]) {}

        async fn upload(&self, _: &str, _: &str, _: &[u8], _: &str) -> AppResult<String> {
            Err(AppError::storage("down"))
        }

        async fn download(&self, _: &str, _: &str) -> AppResult<Option<Vec<u8>>> {
            Err(AppError::storage("down"))
        }

        async fn list(&self, _: &str, _: &str) -> AppResult<Vec<ObjectEntry>> {
            Err(AppError::storage("down"))
        }

        async fn remove(&self, _: &str, _: &[String]) -> AppResult<()> {
            Err(AppError::storage("down"))
        }
    }

    #[test]
    fn test_usable_lines_filtering() {
        let text = "Name,Event\n\n   \nsingle-field\nAlice,Code Sprint\r\nBob,Tech Quiz";
        let lines = usable_lines(text);
        assert_eq!(lines, vec!["Name,Event", "Alice,Code Sprint", "Bob,Tech Quiz"]);
    }

    #[test]
    fn test_find_event_column() {
        assert_eq!(find_event_column("Name,Event Name"), Some(1));
        assert_eq!(find_event_column("EVENT,Name"), Some(0));
        assert_eq!(find_event_column("Name,Phone,events attended"), Some(2));
        assert_eq!(find_event_column("Name,Phone"), None);
    }

    #[test]
    fn test_compute_stats_rounding() {
        let map = EventDepartmentMap::default();
        let lines = vec![
            "Alice,Code Sprint",
            "Bob,Tech Quiz",
            "Carol,Circuit Challenge",
        ];
        let stats = compute_stats(&lines, 1, &map);

        assert_eq!(stats.total, 3);
        // 2/3 rounds to 67, 1/3 to 33; the column sums to 100 only by luck.
        assert_eq!(stats.department_breakdown[0].department, "CSE");
        assert_eq!(stats.department_breakdown[0].count, 2);
        assert_eq!(stats.department_breakdown[0].percent, 67);
        assert_eq!(stats.department_breakdown[1].percent, 33);
    }

    #[test]
    fn test_compute_stats_skips_short_and_empty_rows() {
        let map = EventDepartmentMap::default();
        // Three-column header: event column index 2.
        let lines = vec!["a,b", "x,y, ", "Alice,123,Code Sprint"];
        let stats = compute_stats(&lines, 2, &map);

        assert_eq!(stats.total, 1);
        assert_eq!(stats.department_breakdown.len(), 1);
    }

    #[tokio::test]
    async fn test_import_scenario_exact_counts() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let csv = "Name,Event Name\nAlice,Code Sprint\nBob,Circuit Challenge\nCarol,Unknown Thing\n";
        let stats = svc.import_csv("reg.csv", csv).await.unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.department_breakdown.len(), 3);
        assert_eq!(percent_of(&stats, "CSE"), Some((1, 33)));
        assert_eq!(percent_of(&stats, "ECE"), Some((1, 33)));
        assert_eq!(percent_of(&stats, "Others"), Some((1, 33)));
    }

    #[tokio::test]
    async fn test_import_is_idempotent_on_stats() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let csv = "Name,Event Name\nAlice,Code Sprint\nBob,Circuit Challenge\n";
        let first = svc.import_csv("reg.csv", csv).await.unwrap();
        let second = svc.import_csv("reg.csv", csv).await.unwrap();

        assert_eq!(first, second);

        // The destructive pre-delete leaves exactly one stored CSV.
        let data = svc.registration_data().await;
        let remote_csvs: Vec<_> = data
            .files
            .iter()
            .filter(|f| f.name.ends_with("-registration.csv"))
            .collect();
        assert_eq!(remote_csvs.len(), 1);
    }

    #[tokio::test]
    async fn test_no_usable_lines_fails_without_deleting() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        // Seed prior data.
        svc.import_csv("reg.csv", "Name,Event Name\nAlice,Code Sprint\n")
            .await
            .unwrap();

        let err = svc.import_csv("bad.csv", "justonefield\n\n").await.unwrap_err();
        assert!(matches!(err, AppError::EmptyCsv));

        // Prior artifacts untouched.
        let data = svc.registration_data().await;
        assert!(data.files.iter().any(|f| f.name.ends_with("-registration.csv")));
    }

    #[tokio::test]
    async fn test_header_only_import_deletes_and_yields_zero() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        svc.import_csv("reg.csv", "Name,Event Name\nAlice,Code Sprint\n")
            .await
            .unwrap();

        // One usable line (the header) is enough to trigger the delete.
        let stats = svc.import_csv("empty.csv", "Name,Event Name\n").await.unwrap();
        assert_eq!(stats.total, 0);
        assert!(stats.department_breakdown.is_empty());

        let data = svc.registration_data().await;
        let remote_csvs: Vec<_> = data
            .files
            .iter()
            .filter(|f| f.name.ends_with("-registration.csv"))
            .collect();
        assert_eq!(remote_csvs.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_event_column_fails_after_delete() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        svc.import_csv("reg.csv", "Name,Event Name\nAlice,Code Sprint\n")
            .await
            .unwrap();

        let err = svc
            .import_csv("bad.csv", "Name,Phone\nAlice,123\n")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingEventColumn));

        // Deletion fires before the column check: prior uploads are gone.
        let data = svc.registration_data().await;
        assert!(!data.files.iter().any(|f| f.name.ends_with("-registration.csv")));
    }

    #[tokio::test]
    async fn test_import_survives_unavailable_store() {
        let tmp = TempDir::new().unwrap();
        let kv = LocalKvStore::new(tmp.path().join("kv"));
        let mirror = Arc::new(RegistrationMirror::new());
        let svc = RegistrationService::new(
            Arc::new(DownStore),
            kv,
            mirror.clone(),
            &Config::default(),
        );

        let csv = "Name,Event Name\nAlice,Code Sprint\nBob,Circuit Challenge\n";
        let stats = svc.import_csv("reg.csv", csv).await.unwrap();
        assert_eq!(stats.total, 2);

        // Reads are served from the mirror.
        assert_eq!(svc.current_count().await, 2);
        let data = svc.registration_data().await;
        assert_eq!(data.count, 2);
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].name, "reg.csv");
    }

    #[tokio::test]
    async fn test_current_count_from_remote_document() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(LocalBlobStore::new(tmp.path().join("blobs")));
        let kv = LocalKvStore::new(tmp.path().join("kv"));

        let count = StoredCount {
            total: 57,
            updated_at: Utc::now(),
        };
        store
            .upload(
                "registration-data",
                COUNT_OBJECT,
                &serde_json::to_vec(&count).unwrap(),
                "application/json",
            )
            .await
            .unwrap();

        let svc = RegistrationService::new(
            store,
            kv,
            Arc::new(RegistrationMirror::new()),
            &Config::default(),
        );
        assert_eq!(svc.current_count().await, 57);
    }

    #[tokio::test]
    async fn test_import_records_history_and_local_keys() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        svc.import_csv("march.csv", "Name,Event Name\nAlice,Code Sprint\n")
            .await
            .unwrap();

        let history = svc.upload_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "march.csv");

        assert_eq!(svc.kv.get(COUNT_KEY).await.unwrap(), Some("1".to_string()));
        let stats_json = svc.kv.get(STATS_KEY).await.unwrap().unwrap();
        let stats: RegistrationStats = serde_json::from_str(&stats_json).unwrap();
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn test_delete_all_clears_artifacts() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        svc.import_csv("reg.csv", "Name,Event Name\nAlice,Code Sprint\n")
            .await
            .unwrap();

        assert!(svc.delete_all_registration_data().await);
        assert!(svc.kv.get(COUNT_KEY).await.unwrap().is_none());
        assert!(svc.kv.get(STATS_KEY).await.unwrap().is_none());

        let data = svc.registration_data().await;
        assert!(!data.files.iter().any(|f| f.name.ends_with("-registration.csv")));
    }

    #[tokio::test]
    async fn test_mirror_file_cap() {
        let mirror = RegistrationMirror::new();
        for i in 0..15 {
            mirror.push_file(CsvFileEntry {
                name: format!("file{i}.csv"),
                created_at: Utc::now(),
                size: 10,
            });
        }

        let files = mirror.files();
        assert_eq!(files.len(), 10);
        assert_eq!(files[0].name, "file14.csv");
    }
}
