// src/services/departments.rs

//! Department document resolution, caching, and persistence.
//!
//! Resolution walks an ordered chain of sources until one yields a
//! document:
//!
//! 1. In-memory cache (fresh within the TTL window)
//! 2. Remote blob store (`{code}.json` in the department-data bucket)
//! 3. Bundled static fallback document (write-through to remote on hit)
//! 4. Synthesized placeholder document (also persisted)
//!
//! An outer safety net catches any error from tiers 2-4 and returns the
//! synthesized document directly, without caching or persisting it. The
//! chain never fails: callers always receive a document.
//!
//! Saves are optimistic: the cache is updated before the remote write is
//! attempted, and a failed remote write degrades to the local key-value
//! store instead of failing the operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::join_all;

use crate::config::{Config, DepartmentRegistry, StaticAssets};
use crate::error::Result;
use crate::models::{Coordinator, DepartmentData, Event, MainDepartmentCoordinator};
use crate::storage::{BlobStore, LocalKvStore};

/// Where a save ultimately landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written to the remote store
    Remote,
    /// Remote write failed; written to the local key-value store only
    LocalOnly,
}

struct CacheEntry {
    data: DepartmentData,
    timestamp_ms: i64,
}

/// Time-boxed in-memory department cache.
///
/// An explicit context object with a defined lifecycle: create it at
/// session start, share it across services, clear it on logout or explicit
/// invalidation. Entries older than the TTL are treated as absent.
pub struct DepartmentCache {
    ttl_ms: i64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DepartmentCache {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl_ms,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Fresh entry for a code, judged against the supplied clock reading.
    pub fn get_at(&self, code: &str, now_ms: i64) -> Option<DepartmentData> {
        let entries = self.lock();
        let entry = entries.get(code)?;
        if now_ms - entry.timestamp_ms < self.ttl_ms {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    /// Fresh entry for a code.
    pub fn get(&self, code: &str) -> Option<DepartmentData> {
        self.get_at(code, Utc::now().timestamp_millis())
    }

    pub fn insert_at(&self, code: &str, data: DepartmentData, now_ms: i64) {
        self.lock().insert(
            code.to_string(),
            CacheEntry {
                data,
                timestamp_ms: now_ms,
            },
        );
    }

    pub fn insert(&self, code: &str, data: DepartmentData) {
        self.insert_at(code, data, Utc::now().timestamp_millis());
    }

    /// Drop one department's entry.
    pub fn invalidate(&self, code: &str) {
        self.lock().remove(code);
    }

    /// Drop everything (logout / session end).
    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// An event found by a cross-department search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Code of the department the event was found under
    pub department_code: String,
    pub event: Event,
}

/// Department data access: resolution chain, saves, search, JSON
/// import/export.
pub struct DepartmentService {
    store: Arc<dyn BlobStore>,
    kv: LocalKvStore,
    cache: Arc<DepartmentCache>,
    registry: DepartmentRegistry,
    assets: StaticAssets,
    bucket: String,
    http: reqwest::Client,
    write_through: bool,
}

impl DepartmentService {
    pub fn new(
        store: Arc<dyn BlobStore>,
        kv: LocalKvStore,
        cache: Arc<DepartmentCache>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            kv,
            cache,
            registry: DepartmentRegistry::from_config(config),
            assets: config.static_assets.clone(),
            bucket: config.buckets.department_data.clone(),
            http: reqwest::Client::new(),
            write_through: true,
        }
    }

    /// Disable the write-through persistence of fallback-sourced documents
    /// (tiers 3 and 4 still cache, but no longer write to the store).
    pub fn without_write_through(mut self) -> Self {
        self.write_through = false;
        self
    }

    pub fn registry(&self) -> &DepartmentRegistry {
        &self.registry
    }

    /// Resolve a department document. Never fails: every error path ends in
    /// a synthesized placeholder.
    pub async fn get_department_data(&self, code: &str) -> DepartmentData {
        match self.resolve(code).await {
            Ok(data) => data,
            Err(e) => {
                // Outer safety net: return a placeholder without caching or
                // persisting anything.
                log::error!("Error fetching department data for {}: {}", code, e);
                self.synthesize(code)
            }
        }
    }

    /// The ordered resolution chain (tiers 1-4). Parse errors and I/O
    /// errors other than plain absence propagate to the safety net in
    /// `get_department_data`.
    async fn resolve(&self, code: &str) -> Result<DepartmentData> {
        // Tier 1: cache
        if let Some(data) = self.cache.get(code) {
            return Ok(data);
        }

        // Tier 2: remote store
        let object = format!("{code}.json");
        if let Some(bytes) = self.store.download(&self.bucket, &object).await? {
            let data: DepartmentData = serde_json::from_slice(&bytes)?;
            self.cache.insert(code, data.clone());
            return Ok(data);
        }

        // Tier 3: bundled static fallback, written through to the store
        if let Some(data) = self.load_bundled(code).await? {
            self.cache.insert(code, data.clone());
            self.persist_best_effort(code, &data).await;
            return Ok(data);
        }

        // Tier 4: synthesized placeholder
        log::info!("No data found for {}, generating fallback data", code);
        let data = self.synthesize(code);
        self.cache.insert(code, data.clone());
        self.persist_best_effort(code, &data).await;
        Ok(data)
    }

    /// Read the packaged default document for a code, if any is bundled.
    /// Absence (missing file, 404) means "try the next tier"; malformed
    /// JSON propagates.
    async fn load_bundled(&self, code: &str) -> Result<Option<DepartmentData>> {
        let file_name = self
            .registry
            .get(code)
            .map(|d| d.json_file.clone())
            .unwrap_or_else(|| format!("{code}.json"));

        match &self.assets {
            StaticAssets::None => Ok(None),
            StaticAssets::Dir { path } => {
                let full = std::path::Path::new(path).join(&file_name);
                match tokio::fs::read(&full).await {
                    Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
            StaticAssets::Url { base } => {
                let url = format!("{}/{}", base.trim_end_matches('/'), file_name);
                let response = self.http.get(&url).send().await?;
                if !response.status().is_success() {
                    return Ok(None);
                }
                let bytes = response.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
        }
    }

    /// The explicit persist-what-we-just-loaded step of the chain.
    async fn persist_best_effort(&self, code: &str, data: &DepartmentData) {
        if !self.write_through {
            return;
        }
        if let Err(e) = self.store_department_data(code, data).await {
            log::warn!("Write-through for {} failed everywhere: {}", code, e);
        }
    }

    /// Minimal placeholder document for a department.
    pub fn synthesize(&self, code: &str) -> DepartmentData {
        let name = self.registry.display_name(code);

        DepartmentData {
            department: name.clone(),
            description: format!(
                "Welcome to the {name} department! Discover our exciting events and meet our coordinators."
            ),
            faculty_coordinators: vec![
                "Dr. John Doe".to_string(),
                "Prof. Jane Smith".to_string(),
            ],
            main_department_coordinators: vec![MainDepartmentCoordinator {
                student_name: "Student Coordinator".to_string(),
                usn: "1XX21XX000".to_string(),
                semester: 5,
                section: "A".to_string(),
                mobile_number: "9876543210".to_string(),
            }],
            events: vec![Event {
                sl_no: 1,
                event_name: format!("{name} Showcase"),
                event_type: "Competition".to_string(),
                department: name.clone(),
                venue: "Main Auditorium".to_string(),
                date: "2025-05-15".to_string(),
                description: format!("Show off your skills in this exciting {name} event."),
                registration_fees: 200,
                team_size: Some(2),
                rules_and_regulations: vec![
                    "Maximum 2 participants per team".to_string(),
                    "Time limit: 30 minutes".to_string(),
                    "Bring your own equipment".to_string(),
                ],
                faculty_coordinators: vec![Coordinator {
                    name: "Dr. John Doe".to_string(),
                    phone: "9876543210".to_string(),
                }],
                student_coordinators: vec![Coordinator {
                    name: "Student Coordinator".to_string(),
                    phone: "9876543210".to_string(),
                }],
                featured: true,
                poster_url: None,
            }],
        }
    }

    /// Save a department document wholesale.
    ///
    /// The cache is updated first, unconditionally. A failed remote write
    /// degrades to the local key-value store; the operation errors only
    /// when even that write fails (the document went nowhere durable).
    pub async fn store_department_data(
        &self,
        code: &str,
        data: &DepartmentData,
    ) -> Result<SaveOutcome> {
        log::info!("Storing department data for {}", code);

        self.cache.insert(code, data.clone());

        let json = serde_json::to_string(data)?;
        let object = format!("{code}.json");

        match self
            .store
            .upload(&self.bucket, &object, json.as_bytes(), "application/json")
            .await
        {
            Ok(_) => Ok(SaveOutcome::Remote),
            Err(e) => {
                log::error!("Error uploading department data to storage: {}", e);
                self.kv.set(&format!("department_{code}"), &json).await?;
                Ok(SaveOutcome::LocalOnly)
            }
        }
    }

    /// Fetch every registered department concurrently. Completion order is
    /// arbitrary; results are returned in registry order, and the chain's
    /// safety net means none of them can fail.
    pub async fn fetch_all_departments(&self) -> Vec<(String, DepartmentData)> {
        let codes: Vec<String> = self.registry.codes().map(str::to_string).collect();

        let fetches = codes.iter().map(|code| async {
            let data = self.get_department_data(code).await;
            (code.clone(), data)
        });

        join_all(fetches).await
    }

    /// Case-insensitive substring search over event name, description, and
    /// type across all departments.
    pub async fn search_events(
        &self,
        query: &str,
        department_filter: Option<&str>,
    ) -> Vec<SearchHit> {
        let query = query.to_lowercase();
        let mut hits = Vec::new();

        for (code, data) in self.fetch_all_departments().await {
            if let Some(filter) = department_filter {
                if code != filter {
                    continue;
                }
            }

            for event in data.events {
                let matches = query.is_empty()
                    || event.event_name.to_lowercase().contains(&query)
                    || event.description.to_lowercase().contains(&query)
                    || event.event_type.to_lowercase().contains(&query);
                if matches {
                    hits.push(SearchHit {
                        department_code: code.clone(),
                        event,
                    });
                }
            }
        }

        hits
    }

    /// Export a department document as a pretty-printed JSON download:
    /// `({code}_data.json, contents)`.
    pub async fn export_json(&self, code: &str) -> Result<(String, String)> {
        let data = self.get_department_data(code).await;
        let json = serde_json::to_string_pretty(&data)?;
        Ok((format!("{code}_data.json"), json))
    }

    /// Import a department document from raw JSON bytes. Invalid JSON is a
    /// hard failure; a valid document goes through the normal save path.
    pub async fn import_json(&self, code: &str, bytes: &[u8]) -> Result<SaveOutcome> {
        let data: DepartmentData = serde_json::from_slice(bytes)?;
        self.store_department_data(code, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LocalBlobStore, ObjectEntry};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn service(tmp: &TempDir) -> DepartmentService {
        let store = Arc::new(LocalBlobStore::new(tmp.path().join("blobs")));
        let kv = LocalKvStore::new(tmp.path().join("kv"));
        let cache = Arc::new(DepartmentCache::new(crate::config::DEFAULT_CACHE_TTL_MS));
        DepartmentService::new(store, kv, cache, &Config::default())
    }

    /// Blob store whose writes always fail; reads find nothing.
    struct UnavailableStore;

    #[async_trait]
    impl BlobStore for UnavailableStore {
        async fn ensure_buckets(&self, _buckets: &[crate::storage::BucketSpec]) {}

        async fn upload(&self, _: &str, _: &str, _: &[u8], _: &str) -> Result<String> {
            Err(crate::error::AppError::storage("service unavailable"))
        }

        async fn download(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn list(&self, _: &str, _: &str) -> Result<Vec<ObjectEntry>> {
            Ok(Vec::new())
        }

        async fn remove(&self, _: &str, _: &[String]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cache_ttl_window() {
        let cache = DepartmentCache::new(5 * 60 * 1000);
        let tmp = TempDir::new().unwrap();
        let data = service(&tmp).synthesize("cse");

        cache.insert_at("cse", data.clone(), 1_000_000);
        assert_eq!(cache.get_at("cse", 1_000_000), Some(data.clone()));
        assert_eq!(
            cache.get_at("cse", 1_000_000 + 5 * 60 * 1000 - 1),
            Some(data)
        );
        assert!(cache.get_at("cse", 1_000_000 + 5 * 60 * 1000).is_none());
    }

    #[test]
    fn test_cache_invalidate_and_clear() {
        let cache = DepartmentCache::new(1000);
        let tmp = TempDir::new().unwrap();
        let data = service(&tmp).synthesize("cse");

        cache.insert_at("cse", data.clone(), 0);
        cache.insert_at("ece", data, 0);

        cache.invalidate("cse");
        assert!(cache.get_at("cse", 0).is_none());
        assert!(cache.get_at("ece", 0).is_some());

        cache.clear();
        assert!(cache.get_at("ece", 0).is_none());
    }

    #[tokio::test]
    async fn test_unknown_code_synthesized_and_persisted() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let data = svc.get_department_data("zzz").await;
        assert_eq!(data.department, "ZZZ");
        assert_eq!(data.events.len(), 1);
        assert_eq!(data.events[0].event_name, "ZZZ Showcase");

        // Write-through persisted the synthesized document.
        let stored = svc
            .store
            .download("department-data", "zzz.json")
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_remote() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let first = svc.get_department_data("cse").await;

        // Overwrite the remote document; a fresh cache entry must win.
        let mut other = first.clone();
        other.description = "changed behind the cache".to_string();
        let json = serde_json::to_string(&other).unwrap();
        svc.store
            .upload(
                "department-data",
                "cse.json",
                json.as_bytes(),
                "application/json",
            )
            .await
            .unwrap();

        let second = svc.get_department_data("cse").await;
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_remote_tier_populates_cache() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let doc = svc.synthesize("ece");
        let json = serde_json::to_string(&doc).unwrap();
        svc.store
            .upload(
                "department-data",
                "ece.json",
                json.as_bytes(),
                "application/json",
            )
            .await
            .unwrap();

        let data = svc.get_department_data("ece").await;
        assert_eq!(data, doc);
        assert_eq!(svc.cache.get("ece"), Some(doc));
    }

    #[tokio::test]
    async fn test_bundled_fallback_write_through() {
        let tmp = TempDir::new().unwrap();
        let assets_dir = tmp.path().join("assets");
        std::fs::create_dir_all(&assets_dir).unwrap();

        let store = Arc::new(LocalBlobStore::new(tmp.path().join("blobs")));
        let kv = LocalKvStore::new(tmp.path().join("kv"));
        let cache = Arc::new(DepartmentCache::new(crate::config::DEFAULT_CACHE_TTL_MS));

        let mut config = Config::default();
        config.static_assets = StaticAssets::Dir {
            path: assets_dir.display().to_string(),
        };
        let svc = DepartmentService::new(store.clone(), kv, cache, &config);

        let mut bundled = svc.synthesize("math");
        bundled.description = "bundled copy".to_string();
        std::fs::write(
            assets_dir.join("math.json"),
            serde_json::to_string(&bundled).unwrap(),
        )
        .unwrap();

        let data = svc.get_department_data("math").await;
        assert_eq!(data.description, "bundled copy");

        // Bundled document was written through to the remote store.
        let stored = store
            .download("department-data", "math.json")
            .await
            .unwrap();
        let stored: DepartmentData = serde_json::from_slice(&stored.unwrap()).unwrap();
        assert_eq!(stored.description, "bundled copy");
    }

    #[tokio::test]
    async fn test_write_through_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp).without_write_through();

        let data = svc.get_department_data("phy").await;
        assert_eq!(data.department, "Physics");

        let stored = svc
            .store
            .download("department-data", "phy.json")
            .await
            .unwrap();
        assert!(stored.is_none());
        // The cache is still populated.
        assert!(svc.cache.get("phy").is_some());
    }

    #[tokio::test]
    async fn test_malformed_remote_json_hits_safety_net() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        svc.store
            .upload(
                "department-data",
                "cse.json",
                b"not json {",
                "application/json",
            )
            .await
            .unwrap();

        let data = svc.get_department_data("cse").await;
        assert_eq!(data.department, "Computer Science");

        // The safety net neither caches nor repairs the stored document.
        assert!(svc.cache.get("cse").is_none());
        let stored = svc
            .store
            .download("department-data", "cse.json")
            .await
            .unwrap();
        assert_eq!(stored, Some(b"not json {".to_vec()));
    }

    #[tokio::test]
    async fn test_save_degrades_to_local_store() {
        let tmp = TempDir::new().unwrap();
        let kv = LocalKvStore::new(tmp.path().join("kv"));
        let cache = Arc::new(DepartmentCache::new(crate::config::DEFAULT_CACHE_TTL_MS));
        let svc = DepartmentService::new(
            Arc::new(UnavailableStore),
            kv.clone(),
            cache.clone(),
            &Config::default(),
        );

        let data = svc.synthesize("cse");
        let outcome = svc.store_department_data("cse", &data).await.unwrap();
        assert_eq!(outcome, SaveOutcome::LocalOnly);

        // Cache was updated optimistically and the document is retrievable
        // from local storage.
        assert_eq!(cache.get("cse"), Some(data.clone()));
        let local = kv.get("department_cse").await.unwrap().unwrap();
        let parsed: DepartmentData = serde_json::from_str(&local).unwrap();
        assert_eq!(parsed, data);
    }

    #[tokio::test]
    async fn test_save_remote_outcome() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let data = svc.synthesize("ece");
        let outcome = svc.store_department_data("ece", &data).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Remote);
    }

    #[tokio::test]
    async fn test_fetch_all_covers_registry() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let all = svc.fetch_all_departments().await;
        assert_eq!(all.len(), svc.registry().len());
        assert!(all.iter().any(|(code, _)| code == "cse"));
    }

    #[tokio::test]
    async fn test_search_events() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        // All departments synthesize a "{Name} Showcase" competition.
        let hits = svc.search_events("showcase", None).await;
        assert_eq!(hits.len(), svc.registry().len());

        let filtered = svc.search_events("showcase", Some("cse")).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].department_code, "cse");

        let none = svc.search_events("no such event", None).await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_export_json_name_and_shape() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let (name, json) = svc.export_json("cse").await.unwrap();
        assert_eq!(name, "cse_data.json");

        let parsed: DepartmentData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.department, "Computer Science");
        // Pretty-printed output spans multiple lines.
        assert!(json.contains('\n'));
    }

    #[tokio::test]
    async fn test_import_json_rejects_invalid() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let err = svc.import_json("cse", b"{ broken").await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Json(_)));
    }

    #[tokio::test]
    async fn test_import_json_saves_document() {
        let tmp = TempDir::new().unwrap();
        let svc = service(&tmp);

        let mut doc = svc.synthesize("cse");
        doc.description = "imported".to_string();
        let bytes = serde_json::to_vec(&doc).unwrap();

        let outcome = svc.import_json("cse", &bytes).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Remote);
        assert_eq!(svc.get_department_data("cse").await.description, "imported");
    }
}
