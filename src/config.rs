// src/config.rs

//! Application configuration and the department registry.
//!
//! The registry is the closed set of known department codes. It is data,
//! not code: deployments may extend it (and the event-to-department map)
//! through the TOML config without touching the source.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Freshness window for cached department documents (5 minutes).
pub const DEFAULT_CACHE_TTL_MS: i64 = 5 * 60 * 1000;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bucket names for the four storage partitions
    #[serde(default)]
    pub buckets: BucketConfig,

    /// Department cache freshness window in milliseconds
    #[serde(default = "defaults::cache_ttl_ms")]
    pub cache_ttl_ms: i64,

    /// Where bundled static department documents are served from
    #[serde(default)]
    pub static_assets: StaticAssets,

    /// Additional department codes beyond the built-in registry
    #[serde(default)]
    pub extra_departments: Vec<DepartmentInfo>,

    /// Additional event-name to department-label mappings
    #[serde(default)]
    pub extra_event_mappings: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buckets: BucketConfig::default(),
            cache_ttl_ms: defaults::cache_ttl_ms(),
            static_assets: StaticAssets::default(),
            extra_departments: Vec::new(),
            extra_event_mappings: BTreeMap::new(),
        }
    }
}

/// Names of the four storage partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// One JSON document per department code
    #[serde(default = "defaults::department_data_bucket")]
    pub department_data: String,

    /// Uploaded registration CSV files (timestamp-prefixed)
    #[serde(default = "defaults::registrations_bucket")]
    pub registrations: String,

    /// The single `current-count.json` document
    #[serde(default = "defaults::registration_data_bucket")]
    pub registration_data: String,

    /// Event poster images
    #[serde(default = "defaults::event_images_bucket")]
    pub event_images: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            department_data: defaults::department_data_bucket(),
            registrations: defaults::registrations_bucket(),
            registration_data: defaults::registration_data_bucket(),
            event_images: defaults::event_images_bucket(),
        }
    }
}

/// Source of the bundled per-department fallback documents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaticAssets {
    /// No bundled fallback available
    #[default]
    None,

    /// Read from a local directory shipped with the deployment
    Dir { path: String },

    /// Fetch from an HTTP base URL (the documents live alongside the site)
    Url { base: String },
}

/// A known department: stable code plus display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentInfo {
    /// Short stable identifier, used as storage key and route segment
    pub code: String,

    /// Human-readable display name
    pub name: String,

    /// Bundled fallback document file name
    pub json_file: String,
}

/// The closed set of known department codes.
///
/// Arbitrary codes are accepted everywhere; unknown codes simply have no
/// display name and fall back to the uppercased code.
#[derive(Debug, Clone)]
pub struct DepartmentRegistry {
    departments: Vec<DepartmentInfo>,
}

impl DepartmentRegistry {
    /// Registry extended with deployment-specific entries from the config.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for info in &config.extra_departments {
            if !registry.departments.iter().any(|d| d.code == info.code) {
                registry.departments.push(info.clone());
            }
        }
        registry
    }

    /// Look up a known department by code.
    pub fn get(&self, code: &str) -> Option<&DepartmentInfo> {
        self.departments.iter().find(|d| d.code == code)
    }

    /// Display name for a code: the registered name, or the uppercased
    /// code for unknown departments.
    pub fn display_name(&self, code: &str) -> String {
        self.get(code)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| code.to_uppercase())
    }

    /// All registered codes, in registry order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.departments.iter().map(|d| d.code.as_str())
    }

    pub fn len(&self) -> usize {
        self.departments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty()
    }
}

impl Default for DepartmentRegistry {
    fn default() -> Self {
        Self {
            departments: defaults::known_departments(),
        }
    }
}

mod defaults {
    use super::DepartmentInfo;

    pub fn cache_ttl_ms() -> i64 {
        super::DEFAULT_CACHE_TTL_MS
    }

    pub fn department_data_bucket() -> String {
        "department-data".into()
    }
    pub fn registrations_bucket() -> String {
        "registrations".into()
    }
    pub fn registration_data_bucket() -> String {
        "registration-data".into()
    }
    pub fn event_images_bucket() -> String {
        "event-images".into()
    }

    fn dept(code: &str, name: &str) -> DepartmentInfo {
        DepartmentInfo {
            code: code.to_string(),
            name: name.to_string(),
            json_file: format!("{code}.json"),
        }
    }

    pub fn known_departments() -> Vec<DepartmentInfo> {
        vec![
            dept("aiml", "AI & ML"),
            dept("chem", "Chemistry"),
            dept("civil", "Civil & Mechanical"),
            dept("cse", "Computer Science"),
            dept("ds", "Data Science"),
            dept("ece", "Electronics & Communication"),
            dept("ise", "Information Science"),
            dept("math", "Mathematics"),
            dept("mba", "MBA"),
            dept("phy", "Physics"),
            dept("svfc", "SVFC"),
        ]
    }
}
