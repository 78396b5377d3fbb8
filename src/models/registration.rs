// src/models/registration.rs

//! Registration statistics and upload bookkeeping structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate statistics computed from one registration CSV import.
///
/// Recomputed wholesale on every import; never patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrationStats {
    /// Total counted registrations
    pub total: u64,

    /// Per-department counts, sorted by count descending
    #[serde(rename = "departmentBreakdown")]
    pub department_breakdown: Vec<DepartmentCount>,
}

/// One department's share of the registrations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentCount {
    pub department: String,
    pub count: u64,

    /// `round(count / total * 100)`, rounded independently per row.
    /// The column need not sum to exactly 100.
    pub percent: u32,
}

/// The small JSON document persisted as `current-count.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCount {
    pub total: u64,
    pub updated_at: DateTime<Utc>,
}

/// A past CSV import, as shown in the admin upload history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadHistoryItem {
    /// Original file name
    pub name: String,

    /// Locale-formatted timestamp of the import
    pub date: String,

    /// Human-formatted size (e.g., "12.34 KB")
    pub size: String,
}

/// A stored registration CSV file, from the remote listing or the
/// in-process mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CsvFileEntry {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Combined registration view for the admin dashboard.
#[derive(Debug, Clone, Default)]
pub struct RegistrationData {
    pub count: u64,
    pub files: Vec<CsvFileEntry>,
}

/// Format a byte count the way the upload history displays it.
pub fn format_file_size(size_bytes: u64) -> String {
    format!("{:.2} KB", size_bytes as f64 / 1024.0)
}
