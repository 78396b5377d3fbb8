//! Service layer for the festival application.
//!
//! This module contains the business logic for:
//! - Department data resolution and fallback (`DepartmentService`)
//! - Event-name to department mapping (`EventDepartmentMap`)
//! - Registration CSV import and statistics (`RegistrationService`)
//! - Upload-history ledger (`UploadHistory`)
//! - Event poster images (`ImageService`)

pub mod departments;
pub mod event_map;
pub mod history;
pub mod images;
pub mod registrations;

pub use departments::{DepartmentCache, DepartmentService, SaveOutcome, SearchHit};
pub use event_map::{EventDepartmentMap, OTHERS_LABEL};
pub use history::{MAX_HISTORY_ENTRIES, UploadHistory};
pub use images::ImageService;
pub use registrations::{RegistrationMirror, RegistrationService};
