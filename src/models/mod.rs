// src/models/mod.rs

//! Domain models for the festhub application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod department;
mod registration;

// Re-export all public types
pub use department::{Coordinator, DepartmentData, Event, MainDepartmentCoordinator};
pub use registration::{
    CsvFileEntry, DepartmentCount, RegistrationData, RegistrationStats, StoredCount,
    UploadHistoryItem, format_file_size,
};
