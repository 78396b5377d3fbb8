// src/models/department.rs

//! Department document and event data structures.
//!
//! A department's entire catalog lives in a single JSON document that is
//! always read and rewritten wholesale; events have no identity outside
//! their department.

use serde::{Deserialize, Serialize};

/// The full data document for one department.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepartmentData {
    /// Display name (e.g., "Computer Science")
    pub department: String,

    /// Description shown on the department page
    pub description: String,

    /// Faculty coordinator display names
    #[serde(default)]
    pub faculty_coordinators: Vec<String>,

    /// Student coordinators for the department as a whole
    #[serde(default)]
    pub main_department_coordinators: Vec<MainDepartmentCoordinator>,

    /// Events hosted by this department
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A student coordinator for the department itself (not a single event).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MainDepartmentCoordinator {
    pub student_name: String,
    pub usn: String,
    pub semester: u32,
    pub section: String,
    pub mobile_number: String,
}

/// A single festival event inside a department document.
///
/// `sl_no` is the stable identifier, unique within the owning department's
/// event list. When no external id source exists a new one is minted from
/// the current epoch-milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Stable id, unique within the department
    pub sl_no: i64,

    pub event_name: String,
    pub event_type: String,
    pub department: String,
    pub venue: String,
    pub date: String,
    pub description: String,

    /// Registration fee in rupees
    pub registration_fees: u32,

    /// Maximum team size, if the event is team-based
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_size: Option<u32>,

    /// Ordered rule list
    #[serde(default)]
    pub rules_and_regulations: Vec<String>,

    #[serde(default)]
    pub faculty_coordinators: Vec<Coordinator>,

    #[serde(default)]
    pub student_coordinators: Vec<Coordinator>,

    /// Whether the event is highlighted on the landing page
    #[serde(default)]
    pub featured: bool,

    /// Public URL of the poster image, if one was uploaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
}

/// A named contact with a phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coordinator {
    pub name: String,
    pub phone: String,
}

impl DepartmentData {
    /// Next free `sl_no` for a new event, minted from epoch-milliseconds
    /// and bumped past any collision with an existing event.
    pub fn next_sl_no(&self, now_ms: i64) -> i64 {
        let mut candidate = now_ms;
        while self.events.iter().any(|e| e.sl_no == candidate) {
            candidate += 1;
        }
        candidate
    }

    /// Insert or replace an event by `sl_no`.
    pub fn upsert_event(&mut self, event: Event) {
        match self.events.iter_mut().find(|e| e.sl_no == event.sl_no) {
            Some(slot) => *slot = event,
            None => self.events.push(event),
        }
    }
}
