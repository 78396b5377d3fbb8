// src/services/event_map.rs

//! Event-name to department-label lookup.
//!
//! A closed, immutable table seeded with the production event list. Unknown
//! event names always map to the catch-all `"Others"` label, so every
//! counted row lands somewhere. Additions are data: deployments extend the
//! table through `Config::extra_event_mappings`, not code changes.

use std::collections::HashMap;

use crate::config::Config;

/// Label used for event names with no table entry.
pub const OTHERS_LABEL: &str = "Others";

/// Immutable event-name to department-label mapping.
#[derive(Debug, Clone)]
pub struct EventDepartmentMap {
    entries: HashMap<String, String>,
}

impl EventDepartmentMap {
    /// Built-in table extended with config-supplied entries.
    pub fn from_config(config: &Config) -> Self {
        let mut map = Self::default();
        for (event, department) in &config.extra_event_mappings {
            map.entries.insert(event.clone(), department.clone());
        }
        map
    }

    /// Department label for an event name. Unknown names map to "Others".
    pub fn department_for(&self, event_name: &str) -> &str {
        self.entries
            .get(event_name)
            .map(String::as_str)
            .unwrap_or(OTHERS_LABEL)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for EventDepartmentMap {
    fn default() -> Self {
        let table: &[(&str, &str)] = &[
            // CSE
            ("Movie Mania", "CSE"),
            ("Code Sprint", "CSE"),
            ("Web Design", "CSE"),
            ("Tech Quiz", "CSE"),
            // ECE
            ("Circuit Challenge", "ECE"),
            ("Robotics Rumble", "ECE"),
            ("Signal Processing", "ECE"),
            ("IoT Workshop", "ECE"),
            // Non-technical
            ("Pattern Play", "Non-Tech"),
            ("Food Beast", "Non-Tech"),
            ("Minute to Win It", "Non-Tech"),
            ("Veg Picasso", "Non-Tech"),
            // ISE
            ("Data Dive", "ISE"),
            ("Network Security", "ISE"),
            ("Database Design", "ISE"),
            // AI & ML
            ("AI Workshop", "AI & ML"),
            ("Neural Networks", "AI & ML"),
            ("Machine Learning", "AI & ML"),
            ("Computer Vision", "AI & ML"),
            // Data Science
            ("Data Analysis", "DS"),
            ("Big Data", "DS"),
            ("Data Visualization", "DS"),
            // Civil & Mechanical
            ("Bridge Building", "Civil"),
            ("CAD Design", "Civil"),
            ("Structural Analysis", "Civil"),
            // Mathematics
            ("Math Olympiad", "Math"),
            ("Statistical Analysis", "Math"),
            // MBA
            ("Business Case Study", "MBA"),
            ("Marketing Strategy", "MBA"),
            ("Entrepreneurship", "MBA"),
            // Chemistry
            ("Chemical Experiments", "Chem"),
            ("Material Science", "Chem"),
            // Physics
            ("Physics Demonstration", "Phy"),
            ("Quantum Mechanics", "Phy"),
            // SVFC
            ("Commerce Quiz", "SVFC"),
            ("Business Administration", "SVFC"),
            ("Computer Applications", "SVFC"),
        ];

        Self {
            entries: table
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
