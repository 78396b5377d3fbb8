// src/lib.rs

//! festhub — college festival event listing and registration data tooling.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
