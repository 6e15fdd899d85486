//! Translation API client, configuration and shared types

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod usage_tracker;
