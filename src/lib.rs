//! Mirror picker for an app shell: probes a fixed set of endpoints, picks the
//! fastest (preferring the last one that worked) and loads it, restarting the
//! whole flow on failure.

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod platform;
pub mod presenter;
pub mod prober;
pub mod selector;
pub mod traits;
pub mod types;
