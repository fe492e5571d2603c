//! `QuickLaunch` - core of a quick-launch panel
//!
//! Keeps an ordered catalog of launcher tiles with per-tile recent items,
//! persisted as one JSON document, and a self-update lifecycle fed by GitHub
//! Releases. `AppController` is the facade a front end talks to; mutations
//! pass through an optimistic `SyncBridge` into the write-through
//! `CatalogStore`, and update work runs on cancellable background threads.
//!
//! # Threads
//!
//! - Catalog mutations: one short-lived worker per mutation, ordered per tile
//! - Update check / download: at most one of each at a time
//! - Startup update check: one delayed background check

// Module declarations
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod sync;
pub mod update;
pub mod utils;
pub mod version;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use error::{QuickLaunchError, Result};
