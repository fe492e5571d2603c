//! Application logic controller module
//!
//! This module exposes the operations the front end calls and connects
//! them to the catalog, the update lifecycle and the host's services.
//!
//! # Architecture
//!
//! - `AppController`: facade over the sync bridge, update manager and auto-start entry
//! - `Executor` / `FolderPicker`: host-provided services, injected at construction
//! - `CommandExecutor`: default `Executor` that starts processes with the platform opener
//!
//! # Event Flow
//!
//! ```text
//! front end ──call──▶ AppController ──▶ SyncBridge ──▶ CatalogStore ──▶ config.json
//!     ▲                    │
//!     └──── AppEvent ◀── EventBus ◀── UpdateManager
//! ```

pub mod app_controller;
pub mod collaborators;

pub use app_controller::{AppController, STARTUP_CHECK_DELAY};
pub use collaborators::{CommandExecutor, Executor, FolderPicker};
