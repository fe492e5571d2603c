//! Shared test utilities for `QuickLaunch` unit tests.
//!
//! This module provides common test infrastructure used across multiple test modules.
//! It is only compiled during testing (`#[cfg(test)]`).

use crate::config::{ActionKind, Config, ConfigStore, Tile};
use crate::controller::{Executor, FolderPicker};
use crate::error::{QuickLaunchError, Result, StringError};
use crate::update::{CancelToken, Installer, Release, ReleaseSource};
use crate::utils::autostart::AutoStart;
use parking_lot::{Condvar, Mutex};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::{NamedTempFile, TempDir};

/// Helper function to create a temporary test directory using tempfile.
/// Returns a `TempDir` that automatically cleans up when dropped.
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// In-memory zip archive holding `entries` as (path, contents) pairs
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, contents) in entries {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer.write_all(contents).expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip").into_inner()
}

/// Tile with a derived name and target
pub fn sample_tile(id: &str) -> Tile {
    Tile::new(id, format!("Tile {id}"), ActionKind::App, format!("{id}.exe"))
}

/// In-memory `ConfigStore` whose writes can be made to fail on demand
#[derive(Default)]
pub struct FlakyStore {
    saved: Mutex<Option<Config>>,
    fail: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyStore {
    /// Store preloaded with `config`
    pub fn with_config(config: Config) -> Self {
        Self {
            saved: Mutex::new(Some(config)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last successfully saved document
    pub fn last_saved(&self) -> Option<Config> {
        self.saved.lock().clone()
    }
}

impl ConfigStore for FlakyStore {
    fn load(&self) -> Result<Config> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save(&self, config: &Config) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuickLaunchError::Persistence(StringError::new(
                "simulated write failure",
            )));
        }
        *self.saved.lock() = Some(config.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Backend whose writes block until opened and reject tiles named "reject"
#[derive(Default)]
pub struct GatedStore {
    inner: FlakyStore,
    open: Mutex<bool>,
    changed: Condvar,
}

impl GatedStore {
    /// Let blocked and future saves through
    pub fn open_gate(&self) {
        *self.open.lock() = true;
        self.changed.notify_all();
    }

    /// Hold future saves until the gate is opened again
    pub fn close_gate(&self) {
        *self.open.lock() = false;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.inner.save_count()
    }
}

impl ConfigStore for GatedStore {
    fn load(&self) -> Result<Config> {
        self.inner.load()
    }

    fn save(&self, config: &Config) -> Result<()> {
        let mut open = self.open.lock();
        while !*open {
            self.changed.wait(&mut open);
        }
        drop(open);
        if config.tiles.iter().any(|t| t.name == "reject") {
            return Err(QuickLaunchError::Persistence(StringError::new("rejected")));
        }
        self.inner.save(config)
    }
}

/// Release source that always answers with the same release (or none)
pub struct StaticSource {
    release: Option<Release>,
}

impl StaticSource {
    /// Source whose latest release is `version`, or nothing when `None`
    pub fn new(version: Option<&str>) -> Self {
        Self {
            release: version.map(|v| Release {
                version: semver::Version::parse(v).expect("valid test version"),
                html_url: format!("https://example.invalid/releases/v{v}"),
                notes: String::new(),
                assets: Vec::new(),
            }),
        }
    }
}

impl ReleaseSource for StaticSource {
    fn latest_release(&self) -> Result<Option<Release>> {
        Ok(self.release.clone())
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        Err(QuickLaunchError::network(Some(404), StringError::new(url.to_string())))
    }

    fn download(&self, url: &str, _sink: &mut dyn Write, _cancel: &CancelToken) -> Result<u64> {
        Err(QuickLaunchError::network(Some(404), StringError::new(url.to_string())))
    }
}

/// Installer that installs nothing
pub struct NullInstaller;

impl Installer for NullInstaller {
    fn create_staging(&self) -> Result<NamedTempFile> {
        Ok(NamedTempFile::new()?)
    }

    fn apply(&self, _staged: NamedTempFile) -> Result<()> {
        Ok(())
    }

    fn relaunch(&self) -> Result<()> {
        Ok(())
    }
}

/// In-memory start-at-login entry
#[derive(Default)]
pub struct FakeAutoStart {
    enabled: AtomicBool,
    fail: AtomicBool,
}

impl FakeAutoStart {
    /// Make subsequent changes fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl AutoStart for FakeAutoStart {
    fn is_enabled(&self) -> Result<bool> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QuickLaunchError::AutoStart(StringError::new("access denied")));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Executor call: action, target, optional path
pub type ExecutorCall = (ActionKind, String, Option<String>);

/// Executor that records its calls instead of launching anything
#[derive(Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutorCall>>,
}

impl RecordingExecutor {
    /// Calls made so far
    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls.lock().clone()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, kind: ActionKind, target: &str) -> Result<()> {
        self.calls.lock().push((kind, target.to_string(), None));
        Ok(())
    }

    fn execute_with_path(&self, kind: ActionKind, target: &str, path: &str) -> Result<()> {
        self.calls
            .lock()
            .push((kind, target.to_string(), Some(path.to_string())));
        Ok(())
    }
}

/// Folder picker with a fixed answer
pub struct StaticPicker(pub Option<String>);

impl FolderPicker for StaticPicker {
    fn pick_folder(&self) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Assert the dense `0..N-1` order invariant
pub fn assert_dense_order(tiles: &[Tile]) {
    let orders: Vec<usize> = tiles.iter().map(|t| t.order).collect();
    let expected: Vec<usize> = (0..tiles.len()).collect();
    assert_eq!(orders, expected, "order values must be dense and positional");
}

/// Ids in catalog order
pub fn ids(tiles: &[Tile]) -> Vec<String> {
    tiles.iter().map(|t| t.id.clone()).collect()
}
