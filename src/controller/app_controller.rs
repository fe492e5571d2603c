//! Application controller implementation
//!
//! `AppController` is the single entry point the front end talks to. It
//! owns no state of its own beyond panel visibility: tile mutations go
//! through the [`SyncBridge`], update operations through the
//! [`UpdateManager`], and start-at-login through an [`AutoStart`].

use crate::catalog::{self, CatalogStore, ClearTarget};
use crate::config::{Config, Settings, SettingsPatch, Tile, TilePatch};
use crate::controller::collaborators::{Executor, FolderPicker};
use crate::error::{QuickLaunchError, Result, StringError};
use crate::events::{AppEvent, EventBus};
use crate::sync::SyncBridge;
use crate::update::{UpdateInfo, UpdateManager, UpdateSnapshot};
use crate::utils::autostart::AutoStart;
use crate::version::{VERSION, VersionInfo};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

/// Delay before the startup update check so the UI can settle first
pub const STARTUP_CHECK_DELAY: Duration = Duration::from_secs(3);

/// Front-end facade over the catalog, updates and OS integration
pub struct AppController {
    /// Optimistic view over the catalog store
    bridge: SyncBridge,
    /// Update lifecycle
    updates: Arc<UpdateManager>,
    /// OS start-at-login entry
    autostart: Box<dyn AutoStart>,
    /// Broadcast channel to the front end
    events: EventBus,
    /// Launches tile targets, if the host provides one
    executor: Option<Arc<dyn Executor>>,
    /// Directory chooser, if the host provides one
    folder_picker: Option<Arc<dyn FolderPicker>>,
    /// Whether the panel is currently shown
    panel_visible: AtomicBool,
}

impl AppController {
    /// Create a controller over an opened catalog store
    pub fn new(
        store: Arc<CatalogStore>,
        updates: UpdateManager,
        autostart: Box<dyn AutoStart>,
        events: EventBus,
    ) -> Self {
        Self {
            bridge: SyncBridge::new(store),
            updates: Arc::new(updates),
            autostart,
            events,
            executor: None,
            folder_picker: None,
            panel_visible: AtomicBool::new(false),
        }
    }

    /// Use `executor` to launch tiles
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Use `picker` for folder selection
    #[must_use]
    pub fn with_folder_picker(mut self, picker: Arc<dyn FolderPicker>) -> Self {
        self.folder_picker = Some(picker);
        self
    }

    /// Optimistic catalog view, for callers that want non-blocking mutations
    pub fn bridge(&self) -> &SyncBridge {
        &self.bridge
    }

    /// Update lifecycle, for callers that want cancellable tasks
    pub fn updates(&self) -> &UpdateManager {
        &self.updates
    }

    fn store(&self) -> &CatalogStore {
        self.bridge.store()
    }

    // --- Tiles ---

    /// All tiles in display order
    pub fn get_tiles(&self) -> Vec<Tile> {
        self.bridge.view()
    }

    /// Enabled tiles whose name contains `filter`, from the same view as [`Self::get_tiles`]
    pub fn search_tiles(&self, filter: &str) -> Vec<Tile> {
        catalog::search_tiles(&self.bridge.view(), filter)
    }

    /// Append a tile
    pub fn add_tile(&self, tile: Tile) -> Result<Tile> {
        self.bridge.add_tile(tile).wait()
    }

    /// Merge `patch` into the tile with `id`
    pub fn update_tile(&self, id: &str, patch: TilePatch) -> Result<Tile> {
        self.bridge.update_tile(id, patch).wait()
    }

    /// Delete the tile with `id`
    pub fn remove_tile(&self, id: &str) -> Result<Tile> {
        self.bridge.remove_tile(id).wait()
    }

    /// Move the tile at `from` to `to`
    pub fn reorder_tiles(&self, from: usize, to: usize) -> Result<Vec<Tile>> {
        self.bridge.reorder(from, to).wait()
    }

    /// Persist the ordering of `tiles`
    pub fn save_tiles(&self, tiles: &[Tile]) -> Result<Vec<Tile>> {
        self.bridge.save_tiles(tiles).wait()
    }

    /// Record `path` as the most recent item of `tile_id`
    pub fn add_recent_item(&self, tile_id: &str, path: &str, name: &str) -> Result<Tile> {
        self.bridge.add_recent_item(tile_id, path, name).wait()
    }

    /// Clear recent items of `tile_id`, or of every tile when it is empty
    pub fn clear_recent_items(&self, tile_id: &str) -> Result<()> {
        self.bridge
            .clear_recent_items(ClearTarget::from_arg(tile_id))
            .wait()
    }

    /// Run the tile's action, optionally in the context of `path`
    ///
    /// A successful launch of a recent-folders tile with a path records that
    /// path as its most recent item.
    pub fn launch_tile(&self, id: &str, path: Option<&str>) -> Result<()> {
        use tracing::{info, warn};

        let tile = self
            .bridge
            .tile(id)
            .ok_or_else(|| QuickLaunchError::NotFound(id.to_string()))?;
        if !tile.enabled {
            return Err(QuickLaunchError::Validation(format!(
                "tile '{}' is disabled",
                tile.name
            )));
        }
        let executor = self.executor.as_ref().ok_or_else(|| {
            QuickLaunchError::Collaborator(StringError::new("no executor configured"))
        })?;

        match path {
            Some(path) => executor.execute_with_path(tile.action, &tile.target, path)?,
            None => executor.execute(tile.action, &tile.target)?,
        }
        info!("Launched tile {} ({})", tile.name, tile.action);

        if let Some(path) = path
            && tile.tracks_recent_folders()
        {
            let name = std::path::Path::new(path.trim_end_matches(['/', '\\']))
                .file_name()
                .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
            if let Err(e) = self.add_recent_item(id, path, &name) {
                warn!("Launched but failed to record recent item: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Ask the user for a folder and launch the tile with it
    ///
    /// Returns the chosen folder, or `None` when the dialog was dismissed.
    pub fn pick_folder_for_tile(&self, id: &str) -> Result<Option<String>> {
        let picker = self.folder_picker.as_ref().ok_or_else(|| {
            QuickLaunchError::Collaborator(StringError::new("no folder picker configured"))
        })?;
        let Some(folder) = picker.pick_folder()? else {
            return Ok(None);
        };
        self.launch_tile(id, Some(&folder))?;
        Ok(Some(folder))
    }

    // --- Settings ---

    /// The whole persisted document
    pub fn get_config(&self) -> Config {
        self.store().config()
    }

    /// Merge `patch` into the global settings
    pub fn update_config(&self, patch: &SettingsPatch) -> Result<Settings> {
        self.store().update_settings(patch)
    }

    /// Whether updates are checked at startup
    pub fn get_check_for_updates_on_startup(&self) -> bool {
        self.store().settings().check_for_updates_on_startup
    }

    /// Whether the OS entry for start-at-login exists
    pub fn get_auto_start_enabled(&self) -> Result<bool> {
        self.autostart.is_enabled()
    }

    /// Change the OS start-at-login entry, then record the choice
    pub fn set_auto_start(&self, enabled: bool) -> Result<()> {
        self.autostart.set_enabled(enabled)?;
        self.store().set_start_with_system(enabled)
    }

    // --- Version and updates ---

    /// Running version
    pub fn get_version(&self) -> &'static str {
        VERSION
    }

    /// Running version with commit and build time
    pub fn get_version_info(&self) -> VersionInfo {
        VersionInfo::current()
    }

    /// Check for a newer release and wait for the answer
    pub fn check_for_update(&self) -> Result<UpdateInfo> {
        self.updates.check_for_update()
    }

    /// Download, verify and install the newest release
    pub fn download_and_apply_update(&self) -> Result<String> {
        self.updates.download_and_apply()
    }

    /// Update lifecycle state for the settings view
    pub fn update_status(&self) -> UpdateSnapshot {
        self.updates.snapshot()
    }

    /// Clear a failed update so it can be retried
    pub fn reset_update(&self) -> Result<()> {
        self.updates.reset()
    }

    /// Start the installed update and exit this process
    ///
    /// Only returns when the restart could not be started.
    pub fn restart_app(&self) -> Result<Infallible> {
        use tracing::info;

        self.updates.restart_app()?;
        info!("Exiting for restart");
        std::process::exit(0)
    }

    /// Check for updates in the background if the setting asks for it
    ///
    /// Waits `delay` first. A found update is broadcast as
    /// [`AppEvent::UpdateAvailable`]; failures are only logged.
    pub fn spawn_startup_update_check(&self, delay: Duration) -> Option<JoinHandle<()>> {
        use tracing::{debug, info, warn};

        if !self.get_check_for_updates_on_startup() {
            debug!("Startup update check disabled");
            return None;
        }

        let updates = Arc::clone(&self.updates);
        let events = self.events.clone();
        let spawned = std::thread::Builder::new()
            .name("startup-update-check".to_string())
            .spawn(move || {
                std::thread::sleep(delay);
                match updates.check_for_update() {
                    Ok(info) if info.available => {
                        info!("Startup check found version {}", info.latest_version);
                        events.emit(&AppEvent::UpdateAvailable(info));
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Startup update check failed: {}", e),
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to start update check thread: {}", e);
                None
            }
        }
    }

    // --- Panel and events ---

    /// Receive events emitted from now on
    pub fn subscribe(&self) -> mpsc::Receiver<AppEvent> {
        self.events.subscribe()
    }

    /// Show the panel
    pub fn show_panel(&self) {
        self.panel_visible.store(true, Ordering::SeqCst);
        self.events.emit(&AppEvent::PanelShow);
    }

    /// Hide the panel
    pub fn hide_panel(&self) {
        self.panel_visible.store(false, Ordering::SeqCst);
        self.events.emit(&AppEvent::PanelHide);
    }

    /// Show the panel on `view`
    pub fn show_panel_with_view(&self, view: &str) {
        self.panel_visible.store(true, Ordering::SeqCst);
        self.events.emit(&AppEvent::PanelShowView(view.to_string()));
    }

    /// Flip panel visibility
    pub fn toggle_panel(&self) {
        if self.is_panel_visible() {
            self.hide_panel();
        } else {
            self.show_panel();
        }
    }

    /// Whether the panel is shown
    pub fn is_panel_visible(&self) -> bool {
        self.panel_visible.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        FakeAutoStart, FlakyStore, GatedStore, NullInstaller, RecordingExecutor, StaticPicker,
        StaticSource, ids, sample_tile,
    };
    use crate::update::UpdateStatus;
    use semver::Version;

    struct Harness {
        controller: AppController,
        backend: Arc<FlakyStore>,
        executor: Arc<RecordingExecutor>,
        autostart: Arc<FakeAutoStart>,
    }

    fn harness(latest: Option<&str>) -> Harness {
        let backend = Arc::new(FlakyStore::default());
        let store = Arc::new(CatalogStore::open(backend.clone()).unwrap());
        let events = EventBus::new();
        let updates = UpdateManager::new(
            Version::new(1, 0, 0),
            Arc::new(StaticSource::new(latest)),
            Arc::new(NullInstaller),
            events.clone(),
        );
        let executor = Arc::new(RecordingExecutor::default());
        let autostart = Arc::new(FakeAutoStart::default());
        let controller = AppController::new(store, updates, Box::new(autostart.clone()), events)
            .with_executor(executor.clone())
            .with_folder_picker(Arc::new(StaticPicker(Some("/srv/projects".to_string()))));
        Harness {
            controller,
            backend,
            executor,
            autostart,
        }
    }

    #[test]
    fn test_tile_crud_through_facade() {
        let h = harness(None);
        h.controller.add_tile(sample_tile("a")).unwrap();
        h.controller.add_tile(sample_tile("b")).unwrap();
        h.controller.add_tile(sample_tile("c")).unwrap();

        h.controller.reorder_tiles(0, 2).unwrap();
        assert_eq!(ids(&h.controller.get_tiles()), vec!["b", "c", "a"]);

        h.controller.remove_tile("c").unwrap();
        assert_eq!(ids(&h.controller.get_tiles()), vec!["b", "a"]);
        assert_eq!(h.backend.last_saved().unwrap().tiles, h.controller.get_tiles());
    }

    #[test]
    fn test_search_sees_tiles_still_being_saved() {
        let backend = Arc::new(GatedStore::default());
        backend.open_gate();
        let store = Arc::new(CatalogStore::open(backend.clone()).unwrap());
        store.add(sample_tile("mail")).unwrap();
        let updates = UpdateManager::new(
            Version::new(1, 0, 0),
            Arc::new(StaticSource::new(None)),
            Arc::new(NullInstaller),
            EventBus::new(),
        );
        let controller = AppController::new(
            store,
            updates,
            Box::new(Arc::new(FakeAutoStart::default())),
            EventBus::new(),
        );

        backend.close_gate();
        let mut terminal = sample_tile("term");
        terminal.name = "Terminal".to_string();
        let pending = controller.bridge().add_tile(terminal);

        let found = controller.search_tiles("TERM");
        assert_eq!(ids(&found), vec!["term"]);
        assert_eq!(ids(&controller.get_tiles()), vec!["mail", "term"]);

        backend.open_gate();
        pending.wait().unwrap();
        assert_eq!(ids(&controller.search_tiles("term")), vec!["term"]);
    }

    #[test]
    fn test_search_matches_get_tiles_filtering() {
        let h = harness(None);
        h.controller.add_tile(sample_tile("code")).unwrap();
        h.controller.add_tile(sample_tile("codex")).unwrap();
        h.controller.add_tile(sample_tile("mail")).unwrap();
        let patch = TilePatch {
            enabled: Some(false),
            ..TilePatch::default()
        };
        h.controller.update_tile("codex", patch).unwrap();

        assert_eq!(ids(&h.controller.search_tiles("tile CODE")), vec!["code"]);
        assert_eq!(h.controller.search_tiles("").len(), 2);
    }

    #[test]
    fn test_update_tile_with_full_record() {
        let h = harness(None);
        h.controller.add_tile(sample_tile("a")).unwrap();

        let mut edited = sample_tile("a");
        edited.name = "Editor".to_string();
        let updated = h.controller.update_tile("a", edited.into()).unwrap();
        assert_eq!(updated.name, "Editor");
    }

    #[test]
    fn test_persistence_failure_surfaces_and_keeps_view() {
        let h = harness(None);
        h.controller.add_tile(sample_tile("a")).unwrap();
        h.backend.set_failing(true);

        let patch = TilePatch {
            name: Some("Changed".to_string()),
            ..TilePatch::default()
        };
        assert!(matches!(
            h.controller.update_tile("a", patch),
            Err(QuickLaunchError::Persistence(_))
        ));
        assert_eq!(h.controller.get_tiles()[0].name, "Tile a");
    }

    #[test]
    fn test_launch_recent_folders_tile_records_path() {
        let h = harness(None);
        h.controller
            .add_tile(sample_tile("explorer").with_recent_folders())
            .unwrap();

        h.controller
            .launch_tile("explorer", Some("/home/me/notes/"))
            .unwrap();

        let tile = &h.controller.get_tiles()[0];
        assert_eq!(tile.sub_menu_items.len(), 1);
        assert_eq!(tile.sub_menu_items[0].name, "notes");
        assert_eq!(h.executor.calls().len(), 1);
    }

    #[test]
    fn test_launch_disabled_tile_is_refused() {
        let h = harness(None);
        let mut tile = sample_tile("a");
        tile.enabled = false;
        h.controller.add_tile(tile).unwrap();

        assert!(matches!(
            h.controller.launch_tile("a", None),
            Err(QuickLaunchError::Validation(_))
        ));
        assert!(h.executor.calls().is_empty());
    }

    #[test]
    fn test_pick_folder_launches_with_choice() {
        let h = harness(None);
        h.controller
            .add_tile(sample_tile("term").with_recent_folders())
            .unwrap();

        let picked = h.controller.pick_folder_for_tile("term").unwrap();
        assert_eq!(picked.as_deref(), Some("/srv/projects"));
        assert_eq!(
            h.executor.calls()[0].2.as_deref(),
            Some("/srv/projects")
        );
    }

    #[test]
    fn test_clear_recent_items_empty_id_means_all() {
        let h = harness(None);
        h.controller.add_tile(sample_tile("a")).unwrap();
        h.controller.add_tile(sample_tile("b")).unwrap();
        h.controller.add_recent_item("a", "/x", "x").unwrap();
        h.controller.add_recent_item("b", "/y", "y").unwrap();

        h.controller.clear_recent_items("").unwrap();
        assert!(h.controller.get_tiles().iter().all(|t| t.sub_menu_items.is_empty()));
    }

    #[test]
    fn test_set_auto_start_updates_os_then_document() {
        let h = harness(None);
        h.controller.set_auto_start(true).unwrap();
        assert!(h.controller.get_auto_start_enabled().unwrap());
        assert!(h.controller.get_config().settings.start_with_windows);

        h.autostart.set_failing(true);
        assert!(h.controller.set_auto_start(false).is_err());
        assert!(h.controller.get_config().settings.start_with_windows);
    }

    #[test]
    fn test_startup_check_emits_update_available() {
        let h = harness(Some("1.1.0"));
        let rx = h.controller.subscribe();

        let handle = h
            .controller
            .spawn_startup_update_check(Duration::ZERO)
            .unwrap();
        handle.join().unwrap();

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            AppEvent::UpdateAvailable(info) => assert_eq!(info.latest_version, "1.1.0"),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(h.controller.update_status().status, UpdateStatus::Available);
    }

    #[test]
    fn test_startup_check_respects_setting() {
        let h = harness(Some("1.1.0"));
        h.controller
            .update_config(&SettingsPatch {
                check_for_updates_on_startup: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert!(h.controller.spawn_startup_update_check(Duration::ZERO).is_none());
    }

    #[test]
    fn test_panel_events() {
        let h = harness(None);
        let rx = h.controller.subscribe();

        h.controller.toggle_panel();
        assert!(h.controller.is_panel_visible());
        h.controller.toggle_panel();
        h.controller.show_panel_with_view("settings");

        let names: Vec<&str> = rx.try_iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["panel:show", "panel:hide", "panel:show:view"]);
    }

    #[test]
    fn test_restart_outside_ready_is_rejected() {
        let h = harness(None);
        assert!(matches!(
            h.controller.restart_app(),
            Err(QuickLaunchError::InvalidState { .. })
        ));
    }
}
