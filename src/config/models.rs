//! Configuration data models
//!
//! This module defines the data structures persisted in `config.json`: the
//! global settings and the ordered tile catalog. Field names are camelCase on
//! disk so documents written by earlier releases keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Default bound for a tile's recent-item list
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// What the external executor does with a tile's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Launch an application (optionally with a path argument)
    App,
    /// Open a folder in the file manager
    Folder,
    /// Open a URL in the default browser
    Url,
    /// Run a PowerShell command
    Powershell,
}

impl ActionKind {
    /// Wire name passed to the executor
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Folder => "folder",
            Self::Url => "url",
            Self::Powershell => "powershell",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "app" => Ok(Self::App),
            "folder" => Ok(Self::Folder),
            "url" => Ok(Self::Url),
            "powershell" => Ok(Self::Powershell),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}

/// Kind of sub-menu a tile exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubMenuType {
    /// Recently used folders, maintained by the recent-item ring
    RecentFolders,
    /// User-defined entries
    Custom,
}

/// A remembered sub-target of a tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentItem {
    /// Path handed to the executor
    pub path: String,
    /// Display label
    pub name: String,
    /// Instant of last use
    pub timestamp: DateTime<Utc>,
}

impl RecentItem {
    /// Create an entry stamped with the current time
    pub fn now(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            timestamp: Utc::now(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One launchable entry in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    /// Opaque unique identifier, immutable after creation
    pub id: String,
    /// Display label
    pub name: String,
    /// Symbolic icon name, resolved by the UI
    #[serde(default)]
    pub icon: String,
    /// How the target is executed
    pub action: ActionKind,
    /// Command, path, or URL
    pub target: String,
    /// Extra launch arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory for the launched process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
    /// Whether the tile opens a sub-menu
    #[serde(default)]
    pub has_sub_menu: bool,
    /// Sub-menu discriminator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_menu_type: Option<SubMenuType>,
    /// Recent items, most recent first
    #[serde(default)]
    pub sub_menu_items: Vec<RecentItem>,
    /// Position among sibling tiles
    #[serde(default)]
    pub order: usize,
    /// Disabled tiles are kept but never executed or searched
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Display colour override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Tile {
    /// Create an enabled tile with no sub-menu
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        action: ActionKind,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: String::new(),
            action,
            target: target.into(),
            args: Vec::new(),
            work_dir: None,
            has_sub_menu: false,
            sub_menu_type: None,
            sub_menu_items: Vec::new(),
            order: 0,
            enabled: true,
            color: None,
        }
    }

    /// Builder helper enabling the recent-folders sub-menu
    #[must_use]
    pub fn with_recent_folders(mut self) -> Self {
        self.has_sub_menu = true;
        self.sub_menu_type = Some(SubMenuType::RecentFolders);
        self
    }

    /// Whether this tile records recent folders when launched with a path
    pub fn tracks_recent_folders(&self) -> bool {
        self.has_sub_menu && self.sub_menu_type == Some(SubMenuType::RecentFolders)
    }

    /// Check the fields every tile must carry
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("tile id must not be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("tile name must not be empty".to_string());
        }
        if self.target.trim().is_empty() {
            return Err("tile target must not be empty".to_string());
        }
        Ok(())
    }
}

/// Field-level partial update of a tile
///
/// `None` leaves a field unchanged. For optional fields the inner `Option`
/// distinguishes "clear" (`Some(None)`) from "set" (`Some(Some(v))`).
/// `id`, `order` and the recent items are owned by the catalog and cannot be patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TilePatch {
    /// New display label
    pub name: Option<String>,
    /// New icon name
    pub icon: Option<String>,
    /// New action kind
    pub action: Option<ActionKind>,
    /// New target
    pub target: Option<String>,
    /// New argument list
    pub args: Option<Vec<String>>,
    /// New working directory
    pub work_dir: Option<Option<String>>,
    /// New sub-menu flag
    pub has_sub_menu: Option<bool>,
    /// New sub-menu type
    pub sub_menu_type: Option<Option<SubMenuType>>,
    /// New enabled flag
    pub enabled: Option<bool>,
    /// New colour override
    pub color: Option<Option<String>>,
}

impl TilePatch {
    /// True if applying the patch changes nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the provided fields into `tile`
    pub fn apply_to(&self, tile: &mut Tile) {
        if let Some(name) = &self.name {
            tile.name.clone_from(name);
        }
        if let Some(icon) = &self.icon {
            tile.icon.clone_from(icon);
        }
        if let Some(action) = self.action {
            tile.action = action;
        }
        if let Some(target) = &self.target {
            tile.target.clone_from(target);
        }
        if let Some(args) = &self.args {
            tile.args.clone_from(args);
        }
        if let Some(work_dir) = &self.work_dir {
            tile.work_dir.clone_from(work_dir);
        }
        if let Some(has_sub_menu) = self.has_sub_menu {
            tile.has_sub_menu = has_sub_menu;
        }
        if let Some(sub_menu_type) = self.sub_menu_type {
            tile.sub_menu_type = sub_menu_type;
        }
        if let Some(enabled) = self.enabled {
            tile.enabled = enabled;
        }
        if let Some(color) = &self.color {
            tile.color.clone_from(color);
        }
    }
}

impl From<Tile> for TilePatch {
    /// Patch that overwrites every editable field with the values of `tile`
    fn from(tile: Tile) -> Self {
        Self {
            name: Some(tile.name),
            icon: Some(tile.icon),
            action: Some(tile.action),
            target: Some(tile.target),
            args: Some(tile.args),
            work_dir: Some(tile.work_dir),
            has_sub_menu: Some(tile.has_sub_menu),
            sub_menu_type: Some(tile.sub_menu_type),
            enabled: Some(tile.enabled),
            color: Some(tile.color),
        }
    }
}

/// Colour scheme of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Dark scheme
    Dark,
    /// Light scheme
    Light,
    /// Follow the operating system
    System,
}

/// Screen edge the panel docks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPosition {
    /// Left screen edge
    Left,
    /// Right screen edge
    Right,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            "system" => Ok(Self::System),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

impl std::str::FromStr for PanelPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown panel position: {other}")),
        }
    }
}

/// Global settings stored alongside the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Colour scheme
    pub theme: Theme,
    /// Hotkey descriptor, e.g. `Ctrl+Space`
    pub hotkey: String,
    /// Docking edge
    pub position: PanelPosition,
    /// Whether show/hide is animated
    pub animation: bool,
    /// Whether the background is blurred
    pub blur: bool,
    /// Mirror of the OS start-at-login entry
    pub start_with_windows: bool,
    /// Whether to check for updates when the application starts
    pub check_for_updates_on_startup: bool,
    /// Maximum recent items kept per tile, applied at write time
    pub recent_folders_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            hotkey: "Ctrl+Space".to_string(),
            position: PanelPosition::Left,
            animation: true,
            blur: true,
            start_with_windows: false,
            check_for_updates_on_startup: true,
            recent_folders_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

/// Partial update of the global settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    /// New colour scheme
    pub theme: Option<Theme>,
    /// New hotkey descriptor
    pub hotkey: Option<String>,
    /// New docking edge
    pub position: Option<PanelPosition>,
    /// New animation flag
    pub animation: Option<bool>,
    /// New blur flag
    pub blur: Option<bool>,
    /// New recent-item bound (must be at least 1)
    pub recent_folders_limit: Option<usize>,
    /// New startup update check flag
    pub check_for_updates_on_startup: Option<bool>,
}

impl SettingsPatch {
    /// Merge into `settings`, rejecting a zero recent-item bound
    pub fn apply_to(&self, settings: &mut Settings) -> std::result::Result<(), String> {
        if self.recent_folders_limit == Some(0) {
            return Err("recentFoldersLimit must be at least 1".to_string());
        }
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(hotkey) = &self.hotkey {
            settings.hotkey.clone_from(hotkey);
        }
        if let Some(position) = self.position {
            settings.position = position;
        }
        if let Some(animation) = self.animation {
            settings.animation = animation;
        }
        if let Some(blur) = self.blur {
            settings.blur = blur;
        }
        if let Some(limit) = self.recent_folders_limit {
            settings.recent_folders_limit = limit;
        }
        if let Some(check) = self.check_for_updates_on_startup {
            settings.check_for_updates_on_startup = check;
        }
        Ok(())
    }
}

/// The persisted document: settings plus the ordered catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Global settings, flattened into the top-level object
    #[serde(flatten)]
    pub settings: Settings,
    /// Tiles in display order
    pub tiles: Vec<Tile>,
}

impl Config {
    /// Restore the catalog invariants on a freshly loaded document
    ///
    /// Sorts tiles by their stored `order` (stable), drops later duplicates of an
    /// id, renumbers `order` densely, and clamps a zero recent-item bound.
    pub fn normalize(&mut self) {
        self.tiles.sort_by_key(|tile| tile.order);

        let mut seen = HashSet::new();
        self.tiles.retain(|tile| {
            let first = seen.insert(tile.id.clone());
            if !first {
                warn!("Dropping duplicate tile id '{}' from configuration", tile.id);
            }
            first
        });

        renumber(&mut self.tiles);

        if self.settings.recent_folders_limit == 0 {
            warn!("recentFoldersLimit of 0 in configuration, using default");
            self.settings.recent_folders_limit = DEFAULT_RECENT_LIMIT;
        }
    }
}

/// Assign `order = position` to every tile
pub fn renumber(tiles: &mut [Tile]) {
    for (index, tile) in tiles.iter_mut().enumerate() {
        tile.order = index;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.tiles.is_empty());
        assert_eq!(config.settings.recent_folders_limit, 5);
        assert_eq!(config.settings.hotkey, "Ctrl+Space");
        assert!(config.settings.check_for_updates_on_startup);
    }

    #[test]
    fn test_document_layout_is_flat_camel_case() {
        let mut config = Config::default();
        config
            .tiles
            .push(Tile::new("t1", "Terminal", ActionKind::App, "wt.exe").with_recent_folders());
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["theme"], "dark");
        assert_eq!(value["recentFoldersLimit"], 5);
        assert_eq!(value["checkForUpdatesOnStartup"], true);
        assert_eq!(value["startWithWindows"], false);
        assert_eq!(value["tiles"][0]["hasSubMenu"], true);
        assert_eq!(value["tiles"][0]["subMenuType"], "recent-folders");
        assert_eq!(value["tiles"][0]["action"], "app");
        assert!(value.get("settings").is_none());
    }

    #[test]
    fn test_old_document_fills_missing_fields_with_defaults() {
        let json = r#"{
            "theme": "light",
            "hotkey": "Alt+Space",
            "recentFolders": [],
            "tiles": [
                {"id": "a", "name": "Docs", "action": "folder", "target": "C:\\Docs", "order": 0}
            ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.settings.theme, Theme::Light);
        assert_eq!(config.settings.hotkey, "Alt+Space");
        assert_eq!(config.settings.recent_folders_limit, 5);
        assert!(config.settings.check_for_updates_on_startup);
        assert!(config.tiles[0].enabled);
        assert!(config.tiles[0].sub_menu_items.is_empty());
    }

    #[test]
    fn test_normalize_sorts_dedups_and_renumbers() {
        let mut a = Tile::new("a", "A", ActionKind::App, "a.exe");
        a.order = 7;
        let mut b = Tile::new("b", "B", ActionKind::App, "b.exe");
        b.order = 2;
        let mut dup = Tile::new("b", "B again", ActionKind::App, "b2.exe");
        dup.order = 9;

        let mut config = Config {
            settings: Settings {
                recent_folders_limit: 0,
                ..Settings::default()
            },
            tiles: vec![a, b, dup],
        };
        config.normalize();

        let ids: Vec<_> = config.tiles.iter().map(|t| (t.id.as_str(), t.order)).collect();
        assert_eq!(ids, vec![("b", 0), ("a", 1)]);
        assert_eq!(config.tiles[0].name, "B");
        assert_eq!(config.settings.recent_folders_limit, DEFAULT_RECENT_LIMIT);
    }

    #[test]
    fn test_patch_merges_only_given_fields() {
        let mut tile = Tile::new("t", "Old", ActionKind::Url, "https://example.com");
        tile.color = Some("#ff0000".to_string());

        let patch = TilePatch {
            name: Some("New".to_string()),
            color: Some(None),
            ..TilePatch::default()
        };
        patch.apply_to(&mut tile);

        assert_eq!(tile.name, "New");
        assert_eq!(tile.target, "https://example.com");
        assert_eq!(tile.color, None);
        assert!(TilePatch::default().is_empty());
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_tile_validation() {
        assert!(Tile::new("x", "X", ActionKind::App, "x.exe").validate().is_ok());
        assert!(Tile::new(" ", "X", ActionKind::App, "x.exe").validate().is_err());
        assert!(Tile::new("x", "", ActionKind::App, "x.exe").validate().is_err());
        assert!(Tile::new("x", "X", ActionKind::App, "  ").validate().is_err());
    }

    #[test]
    fn test_settings_patch_rejects_zero_limit() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            recent_folders_limit: Some(0),
            theme: Some(Theme::Light),
            ..SettingsPatch::default()
        };
        assert!(patch.apply_to(&mut settings).is_err());
        assert_eq!(settings.theme, Theme::Dark);
    }

    #[test]
    fn test_action_kind_parse() {
        assert_eq!("URL".parse::<ActionKind>(), Ok(ActionKind::Url));
        assert!("shell".parse::<ActionKind>().is_err());
    }
}
