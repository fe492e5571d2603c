//! Configuration management module
//!
//! This module handles loading, saving, and managing the persisted document:
//! global settings plus the ordered tile catalog. It is always read and
//! written as a whole, with atomic writes to prevent corruption.

pub mod manager;
pub mod models;

pub use manager::{ConfigManager, ConfigStore};
pub use models::{
    ActionKind, Config, PanelPosition, RecentItem, Settings, SettingsPatch, SubMenuType, Theme,
    Tile, TilePatch,
};
