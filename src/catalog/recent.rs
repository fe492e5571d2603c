//! Per-tile recent item ring
//!
//! Each tile keeps its recently used sub-targets most-recent-first. Adding a
//! path that is already present promotes it to the front instead of
//! duplicating it, and the list is truncated to `recentFoldersLimit`.
//!
//! The limit is applied only when an item is added. Lowering the global
//! setting leaves longer lists alone until that tile's next add, so changing
//! a setting never rewrites unrelated tiles.
//!
//! Paths are compared case-sensitively after trimming trailing `/` and `\`
//! separators (a bare root such as `/` or `C:\` is kept as is). No other
//! normalization is done; see `DESIGN.md` for the rationale.

use crate::catalog::store::{CatalogStore, find_mut};
use crate::config::{RecentItem, Tile};
use crate::error::{QuickLaunchError, Result};
use chrono::{DateTime, Utc};
use tracing::info;

/// Which tiles `clear_recent_items` empties
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClearTarget {
    /// One tile by id
    Tile(String),
    /// Every tile in the catalog
    All,
}

impl ClearTarget {
    /// Interpret the external argument form where an empty id means "all"
    pub fn from_arg(tile_id: &str) -> Self {
        if tile_id.is_empty() {
            Self::All
        } else {
            Self::Tile(tile_id.to_string())
        }
    }
}

/// Comparison key for a recent-item path
pub fn path_key(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() || trimmed.ends_with(':') {
        path
    } else {
        trimmed
    }
}

/// Whether two recent-item paths name the same target
pub fn same_path(a: &str, b: &str) -> bool {
    path_key(a) == path_key(b)
}

/// Promote-or-insert `item` at the front of `items`, then truncate to `limit`
pub fn push_recent(items: &mut Vec<RecentItem>, item: RecentItem, limit: usize) {
    items.retain(|existing| !same_path(&existing.path, &item.path));
    items.insert(0, item);
    items.truncate(limit.max(1));
}

impl CatalogStore {
    /// Record `path` as the most recent item of tile `tile_id`
    pub fn add_recent_item(&self, tile_id: &str, path: &str, name: &str) -> Result<Tile> {
        self.add_recent_item_at(tile_id, path, name, Utc::now())
    }

    /// Same as [`CatalogStore::add_recent_item`] with an explicit timestamp
    pub fn add_recent_item_at(
        &self,
        tile_id: &str,
        path: &str,
        name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Tile> {
        if path.trim().is_empty() {
            return Err(QuickLaunchError::Validation(
                "recent item path must not be empty".to_string(),
            ));
        }

        let tile = self.commit(|config| {
            let limit = config.settings.recent_folders_limit;
            let tile = find_mut(&mut config.tiles, tile_id)?;
            let item = RecentItem {
                path: path.to_string(),
                name: name.to_string(),
                timestamp,
            };
            push_recent(&mut tile.sub_menu_items, item, limit);
            Ok(tile.clone())
        })?;

        info!(
            "Recent item added to tile {}: {} ({} entries)",
            tile_id,
            path,
            tile.sub_menu_items.len()
        );
        Ok(tile)
    }

    /// Empty the recent items of one tile or of every tile
    pub fn clear_recent_items(&self, target: &ClearTarget) -> Result<()> {
        self.commit(|config| {
            match target {
                ClearTarget::Tile(id) => find_mut(&mut config.tiles, id)?.sub_menu_items.clear(),
                ClearTarget::All => config
                    .tiles
                    .iter_mut()
                    .for_each(|tile| tile.sub_menu_items.clear()),
            }
            Ok(())
        })?;

        match target {
            ClearTarget::Tile(id) => info!("Recent items cleared for tile {}", id),
            ClearTarget::All => info!("Recent items cleared for all tiles"),
        }
        Ok(())
    }
}
