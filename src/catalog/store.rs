//! Tile catalog store
//!
//! Owns the in-memory copy of the configuration document and is the only
//! writer of it. Every mutation runs inside one mutex-guarded critical
//! section: the change is applied to a draft copy, the draft is written
//! through the `ConfigStore`, and only then does the draft replace the live
//! state. A failed write therefore leaves the live state untouched.

use crate::config::models::renumber;
use crate::config::{Config, ConfigStore, Settings, SettingsPatch, Tile, TilePatch};
use crate::error::{QuickLaunchError, Result};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Committed catalog state tagged with the revision that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    /// Number of commits since the store was opened
    pub revision: u64,
    /// Tiles in display order
    pub tiles: Vec<Tile>,
}

struct State {
    config: Config,
    revision: u64,
}

/// Serialized, write-through owner of the tile catalog
pub struct CatalogStore {
    state: Mutex<State>,
    backend: Arc<dyn ConfigStore>,
}

impl CatalogStore {
    /// Load the document from `backend` and take ownership of it
    pub fn open(backend: Arc<dyn ConfigStore>) -> Result<Self> {
        let config = backend.load()?;
        Ok(Self::with_config(config, backend))
    }

    /// Wrap an already loaded document
    pub fn with_config(mut config: Config, backend: Arc<dyn ConfigStore>) -> Self {
        config.normalize();
        Self {
            state: Mutex::new(State {
                config,
                revision: 0,
            }),
            backend,
        }
    }

    /// Current tiles in display order
    pub fn list(&self) -> Vec<Tile> {
        self.state.lock().config.tiles.clone()
    }

    /// Current tiles together with the revision they belong to
    pub fn snapshot(&self) -> CatalogSnapshot {
        let state = self.state.lock();
        CatalogSnapshot {
            revision: state.revision,
            tiles: state.config.tiles.clone(),
        }
    }

    /// A single tile by id
    pub fn tile(&self, id: &str) -> Option<Tile> {
        self.state
            .lock()
            .config
            .tiles
            .iter()
            .find(|tile| tile.id == id)
            .cloned()
    }

    /// The whole document
    pub fn config(&self) -> Config {
        self.state.lock().config.clone()
    }

    /// Global settings
    pub fn settings(&self) -> Settings {
        self.state.lock().config.settings.clone()
    }

    /// Enabled tiles whose name contains `filter` (case-insensitive), in catalog order
    pub fn search(&self, filter: &str) -> Vec<Tile> {
        search_tiles(&self.state.lock().config.tiles, filter)
    }

    /// Append a tile at the end of the catalog
    pub fn add(&self, mut tile: Tile) -> Result<Tile> {
        tile.validate().map_err(QuickLaunchError::Validation)?;

        let added = self.commit(|config| {
            if config.tiles.iter().any(|existing| existing.id == tile.id) {
                return Err(QuickLaunchError::Validation(format!(
                    "a tile with id '{}' already exists",
                    tile.id
                )));
            }
            tile.order = config.tiles.len();
            config.tiles.push(tile.clone());
            Ok(tile)
        })?;

        info!("Tile added: {} ({})", added.name, added.id);
        Ok(added)
    }

    /// Merge `patch` into the tile with `id` and return the merged record
    pub fn update(&self, id: &str, patch: &TilePatch) -> Result<Tile> {
        let updated = self.commit(|config| {
            let tile = find_mut(&mut config.tiles, id)?;
            let mut merged = tile.clone();
            patch.apply_to(&mut merged);
            merged.validate().map_err(QuickLaunchError::Validation)?;
            *tile = merged.clone();
            Ok(merged)
        })?;

        info!("Tile updated: {} ({})", updated.name, updated.id);
        Ok(updated)
    }

    /// Delete the tile with `id`, compacting the order of the rest
    pub fn remove(&self, id: &str) -> Result<Tile> {
        let removed = self.commit(|config| {
            let index = position(&config.tiles, id)?;
            let removed = config.tiles.remove(index);
            renumber(&mut config.tiles);
            Ok(removed)
        })?;

        info!("Tile removed: {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// Move the tile at `from` to position `to`
    pub fn reorder(&self, from: usize, to: usize) -> Result<Vec<Tile>> {
        let tiles = self.commit(|config| {
            let len = config.tiles.len();
            if from >= len || to >= len {
                return Err(QuickLaunchError::Validation(format!(
                    "reorder {from} -> {to} out of range for {len} tiles"
                )));
            }
            let tile = config.tiles.remove(from);
            config.tiles.insert(to, tile);
            renumber(&mut config.tiles);
            Ok(config.tiles.clone())
        })?;

        info!("Tiles reordered: {} -> {}", from, to);
        Ok(tiles)
    }

    /// Persist a complete new ordering given as tile records
    ///
    /// Only the sequence of ids is taken from `tiles`; the stored records are
    /// kept so that a stale list cannot overwrite newer edits.
    pub fn save_tiles(&self, tiles: &[Tile]) -> Result<Vec<Tile>> {
        let ids: Vec<&str> = tiles.iter().map(|tile| tile.id.as_str()).collect();
        self.save_order(&ids)
    }

    /// Persist a complete new ordering given as ids
    pub fn save_order<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Tile>> {
        let tiles = self.commit(|config| {
            let wanted: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
            let current: HashSet<&str> = config.tiles.iter().map(|t| t.id.as_str()).collect();
            if wanted.len() != ids.len() || wanted != current {
                return Err(QuickLaunchError::Validation(
                    "tile list must be a reordering of the current catalog".to_string(),
                ));
            }

            let mut remaining = std::mem::take(&mut config.tiles);
            for id in ids {
                let id: &str = id.as_ref();
                let index = remaining
                    .iter()
                    .position(|tile| tile.id == id)
                    .ok_or_else(|| QuickLaunchError::NotFound(id.to_string()))?;
                config.tiles.push(remaining.swap_remove(index));
            }
            renumber(&mut config.tiles);
            Ok(config.tiles.clone())
        })?;

        info!("Tile order saved ({} tiles)", tiles.len());
        Ok(tiles)
    }

    /// Merge `patch` into the global settings
    ///
    /// Lowering `recentFoldersLimit` does not trim existing recent items; each
    /// tile is trimmed on its next recent-item add.
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings> {
        let settings = self.commit(|config| {
            patch
                .apply_to(&mut config.settings)
                .map_err(QuickLaunchError::Validation)?;
            Ok(config.settings.clone())
        })?;

        info!("Settings updated");
        Ok(settings)
    }

    /// Record the start-at-login flag in the document
    pub fn set_start_with_system(&self, enabled: bool) -> Result<()> {
        self.commit(|config| {
            config.settings.start_with_windows = enabled;
            Ok(())
        })?;
        debug!("startWithWindows set to {}", enabled);
        Ok(())
    }

    /// Run `mutation` on a draft, persist it, then publish it
    ///
    /// The lock is held across the write so mutations never interleave.
    pub(crate) fn commit<T>(&self, mutation: impl FnOnce(&mut Config) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let mut draft = state.config.clone();
        let output = mutation(&mut draft)?;
        self.backend.save(&draft)?;
        state.config = draft;
        state.revision += 1;
        debug!("Catalog committed at revision {}", state.revision);
        Ok(output)
    }
}

/// Enabled tiles from `tiles` whose name contains `filter`, ignoring case
pub fn search_tiles(tiles: &[Tile], filter: &str) -> Vec<Tile> {
    let needle = filter.to_lowercase();
    tiles
        .iter()
        .filter(|tile| tile.enabled && tile.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

fn position(tiles: &[Tile], id: &str) -> Result<usize> {
    tiles
        .iter()
        .position(|tile| tile.id == id)
        .ok_or_else(|| QuickLaunchError::NotFound(id.to_string()))
}

pub(crate) fn find_mut<'a>(tiles: &'a mut [Tile], id: &str) -> Result<&'a mut Tile> {
    tiles
        .iter_mut()
        .find(|tile| tile.id == id)
        .ok_or_else(|| QuickLaunchError::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FlakyStore, assert_dense_order, ids, sample_tile};

    fn store_with(tile_ids: &[&str]) -> (CatalogStore, Arc<FlakyStore>) {
        let backend = Arc::new(FlakyStore::default());
        let store = CatalogStore::open(backend.clone()).unwrap();
        for id in tile_ids {
            store.add(sample_tile(id)).unwrap();
        }
        (store, backend)
    }

    #[test]
    fn test_add_assigns_order_and_persists() {
        let (store, backend) = store_with(&["a", "b"]);
        let tiles = store.list();
        assert_eq!(ids(&tiles), vec!["a", "b"]);
        assert_dense_order(&tiles);
        assert_eq!(backend.save_count(), 2);
        assert_eq!(backend.last_saved().unwrap().tiles, tiles);
    }

    #[test]
    fn test_add_duplicate_id_is_validation_error() {
        let (store, backend) = store_with(&["a"]);
        let before = store.list();

        let result = store.add(sample_tile("a"));
        assert!(matches!(result, Err(QuickLaunchError::Validation(_))));
        assert_eq!(store.list(), before);
        assert_eq!(backend.save_count(), 1);
    }

    #[test]
    fn test_add_blank_name_is_validation_error() {
        let (store, _backend) = store_with(&[]);
        let mut tile = sample_tile("a");
        tile.name = "   ".to_string();
        assert!(matches!(
            store.add(tile),
            Err(QuickLaunchError::Validation(_))
        ));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_update_merges_fields() {
        let (store, _backend) = store_with(&["a", "b"]);
        let patch = TilePatch {
            name: Some("Renamed".to_string()),
            enabled: Some(false),
            ..TilePatch::default()
        };
        let updated = store.update("b", &patch).unwrap();

        assert_eq!(updated.name, "Renamed");
        assert!(!updated.enabled);
        assert_eq!(updated.target, "b.exe");
        assert_eq!(updated.order, 1);
        assert_eq!(store.tile("b").unwrap(), updated);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let (store, _backend) = store_with(&["a"]);
        let result = store.update("zzz", &TilePatch::default());
        assert!(matches!(result, Err(QuickLaunchError::NotFound(id)) if id == "zzz"));
    }

    #[test]
    fn test_update_persistence_failure_keeps_previous_record() {
        let (store, backend) = store_with(&["a"]);
        let before = store.tile("a").unwrap();

        backend.set_failing(true);
        let patch = TilePatch {
            name: Some("Changed".to_string()),
            ..TilePatch::default()
        };
        let result = store.update("a", &patch);

        assert!(matches!(result, Err(QuickLaunchError::Persistence(_))));
        assert_eq!(store.tile("a").unwrap(), before);
        assert_eq!(store.snapshot().revision, 1);
    }

    #[test]
    fn test_remove_persistence_failure_keeps_tile() {
        let (store, backend) = store_with(&["a", "b", "c"]);
        let before = store.list();

        backend.set_failing(true);
        assert!(matches!(
            store.remove("b"),
            Err(QuickLaunchError::Persistence(_))
        ));

        assert_eq!(store.list(), before);
        assert_eq!(store.snapshot().revision, 3);
        assert_eq!(backend.last_saved().unwrap().tiles, before);
    }

    #[test]
    fn test_reorder_persistence_failure_keeps_order() {
        let (store, backend) = store_with(&["A", "B", "C"]);

        backend.set_failing(true);
        assert!(matches!(
            store.reorder(0, 2),
            Err(QuickLaunchError::Persistence(_))
        ));
        assert!(matches!(
            store.save_order(&["C", "B", "A"]),
            Err(QuickLaunchError::Persistence(_))
        ));

        let tiles = store.list();
        assert_eq!(ids(&tiles), vec!["A", "B", "C"]);
        assert_dense_order(&tiles);
        assert_eq!(store.snapshot().revision, 3);
    }

    #[test]
    fn test_remove_compacts_order_preserving_relative_order() {
        let (store, _backend) = store_with(&["a", "b", "c", "d"]);
        let removed = store.remove("b").unwrap();
        assert_eq!(removed.id, "b");

        let tiles = store.list();
        assert_eq!(ids(&tiles), vec!["a", "c", "d"]);
        assert_dense_order(&tiles);
    }

    #[test]
    fn test_remove_unknown_id_is_not_found() {
        let (store, _backend) = store_with(&["a"]);
        assert!(matches!(
            store.remove("nope"),
            Err(QuickLaunchError::NotFound(_))
        ));
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn test_reorder_moves_first_to_last() {
        let (store, _backend) = store_with(&["A", "B", "C"]);
        let tiles = store.reorder(0, 2).unwrap();
        assert_eq!(ids(&tiles), vec!["B", "C", "A"]);
        assert_dense_order(&tiles);
    }

    #[test]
    fn test_reorder_out_of_range() {
        let (store, _backend) = store_with(&["A", "B"]);
        assert!(matches!(
            store.reorder(0, 2),
            Err(QuickLaunchError::Validation(_))
        ));
    }

    #[test]
    fn test_save_tiles_takes_order_but_keeps_stored_records() {
        let (store, _backend) = store_with(&["a", "b", "c"]);
        let mut stale = store.list();
        stale.reverse();
        stale[0].name = "stale edit".to_string();

        let tiles = store.save_tiles(&stale).unwrap();
        assert_eq!(ids(&tiles), vec!["c", "b", "a"]);
        assert_eq!(tiles[0].name, "Tile c");
        assert_dense_order(&tiles);
    }

    #[test]
    fn test_save_order_rejects_non_permutation() {
        let (store, _backend) = store_with(&["a", "b"]);
        assert!(store.save_order(&["a"]).is_err());
        assert!(store.save_order(&["a", "a"]).is_err());
        assert!(store.save_order(&["a", "x"]).is_err());
        assert_eq!(ids(&store.list()), vec!["a", "b"]);
    }

    #[test]
    fn test_search_skips_disabled_tiles() {
        let (store, _backend) = store_with(&["code", "codex", "mail"]);
        store
            .update(
                "codex",
                &TilePatch {
                    enabled: Some(false),
                    ..TilePatch::default()
                },
            )
            .unwrap();

        let found = store.search("CODE");
        assert_eq!(ids(&found), vec!["code"]);
    }

    #[test]
    fn test_update_settings_validates_limit() {
        let (store, _backend) = store_with(&[]);
        let bad = SettingsPatch {
            recent_folders_limit: Some(0),
            ..SettingsPatch::default()
        };
        assert!(store.update_settings(&bad).is_err());

        let good = SettingsPatch {
            recent_folders_limit: Some(3),
            ..SettingsPatch::default()
        };
        assert_eq!(store.update_settings(&good).unwrap().recent_folders_limit, 3);
    }

    #[test]
    fn test_concurrent_adds_keep_order_dense() {
        let (store, _backend) = store_with(&[]);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..5 {
                        store.add(sample_tile(&format!("t{t}-{i}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tiles = store.list();
        assert_eq!(tiles.len(), 40);
        assert_dense_order(&tiles);
        assert_eq!(store.snapshot().revision, 40);
    }

    // Property-based tests using proptest
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add,
            Remove(usize),
            Reorder(usize, usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Add),
                any::<usize>().prop_map(Op::Remove),
                (any::<usize>(), any::<usize>()).prop_map(|(from, to)| Op::Reorder(from, to)),
            ]
        }

        proptest! {
            /// Property: order stays exactly 0..N-1 under any add/remove/reorder sequence
            #[test]
            fn order_stays_dense(ops in prop::collection::vec(op(), 0..40)) {
                let (store, _backend) = store_with(&[]);
                let mut next = 0;
                for op in ops {
                    let len = store.list().len();
                    match op {
                        Op::Add => {
                            store.add(sample_tile(&format!("t{next}"))).unwrap();
                            next += 1;
                        }
                        Op::Remove(i) if len > 0 => {
                            let id = store.list()[i % len].id.clone();
                            store.remove(&id).unwrap();
                        }
                        Op::Reorder(from, to) if len > 0 => {
                            store.reorder(from % len, to % len).unwrap();
                        }
                        _ => {}
                    }
                    assert_dense_order(&store.list());
                }
            }

            /// Property: remove never changes the relative order of the remaining tiles
            #[test]
            fn remove_preserves_relative_order(count in 1usize..12, pick in any::<usize>()) {
                let names: Vec<String> = (0..count).map(|i| format!("t{i}")).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let (store, _backend) = store_with(&refs);

                let victim = names[pick % count].clone();
                store.remove(&victim).unwrap();

                let expected: Vec<String> = names.into_iter().filter(|n| *n != victim).collect();
                prop_assert_eq!(ids(&store.list()), expected);
            }

            /// Property: save_order accepts every permutation and applies it verbatim
            #[test]
            fn save_order_applies_any_permutation(
                order in Just((0..6).map(|i| format!("t{i}")).collect::<Vec<_>>()).prop_shuffle()
            ) {
                let (store, _backend) = store_with(&["t0", "t1", "t2", "t3", "t4", "t5"]);
                let tiles = store.save_order(order.as_slice()).unwrap();
                prop_assert_eq!(ids(&tiles), order);
                assert_dense_order(&tiles);
            }
        }
    }
}
