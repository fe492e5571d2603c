//! Optimistic front end to the catalog store
//!
//! A caller-facing view of the catalog is kept in memory. Each mutation gets
//! a transaction id, is applied to the view immediately, and is then run
//! against [`CatalogStore`] on a worker thread. When it settles the view is
//! rebuilt as the latest confirmed snapshot plus every still-pending
//! mutation in transaction order. A failed mutation thus disappears from the
//! view without disturbing newer unrelated ones.
//!
//! Pending mutations are replayed on top of snapshots that may already
//! contain them, so each [`Mutation`] is written to be idempotent.

use crate::catalog::{CatalogSnapshot, CatalogStore, ClearTarget, push_recent};
use crate::config::models::renumber;
use crate::config::{RecentItem, Tile, TilePatch};
use crate::error::{QuickLaunchError, Result};
use crate::sync::sequencer::{KeySequencer, OrderKey};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Transaction identifier, increasing in submission order
pub type TxnId = u64;

/// A catalog change as replayed on the in-memory view
#[derive(Debug, Clone)]
enum Mutation {
    Add(Tile),
    Update { id: String, patch: TilePatch },
    Remove(String),
    SaveOrder(Vec<String>),
    AddRecent {
        tile_id: String,
        item: RecentItem,
        limit: usize,
    },
    ClearRecent(ClearTarget),
}

impl Mutation {
    fn key(&self) -> OrderKey {
        match self {
            Self::Add(tile) => OrderKey::Tile(tile.id.clone()),
            Self::Update { id, .. } | Self::Remove(id) => OrderKey::Tile(id.clone()),
            Self::AddRecent { tile_id, .. } => OrderKey::Tile(tile_id.clone()),
            Self::ClearRecent(ClearTarget::Tile(id)) => OrderKey::Tile(id.clone()),
            Self::SaveOrder(_) | Self::ClearRecent(ClearTarget::All) => OrderKey::Catalog,
        }
    }

    fn replay(&self, tiles: &mut Vec<Tile>) {
        match self {
            Self::Add(tile) => {
                if !tiles.iter().any(|t| t.id == tile.id) {
                    let mut tile = tile.clone();
                    tile.order = tiles.len();
                    tiles.push(tile);
                }
            }
            Self::Update { id, patch } => {
                if let Some(tile) = tiles.iter_mut().find(|t| &t.id == id) {
                    patch.apply_to(tile);
                }
            }
            Self::Remove(id) => {
                tiles.retain(|t| &t.id != id);
                renumber(tiles);
            }
            Self::SaveOrder(ids) => {
                if ids.len() == tiles.len() {
                    let mut remaining = std::mem::take(tiles);
                    for id in ids {
                        if let Some(index) = remaining.iter().position(|t| &t.id == id) {
                            tiles.push(remaining.swap_remove(index));
                        }
                    }
                    tiles.append(&mut remaining);
                    renumber(tiles);
                }
            }
            Self::AddRecent {
                tile_id,
                item,
                limit,
            } => {
                if let Some(tile) = tiles.iter_mut().find(|t| &t.id == tile_id) {
                    push_recent(&mut tile.sub_menu_items, item.clone(), *limit);
                }
            }
            Self::ClearRecent(ClearTarget::Tile(id)) => {
                if let Some(tile) = tiles.iter_mut().find(|t| &t.id == id) {
                    tile.sub_menu_items.clear();
                }
            }
            Self::ClearRecent(ClearTarget::All) => {
                tiles.iter_mut().for_each(|t| t.sub_menu_items.clear());
            }
        }
    }
}

#[derive(Default)]
struct Projection {
    confirmed: Vec<Tile>,
    confirmed_revision: u64,
    pending: BTreeMap<TxnId, Mutation>,
    view: Vec<Tile>,
}

impl Projection {
    fn adopt(&mut self, snapshot: CatalogSnapshot, force: bool) {
        if force || snapshot.revision > self.confirmed_revision {
            self.confirmed = snapshot.tiles;
            self.confirmed_revision = snapshot.revision;
        }
    }

    fn rebuild(&mut self) {
        let mut view = self.confirmed.clone();
        for mutation in self.pending.values() {
            mutation.replay(&mut view);
        }
        self.view = view;
    }
}

/// Handle to a mutation running in the background
pub struct Pending<T> {
    txn: TxnId,
    state: PendingState<T>,
}

enum PendingState<T> {
    Ready(T),
    Running(JoinHandle<T>),
}

impl<T> Pending<T> {
    fn ready(txn: TxnId, value: T) -> Self {
        Self {
            txn,
            state: PendingState::Ready(value),
        }
    }

    /// Transaction id of this mutation
    pub fn txn(&self) -> TxnId {
        self.txn
    }

    /// Whether [`Pending::wait`] would return without blocking
    pub fn is_finished(&self) -> bool {
        match &self.state {
            PendingState::Ready(_) => true,
            PendingState::Running(handle) => handle.is_finished(),
        }
    }

    /// Block until the mutation settles and return its result
    pub fn wait(self) -> T {
        match self.state {
            PendingState::Ready(value) => value,
            PendingState::Running(handle) => handle
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload)),
        }
    }
}

/// Optimistic, per-tile ordered access to a [`CatalogStore`]
pub struct SyncBridge {
    store: Arc<CatalogStore>,
    projection: Arc<Mutex<Projection>>,
    sequencer: KeySequencer,
    next_txn: AtomicU64,
}

impl SyncBridge {
    /// Start a bridge whose view begins at the store's current snapshot
    pub fn new(store: Arc<CatalogStore>) -> Self {
        let mut projection = Projection::default();
        projection.adopt(store.snapshot(), true);
        projection.rebuild();
        Self {
            store,
            projection: Arc::new(Mutex::new(projection)),
            sequencer: KeySequencer::new(),
            next_txn: AtomicU64::new(1),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// Tiles as the caller should currently see them
    pub fn view(&self) -> Vec<Tile> {
        self.projection.lock().view.clone()
    }

    /// One tile from the current view
    pub fn tile(&self, id: &str) -> Option<Tile> {
        self.projection
            .lock()
            .view
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    /// Number of submitted mutations not yet settled
    pub fn pending_count(&self) -> usize {
        self.projection.lock().pending.len()
    }

    /// Re-read the store and rebuild the view from it
    pub fn refresh(&self) -> Vec<Tile> {
        let snapshot = self.store.snapshot();
        let mut projection = self.projection.lock();
        projection.adopt(snapshot, true);
        projection.rebuild();
        projection.view.clone()
    }

    /// Append a tile
    pub fn add_tile(&self, tile: Tile) -> Pending<Result<Tile>> {
        if let Err(message) = tile.validate() {
            return self.reject(QuickLaunchError::Validation(message));
        }
        let submitted = tile.clone();
        self.submit(Mutation::Add(tile), move |store| store.add(submitted))
    }

    /// Merge `patch` into tile `id`
    pub fn update_tile(&self, id: &str, patch: TilePatch) -> Pending<Result<Tile>> {
        let owned_id = id.to_string();
        let submitted = patch.clone();
        self.submit(
            Mutation::Update {
                id: id.to_string(),
                patch,
            },
            move |store| store.update(&owned_id, &submitted),
        )
    }

    /// Delete tile `id`
    pub fn remove_tile(&self, id: &str) -> Pending<Result<Tile>> {
        let owned_id = id.to_string();
        self.submit(Mutation::Remove(id.to_string()), move |store| {
            store.remove(&owned_id)
        })
    }

    /// Move the tile at view position `from` to `to`
    ///
    /// The move is resolved against the current view into a full ordering,
    /// so later replays do not depend on positions.
    pub fn reorder(&self, from: usize, to: usize) -> Pending<Result<Vec<Tile>>> {
        let mut ids: Vec<String> = self.view().into_iter().map(|t| t.id).collect();
        let len = ids.len();
        if from >= len || to >= len {
            return self.reject(QuickLaunchError::Validation(format!(
                "reorder {from} -> {to} out of range for {len} tiles"
            )));
        }
        let moved = ids.remove(from);
        ids.insert(to, moved);
        self.save_order(ids)
    }

    /// Persist a full ordering given as tile records
    pub fn save_tiles(&self, tiles: &[Tile]) -> Pending<Result<Vec<Tile>>> {
        self.save_order(tiles.iter().map(|t| t.id.clone()).collect())
    }

    fn save_order(&self, ids: Vec<String>) -> Pending<Result<Vec<Tile>>> {
        let submitted = ids.clone();
        self.submit(Mutation::SaveOrder(ids), move |store| {
            store.save_order(&submitted)
        })
    }

    /// Record a recent item on tile `tile_id`
    pub fn add_recent_item(&self, tile_id: &str, path: &str, name: &str) -> Pending<Result<Tile>> {
        if path.trim().is_empty() {
            return self.reject(QuickLaunchError::Validation(
                "recent item path must not be empty".to_string(),
            ));
        }
        let item = RecentItem {
            path: path.to_string(),
            name: name.to_string(),
            timestamp: Utc::now(),
        };
        let limit = self.store.settings().recent_folders_limit;
        let owned_id = tile_id.to_string();
        let submitted = item.clone();
        self.submit(
            Mutation::AddRecent {
                tile_id: tile_id.to_string(),
                item,
                limit,
            },
            move |store| {
                store.add_recent_item_at(
                    &owned_id,
                    &submitted.path,
                    &submitted.name,
                    submitted.timestamp,
                )
            },
        )
    }

    /// Empty the recent items of one tile or of all tiles
    pub fn clear_recent_items(&self, target: ClearTarget) -> Pending<Result<()>> {
        let submitted = target.clone();
        self.submit(Mutation::ClearRecent(target), move |store| {
            store.clear_recent_items(&submitted)
        })
    }

    fn reject<T>(&self, error: QuickLaunchError) -> Pending<Result<T>> {
        let txn = self.next_txn.fetch_add(1, Ordering::SeqCst);
        Pending::ready(txn, Err(error))
    }

    fn submit<T, F>(&self, mutation: Mutation, call: F) -> Pending<Result<T>>
    where
        T: Send + 'static,
        F: FnOnce(&CatalogStore) -> Result<T> + Send + 'static,
    {
        let (txn, ticket) = {
            let mut projection = self.projection.lock();
            let txn = self.next_txn.fetch_add(1, Ordering::SeqCst);
            let ticket = self.sequencer.register(mutation.key());
            debug!("Txn {} submitted: {:?}", txn, ticket.key());
            projection.pending.insert(txn, mutation);
            projection.rebuild();
            (txn, ticket)
        };

        let store = Arc::clone(&self.store);
        let projection = Arc::clone(&self.projection);
        let spawned = thread::Builder::new()
            .name(format!("catalog-txn-{txn}"))
            .spawn(move || {
                ticket.wait_turn();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(&store)));
                drop(ticket);

                match &outcome {
                    Ok(Ok(_)) => debug!("Txn {} confirmed", txn),
                    Ok(Err(e)) => warn!("Txn {} rolled back: {}", txn, e),
                    Err(_) => warn!("Txn {} rolled back after a panic", txn),
                }
                settle(&projection, &store, txn);

                match outcome {
                    Ok(result) => result,
                    Err(payload) => panic::resume_unwind(payload),
                }
            });

        match spawned {
            Ok(handle) => Pending {
                txn,
                state: PendingState::Running(handle),
            },
            Err(e) => {
                warn!("Failed to start worker for txn {}: {}", txn, e);
                settle(&self.projection, &self.store, txn);
                Pending::ready(txn, Err(QuickLaunchError::IoError(e)))
            }
        }
    }
}

fn settle(projection: &Mutex<Projection>, store: &CatalogStore, txn: TxnId) {
    let snapshot = store.snapshot();
    let mut projection = projection.lock();
    projection.pending.remove(&txn);
    projection.adopt(snapshot, false);
    projection.rebuild();
}
