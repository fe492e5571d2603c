//! Tile catalog module
//!
//! The catalog is the ordered list of tiles persisted in the configuration
//! document, together with each tile's recent-item history.
//!
//! # Invariants
//!
//! - Tile ids are unique
//! - `order` is always the dense permutation `0..N-1` matching list position
//! - A tile's recent items are unique by path and never longer than the limit
//!   in effect at that tile's last add
//! - A mutation is reported successful only after the whole document has been
//!   durably written; on failure the in-memory catalog is unchanged

pub mod recent;
pub mod store;

pub use recent::{ClearTarget, push_recent, same_path};
pub use store::{CatalogSnapshot, CatalogStore, search_tiles};
