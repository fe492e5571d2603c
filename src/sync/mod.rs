//! Optimistic synchronization between a UI-facing view and the catalog store
//!
//! [`SyncBridge`] applies mutations to an in-memory view right away and
//! confirms or rolls them back once the store has written them.
//! [`KeySequencer`] keeps mutations on the same tile in submission order
//! while letting different tiles proceed in parallel.

pub mod bridge;
pub mod sequencer;

pub use bridge::{Pending, SyncBridge, TxnId};
pub use sequencer::{KeySequencer, OrderKey, Ticket};
