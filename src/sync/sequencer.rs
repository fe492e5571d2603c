//! Per-key ordering of background mutations
//!
//! Every mutation takes a [`Ticket`] when it is submitted. A ticket may run
//! once no earlier, still unfinished ticket conflicts with it. Two keys
//! conflict when they name the same tile or when either of them is the
//! catalog-wide key. Dropping a ticket marks it finished.

use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordering key of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderKey {
    /// Mutation touching only one tile
    Tile(String),
    /// Mutation touching the whole catalog (ordering, clear-all)
    Catalog,
}

impl OrderKey {
    /// Whether two mutations with these keys must not overlap
    pub fn conflicts_with(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Catalog, _) | (_, Self::Catalog) => true,
            (Self::Tile(a), Self::Tile(b)) => a == b,
        }
    }
}

#[derive(Default)]
struct Shared {
    inner: Mutex<Inner>,
    turn: Condvar,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    unfinished: BTreeMap<u64, OrderKey>,
}

/// Hands out tickets in submission order
#[derive(Clone, Default)]
pub struct KeySequencer {
    shared: Arc<Shared>,
}

impl KeySequencer {
    /// Create an empty sequencer
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mutation with `key`; call order defines execution order
    pub fn register(&self, key: OrderKey) -> Ticket {
        let mut inner = self.shared.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.unfinished.insert(seq, key.clone());
        Ticket {
            seq,
            key,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Number of registered tickets not yet dropped
    pub fn unfinished(&self) -> usize {
        self.shared.inner.lock().unfinished.len()
    }
}

/// A place in the execution order
pub struct Ticket {
    seq: u64,
    key: OrderKey,
    shared: Arc<Shared>,
}

impl Ticket {
    /// Key this ticket was registered with
    pub fn key(&self) -> &OrderKey {
        &self.key
    }

    /// Block until every earlier conflicting ticket has finished
    pub fn wait_turn(&self) {
        let mut inner = self.shared.inner.lock();
        while inner
            .unfinished
            .range(..self.seq)
            .any(|(_, key)| key.conflicts_with(&self.key))
        {
            self.shared.turn.wait(&mut inner);
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.shared.inner.lock().unfinished.remove(&self.seq);
        self.shared.turn.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn tile(id: &str) -> OrderKey {
        OrderKey::Tile(id.to_string())
    }

    #[test]
    fn test_conflicts() {
        assert!(tile("a").conflicts_with(&tile("a")));
        assert!(!tile("a").conflicts_with(&tile("b")));
        assert!(OrderKey::Catalog.conflicts_with(&tile("a")));
        assert!(tile("b").conflicts_with(&OrderKey::Catalog));
    }

    #[test]
    fn test_same_key_waits_for_earlier_ticket() {
        let sequencer = KeySequencer::new();
        let first = sequencer.register(tile("a"));
        let second = sequencer.register(tile("a"));

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            second.wait_turn();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(first);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        worker.join().unwrap();
        assert_eq!(sequencer.unfinished(), 0);
    }

    #[test]
    fn test_different_keys_do_not_wait() {
        let sequencer = KeySequencer::new();
        let _first = sequencer.register(tile("a"));
        let second = sequencer.register(tile("b"));

        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            second.wait_turn();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        worker.join().unwrap();
    }

    #[test]
    fn test_catalog_key_waits_for_any_earlier_ticket() {
        let sequencer = KeySequencer::new();
        let first = sequencer.register(tile("a"));
        let catalog = sequencer.register(OrderKey::Catalog);
        let later = sequencer.register(tile("b"));

        let (tx, rx) = mpsc::channel();
        let tx_later = tx.clone();
        let catalog_worker = thread::spawn(move || {
            catalog.wait_turn();
            tx.send("catalog").unwrap();
        });
        let later_worker = thread::spawn(move || {
            later.wait_turn();
            tx_later.send("later").unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(first);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "catalog");
        catalog_worker.join().unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "later");
        later_worker.join().unwrap();
    }
}
