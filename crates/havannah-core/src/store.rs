//! Solved-position store keyed by canonical board hash.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::{Move, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRecord {
    pub outcome: Outcome,
    pub work: u64,
    pub best: Move,
}

impl StoreRecord {
    pub const UNKNOWN: StoreRecord = StoreRecord { outcome: Outcome::Unknown, work: 0, best: Move::NONE };
}

/// External position cache. Implementations must be callable from every
/// search worker at once.
pub trait PositionStore: Send + Sync {
    fn get(&self, hash: u64) -> Option<StoreRecord>;
    fn set(&self, hash: u64, record: StoreRecord);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<u64, StoreRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PositionStore for MemoryStore {
    fn get(&self, hash: u64) -> Option<StoreRecord> {
        self.map.lock().get(&hash).copied()
    }

    fn set(&self, hash: u64, record: StoreRecord) {
        self.map.lock().insert(hash, record);
    }
}

/// Compare a stored outcome with a freshly computed one. Two distinct
/// positions sharing a hash show up as decided outcomes that disagree; the
/// record is reset to unknown so it gets solved again. Returns whether the
/// stored record could be trusted.
pub fn reconcile(store: &dyn PositionStore, hash: u64, fresh: Outcome) -> bool {
    match store.get(hash) {
        Some(rec) if rec.outcome.is_decided() && fresh.is_decided() && rec.outcome != fresh => {
            log::warn!("store: hash {hash:016x} records {} but search found {fresh}; resetting", rec.outcome);
            store.set(hash, StoreRecord::UNKNOWN);
            false
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Player;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        let rec = StoreRecord { outcome: Outcome::Win(Player::One), work: 42, best: Move::new(1, 2) };
        store.set(7, rec);
        assert_eq!(store.get(7), Some(rec));
        assert_eq!(store.get(8), None);
    }

    #[test]
    fn test_reconcile_resets_collisions() {
        let store = MemoryStore::new();
        store.set(1, StoreRecord { outcome: Outcome::Win(Player::One), work: 10, best: Move::new(0, 0) });

        assert!(reconcile(&store, 1, Outcome::Win(Player::One)));
        assert!(reconcile(&store, 1, Outcome::Unknown));
        assert_eq!(store.get(1).unwrap().work, 10);

        assert!(!reconcile(&store, 1, Outcome::Win(Player::Two)));
        assert_eq!(store.get(1), Some(StoreRecord::UNKNOWN));
    }
}
