use crate::model::ReceiptId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// In-memory scores keyed by receipt id.
///
/// Append-only for the life of the process: there is no update, delete or
/// eviction. Insert and lookup each take the lock once, so readers see a
/// record either fully present or absent.
#[derive(Debug, Default)]
pub struct ScoreStore {
    scores: RwLock<HashMap<ReceiptId, i64>>,
}

impl ScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `points` under a freshly generated id and returns the id.
    pub fn insert(&self, points: i64) -> ReceiptId {
        let mut scores = self.scores.write();
        loop {
            let id = ReceiptId::generate();
            if let Entry::Vacant(slot) = scores.entry(id.clone()) {
                slot.insert(points);
                return id;
            }
            tracing::warn!(id = %id, "generated receipt id collided, drawing another");
        }
    }

    pub fn lookup(&self, id: &str) -> Option<i64> {
        self.scores.read().get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lookup_returns_inserted_points() {
        let store = ScoreStore::new();
        let id = store.insert(28);

        assert_eq!(store.lookup(id.as_str()), Some(28));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_is_absent() {
        let store = ScoreStore::new();
        assert!(store.is_empty());
        assert_eq!(store.lookup("non-existent-id"), None);

        store.insert(1);
        assert_eq!(store.lookup("non-existent-id"), None);
    }

    #[test]
    fn same_points_get_distinct_ids() {
        let store = ScoreStore::new();
        let first = store.insert(50);
        let second = store.insert(50);

        assert_ne!(first, second);
        assert_eq!(store.lookup(first.as_str()), Some(50));
        assert_eq!(store.lookup(second.as_str()), Some(50));
    }

    #[test]
    fn stores_are_independent() {
        let a = ScoreStore::new();
        let b = ScoreStore::new();
        let id = a.insert(7);

        assert_eq!(a.lookup(id.as_str()), Some(7));
        assert_eq!(b.lookup(id.as_str()), None);
    }

    #[test]
    fn concurrent_inserts_never_share_an_id() {
        let store = Arc::new(ScoreStore::new());
        let threads = 8;
        let per_thread = 250;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    (0..per_thread)
                        .map(|i| (store.insert(t * 1000 + i), t * 1000 + i))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for (id, points) in handle.join().unwrap() {
                assert_eq!(store.lookup(id.as_str()), Some(points));
                assert!(seen.insert(id));
            }
        }

        assert_eq!(store.len(), (threads * per_thread) as usize);
    }
}
