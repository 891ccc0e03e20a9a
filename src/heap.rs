//! Fixed-capacity "top-K seen so far" structure.
//!
//! The heap is a min-heap over entry goodness: its root is always the worst
//! entry currently kept, and that root is the only entry ever evicted.
//! "Better" means a greater `CompositeKey`; among equal keys the entry seen
//! first (smaller `Sequence`) is better, so ties never displace an older entry.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;

use crate::data::SharedRecord;
use crate::errors::CuratorError;
use crate::score::CompositeKey;
use crate::types::ShardId;

/// Globally monotonic arrival stamp: shard first, then the shard-local counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence {
    /// Ingestion shard that produced the entry.
    pub shard: ShardId,
    /// Counter local to that shard's engine.
    pub local: u64,
}

/// A scored record waiting in a category heap.
#[derive(Clone, Debug)]
pub struct ScoreEntry {
    /// Ranking key.
    pub key: CompositeKey,
    /// Arrival stamp used for tie-breaking.
    pub sequence: Sequence,
    /// Shared record payload.
    pub record: SharedRecord,
}

impl PartialEq for ScoreEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoreEntry {}

impl PartialOrd for ScoreEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreEntry {
    /// Goodness order: greater key first, then earlier sequence.
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Outcome of a single `offer`.
#[derive(Debug)]
pub enum Offer {
    /// The heap had room.
    Inserted,
    /// The heap was full and the returned entry was evicted.
    Replaced(ScoreEntry),
    /// The entry was not strictly better than the current minimum.
    Rejected,
}

/// Min-priority queue holding at most `capacity` entries.
#[derive(Debug)]
pub struct BoundedCategoryHeap {
    capacity: usize,
    entries: BinaryHeap<Reverse<ScoreEntry>>,
}

impl BoundedCategoryHeap {
    /// Create an empty heap. `capacity` must be at least 1.
    pub fn new(capacity: usize) -> Result<Self, CuratorError> {
        NonZeroUsize::new(capacity)
            .map(Self::with_capacity)
            .ok_or_else(|| {
                CuratorError::Configuration("heap capacity must be at least 1".to_string())
            })
    }

    /// Create an empty heap from an already validated capacity.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: capacity.get(),
            entries: BinaryHeap::with_capacity(capacity.get() + 1),
        }
    }

    /// Maximum number of entries kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently kept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been kept yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The worst entry currently kept.
    pub fn min(&self) -> Option<&ScoreEntry> {
        self.entries.peek().map(|Reverse(entry)| entry)
    }

    /// Offer an entry. O(log K).
    pub fn offer(&mut self, entry: ScoreEntry) -> Offer {
        if self.entries.len() < self.capacity {
            self.entries.push(Reverse(entry));
            return Offer::Inserted;
        }
        let Some(mut worst) = self.entries.peek_mut() else {
            return Offer::Rejected;
        };
        // Strictly greater key only; equal keys keep the incumbent.
        if entry.key > worst.0.key {
            let evicted = std::mem::replace(&mut worst.0, entry);
            drop(worst);
            Offer::Replaced(evicted)
        } else {
            Offer::Rejected
        }
    }

    /// Fold another heap's entries into this one under the same eviction rule.
    ///
    /// Entries are offered best first so the result does not depend on the
    /// internal layout of `other`.
    pub fn merge(&mut self, other: BoundedCategoryHeap) {
        for entry in other.into_sorted_desc() {
            self.offer(entry);
        }
    }

    /// Consume the heap, returning entries by key descending, ties by ascending sequence.
    pub fn into_sorted_desc(self) -> Vec<ScoreEntry> {
        let mut entries: Vec<ScoreEntry> = self
            .entries
            .into_iter()
            .map(|Reverse(entry)| entry)
            .collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PuzzleRecord;
    use std::sync::Arc;

    fn entry(id: &str, popularity: f64, local: u64) -> ScoreEntry {
        ScoreEntry {
            key: CompositeKey {
                popularity,
                proximity: 0.0,
                volume: 0.0,
            },
            sequence: Sequence { shard: 0, local },
            record: Arc::new(PuzzleRecord {
                id: id.to_string(),
                fen: String::new(),
                moves: Vec::new(),
                rating: 0,
                rating_deviation: 0,
                popularity: 0,
                num_plays: 0,
                themes: Vec::new(),
                game_url: String::new(),
                opening_tags: Vec::new(),
            }),
        }
    }

    fn ids(entries: &[ScoreEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.record.id.as_str()).collect()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(BoundedCategoryHeap::new(0).is_err());
    }

    #[test]
    fn keeps_top_k_and_evicts_minimum() {
        let mut heap = BoundedCategoryHeap::new(2).unwrap();
        assert!(matches!(heap.offer(entry("a", 1.0, 0)), Offer::Inserted));
        assert!(matches!(heap.offer(entry("b", 3.0, 1)), Offer::Inserted));
        match heap.offer(entry("c", 2.0, 2)) {
            Offer::Replaced(evicted) => assert_eq!(evicted.record.id, "a"),
            other => panic!("expected replacement, got {other:?}"),
        }
        assert!(matches!(heap.offer(entry("d", 0.5, 3)), Offer::Rejected));
        assert_eq!(heap.len(), 2);
        assert_eq!(ids(&heap.into_sorted_desc()), vec!["b", "c"]);
    }

    #[test]
    fn ties_never_evict_older_entries() {
        let mut heap = BoundedCategoryHeap::new(1).unwrap();
        heap.offer(entry("first", 5.0, 0));
        assert!(matches!(heap.offer(entry("second", 5.0, 1)), Offer::Rejected));
        assert_eq!(ids(&heap.into_sorted_desc()), vec!["first"]);
    }

    #[test]
    fn minimum_among_equal_keys_is_the_newest() {
        let mut heap = BoundedCategoryHeap::new(2).unwrap();
        heap.offer(entry("old", 1.0, 0));
        heap.offer(entry("new", 1.0, 1));
        assert_eq!(heap.min().map(|e| e.record.id.as_str()), Some("new"));
        match heap.offer(entry("better", 2.0, 2)) {
            Offer::Replaced(evicted) => assert_eq!(evicted.record.id, "new"),
            other => panic!("expected replacement, got {other:?}"),
        }
    }

    #[test]
    fn drain_orders_ties_by_arrival() {
        let mut heap = BoundedCategoryHeap::new(3).unwrap();
        heap.offer(entry("late", 1.0, 9));
        heap.offer(entry("early", 1.0, 2));
        heap.offer(entry("top", 4.0, 5));
        assert_eq!(ids(&heap.into_sorted_desc()), vec!["top", "early", "late"]);
    }

    #[test]
    fn merge_matches_single_heap_result() {
        let values = [3.0, 9.0, 1.0, 7.0, 5.0, 8.0, 2.0];
        let mut single = BoundedCategoryHeap::new(3).unwrap();
        let mut left = BoundedCategoryHeap::new(3).unwrap();
        let mut right = BoundedCategoryHeap::new(3).unwrap();
        for (idx, value) in values.iter().enumerate() {
            let e = entry(&format!("r{idx}"), *value, idx as u64);
            single.offer(e.clone());
            if idx % 2 == 0 {
                left.offer(e);
            } else {
                right.offer(e);
            }
        }
        left.merge(right);
        assert_eq!(
            ids(&left.into_sorted_desc()),
            ids(&single.into_sorted_desc())
        );
    }
}
