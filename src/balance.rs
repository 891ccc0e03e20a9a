//! Round-robin bin interleaving with greedy side-to-move balancing.
//!
//! Each category's bin heaps are drained best first and split by attribute.
//! Picks rotate through bins starting after the last bin used, preferring
//! whichever side currently has fewer picks (white on ties). When no bin has
//! the preferred side the other side is accepted; unknown-attribute
//! candidates are used only after both sides are exhausted and never count
//! toward either side.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::classify::{Attribute, AttributeClassifier};
use crate::data::SharedRecord;
use crate::heap::BoundedCategoryHeap;
use crate::types::BinIndex;

/// Per-bin candidate lists, each in descending key order.
#[derive(Debug, Default)]
struct BinLists {
    white: VecDeque<SharedRecord>,
    black: VecDeque<SharedRecord>,
    unknown: VecDeque<SharedRecord>,
}

impl BinLists {
    fn list_mut(&mut self, attribute: Attribute) -> &mut VecDeque<SharedRecord> {
        match attribute {
            Attribute::White => &mut self.white,
            Attribute::Black => &mut self.black,
            Attribute::Unknown => &mut self.unknown,
        }
    }

    fn has(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::White => !self.white.is_empty(),
            Attribute::Black => !self.black.is_empty(),
            Attribute::Unknown => !self.unknown.is_empty(),
        }
    }
}

/// Result of balancing one category.
#[derive(Clone, Debug, Default)]
pub struct BalancedCategory {
    /// Records in final emission order.
    pub records: Vec<SharedRecord>,
    /// Picks with white to move.
    pub white: usize,
    /// Picks with black to move.
    pub black: usize,
    /// Picks whose attribute was unavailable.
    pub unknown: usize,
}

/// Greedy interleaver for stratified selections.
#[derive(Clone, Copy, Debug)]
pub struct Balancer {
    num_bins: usize,
    quota: usize,
}

impl Balancer {
    /// Create a balancer over `num_bins` bins emitting at most `quota` records.
    pub fn new(num_bins: usize, quota: usize) -> Self {
        Self {
            num_bins: num_bins.max(1),
            quota,
        }
    }

    /// Drain one category's bin heaps into its final order.
    ///
    /// The classifier is called exactly once per candidate.
    pub fn balance(
        &self,
        bins: BTreeMap<BinIndex, BoundedCategoryHeap>,
        classifier: &dyn AttributeClassifier,
    ) -> BalancedCategory {
        let mut lists: Vec<BinLists> = (0..self.num_bins).map(|_| BinLists::default()).collect();
        for (bin, heap) in bins {
            let Some(target) = lists.get_mut(bin) else {
                continue;
            };
            for entry in heap.into_sorted_desc() {
                let attribute = classifier.classify(&entry.record);
                target.list_mut(attribute).push_back(entry.record);
            }
        }
        self.interleave(lists)
    }

    fn interleave(&self, mut lists: Vec<BinLists>) -> BalancedCategory {
        let mut out = BalancedCategory::default();
        let mut desired = Attribute::White;
        let mut cursor = 0usize;
        while out.records.len() < self.quota {
            let pick = [desired, opposite(desired), Attribute::Unknown]
                .into_iter()
                .find_map(|attribute| {
                    self.scan(&lists, cursor, attribute)
                        .map(|bin| (bin, attribute))
                });
            let Some((bin, attribute)) = pick else {
                break;
            };
            let Some(record) = lists[bin].list_mut(attribute).pop_front() else {
                break;
            };
            out.records.push(record);
            cursor = (bin + 1) % self.num_bins;
            match attribute {
                Attribute::White => out.white += 1,
                Attribute::Black => out.black += 1,
                Attribute::Unknown => out.unknown += 1,
            }
            desired = if out.white <= out.black {
                Attribute::White
            } else {
                Attribute::Black
            };
        }
        if out.records.len() < self.quota {
            debug!(
                selected = out.records.len(),
                quota = self.quota,
                "category exhausted before reaching quota"
            );
        }
        out
    }

    /// First bin at or after `cursor` (wrapping) holding `attribute`.
    fn scan(&self, lists: &[BinLists], cursor: usize, attribute: Attribute) -> Option<BinIndex> {
        (0..self.num_bins)
            .map(|offset| (cursor + offset) % self.num_bins)
            .find(|&bin| lists[bin].has(attribute))
    }
}

fn opposite(attribute: Attribute) -> Attribute {
    match attribute {
        Attribute::White => Attribute::Black,
        Attribute::Black => Attribute::White,
        Attribute::Unknown => Attribute::Unknown,
    }
}
