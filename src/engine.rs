//! Single-pass, memory-bounded selection engine.
//!
//! Ownership model:
//! - The engine owns every heap; nothing escapes it until `finish`.
//! - Records are wrapped in an `Arc` once and shared by every heap they land in.
//! - Category labels are interned on first sight, so routing a record hashes
//!   each of its labels once and indexes heaps by a dense `CategoryId`.
//!
//! Memory is bounded by `categories × (1 or num_bins) × heap capacity`,
//! independent of how many records are offered.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use indexmap::IndexSet;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::balance::Balancer;
use crate::classify::AttributeClassifier;
use crate::config::{SelectionConfig, SelectionMode};
use crate::constants::selection::SEQUENTIAL_SHARD;
use crate::data::{CategorySelection, PuzzleRecord, Selection};
use crate::errors::CuratorError;
use crate::heap::{BoundedCategoryHeap, Offer, ScoreEntry, Sequence};
use crate::score::score;
use crate::stratify::Stratifier;
use crate::types::{BinIndex, CategoryLabel, ShardId};

/// Dense id of an interned category label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CategoryId(usize);

/// Interns category labels in first-seen order.
#[derive(Debug, Default)]
pub struct CategoryInterner {
    labels: IndexSet<CategoryLabel>,
}

impl CategoryInterner {
    /// Return the id for `label`, allocating one on first sight.
    pub fn intern(&mut self, label: &str) -> CategoryId {
        if let Some(idx) = self.labels.get_index_of(label) {
            return CategoryId(idx);
        }
        let (idx, _) = self.labels.insert_full(label.to_string());
        CategoryId(idx)
    }

    /// Label for an id previously returned by `intern`.
    pub fn label(&self, id: CategoryId) -> Option<&str> {
        self.labels.get_index(id.0).map(String::as_str)
    }

    /// Number of distinct labels seen.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` when no label has been interned.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Counters describing one selection pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionStats {
    /// Records offered to the engine.
    pub records_seen: u64,
    /// Records routed into at least one heap.
    pub records_routed: u64,
    /// Records carrying no category at all.
    pub records_without_category: u64,
    /// Records whose categories were all outside the allow-list.
    pub records_filtered: u64,
    /// Heap inserts below capacity.
    pub inserted: u64,
    /// Heap inserts that evicted the previous minimum.
    pub replaced: u64,
    /// Offers discarded by a full heap.
    pub rejected: u64,
}

impl SelectionStats {
    fn absorb(&mut self, other: SelectionStats) {
        self.records_seen += other.records_seen;
        self.records_routed += other.records_routed;
        self.records_without_category += other.records_without_category;
        self.records_filtered += other.records_filtered;
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.rejected += other.rejected;
    }

    fn count(&mut self, offer: &Offer) {
        match offer {
            Offer::Inserted => self.inserted += 1,
            Offer::Replaced(_) => self.replaced += 1,
            Offer::Rejected => self.rejected += 1,
        }
    }
}

/// Heaps of one category, keyed by bin (flat mode uses bin 0 only).
type CategoryBins = BTreeMap<BinIndex, BoundedCategoryHeap>;

/// Streaming top-N-per-category selector.
pub struct SelectionEngine {
    config: SelectionConfig,
    stratifier: Option<Stratifier>,
    heap_capacity: NonZeroUsize,
    interner: CategoryInterner,
    heaps: Vec<CategoryBins>,
    shard: ShardId,
    next_local: u64,
    stats: SelectionStats,
    routed: Vec<CategoryId>,
}

impl SelectionEngine {
    /// Create a single-threaded engine. Fails on an invalid configuration.
    pub fn new(config: SelectionConfig) -> Result<Self, CuratorError> {
        Self::for_shard(config, SEQUENTIAL_SHARD)
    }

    /// Create an engine for one ingestion shard.
    ///
    /// Sequence numbers are stamped `(shard, local)`, so ties between shards
    /// resolve in shard order after `merge`.
    pub fn for_shard(config: SelectionConfig, shard: ShardId) -> Result<Self, CuratorError> {
        config.validate()?;
        let stratifier = match config.mode {
            SelectionMode::Flat => None,
            SelectionMode::Stratified => Some(Stratifier::new(
                config.min_rating,
                config.max_rating,
                config.bin_width,
            )?),
        };
        let capacity = match &stratifier {
            Some(strat) => strat.per_bin_quota(config.per_category),
            None => config.per_category,
        };
        let heap_capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            CuratorError::Configuration("heap capacity must be at least 1".to_string())
        })?;
        debug!(
            mode = ?config.mode,
            shard,
            heap_capacity = capacity,
            bins = stratifier.map(|s| s.num_bins()).unwrap_or(1),
            "selection engine ready"
        );
        Ok(Self {
            config,
            stratifier,
            heap_capacity,
            interner: CategoryInterner::default(),
            heaps: Vec::new(),
            shard,
            next_local: 0,
            stats: SelectionStats::default(),
            routed: Vec::new(),
        })
    }

    /// Configuration this engine was built with.
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Stratifier in use, if the engine runs in stratified mode.
    pub fn stratifier(&self) -> Option<&Stratifier> {
        self.stratifier.as_ref()
    }

    /// Capacity of every heap this engine creates.
    pub fn heap_capacity(&self) -> usize {
        self.heap_capacity.get()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> SelectionStats {
        self.stats
    }

    /// Largest number of entries currently held by any single heap.
    pub fn max_heap_len(&self) -> usize {
        self.heaps
            .iter()
            .flat_map(|bins| bins.values())
            .map(BoundedCategoryHeap::len)
            .max()
            .unwrap_or(0)
    }

    /// Total entries currently held across all heaps.
    pub fn held_entries(&self) -> usize {
        self.heaps
            .iter()
            .flat_map(|bins| bins.values())
            .map(BoundedCategoryHeap::len)
            .sum()
    }

    /// Route one record into its category heaps. Returns the number of heaps offered to.
    pub fn offer(&mut self, record: PuzzleRecord) -> usize {
        self.stats.records_seen += 1;
        if !record.has_themes() {
            self.stats.records_without_category += 1;
            return 0;
        }

        self.routed.clear();
        for theme in record.primary_themes() {
            if !self.config.allows(theme) {
                continue;
            }
            let id = self.interner.intern(theme);
            if !self.routed.contains(&id) {
                self.routed.push(id);
            }
        }
        if self.routed.is_empty() {
            self.stats.records_filtered += 1;
            return 0;
        }
        self.stats.records_routed += 1;

        let key = score(&record, self.config.difficulty_center);
        let sequence = Sequence {
            shard: self.shard,
            local: self.next_local,
        };
        self.next_local += 1;
        let bin = self
            .stratifier
            .as_ref()
            .map_or(0, |strat| strat.bin_index(record.rating));
        let record = Arc::new(record);

        for &id in &self.routed {
            if self.heaps.len() <= id.0 {
                self.heaps.resize_with(id.0 + 1, CategoryBins::new);
            }
            let heap = self.heaps[id.0]
                .entry(bin)
                .or_insert_with(|| BoundedCategoryHeap::with_capacity(self.heap_capacity));
            let outcome = heap.offer(ScoreEntry {
                key,
                sequence,
                record: Arc::clone(&record),
            });
            self.stats.count(&outcome);
        }
        self.routed.len()
    }

    /// Offer every record of a stream.
    pub fn offer_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = PuzzleRecord>,
    {
        for record in records {
            self.offer(record);
        }
    }

    /// Fold another shard's engine into this one.
    ///
    /// Both engines must share mode, range, bin width and quota. Heaps are
    /// merged under the same strictly-greater eviction rule used by `offer`.
    pub fn merge(&mut self, other: SelectionEngine) -> Result<(), CuratorError> {
        if self.heap_capacity != other.heap_capacity
            || self.config.mode != other.config.mode
            || self.stratifier != other.stratifier
        {
            return Err(CuratorError::Configuration(
                "cannot merge engines built with different selection settings".to_string(),
            ));
        }
        let SelectionEngine {
            interner,
            heaps,
            stats,
            ..
        } = other;
        for (idx, bins) in heaps.into_iter().enumerate() {
            let Some(label) = interner.label(CategoryId(idx)) else {
                continue;
            };
            let id = self.interner.intern(label);
            if self.heaps.len() <= id.0 {
                self.heaps.resize_with(id.0 + 1, CategoryBins::new);
            }
            let target = &mut self.heaps[id.0];
            for (bin, heap) in bins {
                match target.get_mut(&bin) {
                    Some(existing) => existing.merge(heap),
                    None => {
                        target.insert(bin, heap);
                    }
                }
            }
        }
        self.stats.absorb(stats);
        Ok(())
    }

    /// Finish the pass and produce the ordered selection.
    ///
    /// Flat mode emits each category's heap best first. Stratified mode
    /// interleaves bins and balances side to move via `classifier`, which is
    /// consulted once per surviving candidate.
    pub fn finish(self, classifier: &dyn AttributeClassifier) -> Selection {
        let SelectionEngine {
            config,
            stratifier,
            interner,
            heaps,
            stats,
            ..
        } = self;
        let mut categories = Vec::with_capacity(heaps.len());
        for (idx, bins) in heaps.into_iter().enumerate() {
            let Some(label) = interner.label(CategoryId(idx)) else {
                continue;
            };
            let records = match &stratifier {
                None => bins
                    .into_values()
                    .flat_map(BoundedCategoryHeap::into_sorted_desc)
                    .map(|entry| entry.record)
                    .collect(),
                Some(strat) => {
                    let balanced =
                        Balancer::new(strat.num_bins(), config.per_category).balance(bins, classifier);
                    debug!(
                        category = label,
                        selected = balanced.records.len(),
                        white = balanced.white,
                        black = balanced.black,
                        unknown = balanced.unknown,
                        "category balanced"
                    );
                    balanced.records
                }
            };
            categories.push(CategorySelection {
                category: label.to_string(),
                records,
            });
        }
        let selection = Selection::from_categories(categories);
        info!(
            records_seen = stats.records_seen,
            records_routed = stats.records_routed,
            without_category = stats.records_without_category,
            filtered = stats.records_filtered,
            replaced = stats.replaced,
            rejected = stats.rejected,
            categories = selection.categories.len(),
            selected = selection.len(),
            "selection pass complete"
        );
        selection
    }
}

/// Run one engine per shard on the rayon pool, merge in shard order, and finish.
///
/// Output is deterministic for a fixed sharding of the input.
pub fn select_parallel<I>(
    shards: Vec<I>,
    config: &SelectionConfig,
    classifier: &dyn AttributeClassifier,
) -> Result<(Selection, SelectionStats), CuratorError>
where
    I: IntoIterator<Item = PuzzleRecord> + Send,
{
    config.validate()?;
    let engines = shards
        .into_par_iter()
        .enumerate()
        .map(|(shard, records)| {
            let mut engine = SelectionEngine::for_shard(config.clone(), shard as ShardId)?;
            engine.offer_all(records);
            Ok(engine)
        })
        .collect::<Result<Vec<_>, CuratorError>>()?;

    let mut engines = engines.into_iter();
    let mut merged = match engines.next() {
        Some(first) => first,
        None => SelectionEngine::new(config.clone())?,
    };
    for engine in engines {
        merged.merge(engine)?;
    }
    let stats = merged.stats();
    Ok((merged.finish(classifier), stats))
}

/// Convenience: run a sequential pass over `records`.
pub fn select<I>(
    records: I,
    config: SelectionConfig,
    classifier: &dyn AttributeClassifier,
) -> Result<(Selection, SelectionStats), CuratorError>
where
    I: IntoIterator<Item = PuzzleRecord>,
{
    let mut engine = SelectionEngine::new(config)?;
    engine.offer_all(records);
    let stats = engine.stats();
    Ok((engine.finish(classifier), stats))
}
