//! Composite ranking key.
//!
//! Greater keys are better. Each term carries a jitter derived from the
//! record id so that equal raw inputs do not always resolve the same way,
//! while staying reproducible run to run.

use std::cmp::Ordering;

use crate::constants::scoring::{
    POPULARITY_JITTER_WEIGHT, PROXIMITY_JITTER_WEIGHT, VOLUME_JITTER_WEIGHT,
};
use crate::data::PuzzleRecord;
use crate::hash::stable_noise;
use crate::types::Rating;

/// Lexicographically ordered `(popularity, proximity, volume)` triple.
#[derive(Clone, Copy, Debug)]
pub struct CompositeKey {
    /// Popularity plus jitter.
    pub popularity: f64,
    /// Negated distance to the difficulty center (or negated rating) plus jitter.
    pub proximity: f64,
    /// `log10` of the play count plus jitter.
    pub volume: f64,
}

impl CompositeKey {
    /// Terms in comparison order.
    pub fn terms(&self) -> [f64; 3] {
        [self.popularity, self.proximity, self.volume]
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CompositeKey {}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.popularity
            .total_cmp(&other.popularity)
            .then_with(|| self.proximity.total_cmp(&other.proximity))
            .then_with(|| self.volume.total_cmp(&other.volume))
    }
}

/// Score a record. Pure and total.
pub fn score(record: &PuzzleRecord, difficulty_center: Option<Rating>) -> CompositeKey {
    let jitter = stable_noise(&record.id);
    let popularity = f64::from(record.popularity) + POPULARITY_JITTER_WEIGHT * jitter;
    let distance = match difficulty_center {
        Some(center) => (i64::from(record.rating) - i64::from(center)).abs(),
        // No center: lower ratings rank higher.
        None => i64::from(record.rating),
    };
    let proximity = -(distance as f64) + PROXIMITY_JITTER_WEIGHT * jitter;
    let volume = (record.num_plays.max(1) as f64).log10() + VOLUME_JITTER_WEIGHT * jitter;
    CompositeKey {
        popularity,
        proximity,
        volume,
    }
}
