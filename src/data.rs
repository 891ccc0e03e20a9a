use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use crate::types::{CategoryLabel, FenText, Rating, RecordId, UciText};

/// One puzzle row as produced by ingestion.
///
/// Immutable once created. The selection core reads the id, the four score
/// inputs and the themes; everything else is payload for export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRecord {
    /// Stable puzzle identifier (used for jitter and determinism).
    pub id: RecordId,
    /// Starting position, before the opponent's first move.
    pub fen: FenText,
    /// Solution line in UCI notation; the first move belongs to the opponent.
    pub moves: Vec<UciText>,
    /// Puzzle rating (the primary metric).
    pub rating: Rating,
    /// Rating uncertainty.
    pub rating_deviation: i32,
    /// Popularity score in `[-100, 100]`.
    pub popularity: i32,
    /// Number of times the puzzle was played.
    pub num_plays: i64,
    /// Theme labels (categories). Duplicates are tolerated and collapsed on routing.
    pub themes: Vec<CategoryLabel>,
    /// Link to the source game.
    pub game_url: String,
    /// Opening names, possibly empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opening_tags: Vec<String>,
}

impl PuzzleRecord {
    /// Themes with empty tokens removed.
    pub fn primary_themes(&self) -> impl Iterator<Item = &str> {
        self.themes
            .iter()
            .map(String::as_str)
            .filter(|theme| !theme.is_empty())
    }

    /// Returns `true` when the record has at least one non-empty theme.
    pub fn has_themes(&self) -> bool {
        self.primary_themes().next().is_some()
    }

    /// Space-joined theme list, as written to the `Themes` export tag.
    pub fn themes_joined(&self) -> String {
        self.primary_themes().collect::<Vec<_>>().join(" ")
    }
}

/// Shared handle to a record held by several category heaps at once.
pub type SharedRecord = Arc<PuzzleRecord>;

/// Final ordered output of one category.
#[derive(Clone, Debug)]
pub struct CategorySelection {
    /// Category label.
    pub category: CategoryLabel,
    /// Selected records, best first.
    pub records: Vec<SharedRecord>,
}

impl CategorySelection {
    /// Number of selected records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when nothing was selected for this category.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One emitted `(category, round, record)` triple.
///
/// `round` is 1-based and restarts for every category.
#[derive(Clone, Debug)]
pub struct SelectedEntry {
    /// Category the record was selected for.
    pub category: CategoryLabel,
    /// Per-category running index, starting at 1.
    pub round: usize,
    /// Selected record.
    pub record: SharedRecord,
}

/// Deterministically ordered selection across all categories.
///
/// Categories are ordered by label; records within a category best first.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// Per-category selections in emission order.
    pub categories: Vec<CategorySelection>,
}

impl Selection {
    /// Build a selection, ordering categories by label.
    pub fn from_categories(mut categories: Vec<CategorySelection>) -> Self {
        categories.sort_by(|a, b| a.category.cmp(&b.category));
        Self { categories }
    }

    /// Total number of selected `(category, record)` pairs.
    pub fn len(&self) -> usize {
        self.categories.iter().map(CategorySelection::len).sum()
    }

    /// Returns `true` when no category selected anything.
    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(CategorySelection::is_empty)
    }

    /// Look up one category's selection.
    pub fn category(&self, label: &str) -> Option<&CategorySelection> {
        self.categories.iter().find(|entry| entry.category == label)
    }

    /// Flatten into emission order with per-category rounds.
    pub fn entries(&self) -> Vec<SelectedEntry> {
        let mut entries = Vec::with_capacity(self.len());
        for category in &self.categories {
            for (idx, record) in category.records.iter().enumerate() {
                entries.push(SelectedEntry {
                    category: category.category.clone(),
                    round: idx + 1,
                    record: Arc::clone(record),
                });
            }
        }
        entries
    }

    /// Keep only records matching `keep`, preserving order.
    pub fn retain_records(&mut self, mut keep: impl FnMut(&PuzzleRecord) -> bool) {
        for category in &mut self.categories {
            category.records.retain(|record| keep(record));
        }
        self.categories.retain(|category| !category.is_empty());
    }

    /// Cap the total number of emitted pairs, cutting in emission order.
    pub fn truncate_total(&mut self, limit: usize) {
        let mut remaining = limit;
        for category in &mut self.categories {
            let keep = category.records.len().min(remaining);
            category.records.truncate(keep);
            remaining -= keep;
        }
        self.categories.retain(|category| !category.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, themes: &[&str]) -> SharedRecord {
        Arc::new(PuzzleRecord {
            id: id.to_string(),
            fen: String::new(),
            moves: Vec::new(),
            rating: 700,
            rating_deviation: 80,
            popularity: 90,
            num_plays: 100,
            themes: themes.iter().map(|t| t.to_string()).collect(),
            game_url: String::new(),
            opening_tags: Vec::new(),
        })
    }

    #[test]
    fn primary_themes_drop_empty_tokens() {
        let rec = record("a", &["mate", "", "fork"]);
        assert_eq!(rec.primary_themes().collect::<Vec<_>>(), vec!["mate", "fork"]);
        assert_eq!(rec.themes_joined(), "mate fork");
        assert!(!record("b", &[""]).has_themes());
    }

    #[test]
    fn entries_restart_round_per_category() {
        let selection = Selection::from_categories(vec![
            CategorySelection {
                category: "mate".into(),
                records: vec![record("a", &["mate"]), record("b", &["mate"])],
            },
            CategorySelection {
                category: "fork".into(),
                records: vec![record("c", &["fork"])],
            },
        ]);
        let entries = selection.entries();
        let labels: Vec<(&str, usize, &str)> = entries
            .iter()
            .map(|e| (e.category.as_str(), e.round, e.record.id.as_str()))
            .collect();
        assert_eq!(labels, vec![("fork", 1, "c"), ("mate", 1, "a"), ("mate", 2, "b")]);
    }

    #[test]
    fn truncate_total_cuts_in_emission_order() {
        let mut selection = Selection::from_categories(vec![
            CategorySelection {
                category: "a".into(),
                records: vec![record("1", &["a"]), record("2", &["a"])],
            },
            CategorySelection {
                category: "b".into(),
                records: vec![record("3", &["b"])],
            },
        ]);
        selection.truncate_total(1);
        assert_eq!(selection.len(), 1);
        assert!(selection.category("b").is_none());
        assert_eq!(selection.categories[0].records[0].id, "1");
    }
}
