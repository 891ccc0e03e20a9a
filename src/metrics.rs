use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::{Attribute, AttributeClassifier};
use crate::constants::summary::TOP_BY_POPULARITY;
use crate::data::{PuzzleRecord, Selection};
use crate::errors::CuratorError;
use crate::types::{CategoryLabel, Rating, RecordId};

/// Aggregate report of a selection, computed over `(category, record)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    /// Selected pairs.
    pub total: usize,
    /// Categories with at least one selected record.
    pub theme_count: usize,
    /// Per-category aggregates, largest first, then by label.
    pub themes: Vec<ThemeSummary>,
    /// Rating statistics; absent for an empty selection.
    pub ratings: Option<RatingStats>,
    /// Popularity statistics; absent for an empty selection.
    pub popularity: Option<PopularityStats>,
    /// Side-to-move distribution of the presented positions.
    pub color_to_move: ColorCounts,
    /// Most popular selected puzzles, ties broken by play count.
    pub top_puzzles_by_popularity: Vec<TopPuzzle>,
}

/// Aggregates of one category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThemeSummary {
    /// Category label.
    pub theme: CategoryLabel,
    /// Selected puzzles in the category.
    pub count: usize,
    /// Mean rating.
    pub rating_avg: f64,
    /// Lowest rating.
    pub rating_min: Rating,
    /// Highest rating.
    pub rating_max: Rating,
    /// Mean popularity.
    pub pop_avg: f64,
}

/// Rating distribution over the whole selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    /// Lowest rating.
    pub min: Rating,
    /// Highest rating.
    pub max: Rating,
    /// Mean rating.
    pub avg: f64,
    /// Median rating; the mean of the middle pair for even counts.
    pub median: f64,
}

/// Popularity distribution over the whole selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopularityStats {
    /// Lowest popularity.
    pub min: i32,
    /// Highest popularity.
    pub max: i32,
    /// Mean popularity.
    pub avg: f64,
}

/// Side to move counts. `unknown` covers positions that could not be replayed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCounts {
    /// White to move.
    pub white: usize,
    /// Black to move.
    pub black: usize,
    /// Not replayable.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unknown: usize,
}

fn is_zero(value: &usize) -> bool {
    *value == 0
}

/// One entry of the popularity leaderboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopPuzzle {
    /// Puzzle identifier.
    pub puzzle_id: RecordId,
    /// Puzzle rating.
    pub rating: Rating,
    /// Popularity score.
    pub popularity: i32,
    /// Theme tags joined by spaces.
    pub themes: String,
}

fn mean(values: &[i32]) -> f64 {
    values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len() as f64
}

/// Median of a non-empty slice; even lengths average the middle pair.
fn median(values: &[i32]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        f64::from(sorted[mid])
    } else {
        (f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0
    }
}

/// Summarize `selection`. `top_themes` optionally truncates the per-category list.
pub fn summarize(
    selection: &Selection,
    classifier: &dyn AttributeClassifier,
    top_themes: Option<usize>,
) -> SelectionSummary {
    let pairs: Vec<(&str, &PuzzleRecord)> = selection
        .categories
        .iter()
        .flat_map(|category| {
            category
                .records
                .iter()
                .map(move |record| (category.category.as_str(), record.as_ref()))
        })
        .collect();
    if pairs.is_empty() {
        return SelectionSummary::default();
    }

    let ratings: Vec<Rating> = pairs.iter().map(|(_, p)| p.rating).collect();
    let pops: Vec<i32> = pairs.iter().map(|(_, p)| p.popularity).collect();

    let mut per_theme: BTreeMap<&str, Vec<&PuzzleRecord>> = BTreeMap::new();
    for &(theme, record) in &pairs {
        per_theme.entry(theme).or_default().push(record);
    }
    let theme_count = per_theme.len();
    let mut themes: Vec<ThemeSummary> = per_theme
        .into_iter()
        .map(|(theme, items)| {
            let r: Vec<Rating> = items.iter().map(|p| p.rating).collect();
            let pp: Vec<i32> = items.iter().map(|p| p.popularity).collect();
            ThemeSummary {
                theme: theme.to_string(),
                count: items.len(),
                rating_avg: mean(&r),
                rating_min: r.iter().copied().min().unwrap_or_default(),
                rating_max: r.iter().copied().max().unwrap_or_default(),
                pop_avg: mean(&pp),
            }
        })
        .collect();
    themes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.theme.cmp(&b.theme)));
    if let Some(limit) = top_themes {
        themes.truncate(limit);
    }

    let mut color_to_move = ColorCounts::default();
    for (_, record) in &pairs {
        match classifier.classify(record) {
            Attribute::White => color_to_move.white += 1,
            Attribute::Black => color_to_move.black += 1,
            Attribute::Unknown => color_to_move.unknown += 1,
        }
    }

    let mut by_popularity: Vec<&PuzzleRecord> = pairs.iter().map(|(_, p)| *p).collect();
    by_popularity.sort_by(|a, b| {
        b.popularity
            .cmp(&a.popularity)
            .then_with(|| b.num_plays.cmp(&a.num_plays))
    });
    let top_puzzles_by_popularity = by_popularity
        .into_iter()
        .take(TOP_BY_POPULARITY)
        .map(|p| TopPuzzle {
            puzzle_id: p.id.clone(),
            rating: p.rating,
            popularity: p.popularity,
            themes: p.themes_joined(),
        })
        .collect();

    SelectionSummary {
        total: pairs.len(),
        theme_count,
        themes,
        ratings: Some(RatingStats {
            min: ratings.iter().copied().min().unwrap_or_default(),
            max: ratings.iter().copied().max().unwrap_or_default(),
            avg: mean(&ratings),
            median: median(&ratings),
        }),
        popularity: Some(PopularityStats {
            min: pops.iter().copied().min().unwrap_or_default(),
            max: pops.iter().copied().max().unwrap_or_default(),
            avg: mean(&pops),
        }),
        color_to_move,
        top_puzzles_by_popularity,
    }
}

impl SelectionSummary {
    /// Pretty-printed JSON form.
    pub fn to_json_pretty(&self) -> Result<String, CuratorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SelectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(
            f,
            "- Total: {} puzzles across {} themes",
            self.total, self.theme_count
        )?;
        if let Some(r) = &self.ratings {
            writeln!(
                f,
                "- Ratings: min {}, max {}, avg {:.1}, median {:.1}",
                r.min, r.max, r.avg, r.median
            )?;
        }
        if self.total > 0 {
            write!(
                f,
                "- Start side to move: White {}, Black {}",
                self.color_to_move.white, self.color_to_move.black
            )?;
            if self.color_to_move.unknown > 0 {
                write!(f, ", Unknown {}", self.color_to_move.unknown)?;
            }
            writeln!(f)?;
        }
        if !self.themes.is_empty() {
            writeln!(f, "- Themes (count, avg rating, avg pop):")?;
            for t in &self.themes {
                writeln!(
                    f,
                    "  - {}: {}, {:.1}, {:.1}",
                    t.theme, t.count, t.rating_avg, t.pop_avg
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CategorySelection;
    use std::sync::Arc;

    fn record(id: &str, rating: i32, popularity: i32, plays: i64) -> Arc<PuzzleRecord> {
        Arc::new(PuzzleRecord {
            id: id.to_string(),
            fen: String::new(),
            moves: Vec::new(),
            rating,
            rating_deviation: 80,
            popularity,
            num_plays: plays,
            themes: vec!["mate".to_string()],
            game_url: String::new(),
            opening_tags: Vec::new(),
        })
    }

    fn by_parity(record: &PuzzleRecord) -> Attribute {
        if record.rating % 2 == 0 {
            Attribute::White
        } else {
            Attribute::Black
        }
    }

    fn sample() -> Selection {
        Selection::from_categories(vec![
            CategorySelection {
                category: "mate".into(),
                records: vec![record("a", 600, 90, 10), record("b", 701, 95, 5)],
            },
            CategorySelection {
                category: "fork".into(),
                records: vec![
                    record("c", 650, 95, 50),
                    record("d", 800, 10, 1),
                    record("e", 700, 20, 1),
                ],
            },
        ])
    }

    #[test]
    fn empty_selection_has_empty_summary() {
        let summary = summarize(&Selection::default(), &by_parity, None);
        assert_eq!(summary.total, 0);
        assert!(summary.ratings.is_none());
        assert!(summary.themes.is_empty());
    }

    #[test]
    fn aggregates_ratings_themes_and_colors() {
        let summary = summarize(&sample(), &by_parity, None);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.theme_count, 2);
        assert_eq!(summary.themes[0].theme, "fork");
        assert_eq!(summary.themes[0].count, 3);
        assert_eq!(summary.themes[1].rating_max, 701);
        let ratings = summary.ratings.as_ref().unwrap();
        assert_eq!((ratings.min, ratings.max), (600, 800));
        assert_eq!(ratings.median, 700.0);
        assert_eq!(summary.color_to_move.white, 4);
        assert_eq!(summary.color_to_move.black, 1);
    }

    #[test]
    fn top_by_popularity_breaks_ties_by_plays() {
        let summary = summarize(&sample(), &by_parity, None);
        let ids: Vec<&str> = summary
            .top_puzzles_by_popularity
            .iter()
            .map(|p| p.puzzle_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a", "e", "d"]);
    }

    #[test]
    fn top_themes_truncates() {
        let summary = summarize(&sample(), &by_parity, Some(1));
        assert_eq!(summary.themes.len(), 1);
        assert_eq!(summary.theme_count, 2);
    }

    #[test]
    fn median_of_even_length_averages() {
        assert_eq!(median(&[4, 1, 3, 2]), 2.5);
    }

    #[test]
    fn json_and_text_renderings() {
        let summary = summarize(&sample(), &by_parity, None);
        let json = summary.to_json_pretty().unwrap();
        let parsed: SelectionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, summary);
        let text = summary.to_string();
        assert!(text.contains("- Total: 5 puzzles across 2 themes"));
        assert!(text.contains("- Start side to move: White 4, Black 1"));
    }
}
