use std::collections::HashSet;
use std::path::PathBuf;

use crate::constants::pgn::{DERIVED_DIR_PREFIX, OPENING_COLOR_VALUES};
use crate::constants::selection::{
    DEFAULT_BIN_WIDTH, DEFAULT_MAX_RATING, DEFAULT_MIN_RATING, DEFAULT_PER_CATEGORY,
};
use crate::errors::CuratorError;
use crate::types::{CategoryLabel, Rating};

/// How records are grouped before ranking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// One heap per category; output is the global top-N per category.
    Flat,
    /// One heap per category and rating bin, interleaved and colour-balanced.
    #[default]
    Stratified,
}

/// Side to move requested by `ExportConfig::force_color`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForcedColor {
    /// Keep only puzzles where white is to move.
    White,
    /// Keep only puzzles where black is to move.
    Black,
}

/// Configuration consumed by the selection engine.
#[derive(Clone, Debug)]
pub struct SelectionConfig {
    /// Lower bound of the rating band (inclusive).
    pub min_rating: Rating,
    /// Upper bound of the rating band (inclusive).
    pub max_rating: Rating,
    /// Maximum records emitted per category (`N`).
    pub per_category: usize,
    /// Rating bin width used in stratified mode.
    pub bin_width: Rating,
    /// Optional allow-list; `None` keeps every category.
    pub include_categories: Option<HashSet<CategoryLabel>>,
    /// Rating the proximity term is centered on; `None` prefers lower ratings.
    pub difficulty_center: Option<Rating>,
    /// Flat or stratified selection.
    pub mode: SelectionMode,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_rating: DEFAULT_MIN_RATING,
            max_rating: DEFAULT_MAX_RATING,
            per_category: DEFAULT_PER_CATEGORY,
            bin_width: DEFAULT_BIN_WIDTH,
            include_categories: None,
            difficulty_center: None,
            mode: SelectionMode::default(),
        }
    }
}

impl SelectionConfig {
    /// Restrict selection to the given categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CategoryLabel>,
    {
        self.include_categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    /// Check every precondition the engine relies on.
    ///
    /// Called once at setup so that no record is read under an invalid
    /// configuration.
    pub fn validate(&self) -> Result<(), CuratorError> {
        if self.min_rating > self.max_rating {
            return Err(CuratorError::Configuration(format!(
                "min rating {} is greater than max rating {}",
                self.min_rating, self.max_rating
            )));
        }
        if self.per_category == 0 {
            return Err(CuratorError::Configuration(
                "per-category quota must be greater than zero".to_string(),
            ));
        }
        if self.mode == SelectionMode::Stratified && self.bin_width <= 0 {
            return Err(CuratorError::Configuration(format!(
                "bin width must be positive, got {}",
                self.bin_width
            )));
        }
        Ok(())
    }

    /// Returns `true` when `category` passes the allow-list.
    pub fn allows(&self, category: &str) -> bool {
        self.include_categories
            .as_ref()
            .is_none_or(|allowed| allowed.contains(category))
    }

    /// Center used by the end-to-end pipeline: the explicit one, or the band midpoint.
    pub fn center_or_midpoint(&self) -> Rating {
        self.difficulty_center.unwrap_or_else(|| {
            let sum = i64::from(self.min_rating) + i64::from(self.max_rating);
            sum.div_euclid(2) as Rating
        })
    }
}

/// Configuration of the export stage that follows selection.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    /// Apply the opponent's first move so the solver is to move.
    pub start_after_first_move: bool,
    /// Keep only puzzles with this side to move (after the optional first move).
    pub force_color: Option<ForcedColor>,
    /// Value of the optional `OpeningColor` tag (`white`, `black`, or `both`).
    pub opening_color_tag: Option<String>,
    /// Optional prefix prepended to the `Event` tag.
    pub event_prefix: Option<String>,
    /// Optional cap on the total number of selected pairs.
    pub limit_total: Option<usize>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            start_after_first_move: true,
            force_color: None,
            opening_color_tag: None,
            event_prefix: None,
            limit_total: None,
        }
    }
}

impl ExportConfig {
    /// Validate tag values before any output is produced.
    pub fn validate(&self) -> Result<(), CuratorError> {
        if let Some(tag) = &self.opening_color_tag
            && !OPENING_COLOR_VALUES.contains(&tag.as_str())
        {
            return Err(CuratorError::Configuration(format!(
                "opening color tag must be one of {:?}, got '{}'",
                OPENING_COLOR_VALUES, tag
            )));
        }
        Ok(())
    }
}

/// Everything an end-to-end run needs: input, selection, export, and output locations.
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    /// Puzzle CSV (`.csv` or `.csv.zst`).
    pub csv_path: PathBuf,
    /// Selection settings.
    pub selection: SelectionConfig,
    /// Export settings.
    pub export: ExportConfig,
    /// Combined PGN output; `None` skips the combined file.
    pub out_pgn: Option<PathBuf>,
    /// Per-category output directory; `None` uses [`GenerationConfig::derived_out_dir`].
    pub out_dir: Option<PathBuf>,
}

impl GenerationConfig {
    /// Config with default selection/export settings reading `csv_path`.
    pub fn new(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            selection: SelectionConfig::default(),
            export: ExportConfig::default(),
            out_pgn: None,
            out_dir: None,
        }
    }

    /// Validate both halves before any input is opened.
    pub fn validate(&self) -> Result<(), CuratorError> {
        self.selection.validate()?;
        self.export.validate()
    }

    /// Directory name derived from the rating band, e.g. `themes_pgn_600-800`.
    pub fn derived_out_dir(&self) -> PathBuf {
        PathBuf::from(format!(
            "{DERIVED_DIR_PREFIX}_{}-{}",
            self.selection.min_rating, self.selection.max_rating
        ))
    }

    /// Resolved per-category output directory.
    pub fn resolved_out_dir(&self) -> PathBuf {
        self.out_dir
            .clone()
            .unwrap_or_else(|| self.derived_out_dir())
    }
}
