#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Round-robin bin interleaving with side-to-move balancing.
pub mod balance;
/// Attribute classification of puzzles (side to move).
pub mod classify;
/// Command line runner.
pub mod cli;
/// Selection, export, and generation configuration types.
pub mod config;
/// Centralized constants used across scoring, ingestion, and export.
pub mod constants;
/// Puzzle records and selection output types.
pub mod data;
/// Streaming selection engine and sharded parallel selection.
pub mod engine;
mod hash;
/// Bounded per-category top-K heap.
pub mod heap;
/// Streaming CSV ingestion.
pub mod ingestion;
/// Selection summary report.
pub mod metrics;
/// PGN export.
pub mod pgn;
/// End-to-end generation pipeline.
pub mod pipeline;
/// Composite score key.
pub mod score;
/// Fixed-width rating stratification.
pub mod stratify;
/// Shared type aliases.
pub mod types;

mod errors;

pub use balance::{BalancedCategory, Balancer};
pub use classify::{Attribute, AttributeClassifier, SideToMoveClassifier};
pub use config::{ExportConfig, ForcedColor, GenerationConfig, SelectionConfig, SelectionMode};
pub use data::{CategorySelection, PuzzleRecord, SelectedEntry, Selection, SharedRecord};
pub use engine::{SelectionEngine, SelectionStats, select, select_parallel};
pub use errors::CuratorError;
pub use hash::{stable_noise, stable_noise_with_salt};
pub use heap::{BoundedCategoryHeap, Offer, ScoreEntry, Sequence};
pub use ingestion::{PuzzleCsvReader, filter_by_rating, normalize_uci};
pub use metrics::{SelectionSummary, summarize};
pub use pgn::{PgnOptions, PgnWriter, ThemeNames, write_per_category_dir, write_pgn_file};
pub use pipeline::{GenerationReport, PipelineOutput, build_pipeline, generate};
pub use score::{CompositeKey, score};
pub use stratify::{Stratifier, bin_index};
pub use types::{BinIndex, CategoryLabel, FenText, Rating, RecordId, ShardId, UciText};
