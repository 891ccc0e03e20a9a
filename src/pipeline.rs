//! End-to-end run: stream, filter, select, export, summarize.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::classify::{Attribute, AttributeClassifier, SideToMoveClassifier};
use crate::config::{ExportConfig, ForcedColor, GenerationConfig, SelectionConfig};
use crate::data::{PuzzleRecord, Selection};
use crate::engine::{SelectionEngine, SelectionStats};
use crate::errors::CuratorError;
use crate::ingestion::PuzzleCsvReader;
use crate::metrics::{SelectionSummary, summarize};
use crate::pgn::{PgnOptions, write_per_category_dir, write_pgn_file};
use crate::types::CategoryLabel;

/// Result of [`build_pipeline`].
#[derive(Debug)]
pub struct PipelineOutput {
    /// Final selection after colour filtering and the total cap.
    pub selection: Selection,
    /// Engine counters for the pass.
    pub stats: SelectionStats,
    /// Games written to the combined file, or the selected pair count when no file was requested.
    pub written: usize,
    /// Report over the final selection.
    pub summary: SelectionSummary,
}

/// Result of [`generate`].
#[derive(Debug)]
pub struct GenerationReport {
    /// Pipeline output.
    pub output: PipelineOutput,
    /// Games written to the combined file (0 when none was requested).
    pub written_combined: usize,
    /// Per-category counts, or `None` if the per-category export failed.
    pub per_theme_counts: Option<BTreeMap<CategoryLabel, usize>>,
    /// Directory the per-category files were written to.
    pub out_dir: PathBuf,
    /// Combined file path, if any.
    pub out_pgn: Option<PathBuf>,
}

/// Settings actually used by the pipeline: centered on the band midpoint unless set.
fn effective_selection(config: &SelectionConfig) -> SelectionConfig {
    SelectionConfig {
        difficulty_center: Some(config.center_or_midpoint()),
        ..config.clone()
    }
}

fn forced_attribute(color: ForcedColor) -> Attribute {
    match color {
        ForcedColor::White => Attribute::White,
        ForcedColor::Black => Attribute::Black,
    }
}

/// Run selection and export over a record stream.
///
/// Records outside `[min_rating, max_rating]` are dropped before they reach
/// the engine. Ingestion errors abort the run; everything already selected is
/// discarded with it.
pub fn build_pipeline<I>(
    records: I,
    selection_config: &SelectionConfig,
    export: &ExportConfig,
    out_pgn: Option<&Path>,
) -> Result<PipelineOutput, CuratorError>
where
    I: IntoIterator<Item = Result<PuzzleRecord, CuratorError>>,
{
    export.validate()?;
    let config = effective_selection(selection_config);
    let mut engine = SelectionEngine::new(config.clone())?;
    let band = config.min_rating..=config.max_rating;
    let mut out_of_band = 0u64;
    for record in records {
        let record = record?;
        if band.contains(&record.rating) {
            engine.offer(record);
        } else {
            out_of_band += 1;
        }
    }
    let stats = engine.stats();
    info!(
        out_of_band,
        in_band = stats.records_seen,
        "rating band filter applied"
    );

    let classifier = SideToMoveClassifier::new(export.start_after_first_move);
    let mut selection = engine.finish(&classifier);

    if let Some(color) = export.force_color {
        let desired = forced_attribute(color);
        let before = selection.len();
        selection.retain_records(|record| classifier.classify(record) == desired);
        info!(
            color = ?color,
            kept = selection.len(),
            dropped = before - selection.len(),
            "forced side to move"
        );
    }
    if let Some(limit) = export.limit_total {
        selection.truncate_total(limit);
    }

    let written = match out_pgn {
        Some(path) => write_pgn_file(&selection, path, &PgnOptions::from(export))?,
        None => selection.len(),
    };
    let summary = summarize(&selection, &classifier, None);
    Ok(PipelineOutput {
        selection,
        stats,
        written,
        summary,
    })
}

/// Full generation from a [`GenerationConfig`]: combined file plus one file per category.
///
/// A failure while writing the per-category directory is logged and reported
/// as `per_theme_counts: None`; it does not fail the run.
pub fn generate(config: &GenerationConfig) -> Result<GenerationReport, CuratorError> {
    config.validate()?;
    let reader = PuzzleCsvReader::open(&config.csv_path)?;
    let output = build_pipeline(
        reader,
        &config.selection,
        &config.export,
        config.out_pgn.as_deref(),
    )?;
    let written_combined = if config.out_pgn.is_some() {
        output.written
    } else {
        0
    };

    let out_dir = config.resolved_out_dir();
    let options = PgnOptions::from(&config.export);
    let per_theme_counts = match write_per_category_dir(&output.selection, &out_dir, &options) {
        Ok(counts) => Some(counts),
        Err(err) => {
            warn!(dir = %out_dir.display(), error = %err, "per-category export failed");
            None
        }
    };

    Ok(GenerationReport {
        output,
        written_combined,
        per_theme_counts,
        out_dir,
        out_pgn: config.out_pgn.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE_FEN: &str = "r3r1k1/p4ppp/2p2n2/1p6/3P1qb1/2NQR3/PPB2PP1/R1B3K1 w - - 5 18";
    const BLACK_FEN: &str = "q3k1nr/1pp1nQpp/3p4/1P2p3/4P3/B1PP1b2/B5PP/5K2 b k - 0 17";

    fn record(id: &str, fen: &str, moves: &[&str], rating: i32, popularity: i32) -> PuzzleRecord {
        PuzzleRecord {
            id: id.to_string(),
            fen: fen.to_string(),
            moves: moves.iter().map(|m| m.to_string()).collect(),
            rating,
            rating_deviation: 80,
            popularity,
            num_plays: 100,
            themes: vec!["mate".to_string()],
            game_url: String::new(),
            opening_tags: Vec::new(),
        }
    }

    fn stream() -> Vec<Result<PuzzleRecord, CuratorError>> {
        vec![
            Ok(record("w1", WHITE_FEN, &["e3g3", "e8e1"], 700, 90)),
            Ok(record("b1", BLACK_FEN, &["e8d7", "a2e6"], 710, 80)),
            Ok(record("low", WHITE_FEN, &["e3g3"], 500, 100)),
            Ok(record("w2", WHITE_FEN, &["e3g3", "e8e1"], 720, 70)),
        ]
    }

    #[test]
    fn out_of_band_records_never_reach_the_engine() {
        let output = build_pipeline(
            stream(),
            &SelectionConfig::default(),
            &ExportConfig::default(),
            None,
        )
        .unwrap();
        assert_eq!(output.stats.records_seen, 3);
        assert_eq!(output.written, 3);
        assert!(output
            .selection
            .categories[0]
            .records
            .iter()
            .all(|r| r.id != "low"));
    }

    #[test]
    fn forced_color_filters_after_first_move() {
        let export = ExportConfig {
            force_color: Some(ForcedColor::Black),
            ..ExportConfig::default()
        };
        let output = build_pipeline(stream(), &SelectionConfig::default(), &export, None).unwrap();
        let ids: Vec<&str> = output.selection.categories[0]
            .records
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.starts_with('w')));
        assert_eq!(output.summary.color_to_move.black, 2);
    }

    #[test]
    fn limit_total_caps_output() {
        let export = ExportConfig {
            limit_total: Some(1),
            ..ExportConfig::default()
        };
        let output = build_pipeline(stream(), &SelectionConfig::default(), &export, None).unwrap();
        assert_eq!(output.written, 1);
        assert_eq!(output.summary.total, 1);
    }

    #[test]
    fn ingestion_errors_abort_the_run() {
        let mut records = stream();
        records.push(Err(CuratorError::Configuration("boom".to_string())));
        assert!(
            build_pipeline(
                records,
                &SelectionConfig::default(),
                &ExportConfig::default(),
                None
            )
            .is_err()
        );
    }

    #[test]
    fn writes_combined_file_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.pgn");
        let output = build_pipeline(
            stream(),
            &SelectionConfig::default(),
            &ExportConfig::default(),
            Some(&path),
        )
        .unwrap();
        assert_eq!(output.written, 3);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("[PuzzleId ").count(), 3);
    }
}
