use std::io;

use thiserror::Error;

/// Error type for configuration, ingestion, and export failures.
///
/// Per-record defects never surface here: malformed rows, unclassifiable
/// positions, and illegal move sequences are skipped where they occur.
#[derive(Debug, Error)]
pub enum CuratorError {
    /// Invalid settings, rejected before any input is read.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Header lacks required columns; the missing names are listed.
    #[error("CSV is missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
    /// Reading input or writing output failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// CSV stream failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Summary serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Theme-name pattern failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),
}
