use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum, error::ErrorKind};

use crate::config::{ExportConfig, ForcedColor, GenerationConfig, SelectionConfig, SelectionMode};
use crate::constants::csv_columns::DEFAULT_CSV_CANDIDATES;
use crate::constants::pgn::DEFAULT_OUTPUT;
use crate::constants::selection::{
    DEFAULT_BIN_WIDTH, DEFAULT_CENTER, DEFAULT_MAX_RATING, DEFAULT_MIN_RATING,
    DEFAULT_PER_CATEGORY,
};
use crate::pipeline::generate;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    White,
    Black,
}

impl From<ColorArg> for ForcedColor {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::White => ForcedColor::White,
            ColorArg::Black => ForcedColor::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OpeningColorArg {
    White,
    Black,
    Both,
}

impl OpeningColorArg {
    fn as_tag(self) -> &'static str {
        match self {
            OpeningColorArg::White => "white",
            OpeningColorArg::Black => "black",
            OpeningColorArg::Both => "both",
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "puzzle-curator",
    disable_help_subcommand = true,
    about = "Curate themed chess puzzle packs from the Lichess puzzle database",
    long_about = "Stream the Lichess puzzle CSV (plain or .zst), keep a rating band, select the best puzzles per theme spread evenly across the band with balanced side to move, and export PGN.",
    after_help = "Set RUST_LOG=debug to see skipped rows and per-theme balancing details."
)]
struct CuratorCli {
    #[arg(
        long = "csv-path",
        value_name = "PATH",
        help = "Path to lichess_db_puzzle.csv or .csv.zst (defaults to the first one found in the working directory)"
    )]
    csv_path: Option<PathBuf>,
    #[arg(long = "min-rating", default_value_t = DEFAULT_MIN_RATING, help = "Minimum rating (inclusive)")]
    min_rating: i32,
    #[arg(long = "max-rating", default_value_t = DEFAULT_MAX_RATING, help = "Maximum rating (inclusive)")]
    max_rating: i32,
    #[arg(
        long,
        default_value_t = DEFAULT_CENTER,
        help = "Difficulty center; puzzles closer to this rating rank higher"
    )]
    center: i32,
    #[arg(
        long = "per-theme",
        default_value_t = DEFAULT_PER_CATEGORY,
        value_parser = parse_positive_usize,
        help = "Select up to N puzzles per theme"
    )]
    per_theme: usize,
    #[arg(
        long = "bin-width",
        default_value_t = DEFAULT_BIN_WIDTH,
        help = "Rating bin width used to spread each theme across the band"
    )]
    bin_width: i32,
    #[arg(
        long = "flat",
        help = "Rank each theme as a whole instead of per rating bin (no side-to-move balancing)"
    )]
    flat: bool,
    #[arg(
        long = "include-theme",
        value_name = "THEME",
        help = "Restrict to a theme, repeat as needed (e.g. --include-theme mate --include-theme fork)"
    )]
    include_themes: Vec<String>,
    #[arg(
        long = "limit-total",
        value_parser = parse_positive_usize,
        help = "Optional hard cap on the total number of puzzles"
    )]
    limit_total: Option<usize>,
    #[arg(long = "out-pgn", value_name = "PATH", default_value = DEFAULT_OUTPUT, help = "Combined PGN output path")]
    out_pgn: PathBuf,
    #[arg(
        long = "out-dir",
        value_name = "DIR",
        help = "Directory for one PGN per theme (defaults to themes_pgn_<min>-<max>)"
    )]
    out_dir: Option<PathBuf>,
    #[arg(
        long = "start-after-first-move",
        default_value_t = true,
        action = ArgAction::Set,
        value_name = "BOOL",
        help = "Apply the opponent's first move so the solver is to move in the FEN"
    )]
    start_after_first_move: bool,
    #[arg(
        long = "force-color",
        value_enum,
        help = "Keep only puzzles where the solver to move is this color"
    )]
    force_color: Option<ColorArg>,
    #[arg(
        long = "opening-color-tag",
        value_enum,
        help = "Add an OpeningColor PGN tag hinting the course color to import tools"
    )]
    opening_color_tag: Option<OpeningColorArg>,
    #[arg(long = "event-prefix", help = "Prefix for the PGN Event tag")]
    event_prefix: Option<String>,
    #[arg(
        long = "summary-json",
        value_name = "PATH",
        help = "Also write the selection summary as JSON"
    )]
    summary_json: Option<PathBuf>,
}

impl CuratorCli {
    fn into_config(self, cwd: &Path) -> (GenerationConfig, Option<PathBuf>) {
        let csv_path = self.csv_path.unwrap_or_else(|| default_csv_path(cwd));
        let selection = SelectionConfig {
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            per_category: self.per_theme,
            bin_width: self.bin_width,
            include_categories: if self.include_themes.is_empty() {
                None
            } else {
                Some(self.include_themes.into_iter().collect())
            },
            difficulty_center: Some(self.center),
            mode: if self.flat {
                SelectionMode::Flat
            } else {
                SelectionMode::Stratified
            },
        };
        let export = ExportConfig {
            start_after_first_move: self.start_after_first_move,
            force_color: self.force_color.map(Into::into),
            opening_color_tag: self.opening_color_tag.map(|tag| tag.as_tag().to_string()),
            event_prefix: self.event_prefix,
            limit_total: self.limit_total,
        };
        let config = GenerationConfig {
            csv_path,
            selection,
            export,
            out_pgn: Some(self.out_pgn),
            out_dir: self.out_dir,
        };
        (config, self.summary_json)
    }
}

/// First default CSV name present in `cwd`, else the plain CSV name.
fn default_csv_path(cwd: &Path) -> PathBuf {
    DEFAULT_CSV_CANDIDATES
        .iter()
        .map(|name| cwd.join(name))
        .find(|path| path.exists())
        .unwrap_or_else(|| cwd.join(DEFAULT_CSV_CANDIDATES[0]))
}

/// Command line entry point. `args_iter` excludes the program name.
pub fn run<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<CuratorCli, _>(
        std::iter::once("puzzle-curator".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let (config, summary_json) = cli.into_config(&cwd);
    let report = generate(&config)?;

    if let Some(path) = &report.out_pgn {
        println!(
            "Wrote {} puzzles to {}",
            report.written_combined,
            path.display()
        );
    }
    println!();
    println!("{}", report.output.summary);
    match &report.per_theme_counts {
        Some(counts) => println!(
            "Wrote {} per-theme PGNs to {}",
            counts.len(),
            report.out_dir.display()
        ),
        None => eprintln!(
            "Per-theme PGNs could not be written to {}",
            report.out_dir.display()
        ),
    }
    if let Some(path) = summary_json {
        std::fs::write(&path, report.output.summary.to_json_pretty()?)?;
        println!("Wrote summary to {}", path.display());
    }
    Ok(())
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
