/// Constants used by the composite score key.
pub mod scoring {
    /// Salt mixed into every record id before hashing for jitter.
    pub const JITTER_SALT: &str = "sel_v1";
    /// Number of leading digest bytes read as a big-endian integer.
    pub const JITTER_PREFIX_BYTES: usize = 4;
    /// Jitter amplitude applied to the popularity term.
    pub const POPULARITY_JITTER_WEIGHT: f64 = 10.0;
    /// Jitter amplitude applied to the proximity term.
    pub const PROXIMITY_JITTER_WEIGHT: f64 = 2.0;
    /// Jitter amplitude applied to the volume term.
    pub const VOLUME_JITTER_WEIGHT: f64 = 0.5;
}

/// Defaults for the selection configuration surface.
pub mod selection {
    /// Default lower bound of the rating band (inclusive).
    pub const DEFAULT_MIN_RATING: i32 = 600;
    /// Default upper bound of the rating band (inclusive).
    pub const DEFAULT_MAX_RATING: i32 = 800;
    /// Default difficulty center used by the command line runner.
    pub const DEFAULT_CENTER: i32 = 700;
    /// Default per-category quota.
    pub const DEFAULT_PER_CATEGORY: usize = 50;
    /// Default rating bin width in stratified mode.
    pub const DEFAULT_BIN_WIDTH: i32 = 5;
    /// Shard id used by single-threaded engines.
    pub const SEQUENTIAL_SHARD: u32 = 0;
}

/// Column names of the Lichess puzzle CSV.
///
/// Documented at <https://database.lichess.org/#puzzles>.
pub mod csv_columns {
    /// Puzzle identifier.
    pub const PUZZLE_ID: &str = "PuzzleId";
    /// Position before the opponent's first move.
    pub const FEN: &str = "FEN";
    /// Space-separated UCI solution line, opponent move first.
    pub const MOVES: &str = "Moves";
    /// Glicko-2 puzzle rating.
    pub const RATING: &str = "Rating";
    /// Rating deviation.
    pub const RATING_DEVIATION: &str = "RatingDeviation";
    /// Popularity score in `[-100, 100]`.
    pub const POPULARITY: &str = "Popularity";
    /// Number of times the puzzle was played.
    pub const NB_PLAYS: &str = "NbPlays";
    /// Space-separated theme tags.
    pub const THEMES: &str = "Themes";
    /// Source game URL.
    pub const GAME_URL: &str = "GameUrl";
    /// Space-separated opening tags; may be empty.
    pub const OPENING_TAGS: &str = "OpeningTags";

    /// Every column the reader requires, in canonical order.
    pub const REQUIRED: [&str; 10] = [
        PUZZLE_ID,
        FEN,
        MOVES,
        RATING,
        RATING_DEVIATION,
        POPULARITY,
        NB_PLAYS,
        THEMES,
        GAME_URL,
        OPENING_TAGS,
    ];

    /// File suffix that switches the reader to zstd decompression.
    pub const ZSTD_SUFFIX: &str = ".zst";
    /// Filenames probed when no CSV path is given.
    pub const DEFAULT_CSV_CANDIDATES: [&str; 2] =
        ["lichess_db_puzzle.csv", "lichess_db_puzzle.csv.zst"];
}

/// Constants used by PGN export.
pub mod pgn {
    /// Neutral site tag (avoids orientation hints carried by game URLs).
    pub const SITE: &str = "https://lichess.org";
    /// Player name assigned to the side to move.
    pub const SOLVER_NAME: &str = "You";
    /// Player name assigned to the other side.
    pub const OPPONENT_NAME: &str = "Opponent";
    /// Result tag for unfinished puzzle games.
    pub const RESULT_UNFINISHED: &str = "*";
    /// Accepted values for the `OpeningColor` hint tag.
    pub const OPENING_COLOR_VALUES: [&str; 3] = ["white", "black", "both"];
    /// Extension used for per-category files.
    pub const FILE_EXTENSION: &str = "pgn";
    /// Default combined output filename.
    pub const DEFAULT_OUTPUT: &str = "puzzles_600_800.pgn";
    /// Prefix of the derived per-category output directory.
    pub const DERIVED_DIR_PREFIX: &str = "themes_pgn";
}

/// Constants used by the selection summary.
pub mod summary {
    /// Number of entries in the top-by-popularity listing.
    pub const TOP_BY_POPULARITY: usize = 10;
}
