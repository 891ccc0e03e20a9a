//! PGN export of a finished selection.
//!
//! Every selected `(category, record)` pair becomes one game: the presented
//! position goes into the `FEN` tag, the remaining solution line becomes SAN
//! movetext, and the side to move is named "You". Records with no moves or
//! with a line that does not replay legally are skipped and do not consume a
//! round number.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{Chess, Color, EnPassantMode, Position};
use tracing::{debug, info};

use crate::classify::{ReplayError, legal_move, presented_position};
use crate::config::ExportConfig;
use crate::constants::pgn::{
    FILE_EXTENSION, OPENING_COLOR_VALUES, OPPONENT_NAME, RESULT_UNFINISHED, SITE, SOLVER_NAME,
};
use crate::data::{PuzzleRecord, Selection};
use crate::errors::CuratorError;
use crate::types::CategoryLabel;

const UNKNOWN_DATE: &str = "????.??.??";
const MOVETEXT_COLUMNS: usize = 80;

/// Knobs that change how games are rendered.
#[derive(Clone, Debug, Default)]
pub struct PgnOptions {
    /// Apply the opponent's first move before writing the position.
    pub skip_first_move: bool,
    /// Value of the `OpeningColor` tag; omitted when `None`.
    pub opening_color_tag: Option<String>,
    /// Prefix of the `Event` tag.
    pub event_prefix: Option<String>,
}

impl From<&ExportConfig> for PgnOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            skip_first_move: config.start_after_first_move,
            opening_color_tag: config.opening_color_tag.clone(),
            event_prefix: config.event_prefix.clone(),
        }
    }
}

/// Human-readable theme names and file stems derived from camelCase labels.
#[derive(Clone, Debug)]
pub struct ThemeNames {
    word_break: Regex,
    unsafe_chars: Regex,
    whitespace: Regex,
}

impl ThemeNames {
    /// Compile the name patterns.
    pub fn new() -> Result<Self, CuratorError> {
        Ok(Self {
            word_break: Regex::new(r"([a-z])([A-Z0-9])")?,
            unsafe_chars: Regex::new(r"[^\w\- ]+")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// `mateIn2` becomes `Mate In 2`, `back_rank` becomes `Back Rank`.
    pub fn humanize(&self, theme: &str) -> String {
        if theme.is_empty() {
            return String::new();
        }
        let spaced = self.word_break.replace_all(theme, "${1} ${2}");
        title_case(spaced.replace('_', " ").trim())
    }

    /// Filesystem-safe stem for a category's PGN file.
    pub fn file_stem(&self, theme: &str) -> String {
        let friendly = match self.humanize(theme) {
            name if name.is_empty() => theme.to_string(),
            name => name,
        };
        let safe = self.unsafe_chars.replace_all(&friendly, "_");
        self.whitespace.replace_all(safe.trim(), " ").into_owned()
    }
}

/// Uppercase the first letter of every run of letters and lowercase the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

fn escape_tag(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Replay `moves` from `pos` as numbered SAN, wrapped to the PGN line width.
fn movetext(mut pos: Chess, moves: &[String]) -> Result<String, ReplayError> {
    let mut tokens = Vec::with_capacity(moves.len() * 2 + 1);
    for (idx, uci) in moves.iter().enumerate() {
        let m = legal_move(&pos, uci).ok_or(ReplayError::IllegalMove(idx))?;
        let number = pos.fullmoves();
        match pos.turn() {
            Color::White => tokens.push(format!("{number}.")),
            Color::Black if idx == 0 => tokens.push(format!("{number}...")),
            Color::Black => {}
        }
        tokens.push(SanPlus::from_move_and_play_unchecked(&mut pos, &m).to_string());
    }
    tokens.push(RESULT_UNFINISHED.to_string());

    let mut text = String::new();
    let mut line_len = 0;
    for token in tokens {
        if line_len > 0 && line_len + 1 + token.len() > MOVETEXT_COLUMNS {
            text.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            text.push(' ');
            line_len += 1;
        }
        line_len += token.len();
        text.push_str(&token);
    }
    Ok(text)
}

/// Streams games to any writer, numbering rounds per category.
pub struct PgnWriter<W: Write> {
    out: W,
    options: PgnOptions,
    names: ThemeNames,
    rounds: HashMap<CategoryLabel, usize>,
    written: usize,
    skipped: usize,
}

impl<W: Write> PgnWriter<W> {
    /// Create a writer. Fails if the opening colour tag is not an accepted value.
    pub fn new(out: W, options: PgnOptions) -> Result<Self, CuratorError> {
        if let Some(tag) = &options.opening_color_tag
            && !OPENING_COLOR_VALUES.contains(&tag.as_str())
        {
            return Err(CuratorError::Configuration(format!(
                "opening color tag must be one of {OPENING_COLOR_VALUES:?}, got '{tag}'"
            )));
        }
        Ok(Self {
            out,
            options,
            names: ThemeNames::new()?,
            rounds: HashMap::new(),
            written: 0,
            skipped: 0,
        })
    }

    /// Games written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Records skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn event(&self, category: &str) -> String {
        let friendly = match self.names.humanize(category) {
            name if name.is_empty() => category.to_string(),
            name => name,
        };
        match self.options.event_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                let sep = if prefix.ends_with(' ') { "" } else { " " };
                format!("{prefix}{sep}{friendly}").trim().to_string()
            }
            _ => friendly,
        }
    }

    /// Write one game. Returns `Ok(false)` when the record was skipped.
    pub fn write_game(
        &mut self,
        category: &str,
        record: &PuzzleRecord,
    ) -> Result<bool, CuratorError> {
        if record.moves.is_empty() {
            self.skipped += 1;
            debug!(puzzle = %record.id, "skipping puzzle without moves");
            return Ok(false);
        }
        let rendered = presented_position(record, self.options.skip_first_move).and_then(
            |(pos, remaining)| {
                let fen = Fen::from_setup(pos.clone().into_setup(EnPassantMode::Legal));
                let turn = pos.turn();
                movetext(pos, remaining).map(|text| (fen, turn, text))
            },
        );
        let (fen, turn, text) = match rendered {
            Ok(parts) => parts,
            Err(err) => {
                self.skipped += 1;
                debug!(puzzle = %record.id, error = ?err, "skipping puzzle that does not replay");
                return Ok(false);
            }
        };

        let round = self.rounds.entry(category.to_string()).or_insert(0);
        *round += 1;
        let round = *round;
        let (white, black) = match turn {
            Color::White => (SOLVER_NAME, OPPONENT_NAME),
            Color::Black => (OPPONENT_NAME, SOLVER_NAME),
        };

        let mut tags: Vec<(&str, String)> = vec![
            ("Event", self.event(category)),
            ("Site", SITE.to_string()),
            ("Date", UNKNOWN_DATE.to_string()),
            ("Round", round.to_string()),
            ("White", white.to_string()),
            ("Black", black.to_string()),
            ("Result", RESULT_UNFINISHED.to_string()),
            ("SetUp", "1".to_string()),
            ("FEN", fen.to_string()),
            ("LichessURL", record.game_url.clone()),
        ];
        if let Some(tag) = &self.options.opening_color_tag {
            tags.push(("OpeningColor", tag.clone()));
        }
        tags.push(("PuzzleId", record.id.clone()));
        tags.push(("Themes", record.themes_joined()));

        for (name, value) in &tags {
            writeln!(self.out, "[{name} \"{}\"]", escape_tag(value))?;
        }
        writeln!(self.out)?;
        write!(self.out, "{text}\n\n\n")?;
        self.written += 1;
        Ok(true)
    }

    /// Write every entry of `selection` in emission order. Returns games written by this call.
    pub fn write_selection(&mut self, selection: &Selection) -> Result<usize, CuratorError> {
        let before = self.written;
        for category in &selection.categories {
            for record in &category.records {
                self.write_game(&category.category, record)?;
            }
        }
        Ok(self.written - before)
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, CuratorError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Write the whole selection to one file, creating parent directories as needed.
pub fn write_pgn_file(
    selection: &Selection,
    path: &Path,
    options: &PgnOptions,
) -> Result<usize, CuratorError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut writer = PgnWriter::new(BufWriter::new(File::create(path)?), options.clone())?;
    let written = writer.write_selection(selection)?;
    let skipped = writer.skipped();
    writer.finish()?;
    info!(path = %path.display(), written, skipped, "wrote pgn");
    Ok(written)
}

/// Path of a category's file inside `dir`.
pub fn category_file_path(names: &ThemeNames, dir: &Path, category: &str) -> PathBuf {
    dir.join(format!("{}.{FILE_EXTENSION}", names.file_stem(category)))
}

/// Write one PGN file per category into `dir`. Returns games written per category.
pub fn write_per_category_dir(
    selection: &Selection,
    dir: &Path,
    options: &PgnOptions,
) -> Result<BTreeMap<CategoryLabel, usize>, CuratorError> {
    fs::create_dir_all(dir)?;
    let names = ThemeNames::new()?;
    let mut counts = BTreeMap::new();
    for category in &selection.categories {
        let path = category_file_path(&names, dir, &category.category);
        let mut writer = PgnWriter::new(BufWriter::new(File::create(&path)?), options.clone())?;
        for record in &category.records {
            writer.write_game(&category.category, record)?;
        }
        counts.insert(category.category.clone(), writer.written());
        writer.finish()?;
    }
    info!(dir = %dir.display(), files = counts.len(), "wrote per-category pgn files");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATE_FEN: &str = "q3k1nr/1pp1nQpp/3p4/1P2p3/4P3/B1PP1b2/B5PP/5K2 b k - 0 17";
    const FORK_FEN: &str = "r3r1k1/p4ppp/2p2n2/1p6/3P1qb1/2NQR3/PPB2PP1/R1B3K1 w - - 5 18";

    fn record(id: &str, fen: &str, moves: &[&str], themes: &[&str]) -> PuzzleRecord {
        PuzzleRecord {
            id: id.to_string(),
            fen: fen.to_string(),
            moves: moves.iter().map(|m| m.to_string()).collect(),
            rating: 700,
            rating_deviation: 80,
            popularity: 90,
            num_plays: 100,
            themes: themes.iter().map(|t| t.to_string()).collect(),
            game_url: "https://lichess.org/yyznGmXs/black#34".to_string(),
            opening_tags: Vec::new(),
        }
    }

    fn mate() -> PuzzleRecord {
        record("00sHx", MATE_FEN, &["e8d7", "a2e6", "d7d8", "f7f8"], &["mate", "mateIn2"])
    }

    fn fork() -> PuzzleRecord {
        record("00sJ9", FORK_FEN, &["e3g3", "e8e1", "g1h2"], &["fork"])
    }

    fn render(options: PgnOptions, games: &[(&str, PuzzleRecord)]) -> (String, usize) {
        let mut writer = PgnWriter::new(Vec::new(), options).unwrap();
        for (category, record) in games {
            writer.write_game(category, record).unwrap();
        }
        let written = writer.written();
        (String::from_utf8(writer.finish().unwrap()).unwrap(), written)
    }

    #[test]
    fn humanizes_camel_case_and_underscores() {
        let names = ThemeNames::new().unwrap();
        assert_eq!(names.humanize("mateIn2"), "Mate In 2");
        assert_eq!(names.humanize("backRankMate"), "Back Rank Mate");
        assert_eq!(names.humanize("back_rank"), "Back Rank");
        assert_eq!(names.humanize(""), "");
    }

    #[test]
    fn file_stems_are_filesystem_safe() {
        let names = ThemeNames::new().unwrap();
        assert_eq!(names.file_stem("mateIn2"), "Mate In 2");
        assert_eq!(names.file_stem("a/b:c"), "A_B_C");
    }

    #[test]
    fn side_to_move_is_named_you() {
        let (text, _) = render(PgnOptions::default(), &[("fork", fork()), ("mate", mate())]);
        assert!(text.contains("[White \"You\"]\n[Black \"Opponent\"]"));
        assert!(text.contains("[White \"Opponent\"]\n[Black \"You\"]"));
        assert!(text.contains("[SetUp \"1\"]"));
        assert!(text.contains(&format!("[FEN \"{MATE_FEN}\"]")));
        assert!(text.contains("17... Kd7 18. Be6+"));
    }

    #[test]
    fn skipping_first_move_flips_the_solver() {
        let options = PgnOptions {
            skip_first_move: true,
            ..PgnOptions::default()
        };
        let (text, written) = render(options, &[("fork", fork())]);
        assert_eq!(written, 1);
        assert!(text.contains("[White \"Opponent\"]\n[Black \"You\"]"));
        assert!(text.contains("18... Re1+"));
    }

    #[test]
    fn event_uses_prefix_and_humanized_theme() {
        let options = PgnOptions {
            event_prefix: Some("Test".to_string()),
            opening_color_tag: Some("both".to_string()),
            ..PgnOptions::default()
        };
        let (text, _) = render(options, &[("mate", mate()), ("fork", fork())]);
        assert!(text.contains("[Event \"Test Mate\"]"));
        assert!(text.contains("[Event \"Test Fork\"]"));
        assert!(text.contains("[OpeningColor \"both\"]"));
        assert!(text.contains("[PuzzleId \"00sHx\"]"));
        assert!(text.contains("[Themes \"mate mateIn2\"]"));
    }

    #[test]
    fn skipped_games_do_not_consume_rounds() {
        let broken = record("bad", FORK_FEN, &["a1a8"], &["mate"]);
        let empty = record("empty", FORK_FEN, &[], &["mate"]);
        let mut other = mate();
        other.id = "second".to_string();
        let (text, written) = render(
            PgnOptions::default(),
            &[
                ("mate", mate()),
                ("mate", broken),
                ("mate", empty),
                ("mate", other),
                ("fork", fork()),
            ],
        );
        assert_eq!(written, 3);
        assert_eq!(text.matches("[Round \"1\"]").count(), 2);
        assert_eq!(text.matches("[Round \"2\"]").count(), 1);
        assert!(!text.contains("[PuzzleId \"bad\"]"));
    }

    #[test]
    fn rejects_unknown_opening_color() {
        let options = PgnOptions {
            opening_color_tag: Some("green".to_string()),
            ..PgnOptions::default()
        };
        assert!(PgnWriter::new(Vec::new(), options).is_err());
    }

    #[test]
    fn movetext_wraps_at_eighty_columns() {
        let pos = Chess::default();
        let line: Vec<String> = ["g1f3", "g8f6", "f3g1", "f6g8"]
            .iter()
            .cycle()
            .take(40)
            .map(|m| m.to_string())
            .collect();
        let text = movetext(pos, &line).unwrap();
        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.len() <= MOVETEXT_COLUMNS));
        assert!(text.starts_with("1. Nf3 Nf6 2. Ng1 Ng8"));
        assert!(text.ends_with('*'));
    }
}
