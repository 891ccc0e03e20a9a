//! Streaming reader for the Lichess puzzle CSV.
//!
//! Rows are parsed one at a time so memory stays flat regardless of file
//! size. A header missing any required column is fatal; individual malformed
//! rows are skipped and counted.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::constants::csv_columns::{
    FEN, GAME_URL, MOVES, NB_PLAYS, OPENING_TAGS, POPULARITY, PUZZLE_ID, RATING,
    RATING_DEVIATION, REQUIRED, THEMES, ZSTD_SUFFIX,
};
use crate::data::PuzzleRecord;
use crate::errors::CuratorError;
use crate::types::Rating;

/// Boxed byte source used for files opened by path.
pub type DynRead = Box<dyn Read + Send>;

/// Column positions resolved once from the header.
#[derive(Clone, Copy, Debug)]
struct ColumnIndex {
    id: usize,
    fen: usize,
    moves: usize,
    rating: usize,
    rating_deviation: usize,
    popularity: usize,
    num_plays: usize,
    themes: usize,
    game_url: usize,
    opening_tags: usize,
}

impl ColumnIndex {
    fn from_header(header: &csv::StringRecord) -> Result<Self, CuratorError> {
        let position = |name: &str| header.iter().position(|field| field.trim() == name);
        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(CuratorError::MissingColumns(missing));
        }
        let at = |name: &str| position(name).unwrap_or_default();
        Ok(Self {
            id: at(PUZZLE_ID),
            fen: at(FEN),
            moves: at(MOVES),
            rating: at(RATING),
            rating_deviation: at(RATING_DEVIATION),
            popularity: at(POPULARITY),
            num_plays: at(NB_PLAYS),
            themes: at(THEMES),
            game_url: at(GAME_URL),
            opening_tags: at(OPENING_TAGS),
        })
    }

    /// Parse one data row, or explain why it was rejected.
    fn parse(&self, row: &csv::StringRecord) -> Result<PuzzleRecord, &'static str> {
        if row.len() < REQUIRED.len() {
            return Err("too few fields");
        }
        let field = |idx: usize| row.get(idx).map(str::trim).ok_or("missing field");
        let number = |idx: usize| -> Result<i64, &'static str> {
            field(idx)?.parse::<i64>().map_err(|_| "non-numeric field")
        };
        let narrow = |value: i64| i32::try_from(value).map_err(|_| "numeric field out of range");
        let tokens = |idx: usize| -> Result<Vec<String>, &'static str> {
            Ok(field(idx)?.split_whitespace().map(str::to_string).collect())
        };

        Ok(PuzzleRecord {
            id: field(self.id)?.to_string(),
            fen: field(self.fen)?.to_string(),
            moves: field(self.moves)?
                .split_whitespace()
                .map(normalize_uci)
                .collect(),
            rating: narrow(number(self.rating)?)?,
            rating_deviation: narrow(number(self.rating_deviation)?)?,
            popularity: narrow(number(self.popularity)?)?,
            num_plays: number(self.num_plays)?,
            themes: tokens(self.themes)?,
            game_url: field(self.game_url)?.to_string(),
            opening_tags: tokens(self.opening_tags)?,
        })
    }
}

/// Lowercase a UCI token and fold `e7e8=Q` promotion spelling into `e7e8q`.
pub fn normalize_uci(token: &str) -> String {
    let token = token.trim();
    if token.len() == 6 && token.as_bytes()[4] == b'=' {
        return format!("{}{}", token[..4].to_lowercase(), token[5..].to_lowercase());
    }
    token.to_lowercase()
}

/// Iterator over puzzle rows of a CSV stream.
///
/// Yields `Err` only for I/O failures; rows that fail to parse are skipped
/// and reported through [`PuzzleCsvReader::rows_skipped`].
pub struct PuzzleCsvReader<R: Read> {
    rows: csv::StringRecordsIntoIter<R>,
    columns: Option<ColumnIndex>,
    rows_read: u64,
    rows_skipped: u64,
}

impl PuzzleCsvReader<DynRead> {
    /// Open a `.csv` file, or a `.csv.zst` file when the zstd feature is enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CuratorError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let compressed = path.to_string_lossy().ends_with(ZSTD_SUFFIX);
        let source: DynRead = if compressed {
            open_zstd(file)?
        } else {
            Box::new(BufReader::new(file))
        };
        debug!(path = %path.display(), compressed, "opening puzzle csv");
        Self::from_reader(source)
    }
}

#[cfg(feature = "zstd")]
fn open_zstd(file: File) -> Result<DynRead, CuratorError> {
    Ok(Box::new(zstd::stream::read::Decoder::new(file)?))
}

#[cfg(not(feature = "zstd"))]
fn open_zstd(_file: File) -> Result<DynRead, CuratorError> {
    Err(CuratorError::Configuration(
        "reading .zst input requires the `zstd` feature; decompress the file first".to_string(),
    ))
}

impl<R: Read> PuzzleCsvReader<R> {
    /// Wrap any byte stream. The header is read and validated immediately.
    ///
    /// An empty stream (no header at all) yields no records rather than an error.
    pub fn from_reader(reader: R) -> Result<Self, CuratorError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let header = csv_reader.headers()?.clone();
        let columns = if header.is_empty() {
            None
        } else {
            Some(ColumnIndex::from_header(&header)?)
        };
        Ok(Self {
            rows: csv_reader.into_records(),
            columns,
            rows_read: 0,
            rows_skipped: 0,
        })
    }

    /// Data rows read so far, including skipped ones.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Rows rejected as malformed so far.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }
}

impl<R: Read> Iterator for PuzzleCsvReader<R> {
    type Item = Result<PuzzleRecord, CuratorError>;

    fn next(&mut self) -> Option<Self::Item> {
        let columns = self.columns?;
        loop {
            let row = match self.rows.next() {
                Some(Ok(row)) => row,
                Some(Err(err)) if err.is_io_error() => return Some(Err(err.into())),
                Some(Err(err)) => {
                    self.rows_read += 1;
                    self.rows_skipped += 1;
                    debug!(row = self.rows_read, error = %err, "skipping unreadable csv row");
                    continue;
                }
                None => {
                    info!(
                        rows_read = self.rows_read,
                        rows_skipped = self.rows_skipped,
                        "puzzle csv exhausted"
                    );
                    self.columns = None;
                    return None;
                }
            };
            self.rows_read += 1;
            match columns.parse(&row) {
                Ok(record) => return Some(Ok(record)),
                Err(reason) => {
                    self.rows_skipped += 1;
                    debug!(row = self.rows_read, reason, "skipping malformed puzzle row");
                }
            }
        }
    }
}

/// Keep records whose rating lies in `[min, max]`.
pub fn filter_by_rating<I>(records: I, min: Rating, max: Rating) -> impl Iterator<Item = PuzzleRecord>
where
    I: IntoIterator<Item = PuzzleRecord>,
{
    records
        .into_iter()
        .filter(move |record| (min..=max).contains(&record.rating))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,Themes,GameUrl,OpeningTags";

    fn read_all(text: &str) -> (Vec<PuzzleRecord>, u64) {
        let mut reader = PuzzleCsvReader::from_reader(text.as_bytes()).unwrap();
        let records = reader.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        (records, reader.rows_skipped())
    }

    #[test]
    fn parses_rows_and_splits_token_fields() {
        let text = format!(
            "{HEADER}\n00sHx,8/8/8/8/8/8/8/K6k w - - 0 1,E7E8=Q a2a4,700,80,83,72,mate mateIn2,https://lichess.org/x,Italian_Game Italian_Game_Classical\n"
        );
        let (records, skipped) = read_all(&text);
        assert_eq!(skipped, 0);
        let record = &records[0];
        assert_eq!(record.id, "00sHx");
        assert_eq!(record.moves, vec!["e7e8q", "a2a4"]);
        assert_eq!(record.themes, vec!["mate", "mateIn2"]);
        assert_eq!(record.opening_tags.len(), 2);
        assert_eq!((record.rating, record.popularity, record.num_plays), (700, 83, 72));
    }

    #[test]
    fn header_order_does_not_matter() {
        let text = "Themes,PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,GameUrl,OpeningTags,Extra\n\
                    fork,abc,fen,e2e4,650,70,90,10,url,,ignored\n";
        let (records, _) = read_all(text);
        assert_eq!(records[0].id, "abc");
        assert_eq!(records[0].themes, vec!["fork"]);
        assert!(records[0].opening_tags.is_empty());
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = PuzzleCsvReader::from_reader("PuzzleId,FEN\n".as_bytes())
            .err()
            .unwrap();
        match err {
            CuratorError::MissingColumns(missing) => {
                assert!(missing.contains(&"Moves".to_string()));
                assert_eq!(missing.len(), 8);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let text = format!(
            "{HEADER}\nshort,row\nbad,fen,e2e4,notanumber,1,1,1,mate,url,\ngood,fen,e2e4,700,1,1,1,mate,url,\n"
        );
        let (records, skipped) = read_all(&text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
        assert_eq!(skipped, 2);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (records, skipped) = read_all("");
        assert!(records.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn normalize_uci_handles_promotion_spelling() {
        assert_eq!(normalize_uci(" E2E4 "), "e2e4");
        assert_eq!(normalize_uci("e7e8=Q"), "e7e8q");
        assert_eq!(normalize_uci("e7e8q"), "e7e8q");
        assert_eq!(normalize_uci(""), "");
    }

    #[test]
    fn uppercase_promotion_spelling_is_fully_lowercased() {
        assert_eq!(normalize_uci("E7E8=Q"), "e7e8q");
        assert_eq!(normalize_uci("a2A1=n"), "a2a1n");
    }

    #[test]
    fn rating_filter_is_inclusive() {
        let text = format!(
            "{HEADER}\na,f,e2e4,599,1,1,1,t,u,\nb,f,e2e4,600,1,1,1,t,u,\nc,f,e2e4,800,1,1,1,t,u,\nd,f,e2e4,801,1,1,1,t,u,\n"
        );
        let (records, _) = read_all(&text);
        let kept: Vec<String> = filter_by_rating(records, 600, 800).map(|r| r.id).collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn opens_plain_files_by_path() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "p1,fen,e2e4,700,1,1,1,mate,url,").unwrap();
        file.flush().unwrap();
        let records: Vec<_> = PuzzleCsvReader::open(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn opens_zstd_files_by_suffix() {
        let plain = format!("{HEADER}\np1,fen,e2e4,700,1,1,1,mate,url,\n");
        let packed = zstd::stream::encode_all(plain.as_bytes(), 0).unwrap();
        let mut file = tempfile::Builder::new().suffix(".csv.zst").tempfile().unwrap();
        file.write_all(&packed).unwrap();
        file.flush().unwrap();
        let records: Vec<_> = PuzzleCsvReader::open(file.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records[0].id, "p1");
    }
}
