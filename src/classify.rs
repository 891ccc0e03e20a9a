//! Side-to-move classification.
//!
//! The balancer only needs a two-valued attribute per candidate. Failures
//! (unparsable FEN, inapplicable first move) are reported as
//! `Attribute::Unknown` instead of silently falling back to a colour.

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, Move, Position};

use crate::data::PuzzleRecord;

/// Binary attribute balanced across the output, plus an explicit unknown state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// White is to move (the "A" side).
    White,
    /// Black is to move (the "B" side).
    Black,
    /// Classification unavailable for this record.
    Unknown,
}

impl From<Color> for Attribute {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Attribute::White,
            Color::Black => Attribute::Black,
        }
    }
}

/// Referentially transparent attribute oracle consulted by the balancer.
pub trait AttributeClassifier: Send + Sync {
    /// Classify one record.
    fn classify(&self, record: &PuzzleRecord) -> Attribute;
}

impl<F> AttributeClassifier for F
where
    F: Fn(&PuzzleRecord) -> Attribute + Send + Sync,
{
    fn classify(&self, record: &PuzzleRecord) -> Attribute {
        self(record)
    }
}

/// Why a record's starting position could not be reconstructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayError {
    /// The FEN did not parse or describes an illegal setup.
    InvalidFen,
    /// A move did not parse or is not legal in the reached position.
    IllegalMove(usize),
}

/// Parse the record's FEN into a playable position.
pub fn starting_position(record: &PuzzleRecord) -> Result<Chess, ReplayError> {
    let fen: Fen = record.fen.parse().map_err(|_| ReplayError::InvalidFen)?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|_| ReplayError::InvalidFen)
}

/// Resolve a UCI move against `pos`, rejecting illegal moves.
pub fn legal_move(pos: &Chess, uci: &str) -> Option<Move> {
    let parsed: UciMove = uci.parse().ok()?;
    parsed.to_move(pos).ok()
}

/// Position the solver is presented with, and the moves still to play from it.
///
/// With `skip_first_move` the opponent's first move is applied; otherwise the
/// FEN position is used as-is and the whole line remains.
pub fn presented_position(
    record: &PuzzleRecord,
    skip_first_move: bool,
) -> Result<(Chess, &[String]), ReplayError> {
    let mut pos = starting_position(record)?;
    let mut remaining = record.moves.as_slice();
    if skip_first_move && let Some((first, rest)) = remaining.split_first() {
        let m = legal_move(&pos, first).ok_or(ReplayError::IllegalMove(0))?;
        pos.play_unchecked(&m);
        remaining = rest;
    }
    Ok((pos, remaining))
}

/// Classifies a puzzle by whose turn it is in the presented position.
#[derive(Clone, Copy, Debug, Default)]
pub struct SideToMoveClassifier {
    /// Apply the opponent's first move before reading the turn.
    pub skip_first_move: bool,
}

impl SideToMoveClassifier {
    /// Create a classifier.
    pub fn new(skip_first_move: bool) -> Self {
        Self { skip_first_move }
    }
}

impl AttributeClassifier for SideToMoveClassifier {
    fn classify(&self, record: &PuzzleRecord) -> Attribute {
        match presented_position(record, self.skip_first_move) {
            Ok((pos, _)) => pos.turn().into(),
            Err(_) => Attribute::Unknown,
        }
    }
}
