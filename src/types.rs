/// Unique puzzle identifier (stable across runs).
/// Example: `00sHx`
pub type RecordId = String;
/// Category label as it appears in the input (a puzzle theme).
/// Examples: `mate`, `fork`, `advancedPawn`
pub type CategoryLabel = String;
/// Move in UCI notation, normalized to lowercase.
/// Examples: `e8d7`, `e7e8q`
pub type UciText = String;
/// Position in Forsyth-Edwards notation.
/// Example: `q3k1nr/1pp1nQpp/3p4/1P2p3/4P3/B1PP1b2/B5PP/5K2 b k - 0 17`
pub type FenText = String;
/// Primary metric used for proximity scoring and stratification.
/// Example: `700`
pub type Rating = i32;
/// Index of a stratification bin in `[0, num_bins)`.
pub type BinIndex = usize;
/// Identifier of an ingestion shard in parallel selection.
pub type ShardId = u32;
