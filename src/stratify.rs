use crate::errors::CuratorError;
use crate::types::{BinIndex, Rating};

/// Fixed-width partition of a closed rating range.
///
/// Out-of-range values clamp to the first or last bin instead of being rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stratifier {
    min: Rating,
    max: Rating,
    bin_width: Rating,
    num_bins: usize,
}

impl Stratifier {
    /// Build a partition of `[min, max]` into bins of `bin_width`.
    pub fn new(min: Rating, max: Rating, bin_width: Rating) -> Result<Self, CuratorError> {
        if bin_width <= 0 {
            return Err(CuratorError::Configuration(format!(
                "bin width must be positive, got {bin_width}"
            )));
        }
        if min > max {
            return Err(CuratorError::Configuration(format!(
                "bin range is inverted: [{min}, {max}]"
            )));
        }
        let span = i64::from(max) - i64::from(min) + 1;
        let width = i64::from(bin_width);
        let num_bins = ((span + width - 1) / width).max(1) as usize;
        Ok(Self {
            min,
            max,
            bin_width,
            num_bins,
        })
    }

    /// Number of bins, at least 1.
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Bin for `value`.
    pub fn bin_index(&self, value: Rating) -> BinIndex {
        if value < self.min {
            return 0;
        }
        if value > self.max {
            return self.num_bins - 1;
        }
        let offset = i64::from(value) - i64::from(self.min);
        (offset / i64::from(self.bin_width)) as usize
    }

    /// Per-bin capacity that lets `quota` records spread over every bin.
    pub fn per_bin_quota(&self, quota: usize) -> usize {
        quota.div_ceil(self.num_bins).max(1)
    }
}

/// Free-function form of [`Stratifier::bin_index`].
pub fn bin_index(
    value: Rating,
    min: Rating,
    max: Rating,
    bin_width: Rating,
) -> Result<BinIndex, CuratorError> {
    Ok(Stratifier::new(min, max, bin_width)?.bin_index(value))
}
