//! Fixed-band threshold hashing.
//!
//! With `D` dimensions and depth `d`, the band width is
//! `inc = 1 / (D * (d + 1))`. Level `i` collects dimensions whose weight lies
//! strictly inside `(lower_i, upper_i)`:
//!
//! ```text
//! lower_i = (d - i) * inc
//! upper_0 = +inf            (catch-all for the heaviest dimensions)
//! upper_i = lower_i + inc   (i > 0)
//! ```
//!
//! Both bounds are exclusive, so a weight sitting exactly on a band edge, or
//! at or below `inc`, belongs to no level.

use super::{
    member_label, rank_groups, validate_depth, validate_vector, Group, HashCode, HashLevel,
    HierarchicalHasher, EMPTY_LABEL,
};
use crate::error::Result;

/// Deterministic, training-free hasher over fixed weight bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdHasher {
    depth: usize,
}

impl ThresholdHasher {
    pub fn new(depth: usize) -> Result<Self> {
        validate_depth(depth)?;
        Ok(Self { depth })
    }

    /// `(lower, upper)` bounds of level `level` for a `dimension`-long vector.
    ///
    /// `None` when `level >= depth`.
    pub fn band(&self, dimension: usize, level: usize) -> Option<(f64, f64)> {
        if level >= self.depth {
            return None;
        }
        let inc = 1.0 / (dimension as f64 * (self.depth as f64 + 1.0));
        let lower = (self.depth - level) as f64 * inc;
        let upper = if level == 0 { f64::INFINITY } else { lower + inc };
        Some((lower, upper))
    }

    /// Member dimensions per level.
    fn bands(&self, vector: &[f64]) -> Vec<Vec<usize>> {
        (0..self.depth)
            .filter_map(|level| self.band(vector.len(), level))
            .map(|(lower, upper)| {
                vector
                    .iter()
                    .enumerate()
                    .filter(|&(_, &w)| w > lower && w < upper)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect()
    }
}

impl HierarchicalHasher for ThresholdHasher {
    fn id(&self) -> &'static str {
        "threshold"
    }

    fn depth(&self) -> usize {
        self.depth
    }

    /// One group per non-empty band plus a residual group for out-of-band dimensions.
    fn groups(&self, vector: &[f64]) -> Result<Vec<Group>> {
        validate_vector(vector)?;
        Ok(rank_groups(vector, &self.bands(vector)))
    }

    fn hash(&self, vector: &[f64]) -> Result<HashCode> {
        validate_vector(vector)?;
        let levels = self
            .bands(vector)
            .into_iter()
            .map(|members| {
                if members.is_empty() {
                    HashLevel::new(EMPTY_LABEL)
                } else {
                    HashLevel::new(member_label(&members))
                }
            })
            .collect();
        Ok(HashCode::new(levels))
    }
}
