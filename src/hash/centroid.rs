//! k-means based hashing.

use super::{rank_groups, validate_depth, validate_vector, Group, HierarchicalHasher};
use crate::error::{HashError, Result};
use crate::partitioning::KMeans;

/// Seed used when none is configured, so hashing stays reproducible.
pub const DEFAULT_SEED: u64 = 0x5eed;

/// Clusters the weights of a vector with k-means (`k = depth + 1`).
///
/// Each cluster becomes a [`Group`] scored by its mean weight. The k-means++
/// initialization is seeded, so equal vectors always hash equally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentroidHasher {
    depth: usize,
    max_iterations: usize,
    seed: u64,
}

impl CentroidHasher {
    pub fn new(depth: usize, max_iterations: usize) -> Result<Self> {
        validate_depth(depth)?;
        if max_iterations == 0 {
            return Err(HashError::config("max_iterations must be greater than 0"));
        }
        Ok(Self {
            depth,
            max_iterations,
            seed: DEFAULT_SEED,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

impl HierarchicalHasher for CentroidHasher {
    fn id(&self) -> &'static str {
        "centroid"
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn groups(&self, vector: &[f64]) -> Result<Vec<Group>> {
        validate_vector(vector)?;
        let mut kmeans = KMeans::new(self.depth + 1, self.max_iterations)?.with_seed(self.seed);
        let clusters = kmeans.fit(vector)?;
        Ok(rank_groups(vector, &clusters))
    }
}
