//! Density-based (DBSCAN) hashing.

use super::{rank_groups, validate_depth, validate_vector, Group, HierarchicalHasher};
use crate::error::Result;
use crate::partitioning::Dbscan;

/// Clusters the weights of a vector with DBSCAN.
///
/// `eps` is the population variance of the vector itself and there is no
/// minimum cluster size, so weights chain together whenever consecutive
/// values are within `eps`. A peakier vector has a larger variance and
/// therefore yields fewer, coarser groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityHasher {
    depth: usize,
}

impl DensityHasher {
    pub fn new(depth: usize) -> Result<Self> {
        validate_depth(depth)?;
        Ok(Self { depth })
    }
}

/// Population variance.
pub(crate) fn variance(vector: &[f64]) -> f64 {
    let n = vector.len() as f64;
    let mean = vector.iter().sum::<f64>() / n;
    vector.iter().map(|w| (w - mean) * (w - mean)).sum::<f64>() / n
}

impl HierarchicalHasher for DensityHasher {
    fn id(&self) -> &'static str {
        "density"
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn groups(&self, vector: &[f64]) -> Result<Vec<Group>> {
        validate_vector(vector)?;
        let clusters = Dbscan::new(variance(vector), 0)?.clusters(vector);
        Ok(rank_groups(vector, &clusters))
    }
}
