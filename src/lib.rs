//! hierhash: near-duplicate and similarity search over probability vectors.
//!
//! Comparing every pair of `n` topic distributions costs `O(n²)` metric
//! evaluations. This crate discretizes each vector into a short hierarchy of
//! labels, writes them to an inverted index, and only compares documents that
//! end up in the same bucket (or match a boosted label query).
//!
//! - `hash/`: hierarchical hashers (threshold bands, k-means, DBSCAN) and the
//!   label encoder
//! - `partitioning/`: 1-D clustering used by the hashers
//! - `index/`: the inverted-index capability and an in-memory backend
//! - `algorithms/`: the approximate explorer and the exhaustive baseline
//! - `distance`: KL, JSD, S²JSD, Hellinger
//!
//! # Levels
//!
//! Level 0 is the most specific label (all groups of a vector); each further
//! level drops the lowest-scoring group, and the last level keeps only the
//! top group. Specific levels give small, precise buckets; coarse levels
//! trade precision for recall.
//!
//! # Measuring efficiency
//!
//! Both explorers count metric evaluations in a shared [`Counters`]. Run the
//! same corpus through [`ExactBaseline`](algorithms::ExactBaseline) and an
//! [`ApproximateIndex`](algorithms::ApproximateIndex), then
//! [`efficiency`]`(approx, exact)` is the fraction of comparisons avoided.
//!
//! # Similarity is not clamped
//!
//! `similarity = 1 - distance`. KL and unnormalized Hellinger distances can
//! exceed 1, so similarities can be negative; KL against a zero bin is
//! `-inf` and such pairs are dropped from results.

pub mod algorithms;
pub mod config;
pub mod distance;
pub mod error;
pub mod hash;
pub mod index;
pub mod parallel;
pub mod partitioning;
pub mod topk;

pub use algorithms::{ApproximateIndex, Document, DocumentRef, ExactBaseline, Explorer, Similarity};
pub use config::{BucketField, HasherKind, IndexConfig};
pub use distance::DistanceMetric;
pub use error::{HashError, Result};
pub use hash::{
    CentroidHasher, DensityHasher, GroupEncoder, HashCode, HierarchicalHasher, ThresholdHasher,
};
pub use index::{InvertedIndex, MemoryIndex};
pub use parallel::{efficiency, Counters};
pub use topk::BoundedTopK;
