//! Hierarchical hashing of probability vectors.
//!
//! A hierarchical hash turns a vector into `depth` discrete labels. Documents
//! that share a label at some level land in the same **bucket**; searching a
//! bucket replaces an O(n²) scan of the corpus with small pairwise scans.
//!
//! ## Strategies
//!
//! | Hasher | Grouping | Training | Cost |
//! |--------|----------|----------|------|
//! | [`ThresholdHasher`] | fixed weight bands | none | O(D · depth) |
//! | [`CentroidHasher`] | k-means, `k = depth + 1` | per vector | O(D · k · iters) |
//! | [`DensityHasher`] | DBSCAN, `eps = var(v)` | per vector | O(D log D) |
//!
//! The clustering hashers adapt bucket granularity to the shape of the
//! distribution: a peaked vector (high variance) collapses into few tight
//! groups, a flat one into many.
//!
//! ## Labels
//!
//! Dimension `i` is written as the token `t{i}`. A group label joins its
//! member tokens with `_`, highest dimension first (`t7_t3_t0`). Several
//! groups are joined with `#` (see [`GroupEncoder`]).
//!
//! ```rust
//! use hierhash::hash::{DensityHasher, HierarchicalHasher};
//!
//! let hasher = DensityHasher::new(3).unwrap();
//! let code = hasher.hash(&[0.9, 0.05, 0.025, 0.025]).unwrap();
//! assert_eq!(code.depth(), 3);
//! assert_eq!(code.level(0).unwrap().label, "t0");
//! ```

mod centroid;
mod density;
mod encoder;
mod threshold;

pub use centroid::CentroidHasher;
pub use density::DensityHasher;
pub use encoder::GroupEncoder;
pub use threshold::ThresholdHasher;

use std::fmt;
use std::hash::Hasher as _;

use smallvec::SmallVec;
use twox_hash::XxHash32;

use crate::error::{HashError, Result};

/// Prefix of a dimension token.
pub const DIMENSION_PREFIX: &str = "t";
/// Separator between member tokens inside one group label.
pub const MEMBER_SEPARATOR: &str = "_";
/// Separator between group labels inside a reduced/top label.
pub const GROUP_SEPARATOR: &str = "#";
/// Label of a threshold band with no members.
pub const EMPTY_LABEL: &str = "none";

/// Token for dimension `i`.
#[inline]
pub fn dimension_token(i: usize) -> String {
    format!("{DIMENSION_PREFIX}{i}")
}

/// `_`-joined member tokens, highest dimension index first.
pub fn member_label(members: &[usize]) -> String {
    let mut sorted: SmallVec<[usize; 16]> = SmallVec::from_slice(members);
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted
        .iter()
        .map(|&i| dimension_token(i))
        .collect::<Vec<_>>()
        .join(MEMBER_SEPARATOR)
}

/// Stable 32-bit hash of a label (xxHash32, seed 0).
pub fn hash32(label: &str) -> i32 {
    let mut hasher = XxHash32::with_seed(0);
    hasher.write(label.as_bytes());
    hasher.finish() as u32 as i32
}

/// Dimensions of similar weight, produced transiently per hashed vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    /// Mean weight of the members; groups are ranked by it.
    pub mean_weight: f64,
    pub members: SmallVec<[usize; 8]>,
}

impl Group {
    /// Build a group from member dimensions of `vector`. `members` must be non-empty.
    pub fn from_members(members: &[usize], vector: &[f64]) -> Self {
        let sum: f64 = members.iter().map(|&i| vector[i]).sum();
        Self {
            label: member_label(members),
            mean_weight: sum / members.len() as f64,
            members: SmallVec::from_slice(members),
        }
    }
}

/// One level of a [`HashCode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashLevel {
    pub label: String,
    pub hash: i32,
}

impl HashLevel {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let hash = hash32(&label);
        Self { label, hash }
    }
}

/// Fixed-depth sequence of labels; level 0 is the most specific.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashCode {
    levels: Vec<HashLevel>,
}

impl HashCode {
    pub fn new(levels: Vec<HashLevel>) -> Self {
        Self { levels }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, i: usize) -> Option<&HashLevel> {
        self.levels.get(i)
    }

    pub fn levels(&self) -> &[HashLevel] {
        &self.levels
    }

    pub fn iter(&self) -> impl Iterator<Item = &HashLevel> {
        self.levels.iter()
    }
}

impl fmt::Display for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, level) in self.levels.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}:{}", i, level.label)?;
        }
        Ok(())
    }
}

/// A strategy that discretizes a vector into a hierarchical hash.
///
/// Implementations are stateless apart from their configuration and can be
/// shared across threads.
pub trait HierarchicalHasher: Send + Sync + fmt::Debug {
    /// Short identifier (`"threshold"`, `"centroid"`, `"density"`).
    fn id(&self) -> &'static str;

    /// Number of levels produced by [`HierarchicalHasher::hash`].
    fn depth(&self) -> usize;

    /// Groups of dimensions, sorted by mean weight, highest first.
    fn groups(&self, vector: &[f64]) -> Result<Vec<Group>>;

    /// Hash `vector` into exactly `depth()` non-empty levels.
    ///
    /// The default takes level `i` from group `i`, repeating the
    /// lowest-scoring group when there are fewer groups than levels.
    fn hash(&self, vector: &[f64]) -> Result<HashCode> {
        let groups = self.groups(vector)?;
        Ok(levels_from_groups(&groups, self.depth()))
    }
}

pub(crate) fn levels_from_groups(groups: &[Group], depth: usize) -> HashCode {
    let levels = (0..depth)
        .map(|i| match groups.get(i).or_else(|| groups.last()) {
            Some(g) => HashLevel::new(g.label.clone()),
            None => HashLevel::new(EMPTY_LABEL),
        })
        .collect();
    HashCode::new(levels)
}

pub(crate) fn validate_depth(depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(HashError::config("depth must be greater than 0"));
    }
    Ok(())
}

pub(crate) fn validate_vector(vector: &[f64]) -> Result<()> {
    if vector.is_empty() {
        return Err(HashError::InvalidInput("cannot hash an empty vector".into()));
    }
    if let Some(i) = vector.iter().position(|w| !w.is_finite()) {
        return Err(HashError::InvalidInput(format!(
            "weight at dimension {i} is not finite"
        )));
    }
    Ok(())
}

/// Turn clusters of dimension indices into ranked groups.
///
/// Empty clusters are dropped. Dimensions that belong to no cluster are
/// gathered into a single residual group.
pub(crate) fn rank_groups(vector: &[f64], clusters: &[Vec<usize>]) -> Vec<Group> {
    let mut covered = vec![false; vector.len()];
    let mut groups: Vec<Group> = clusters
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| {
            for &i in c {
                covered[i] = true;
            }
            Group::from_members(c, vector)
        })
        .collect();

    let isolated: Vec<usize> = (0..vector.len()).filter(|&i| !covered[i]).collect();
    if !isolated.is_empty() {
        groups.push(Group::from_members(&isolated, vector));
    }

    groups.sort_by(|a, b| {
        b.mean_weight
            .total_cmp(&a.mean_weight)
            .then_with(|| a.label.cmp(&b.label))
    });
    groups
}
