//! Configuration for the search algorithms.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HashError, Result};
use crate::hash::{CentroidHasher, DensityHasher, HierarchicalHasher, ThresholdHasher};

/// Which hashing strategy an approximate index uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HasherKind {
    Threshold,
    Centroid {
        max_iterations: usize,
        #[serde(default)]
        seed: Option<u64>,
    },
    Density,
}

impl HasherKind {
    /// Instantiate the hasher for `depth` levels.
    pub fn build(&self, depth: usize) -> Result<Arc<dyn HierarchicalHasher>> {
        Ok(match self {
            HasherKind::Threshold => Arc::new(ThresholdHasher::new(depth)?),
            HasherKind::Centroid {
                max_iterations,
                seed,
            } => {
                let hasher = CentroidHasher::new(depth, *max_iterations)?;
                Arc::new(match seed {
                    Some(seed) => hasher.with_seed(*seed),
                    None => hasher,
                })
            }
            HasherKind::Density => Arc::new(DensityHasher::new(depth)?),
        })
    }
}

/// Which encoded field family defines buckets and query terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketField {
    /// Tail-drop encoding (`hashcodeR_*` / `hashexpR_*`).
    Reduced,
    /// Head-keep encoding (`hashcodeT_*` / `hashexpT_*`).
    Top,
}

/// Settings shared by [`ApproximateIndex`](crate::algorithms::ApproximateIndex)
/// and [`ExactBaseline`](crate::algorithms::ExactBaseline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Number of hash levels written per document.
    pub depth: usize,
    /// Level used by duplicate and similarity search (0 = most specific).
    pub level: usize,
    pub hasher: HasherKind,
    pub bucket_field: BucketField,
    /// Most-frequent buckets examined by duplicate search.
    pub max_buckets: usize,
    /// Upper bound on boosted clauses in a similarity query.
    pub max_clauses: usize,
    /// Worker threads.
    pub threads: usize,
    /// Wall-clock bound for one parallel search call.
    pub timeout_secs: u64,
    /// Commit automatically after this many adds.
    pub commit_every: Option<usize>,
    /// Exhaustive baseline keeps pairs with similarity `>= threshold`.
    pub threshold: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            depth: 4,
            level: 0,
            hasher: HasherKind::Density,
            bucket_field: BucketField::Reduced,
            max_buckets: 100,
            max_clauses: 1024,
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            timeout_secs: 3600,
            commit_every: Some(500),
            threshold: 0.9,
        }
    }
}

impl IndexConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[must_use]
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: HasherKind) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings that cannot work, before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.depth == 0 {
            return Err(HashError::config("depth must be greater than 0"));
        }
        if self.level >= self.depth {
            return Err(HashError::config(format!(
                "level {} out of range for depth {}",
                self.level, self.depth
            )));
        }
        if self.threads == 0 {
            return Err(HashError::config("threads must be greater than 0"));
        }
        if self.max_buckets == 0 {
            return Err(HashError::config("max_buckets must be greater than 0"));
        }
        if self.max_clauses == 0 {
            return Err(HashError::config("max_clauses must be greater than 0"));
        }
        if !self.threshold.is_finite() {
            return Err(HashError::config("threshold must be finite"));
        }
        if let HasherKind::Centroid { max_iterations: 0, .. } = self.hasher {
            return Err(HashError::config("max_iterations must be greater than 0"));
        }
        if self.commit_every == Some(0) {
            return Err(HashError::config("commit_every must be greater than 0"));
        }
        Ok(())
    }
}
