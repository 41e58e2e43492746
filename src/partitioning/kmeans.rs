//! One-dimensional k-means clustering.
//!
//! Used by the centroid hasher to split a probability vector's weights into
//! `k` groups of similar magnitude. Points are scalars and the distance is
//! `|a - b|`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{HashError, Result};

/// k-means over scalar points, with k-means++ initialization.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    seed: Option<u64>,
    centroids: Vec<f64>,
}

impl KMeans {
    /// Create new k-means with k clusters.
    pub fn new(k: usize, max_iterations: usize) -> Result<Self> {
        if k == 0 {
            return Err(HashError::config("k must be greater than 0"));
        }
        if max_iterations == 0 {
            return Err(HashError::config("max_iterations must be greater than 0"));
        }
        Ok(Self {
            k,
            max_iterations,
            seed: None,
            centroids: Vec::new(),
        })
    }

    /// Configure a deterministic seed for k-means++ initialization.
    ///
    /// When set, repeated `fit(...)` calls on the same inputs produce identical results.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Fit on `points` and return one member list per cluster.
    ///
    /// `k` is clamped to the number of points. Clusters may come back empty
    /// when several centroids collapse onto the same value.
    pub fn fit(&mut self, points: &[f64]) -> Result<Vec<Vec<usize>>> {
        if points.is_empty() {
            return Err(HashError::InvalidInput("cannot cluster zero points".into()));
        }
        let k = self.k.min(points.len());

        self.centroids = self.kmeans_plus_plus(points, k);

        let mut assignments = self.assign_clusters(points);
        for _iteration in 0..self.max_iterations {
            let new_centroids = self.update_centroids(points, &assignments);
            self.centroids = new_centroids;

            let next = self.assign_clusters(points);
            if next == assignments {
                break;
            }
            assignments = next;
        }

        let mut clusters = vec![Vec::new(); self.centroids.len()];
        for (i, &c) in assignments.iter().enumerate() {
            clusters[c].push(i);
        }
        Ok(clusters)
    }

    /// k-means++ initialization.
    fn kmeans_plus_plus(&self, points: &[f64], k: usize) -> Vec<f64> {
        // Use an explicit seed when configured; otherwise derive one from entropy.
        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = StdRng::seed_from_u64(seed);

        let mut centroids = Vec::with_capacity(k);
        centroids.push(points[rng.random_range(0..points.len())]);

        // Subsequent centroids: sampled proportional to squared distance to nearest centroid
        while centroids.len() < k {
            let distances: Vec<f64> = points
                .iter()
                .map(|&p| {
                    centroids
                        .iter()
                        .map(|&c| (p - c).abs())
                        .fold(f64::INFINITY, f64::min)
                        .powi(2)
                })
                .collect();
            let total: f64 = distances.iter().sum();

            if total <= 0.0 {
                // Every point coincides with a centroid already.
                centroids.push(points[rng.random_range(0..points.len())]);
                continue;
            }

            let threshold = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut chosen = points.len() - 1;
            for (i, &d) in distances.iter().enumerate() {
                cumulative += d;
                if cumulative >= threshold && d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            centroids.push(points[chosen]);
        }

        centroids
    }

    /// Assign points to their nearest centroid (ties go to the lowest index).
    pub fn assign_clusters(&self, points: &[f64]) -> Vec<usize> {
        points
            .iter()
            .map(|&p| {
                let mut best_cluster = 0;
                let mut best_dist = f64::INFINITY;
                for (cluster_idx, &c) in self.centroids.iter().enumerate() {
                    let dist = (p - c).abs();
                    if dist < best_dist {
                        best_dist = dist;
                        best_cluster = cluster_idx;
                    }
                }
                best_cluster
            })
            .collect()
    }

    /// Recompute centroids as member means.
    fn update_centroids(&self, points: &[f64], assignments: &[usize]) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.centroids.len()];
        let mut counts = vec![0usize; self.centroids.len()];
        for (&p, &c) in points.iter().zip(assignments) {
            sums[c] += p;
            counts[c] += 1;
        }
        sums.iter()
            .zip(&counts)
            .zip(&self.centroids)
            .map(|((&sum, &count), &old)| {
                if count > 0 {
                    sum / count as f64
                } else {
                    // Empty cluster: keep old centroid
                    old
                }
            })
            .collect()
    }

    /// Get centroids.
    pub fn centroids(&self) -> &[f64] {
        &self.centroids
    }
}
