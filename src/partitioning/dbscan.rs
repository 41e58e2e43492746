//! One-dimensional DBSCAN.
//!
//! Points within `eps` of each other (`|a - b| <= eps`) are neighbors; a point
//! with at least `min_points` neighbors (itself included) is a core point and
//! grows a cluster. With `min_points == 0` every point is core, so no point
//! is ever noise and isolated values become singleton clusters.

use crate::error::{HashError, Result};

/// Label assigned to points that belong to no cluster.
pub const NOISE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    eps: f64,
    min_points: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_points: usize) -> Result<Self> {
        if !eps.is_finite() || eps < 0.0 {
            return Err(HashError::config(format!(
                "eps must be finite and non-negative, got {eps}"
            )));
        }
        Ok(Self { eps, min_points })
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Cluster label per point (`0..n_clusters`, or [`NOISE`]).
    ///
    /// Cluster ids are assigned in input order of the first core point found.
    pub fn fit_predict(&self, points: &[f64]) -> Vec<usize> {
        let mut sorted: Vec<(f64, usize)> =
            points.iter().copied().enumerate().map(|(i, v)| (v, i)).collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut labels = vec![None::<usize>; points.len()];
        let mut visited = vec![false; points.len()];
        let mut next_cluster = 0;

        for start in 0..points.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let neighbors = self.region(&sorted, points[start]);
            if neighbors.len() < self.min_points {
                // Noise for now; may still be claimed as a border point later.
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[start] = Some(cluster);

            let mut frontier = neighbors;
            while let Some(p) = frontier.pop() {
                if labels[p].is_none() {
                    labels[p] = Some(cluster);
                }
                if visited[p] {
                    continue;
                }
                visited[p] = true;
                let expansion = self.region(&sorted, points[p]);
                if expansion.len() >= self.min_points {
                    frontier.extend(expansion.into_iter().filter(|&q| !visited[q] || labels[q].is_none()));
                }
            }
        }

        labels.into_iter().map(|l| l.unwrap_or(NOISE)).collect()
    }

    /// Group point indices by cluster, in cluster-id order. Noise is dropped.
    pub fn clusters(&self, points: &[f64]) -> Vec<Vec<usize>> {
        let labels = self.fit_predict(points);
        let n_clusters = labels.iter().filter(|&&l| l != NOISE).max().map_or(0, |m| m + 1);
        let mut clusters = vec![Vec::new(); n_clusters];
        for (i, l) in labels.into_iter().enumerate() {
            if l != NOISE {
                clusters[l].push(i);
            }
        }
        clusters
    }

    /// Indices of all points within `eps` of `value`.
    fn region(&self, sorted: &[(f64, usize)], value: f64) -> Vec<usize> {
        let lo = sorted.partition_point(|&(v, _)| v < value - self.eps);
        let hi = sorted.partition_point(|&(v, _)| v <= value + self.eps);
        sorted[lo..hi].iter().map(|&(_, i)| i).collect()
    }
}
