//! Information-theoretic distances between probability vectors.
//!
//! All metrics compare two equal-length vectors of non-negative weights that
//! sum to (roughly) one. Normalization is not enforced.
//!
//! ## Important nuance
//!
//! - KL divergence is **asymmetric**: `kl(p, q) != kl(q, p)`. Callers must keep
//!   argument order, and it is `+inf` whenever `p[i] > 0` but `q[i] == 0`.
//! - Similarity is `1 - distance` and is **not clamped**: large distances give
//!   negative similarities, `+inf` distance gives `-inf` similarity.
//! - [`hellinger`] is the squared, unnormalized form
//!   $\sum_i (\sqrt{p_i} - \sqrt{q_i})^2$ (no $1/\sqrt{2}$, no final root).

use serde::{Deserialize, Serialize};

use crate::error::{HashError, Result};

/// Distance metric for probability vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Kullback-Leibler divergence.
    KullbackLeibler,
    /// Jensen-Shannon divergence.
    JensenShannon,
    /// $\sqrt{2 \cdot JSD}$, a true metric.
    S2JSD,
    /// Squared, unnormalized Hellinger distance.
    Hellinger,
}

impl DistanceMetric {
    /// All metrics, in declaration order.
    pub const ALL: [DistanceMetric; 4] = [
        DistanceMetric::KullbackLeibler,
        DistanceMetric::JensenShannon,
        DistanceMetric::S2JSD,
        DistanceMetric::Hellinger,
    ];

    /// Short identifier used in logs and reports.
    pub fn id(self) -> &'static str {
        match self {
            DistanceMetric::KullbackLeibler => "Kullback-Leibler",
            DistanceMetric::JensenShannon => "JSD",
            DistanceMetric::S2JSD => "S2JSD",
            DistanceMetric::Hellinger => "Hellinger",
        }
    }

    /// Compute distance between two vectors.
    #[inline]
    pub fn distance(self, a: &[f64], b: &[f64]) -> Result<f64> {
        match self {
            DistanceMetric::KullbackLeibler => kl_divergence(a, b),
            DistanceMetric::JensenShannon => jensen_shannon(a, b),
            DistanceMetric::S2JSD => s2jsd(a, b),
            DistanceMetric::Hellinger => hellinger(a, b),
        }
    }

    /// `1 - distance`, unclamped.
    #[inline]
    pub fn similarity(self, a: &[f64], b: &[f64]) -> Result<f64> {
        self.distance(a, b).map(|d| 1.0 - d)
    }

    /// Like [`DistanceMetric::similarity`], but a score that cannot be ranked
    /// is [`HashError::NonFiniteScore`].
    pub fn finite_similarity(self, a: &[f64], b: &[f64]) -> Result<f64> {
        let score = self.similarity(a, b)?;
        if !score.is_finite() {
            return Err(HashError::NonFiniteScore(score));
        }
        Ok(score)
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[inline]
fn check_dims(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(HashError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Kullback-Leibler divergence $\sum_i p_i \ln(p_i / q_i)$ over `p_i != 0`.
pub fn kl_divergence(p: &[f64], q: &[f64]) -> Result<f64> {
    check_dims(p, q)?;
    let mut kl = 0.0;
    for (&pi, &qi) in p.iter().zip(q) {
        if pi == 0.0 {
            continue;
        }
        if qi == 0.0 {
            return Ok(f64::INFINITY);
        }
        kl += pi * (pi / qi).ln();
    }
    Ok(kl)
}

/// Jensen-Shannon divergence: `0.5 * KL(p, m) + 0.5 * KL(q, m)`, `m = (p + q) / 2`.
///
/// Finite for any non-negative inputs: `m[i]` is zero only where both
/// inputs are zero, and those bins are skipped.
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> Result<f64> {
    check_dims(p, q)?;
    let m: Vec<f64> = p.iter().zip(q).map(|(a, b)| (a + b) / 2.0).collect();
    Ok(0.5 * kl_divergence(p, &m)? + 0.5 * kl_divergence(q, &m)?)
}

/// $\sqrt{2 \cdot JSD(p, q)}$.
pub fn s2jsd(p: &[f64], q: &[f64]) -> Result<f64> {
    // JSD can dip a hair below zero from rounding.
    Ok((2.0 * jensen_shannon(p, q)?).max(0.0).sqrt())
}

/// Squared, unnormalized Hellinger distance $\sum_i (\sqrt{p_i} - \sqrt{q_i})^2$.
pub fn hellinger(p: &[f64], q: &[f64]) -> Result<f64> {
    check_dims(p, q)?;
    Ok(p.iter()
        .zip(q)
        .map(|(a, b)| {
            let d = a.sqrt() - b.sqrt();
            d * d
        })
        .sum())
}
