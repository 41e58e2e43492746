//! Scalar clustering used by the group-based hashers.
//!
//! Both clusterers work on the weights of a single probability vector, one
//! point per dimension, with distance `|w_a - w_b|`.

pub mod dbscan;
pub mod kmeans;

pub use dbscan::{Dbscan, NOISE};
pub use kmeans::KMeans;
