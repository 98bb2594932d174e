//! K-means over a spatial index.
//!
//! This module is the clustering side of the crate: the driver, the
//! filtering engine it delegates each pass to, and the centroid
//! initialization strategies it consumes.
//!
//! ## The filtering algorithm
//!
//! Plain Lloyd iterations compare every point against every centroid, an
//! O(N·K) scan per pass. The filtering variant organizes the points in a
//! kd-tree once, then walks the tree per pass carrying the set of centroids
//! that could still be nearest for some point in the current cell:
//!
//! 1. Pick the candidate nearest the cell midpoint (`z_star`).
//! 2. Drop every candidate provably farther than `z_star` from the entire
//!    cell (checked at the cell corner most favorable to the candidate).
//! 3. One survivor: assign the whole subtree from its precomputed
//!    weighted sum, without visiting the leaves. Otherwise recurse.
//!
//! Most subtrees resolve high in the tree, so per-pass work approaches
//! O(N log K) in practice.
//!
//! **Objective**: same as Lloyd — minimize within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} d(x, μ_k)²
//! ```
//!
//! with `d` the configured metric: straight-line Euclidean, or geodesic
//! distance over a triangle mesh.
//!
//! ## Usage
//!
//! ```rust
//! use cull::{Clustering, EuclideanMetric, Kmeans};
//!
//! let data = vec![
//!     [0.0, 0.0],
//!     [0.1, 0.1],
//!     [10.0, 10.0],
//!     [10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2, EuclideanMetric)
//!     .with_seed(42)
//!     .fit_predict(&data)
//!     .unwrap();
//! assert_eq!(labels[0], labels[1]); // First two together
//! assert_ne!(labels[0], labels[2]); // Separate from last two
//! ```

mod filter;
mod init;
mod kmeans;
mod traits;

pub use init::{elbow_k, CentroidInit, DensityPeaks, FarthestFirst, RandomSample};
pub use kmeans::{Kmeans, KmeansFit};
pub use traits::Clustering;
