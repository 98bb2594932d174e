//! Tree-accelerated k-means clustering.
//!
//! `cull` clusters points in D-dimensional space with the *filtering
//! algorithm*: instead of comparing every point against every centroid each
//! iteration, the points are organized once into a balanced kd-tree whose
//! nodes carry bounding boxes and weighted-sum aggregates, and each pass
//! prunes the candidate-centroid set while descending the tree. Whole
//! subtrees are assigned in bulk as soon as a single candidate survives.
//!
//! The distance metric is pluggable: straight-line Euclidean in any
//! dimension, or geodesic distance over a triangle mesh (shortest-path- or
//! heat-kernel-backed) for clustering points that live on a surface.
//!
//! The primary public API is under [`cluster`], which provides:
//! - [`Kmeans`]: the driver (initialization, filtering passes, convergence)
//! - [`CentroidInit`] strategies: random sampling, farthest-first,
//!   density peaks; plus [`elbow_k`] for picking a cluster count

#![forbid(unsafe_code)]

pub mod cluster;
pub mod error;
pub mod mesh;
pub mod metric;
pub mod point;
pub mod tree;

pub use cluster::{
    elbow_k, CentroidInit, Clustering, DensityPeaks, FarthestFirst, Kmeans, KmeansFit,
    RandomSample,
};
pub use error::{Error, Result};
pub use mesh::TriMesh;
pub use metric::{EuclideanMetric, GeodesicMetric, Metric};
pub use point::{Accumulator, Centroid};
pub use tree::KdTree;
