//! Distance metrics.
//!
//! The filtering descent is generic over a [`Metric`]: the same pruning logic
//! runs under straight-line distance ([`EuclideanMetric`]) or geodesic
//! distance over a triangle mesh ([`GeodesicMetric`]). The pruning test is
//! only sound for metrics that are symmetric and satisfy the triangle
//! inequality, which both provided metrics do.

mod euclidean;
mod geodesic;

pub use euclidean::EuclideanMetric;
pub use geodesic::GeodesicMetric;

pub(crate) use euclidean::squared as squared_euclidean;

use crate::error::Result;

/// A scalar distance between two coordinate vectors.
///
/// Implementations must be symmetric and satisfy the triangle inequality —
/// the candidate-pruning test relies on both. `distance` is called
/// concurrently from rayon workers during a filtering pass, hence the `Sync`
/// bound; any internal caching needs interior mutability that tolerates that.
pub trait Metric<const D: usize>: Sync {
    /// Non-negative distance between `a` and `b`.
    fn distance(&self, a: &[f64; D], b: &[f64; D]) -> f64;

    /// One-time precomputation binding the metric to the dataset it will
    /// measure. The driver invokes this once per fit, before the first pass.
    /// Stateless metrics keep the default no-op.
    fn setup(&mut self, data: &[[f64; D]]) -> Result<()> {
        let _ = data;
        Ok(())
    }
}
