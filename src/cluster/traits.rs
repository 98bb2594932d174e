use crate::error::Result;

/// Common interface for hard clustering algorithms (one label per point).
pub trait Clustering<const D: usize> {
    /// Fit the model and return one cluster label per input point.
    ///
    /// Takes `&mut self` because fitting may bind internal state to the
    /// dataset (a geodesic metric's one-time setup, for example).
    fn fit_predict(&mut self, data: &[[f64; D]]) -> Result<Vec<usize>>;

    /// The configured number of clusters.
    fn n_clusters(&self) -> usize;
}
