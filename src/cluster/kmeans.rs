//! K-means driver over the filtering engine.
//!
//! The driver owns the centroids and the distance metric, builds the kd-tree
//! once per fit, and then loops: reset accumulators, run one filtering pass,
//! normalize every centroid from its accumulated sum, and test convergence
//! as the mean per-centroid displacement under the active metric. The loop
//! ends when the displacement drops strictly below the threshold (never on
//! the first pass, which has nothing to compare against) or when the
//! iteration cap fires — a flagged, non-error outcome that still returns the
//! best centroids found.

use std::fmt;

use log::{debug, warn};
use rand::prelude::*;

use super::filter::run_pass;
use super::init::{CentroidInit, RandomSample};
use super::traits::Clustering;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::point::Centroid;
use crate::tree::KdTree;

/// Tree-accelerated k-means.
///
/// ```
/// use cull::{EuclideanMetric, Kmeans};
///
/// let data = vec![[0.0, 0.0], [0.1, 0.1], [10.0, 10.0], [10.1, 10.1]];
/// let mut model = Kmeans::new(2, EuclideanMetric).with_seed(42);
/// let fit = model.fit(&data).unwrap();
/// assert_eq!(fit.assignments[0], fit.assignments[1]);
/// assert_ne!(fit.assignments[0], fit.assignments[2]);
/// ```
pub struct Kmeans<const D: usize, M> {
    /// Number of clusters.
    k: usize,
    /// Active distance metric.
    metric: M,
    /// Iteration cap.
    max_iter: usize,
    /// Convergence threshold on the mean centroid displacement.
    threshold: f64,
    /// Random seed.
    seed: Option<u64>,
    /// Centroid initialization strategy.
    init: Box<dyn CentroidInit<D> + Send + Sync>,
}

/// Result of a completed fit.
#[derive(Clone, Debug)]
pub struct KmeansFit<const D: usize> {
    /// Final centroid positions, indexed by cluster label.
    pub centroids: Vec<[f64; D]>,
    /// One cluster label per input point.
    pub assignments: Vec<usize>,
    /// Number of centroid-update passes executed (the final relabeling pass
    /// not included).
    pub iterations: usize,
    /// Whether the convergence threshold was met before the iteration cap.
    pub converged: bool,
    /// Sum of squared distances from each point to its assigned centroid,
    /// under the metric the fit ran with.
    pub inertia: f64,
    /// Number of points per cluster. A zero entry marks a cluster that kept
    /// its prior position because no point reached it on the final pass.
    pub cluster_sizes: Vec<usize>,
}

impl<const D: usize, M: Metric<D>> Kmeans<D, M> {
    /// Create a new k-means driver with `k` clusters under `metric`.
    ///
    /// Defaults: 100 iterations, threshold `1e-4`, uniform random
    /// initialization, entropy-seeded RNG.
    pub fn new(k: usize, metric: M) -> Self {
        Self {
            k,
            metric,
            max_iter: 100,
            threshold: 1e-4,
            seed: None,
            init: Box::new(RandomSample),
        }
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence threshold (mean centroid displacement, measured
    /// under the active metric). A threshold of zero never converges on any
    /// dataset with more than one distinct position.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace the centroid initialization strategy.
    pub fn with_init(mut self, init: Box<dyn CentroidInit<D> + Send + Sync>) -> Self {
        self.init = init;
        self
    }

    /// The metric the driver measures with.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Cluster `data`.
    pub fn fit(&mut self, data: &[[f64; D]]) -> Result<KmeansFit<D>> {
        if D == 0 {
            return Err(Error::InvalidParameter {
                name: "D",
                message: "dimensionality must be at least 1",
            });
        }
        let n = data.len();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(Error::InvalidParameter {
                name: "threshold",
                message: "must be a non-negative number",
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }

        // One-time metric precomputation, before anything touches distances.
        self.metric.setup(data)?;

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };
        let coords = self.init.initialize(data, self.k, rng.as_mut())?;
        if coords.len() != self.k {
            return Err(Error::InvalidParameter {
                name: "init",
                message: "strategy did not produce exactly k centroids",
            });
        }
        let mut centroids: Vec<Centroid<D>> = coords.into_iter().map(Centroid::new).collect();

        let tree = KdTree::build(data).ok_or(Error::EmptyInput)?;

        let mut by_slot = vec![0usize; n];
        let mut prev: Option<Vec<[f64; D]>> = None;
        let mut converged = false;
        let mut iterations = 0;

        for pass in 1..=self.max_iter {
            iterations = pass;

            for c in centroids.iter_mut() {
                c.reset();
            }
            let partials = run_pass(&tree, &centroids, &self.metric, &mut by_slot);
            for (c, p) in centroids.iter_mut().zip(&partials) {
                c.acc = *p;
            }

            for (idx, c) in centroids.iter_mut().enumerate() {
                if !c.normalize() {
                    warn!("cluster {idx} received no points in pass {pass}; keeping its position");
                }
            }

            if let Some(prev_coords) = &prev {
                let total: f64 = centroids
                    .iter()
                    .zip(prev_coords)
                    .map(|(c, old)| self.metric.distance(&c.coords, old))
                    .sum();
                let mean_shift = total / self.k as f64;
                debug!("pass {pass}: mean centroid shift {mean_shift:.6e}");
                if mean_shift < self.threshold {
                    converged = true;
                    break;
                }
            }
            prev = Some(centroids.iter().map(|c| c.coords).collect());
        }

        if !converged {
            warn!(
                "threshold {} not reached after {} passes; returning the current centroids",
                self.threshold, iterations
            );
        }

        // One assignment-only pass against the final positions, so the
        // reported labels are exact for the reported centroids and every
        // point ends up no farther from its own centroid than from any
        // other.
        for c in centroids.iter_mut() {
            c.reset();
        }
        run_pass(&tree, &centroids, &self.metric, &mut by_slot);

        // Scatter slot-ordered labels back to input order.
        let mut assignments = vec![0usize; n];
        for (slot, &orig) in tree.slots().iter().enumerate() {
            assignments[orig] = by_slot[slot];
        }

        let mut cluster_sizes = vec![0usize; self.k];
        for &label in &assignments {
            cluster_sizes[label] += 1;
        }

        let inertia = data
            .iter()
            .zip(&assignments)
            .map(|(p, &label)| {
                let d = self.metric.distance(p, &centroids[label].coords);
                d * d
            })
            .sum();

        Ok(KmeansFit {
            centroids: centroids.iter().map(|c| c.coords).collect(),
            assignments,
            iterations,
            converged,
            inertia,
            cluster_sizes,
        })
    }
}

impl<const D: usize, M: Metric<D>> Clustering<D> for Kmeans<D, M> {
    fn fit_predict(&mut self, data: &[[f64; D]]) -> Result<Vec<usize>> {
        Ok(self.fit(data)?.assignments)
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

impl<const D: usize, M: fmt::Debug> fmt::Debug for Kmeans<D, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kmeans")
            .field("k", &self.k)
            .field("metric", &self.metric)
            .field("max_iter", &self.max_iter)
            .field("threshold", &self.threshold)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}
