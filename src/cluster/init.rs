//! Centroid initialization strategies and K-selection heuristics.
//!
//! Every strategy implements the one-method [`CentroidInit`] contract: given
//! the dataset and a target count, produce exactly `k` coordinate vectors.
//! The driver consumes them as black boxes; only the output contract
//! matters. [`elbow_k`] sits on the other side of the driver: it re-runs the
//! full fit across candidate cluster counts and reads back the inertia.

use log::debug;
use rand::prelude::*;

use super::kmeans::Kmeans;
use crate::error::{Error, Result};
use crate::metric::{squared_euclidean, Metric};

/// Produces initial centroids for a clustering run.
pub trait CentroidInit<const D: usize> {
    /// Produce exactly `k` initial centroid positions for `data`.
    fn initialize(
        &self,
        data: &[[f64; D]],
        k: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<[f64; D]>>;
}

fn check_request<const D: usize>(data: &[[f64; D]], k: usize) -> Result<()> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    if k == 0 || k > data.len() {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: data.len(),
        });
    }
    Ok(())
}

/// Uniform sampling without replacement from the dataset.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSample;

impl<const D: usize> CentroidInit<D> for RandomSample {
    fn initialize(
        &self,
        data: &[[f64; D]],
        k: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<[f64; D]>> {
        check_request(data, k)?;
        let picks = rand::seq::index::sample(rng, data.len(), k);
        Ok(picks.iter().map(|i| data[i]).collect())
    }
}

/// Iterative farthest-point sampling: a random first pick, then repeatedly
/// the point maximizing the minimum distance to the picks so far.
#[derive(Clone, Copy, Debug, Default)]
pub struct FarthestFirst;

impl<const D: usize> CentroidInit<D> for FarthestFirst {
    fn initialize(
        &self,
        data: &[[f64; D]],
        k: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<[f64; D]>> {
        check_request(data, k)?;

        let first = rng.random_range(0..data.len());
        let mut chosen = vec![data[first]];
        let mut min_sq: Vec<f64> = data.iter().map(|p| squared_euclidean(p, &data[first])).collect();

        while chosen.len() < k {
            let mut best = 0;
            let mut best_sq = f64::NEG_INFINITY;
            for (i, &d) in min_sq.iter().enumerate() {
                if d > best_sq {
                    best_sq = d;
                    best = i;
                }
            }
            chosen.push(data[best]);
            for (i, p) in data.iter().enumerate() {
                let d = squared_euclidean(p, &data[best]);
                if d < min_sq[i] {
                    min_sq[i] = d;
                }
            }
        }
        Ok(chosen)
    }
}

/// Density-peak detection: local maxima of a grid kernel-density estimate.
///
/// The dataset's bounding box is divided into `divisions` intervals per
/// axis; every grid node gets a Gaussian KDE value (per-dimension
/// rule-of-thumb bandwidth), and nodes at least as dense as their whole
/// 3^D-neighborhood are peaks, ranked by density. Grid size grows as
/// `(divisions + 1)^D`, so this strategy is meant for low-dimensional data.
#[derive(Clone, Copy, Debug)]
pub struct DensityPeaks {
    /// Grid intervals per axis.
    pub divisions: usize,
}

impl Default for DensityPeaks {
    fn default() -> Self {
        Self { divisions: 4 }
    }
}

impl DensityPeaks {
    /// A grid with `divisions` intervals per axis.
    pub fn new(divisions: usize) -> Self {
        Self { divisions }
    }

    /// Number of density peaks the grid finds — a cluster-count suggestion
    /// for callers that do not know `k` up front.
    pub fn suggest_k<const D: usize>(&self, data: &[[f64; D]]) -> Result<usize> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(self.peaks(data)?.len())
    }

    /// Grid peaks as `(coordinates, density)`, densest first.
    fn peaks<const D: usize>(&self, data: &[[f64; D]]) -> Result<Vec<([f64; D], f64)>> {
        if D == 0 {
            return Err(Error::InvalidParameter {
                name: "D",
                message: "dimensionality must be at least 1",
            });
        }
        if self.divisions == 0 {
            return Err(Error::InvalidParameter {
                name: "divisions",
                message: "must be at least 1",
            });
        }

        let n = data.len();
        let mut lo = [f64::INFINITY; D];
        let mut hi = [f64::NEG_INFINITY; D];
        for p in data {
            for d in 0..D {
                lo[d] = lo[d].min(p[d]);
                hi[d] = hi[d].max(p[d]);
            }
        }

        // Scott's rule per dimension, floored to stay usable when an axis is
        // constant.
        let scott = (n as f64).powf(-1.0 / (D as f64 + 4.0));
        let mut bandwidth = [0.0; D];
        for d in 0..D {
            let mean = data.iter().map(|p| p[d]).sum::<f64>() / n as f64;
            let var = data.iter().map(|p| (p[d] - mean).powi(2)).sum::<f64>() / n as f64;
            bandwidth[d] = (var.sqrt() * scott).max(1e-9);
        }
        let norm = (2.0 * std::f64::consts::PI).powf(D as f64 / 2.0)
            * bandwidth.iter().product::<f64>()
            * n as f64;

        let mut nodes_per_dim = [1usize; D];
        let mut step = [0.0; D];
        for d in 0..D {
            let range = hi[d] - lo[d];
            if range > 0.0 {
                nodes_per_dim[d] = self.divisions + 1;
                step[d] = range / self.divisions as f64;
            }
        }

        let total: usize = nodes_per_dim.iter().product();
        let node_coords = |idx: &[usize; D]| {
            let mut c = [0.0; D];
            for d in 0..D {
                c[d] = lo[d] + idx[d] as f64 * step[d];
            }
            c
        };

        // Density at every grid node.
        let mut densities = Vec::with_capacity(total);
        let mut coords = Vec::with_capacity(total);
        let mut idx = [0usize; D];
        for _ in 0..total {
            let node = node_coords(&idx);
            let mut sum = 0.0;
            for p in data {
                let mut u = 0.0;
                for d in 0..D {
                    let z = (node[d] - p[d]) / bandwidth[d];
                    u += z * z;
                }
                sum += (-0.5 * u).exp();
            }
            densities.push(sum / norm);
            coords.push(node);
            advance(&mut idx, &nodes_per_dim);
        }

        let strides = {
            let mut s = [1usize; D];
            for d in 1..D {
                s[d] = s[d - 1] * nodes_per_dim[d - 1];
            }
            s
        };
        let linear = |idx: &[usize; D]| -> usize {
            (0..D).map(|d| idx[d] * strides[d]).sum()
        };

        // Weak local maxima over the 3^D neighborhood.
        let mut peaks = Vec::new();
        let mut idx = [0usize; D];
        for _ in 0..total {
            let here = densities[linear(&idx)];
            let mut is_peak = true;
            let mut off = [0usize; D]; // 0, 1, 2 encode -1, 0, +1
            'offsets: for _ in 0..3usize.pow(D as u32) {
                let advanced = off;
                advance3(&mut off);
                if advanced.iter().all(|&o| o == 1) {
                    continue;
                }
                let mut neighbor = idx;
                for d in 0..D {
                    let shifted = idx[d] as isize + advanced[d] as isize - 1;
                    if shifted < 0 || shifted as usize >= nodes_per_dim[d] {
                        continue 'offsets;
                    }
                    neighbor[d] = shifted as usize;
                }
                if densities[linear(&neighbor)] > here {
                    is_peak = false;
                    break;
                }
            }
            if is_peak {
                peaks.push((coords[linear(&idx)], here));
            }
            advance(&mut idx, &nodes_per_dim);
        }

        peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(peaks)
    }
}

fn advance<const D: usize>(idx: &mut [usize; D], dims: &[usize; D]) {
    for d in 0..D {
        idx[d] += 1;
        if idx[d] < dims[d] {
            return;
        }
        idx[d] = 0;
    }
}

fn advance3<const D: usize>(off: &mut [usize; D]) {
    for d in 0..D {
        off[d] += 1;
        if off[d] < 3 {
            return;
        }
        off[d] = 0;
    }
}

impl<const D: usize> CentroidInit<D> for DensityPeaks {
    fn initialize(
        &self,
        data: &[[f64; D]],
        k: usize,
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<[f64; D]>> {
        check_request(data, k)?;

        let peaks = self.peaks(data)?;
        let mut chosen: Vec<[f64; D]> = peaks.into_iter().map(|(c, _)| c).take(k).collect();
        if chosen.is_empty() {
            chosen.push(data[0]);
        }

        // Fewer peaks than clusters: top up farthest-first from the data.
        while chosen.len() < k {
            let mut best = 0;
            let mut best_sq = f64::NEG_INFINITY;
            for (i, p) in data.iter().enumerate() {
                let d = chosen
                    .iter()
                    .map(|c| squared_euclidean(p, c))
                    .fold(f64::INFINITY, f64::min);
                if d > best_sq {
                    best_sq = d;
                    best = i;
                }
            }
            chosen.push(data[best]);
        }
        Ok(chosen)
    }
}

/// Pick a cluster count by the elbow method: fit for `k = 1..=max_k`, read
/// back the inertia, stop early once it rises, and return the `k` with the
/// largest curvature (absolute second difference) of the inertia curve.
///
/// `metric` is a factory producing a fresh metric per run, since a fit binds
/// its metric to the dataset.
pub fn elbow_k<const D: usize, M, F>(
    data: &[[f64; D]],
    max_k: usize,
    threshold: f64,
    seed: u64,
    mut metric: F,
) -> Result<usize>
where
    M: Metric<D>,
    F: FnMut() -> M,
{
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }
    if max_k == 0 {
        return Err(Error::InvalidParameter {
            name: "max_k",
            message: "must be at least 1",
        });
    }

    let cap = max_k.min(data.len());
    let mut wcss: Vec<f64> = Vec::with_capacity(cap);
    for k in 1..=cap {
        let fit = Kmeans::new(k, metric())
            .with_threshold(threshold)
            .with_seed(seed)
            .with_init(Box::new(FarthestFirst))
            .fit(data)?;
        debug!("elbow probe k = {k}: inertia {:.6e}", fit.inertia);
        wcss.push(fit.inertia);

        // Inertia should fall as k grows; a rise means the curve has gone
        // flat and noisy, so stop probing.
        if wcss.len() >= 2 && wcss[wcss.len() - 1] > wcss[wcss.len() - 2] {
            break;
        }
    }

    if wcss.len() < 3 {
        return Ok(1);
    }

    let mut best_k = 1;
    let mut best_curvature = f64::NEG_INFINITY;
    for i in 1..wcss.len() - 1 {
        let curvature = (wcss[i - 1] - 2.0 * wcss[i] + wcss[i + 1]).abs();
        if curvature > best_curvature {
            best_curvature = curvature;
            best_k = i + 1;
        }
    }
    Ok(best_k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::EuclideanMetric;

    fn two_blobs() -> Vec<[f64; 2]> {
        let mut data = Vec::new();
        for i in 0..5 {
            let jitter = f64::from(i) * 0.01;
            data.push([jitter, jitter]);
            data.push([10.0 + jitter, 10.0 + jitter]);
        }
        data
    }

    #[test]
    fn test_random_sample_draws_from_data() {
        let data = two_blobs();
        let mut rng = StdRng::seed_from_u64(42);
        let picks = RandomSample.initialize(&data, 4, &mut rng).unwrap();

        assert_eq!(picks.len(), 4);
        for p in &picks {
            assert!(data.contains(p));
        }
    }

    #[test]
    fn test_random_sample_is_without_replacement() {
        let data: Vec<[f64; 1]> = (0..6).map(|i| [f64::from(i)]).collect();
        let mut rng = StdRng::seed_from_u64(9);
        let picks = RandomSample.initialize(&data, 6, &mut rng).unwrap();

        let mut sorted: Vec<f64> = picks.iter().map(|p| p[0]).collect();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(sorted, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_requests_are_validated() {
        let data = vec![[0.0, 0.0], [1.0, 1.0]];
        let empty: Vec<[f64; 2]> = Vec::new();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(RandomSample.initialize(&empty, 1, &mut rng).is_err());
        assert!(RandomSample.initialize(&data, 0, &mut rng).is_err());
        assert!(RandomSample.initialize(&data, 3, &mut rng).is_err());
        assert!(FarthestFirst.initialize(&data, 3, &mut rng).is_err());
        assert!(DensityPeaks::default().initialize(&data, 3, &mut rng).is_err());
    }

    #[test]
    fn test_farthest_first_spans_both_blobs() {
        let data = two_blobs();
        let mut rng = StdRng::seed_from_u64(5);
        let picks = FarthestFirst.initialize(&data, 2, &mut rng).unwrap();

        // One pick per blob, whichever came first.
        let near_origin = picks.iter().filter(|p| p[0] < 5.0).count();
        assert_eq!(near_origin, 1);
    }

    #[test]
    fn test_density_peaks_finds_both_blobs() {
        let data = two_blobs();
        let peaks = DensityPeaks::default();

        assert_eq!(peaks.suggest_k(&data).unwrap(), 2);

        let mut rng = StdRng::seed_from_u64(1);
        let picks = peaks.initialize(&data, 2, &mut rng).unwrap();
        assert_eq!(picks.len(), 2);
        let near_origin = picks.iter().filter(|p| p[0] < 5.0).count();
        assert_eq!(near_origin, 1);
    }

    #[test]
    fn test_density_peaks_tops_up_when_short() {
        // One blob, one peak; the remaining picks come from the data.
        let data: Vec<[f64; 2]> = (0..8)
            .map(|i| [f64::from(i) * 0.01, 0.0])
            .collect();
        let mut rng = StdRng::seed_from_u64(2);
        let picks = DensityPeaks::default().initialize(&data, 3, &mut rng).unwrap();
        assert_eq!(picks.len(), 3);
    }

    #[test]
    fn test_elbow_spots_two_clusters() {
        let data = two_blobs();
        let k = elbow_k(&data, 5, 1e-4, 42, || EuclideanMetric).unwrap();
        assert_eq!(k, 2);
    }

    #[test]
    fn test_elbow_validates_input() {
        let empty: Vec<[f64; 2]> = Vec::new();
        assert!(elbow_k(&empty, 3, 1e-4, 0, || EuclideanMetric).is_err());

        let data = vec![[0.0, 0.0], [1.0, 1.0]];
        assert!(elbow_k(&data, 0, 1e-4, 0, || EuclideanMetric).is_err());
    }
}
