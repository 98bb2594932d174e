//! The filtering engine: one candidate-pruning pass over the kd-tree.
//!
//! A pass walks the tree root-to-leaves carrying the set of centroids that
//! could still be nearest for some point in the current cell. At each
//! internal node the candidate nearest to the cell midpoint (`z_star`)
//! anchors a dominance test: any candidate provably farther than `z_star`
//! from every point of the cell is dropped. When a single candidate
//! survives, the whole subtree is assigned in bulk from the node's
//! precomputed aggregate; otherwise the descent continues with the narrowed
//! set, and leaves resolve the remaining candidates exactly.
//!
//! Shallow recursion levels fork onto the rayon pool. Each forked branch
//! accumulates into its own partial accumulators, merged left-then-right at
//! the join, so the final sums are identical for every thread schedule.
//! Assignment output is slot-indexed and split along the tree's contiguous
//! spans, which keeps concurrent writers on disjoint slices.

use crate::metric::Metric;
use crate::point::{midpoint, Accumulator, Centroid};
use crate::tree::{parallel_cutoff, KdNode, KdTree, NodeKind};

/// Run one filtering pass.
///
/// `assign` is slot-indexed (`tree.slots()` maps a slot back to the input
/// point); it must be exactly `tree.len()` long. Returns the per-centroid
/// weighted sums and counts gathered by the pass.
pub(crate) fn run_pass<const D: usize, M: Metric<D>>(
    tree: &KdTree<D>,
    centroids: &[Centroid<D>],
    metric: &M,
    assign: &mut [usize],
) -> Vec<Accumulator<D>> {
    debug_assert_eq!(assign.len(), tree.len());
    let candidates: Vec<usize> = (0..centroids.len()).collect();
    let mut acc = vec![Accumulator::zero(); centroids.len()];
    filter_node(
        tree.root(),
        &candidates,
        0,
        parallel_cutoff(),
        centroids,
        metric,
        &mut acc,
        assign,
    );
    acc
}

#[allow(clippy::too_many_arguments)]
fn filter_node<const D: usize, M: Metric<D>>(
    node: &KdNode<D>,
    candidates: &[usize],
    depth: usize,
    cutoff: usize,
    centroids: &[Centroid<D>],
    metric: &M,
    acc: &mut [Accumulator<D>],
    assign: &mut [usize],
) {
    // A singleton candidate set owns the subtree outright: merge the node's
    // aggregate and blanket the span, no distance computation at all.
    if let [only] = *candidates {
        acc[only].merge(&node.agg);
        assign.fill(only);
        return;
    }

    match &node.kind {
        NodeKind::Leaf { point } => {
            let best = nearest_candidate(candidates, centroids, metric, point);
            acc[best].merge(&node.agg);
            assign[0] = best;
        }
        NodeKind::Split { left, right } => {
            let mid = midpoint(&node.cell_min, &node.cell_max);
            let z_star = nearest_candidate(candidates, centroids, metric, &mid);

            let survivors: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&z| {
                    z == z_star
                        || !is_farther(
                            &centroids[z].coords,
                            &centroids[z_star].coords,
                            node,
                            metric,
                        )
                })
                .collect();

            if let [only] = *survivors.as_slice() {
                acc[only].merge(&node.agg);
                assign.fill(only);
                return;
            }

            let (assign_l, assign_r) = assign.split_at_mut(left.agg.count);
            if depth < cutoff {
                let mut acc_l = vec![Accumulator::zero(); centroids.len()];
                let mut acc_r = vec![Accumulator::zero(); centroids.len()];
                rayon::join(
                    || {
                        filter_node(
                            left, &survivors, depth + 1, cutoff, centroids, metric, &mut acc_l,
                            assign_l,
                        )
                    },
                    || {
                        filter_node(
                            right, &survivors, depth + 1, cutoff, centroids, metric, &mut acc_r,
                            assign_r,
                        )
                    },
                );
                for (dst, src) in acc.iter_mut().zip(&acc_l) {
                    dst.merge(src);
                }
                for (dst, src) in acc.iter_mut().zip(&acc_r) {
                    dst.merge(src);
                }
            } else {
                filter_node(
                    left, &survivors, depth + 1, cutoff, centroids, metric, acc, assign_l,
                );
                filter_node(
                    right, &survivors, depth + 1, cutoff, centroids, metric, acc, assign_r,
                );
            }
        }
    }
}

/// The candidate nearest to `target`; the first candidate wins ties, so with
/// candidates kept in driver order the lowest handle is deterministic.
fn nearest_candidate<const D: usize, M: Metric<D>>(
    candidates: &[usize],
    centroids: &[Centroid<D>],
    metric: &M,
    target: &[f64; D],
) -> usize {
    let mut best = candidates[0];
    let mut best_dist = metric.distance(&centroids[best].coords, target);
    for &c in &candidates[1..] {
        let d = metric.distance(&centroids[c].coords, target);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

/// Dominance test: is `z` farther than `z_star` from every point of the
/// node's cell? Checked at the bounding-box corner most favorable to `z` —
/// per dimension the side of the cell lying away from `z_star` relative to
/// `z`. Equality keeps the candidate.
fn is_farther<const D: usize, M: Metric<D>>(
    z: &[f64; D],
    z_star: &[f64; D],
    node: &KdNode<D>,
    metric: &M,
) -> bool {
    let mut corner = [0.0; D];
    for i in 0..D {
        corner[i] = if z[i] - z_star[i] >= 0.0 {
            node.cell_max[i]
        } else {
            node.cell_min[i]
        };
    }
    metric.distance(z, &corner) > metric.distance(z_star, &corner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::EuclideanMetric;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Euclidean metric that counts distance invocations.
    struct CountingMetric(AtomicUsize);

    impl CountingMetric {
        fn new() -> Self {
            Self(AtomicUsize::new(0))
        }

        fn calls(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl<const D: usize> Metric<D> for CountingMetric {
        fn distance(&self, a: &[f64; D], b: &[f64; D]) -> f64 {
            self.0.fetch_add(1, Ordering::SeqCst);
            EuclideanMetric.distance(a, b)
        }
    }

    fn centroids_at<const D: usize>(coords: &[[f64; D]]) -> Vec<Centroid<D>> {
        coords.iter().map(|&c| Centroid::new(c)).collect()
    }

    /// Nearest-centroid assignment with the same lowest-index tie-break.
    fn brute_force<const D: usize>(
        data: &[[f64; D]],
        centroids: &[Centroid<D>],
    ) -> (Vec<Accumulator<D>>, Vec<usize>) {
        let metric = EuclideanMetric;
        let mut acc = vec![Accumulator::zero(); centroids.len()];
        let mut assign = Vec::with_capacity(data.len());
        for p in data {
            let mut best = 0;
            let mut best_dist = metric.distance(&centroids[0].coords, p);
            for (c, centroid) in centroids.iter().enumerate().skip(1) {
                let d = metric.distance(&centroid.coords, p);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            acc[best].add(p);
            assign.push(best);
        }
        (acc, assign)
    }

    fn run_and_scatter<const D: usize>(
        data: &[[f64; D]],
        centroids: &[Centroid<D>],
    ) -> (Vec<Accumulator<D>>, Vec<usize>) {
        let tree = KdTree::build(data).unwrap();
        let mut by_slot = vec![usize::MAX; data.len()];
        let acc = run_pass(&tree, centroids, &EuclideanMetric, &mut by_slot);
        let mut assign = vec![usize::MAX; data.len()];
        for (slot, &orig) in tree.slots().iter().enumerate() {
            assign[orig] = by_slot[slot];
        }
        (acc, assign)
    }

    #[test]
    fn test_pass_matches_brute_force() {
        let data: Vec<[f64; 2]> = (0..60)
            .map(|i| {
                let x = f64::from(i);
                [(x * 0.37).sin() * 8.0, (x * 0.73).cos() * 8.0]
            })
            .collect();
        let centroids = centroids_at(&[[-4.0, -4.0], [0.0, 0.0], [4.0, 4.0], [8.0, -8.0]]);

        let (acc, assign) = run_and_scatter(&data, &centroids);
        let (expected_acc, expected_assign) = brute_force(&data, &centroids);

        assert_eq!(assign, expected_assign);
        for (a, e) in acc.iter().zip(&expected_acc) {
            assert_eq!(a.count, e.count);
            for i in 0..2 {
                assert!((a.sum[i] - e.sum[i]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_singleton_candidate_set_never_measures() {
        let data = [[0.0, 0.0], [1.0, 0.0], [2.0, 3.0], [5.0, 5.0]];
        let centroids = centroids_at(&[[1.0, 1.0]]);
        let tree = KdTree::build(&data).unwrap();
        let metric = CountingMetric::new();

        let mut assign = vec![usize::MAX; data.len()];
        let acc = run_pass(&tree, &centroids, &metric, &mut assign);

        assert_eq!(metric.calls(), 0);
        assert!(assign.iter().all(|&a| a == 0));
        assert_eq!(acc[0].count, 4);
    }

    #[test]
    fn test_single_survivor_bulk_assigns_without_leaf_metric_calls() {
        // Four points near the origin; the second centroid is hopeless, so
        // the root prunes it and the whole tree is assigned in bulk. The
        // only metric calls are the root's midpoint scan (2) and one
        // dominance test (2); the four leaves are never measured.
        let data = [[0.0, 0.0], [0.5, 0.0], [0.0, 0.5], [0.5, 0.5]];
        let centroids = centroids_at(&[[0.25, 0.25], [1000.0, 1000.0]]);
        let tree = KdTree::build(&data).unwrap();
        let metric = CountingMetric::new();

        let mut assign = vec![usize::MAX; data.len()];
        let acc = run_pass(&tree, &centroids, &metric, &mut assign);

        assert_eq!(metric.calls(), 4);
        assert!(assign.iter().all(|&a| a == 0));
        assert_eq!(acc[0].count, 4);
        assert_eq!(acc[1].count, 0);
    }

    #[test]
    fn test_tied_candidates_resolve_to_lowest_handle() {
        // Both centroids are equidistant from every point: the prune keeps
        // both (equality is not "farther"), and every leaf resolves to the
        // first centroid.
        let data = [[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]];
        let centroids = centroids_at(&[[-1.0, 1.0], [1.0, 1.0]]);

        let (acc, assign) = run_and_scatter(&data, &centroids);
        assert!(assign.iter().all(|&a| a == 0));
        assert_eq!(acc[0].count, 3);
        assert_eq!(acc[1].count, 0);
    }

    #[test]
    fn test_duplicate_points_all_assigned() {
        let data = [[2.0, 2.0]; 7];
        let centroids = centroids_at(&[[0.0, 0.0], [3.0, 3.0]]);

        let (acc, assign) = run_and_scatter(&data, &centroids);
        assert!(assign.iter().all(|&a| a == 1));
        assert_eq!(acc[1].count, 7);
        assert_eq!(acc[0].count, 0);
        assert!((acc[1].sum[0] - 14.0).abs() < 1e-12);
    }
}
