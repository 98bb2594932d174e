use cull::{Clustering, EuclideanMetric, Kmeans, Metric};
use proptest::prelude::*;

/// Brute-force nearest-centroid labels with the same lowest-index tie-break
/// the filtering engine uses.
fn nearest_labels(data: &[[f64; 2]], centroids: &[[f64; 2]]) -> Vec<usize> {
    data.iter()
        .map(|p| {
            let mut best = 0;
            let mut best_dist = EuclideanMetric.distance(&centroids[0], p);
            for (c, centroid) in centroids.iter().enumerate().skip(1) {
                let d = EuclideanMetric.distance(centroid, p);
                if d < best_dist {
                    best_dist = d;
                    best = c;
                }
            }
            best
        })
        .collect()
}

fn points(n: usize) -> impl Strategy<Value = Vec<[f64; 2]>> {
    prop::collection::vec(proptest::array::uniform2(-10.0f64..10.0), 1..n)
}

proptest! {
    #[test]
    fn prop_kmeans_all_assigned(data in points(20), k in 1usize..5) {
        // Skip if k > n
        if k <= data.len() {
            let mut model = Kmeans::new(k, EuclideanMetric).with_seed(42);
            let labels = model.fit_predict(&data).unwrap();

            prop_assert_eq!(labels.len(), data.len());
            for &l in &labels {
                prop_assert!(l < k);
            }
        }
    }

    #[test]
    fn prop_final_assignment_is_locally_optimal(data in points(30), k in 1usize..6) {
        // After a completed fit, no point may sit closer to a foreign
        // centroid than to its own, and the nearest-centroid recomputation
        // (with the same tie-break) must reproduce the reported labels.
        if k <= data.len() {
            let fit = Kmeans::new(k, EuclideanMetric)
                .with_seed(7)
                .fit(&data)
                .unwrap();

            let recomputed = nearest_labels(&data, &fit.centroids);
            prop_assert_eq!(&recomputed, &fit.assignments);

            for (p, &label) in data.iter().zip(&fit.assignments) {
                let own = EuclideanMetric.distance(p, &fit.centroids[label]);
                for c in &fit.centroids {
                    let other = EuclideanMetric.distance(p, c);
                    prop_assert!(own <= other + 1e-9);
                }
            }
        }
    }

    #[test]
    fn prop_inertia_matches_assignments(data in points(25), k in 1usize..4) {
        if k <= data.len() {
            let fit = Kmeans::new(k, EuclideanMetric)
                .with_seed(3)
                .fit(&data)
                .unwrap();

            let expected: f64 = data
                .iter()
                .zip(&fit.assignments)
                .map(|(p, &label)| {
                    let d = EuclideanMetric.distance(p, &fit.centroids[label]);
                    d * d
                })
                .sum();
            prop_assert!((fit.inertia - expected).abs() < 1e-9);

            let mut sizes = vec![0usize; k];
            for &label in &fit.assignments {
                sizes[label] += 1;
            }
            prop_assert_eq!(sizes, fit.cluster_sizes);
        }
    }

    #[test]
    fn prop_seeded_fit_is_deterministic(data in points(20), k in 1usize..4, seed in any::<u64>()) {
        if k <= data.len() {
            let fit_a = Kmeans::new(k, EuclideanMetric).with_seed(seed).fit(&data).unwrap();
            let fit_b = Kmeans::new(k, EuclideanMetric).with_seed(seed).fit(&data).unwrap();

            prop_assert_eq!(fit_a.assignments, fit_b.assignments);
            prop_assert_eq!(fit_a.centroids, fit_b.centroids);
        }
    }
}
