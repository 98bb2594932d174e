use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cull::{Clustering, EuclideanMetric, Kmeans};
use rand::prelude::*;

fn bench_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans");

    // Generate synthetic data
    let mut rng = StdRng::seed_from_u64(42);
    let n = 1000;
    let k = 10;

    let data: Vec<[f64; 16]> = (0..n)
        .map(|_| std::array::from_fn(|_| rng.random::<f64>()))
        .collect();

    group.bench_function("fit_predict_n1000_d16_k10", |b| {
        b.iter(|| {
            let mut model = Kmeans::new(k, EuclideanMetric)
                .with_max_iter(10)
                .with_seed(42);
            model.fit_predict(black_box(&data)).unwrap();
        })
    });

    let clustered: Vec<[f64; 2]> = (0..n)
        .map(|i| {
            let center = f64::from(i % 8) * 20.0;
            [
                center + rng.random::<f64>(),
                center - rng.random::<f64>(),
            ]
        })
        .collect();

    group.bench_function("fit_predict_n1000_d2_k8_clustered", |b| {
        b.iter(|| {
            let mut model = Kmeans::new(8, EuclideanMetric)
                .with_max_iter(10)
                .with_seed(42);
            model.fit_predict(black_box(&clustered)).unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_kmeans);
criterion_main!(benches);
