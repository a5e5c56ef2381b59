use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use efficient_knn::{Knn, KnnConfig, KnnVariant, SimilarityMetric, TrainSet};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

/// Generates `(user, item, rating)` triples with ratings in 1..=5, seeded for reproducibility.
/// Each cell is present with probability `density`.
fn generate_random_triples(n_users: u64, n_items: u64, density: f64, seed: u64) -> Vec<(u64, u64, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut triples = Vec::new();
    for user in 0..n_users {
        for item in 0..n_items {
            if rng.gen_bool(density) {
                triples.push((user, item, rng.gen_range(1..=5) as f64));
            }
        }
    }
    triples
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn_fit");
    group.sample_size(10);
    for &n_users in &[100u64, 400, 1000] {
        let data = TrainSet::from_triples(&generate_random_triples(n_users, 300, 0.05, 42))
            .expect("training set");
        group.throughput(Throughput::Elements(n_users * n_users / 2));
        for (name, metric) in [
            ("msd", SimilarityMetric::Msd),
            ("cosine", SimilarityMetric::Cosine),
            ("pearson", SimilarityMetric::Pearson),
        ] {
            group.bench_with_input(BenchmarkId::new(name, n_users), &data, |b, data| {
                b.iter(|| {
                    let mut knn = Knn::basic();
                    knn.fit(data, KnnConfig::default().with_similarity(metric))
                        .expect("fit");
                    black_box(knn)
                })
            });
        }
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let data = TrainSet::from_triples(&generate_random_triples(1000, 500, 0.05, 7)).expect("training set");
    let pairs: Vec<(u64, u64)> = {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        (0..10_000)
            .map(|_| (rng.gen_range(0..1000), rng.gen_range(0..500)))
            .collect()
    };

    let mut group = c.benchmark_group("knn_predict");
    group.throughput(Throughput::Elements(pairs.len() as u64));
    for variant in [KnnVariant::Basic, KnnVariant::Centered, KnnVariant::Baseline] {
        let mut knn = Knn::new(variant);
        knn.fit(&data, KnnConfig::default()).expect("fit");

        group.bench_function(BenchmarkId::new("sequential", format!("{:?}", variant)), |b| {
            b.iter(|| {
                for &(user, item) in &pairs {
                    black_box(knn.predict(user, item).expect("prediction"));
                }
            })
        });
        group.bench_function(BenchmarkId::new("batch", format!("{:?}", variant)), |b| {
            b.iter(|| black_box(knn.predict_batch(&pairs).expect("batch prediction")))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);
