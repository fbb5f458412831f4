//! Criterion benchmarks for rfcde: forest training and neighbor weights.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rfcde::{BasisSystem, ColumnMajorMatrix, ColumnMajorView, ForestConfig, OobMode};

/// Generate `n_train` observations whose response mode depends on covariate 0.
fn make_data(
    n_train: usize,
    n_var: usize,
    n_basis: usize,
    seed: u64,
) -> (ColumnMajorMatrix, ColumnMajorMatrix, Vec<Vec<f64>>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x: Vec<f64> = (0..n_train * n_var).map(|_| rng.r#gen::<f64>()).collect();
    let z: Vec<f64> = (0..n_train)
        .map(|i| x[i] * 2.0 + rng.r#gen::<f64>() * 0.5)
        .collect();
    let basis = BasisSystem::Cosine
        .evaluate(ColumnMajorView::new(&z, n_train, 1).unwrap(), &[n_basis])
        .unwrap();
    let points: Vec<Vec<f64>> = (0..n_train)
        .map(|i| (0..n_var).map(|j| x[j * n_train + i]).collect())
        .collect();
    (ColumnMajorMatrix::new(x, n_train, n_var).unwrap(), basis, points)
}

fn bench_forest_train(c: &mut Criterion) {
    let (x, basis, _) = make_data(1000, 20, 31, 42);
    let cfg = ForestConfig::new(50).unwrap().with_seed(42);

    c.bench_function("rfcde_train_1000x20_31basis_50trees", |b| {
        b.iter(|| cfg.fit(x.as_view(), basis.as_view()).unwrap());
    });
}

fn bench_functional_train(c: &mut Criterion) {
    // One scalar covariate followed by a 49-column functional block.
    let (x, basis, _) = make_data(1000, 50, 31, 42);
    let cfg = ForestConfig::new(50)
        .unwrap()
        .with_block_lengths(Some(vec![1, 49]))
        .with_lambda(5.0)
        .with_seed(42);

    c.bench_function("rfcde_train_functional_1000x50_50trees", |b| {
        b.iter(|| cfg.fit(x.as_view(), basis.as_view()).unwrap());
    });
}

fn bench_weights_batch(c: &mut Criterion) {
    let (x, basis, points) = make_data(1000, 20, 31, 42);
    let forest = ForestConfig::new(50)
        .unwrap()
        .with_seed(42)
        .fit(x.as_view(), basis.as_view())
        .unwrap()
        .into_forest();

    c.bench_function("rfcde_weights_batch_1000x20_50trees", |b| {
        b.iter(|| forest.weights_batch(&points).unwrap());
    });
}

fn bench_oob_weights(c: &mut Criterion) {
    let (x, basis, _) = make_data(500, 20, 31, 42);
    let forest = ForestConfig::new(50)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .with_seed(42)
        .fit(x.as_view(), basis.as_view())
        .unwrap()
        .into_forest();

    c.bench_function("rfcde_oob_weights_500x20_50trees", |b| {
        b.iter(|| forest.oob_weights().unwrap());
    });
}

criterion_group!(
    benches,
    bench_forest_train,
    bench_functional_train,
    bench_weights_batch,
    bench_oob_weights
);
criterion_main!(benches);
