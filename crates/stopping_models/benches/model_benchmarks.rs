//! Benchmarks for stopping_models.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stopping_core::types::{Matrix, PathTensor};
use stopping_models::config::NetworkConfig;
use stopping_models::training::FitOptions;
use stopping_models::{
    DualArchitecture, DualBatch, DualNetwork, LossKind, Regressor, RegressorArchitecture,
    TrainableModel,
};

fn sample_features(rows: usize, cols: usize) -> Matrix {
    let data = (0..rows * cols).map(|i| (i as f64 * 0.17).sin()).collect();
    Matrix::new(rows, cols, data).unwrap()
}

fn benchmark_regressor_predict(c: &mut Criterion) {
    let config = NetworkConfig::default();
    let model = Regressor::new(RegressorArchitecture::from_config(8, &config), 1).unwrap();
    let mut group = c.benchmark_group("regressor_predict");

    for rows in [1_000, 10_000, 50_000] {
        let x = sample_features(rows, 8);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &x, |b, x| {
            b.iter(|| model.predict(black_box(x)))
        });
    }

    group.finish();
}

fn benchmark_regressor_fit(c: &mut Criterion) {
    let config = NetworkConfig::default();
    let x = sample_features(2_048, 8);
    let y: Vec<f64> = (0..2_048).map(|i| (i as f64 * 0.01).cos()).collect();

    c.bench_function("regressor_fit_one_epoch", |b| {
        b.iter(|| {
            let mut model =
                Regressor::new(RegressorArchitecture::from_config(8, &config), 1).unwrap();
            model.compile(1e-3, LossKind::MeanSquaredError);
            model.fit(black_box(&x), black_box(&y), None, &FitOptions::new(256, 1))
        })
    });
}

fn benchmark_dual_fit(c: &mut Criterion) {
    let paths = 256;
    let times = 11;
    let tensor = PathTensor::new(
        paths,
        times,
        4,
        (0..paths * times * 4).map(|i| (i as f64 * 0.05).sin()).collect(),
    )
    .unwrap();
    let payoffs = sample_features(paths, times - 1);
    let increments = sample_features(paths, times - 1);
    let batch = DualBatch::new(&tensor, &payoffs, &increments).unwrap();
    let mut group = c.benchmark_group("dual_fit_one_epoch");

    for attention in [false, true] {
        let config = NetworkConfig::builder()
            .layers(2)
            .nodes(16)
            .attention(attention)
            .build()
            .unwrap();
        let arch = DualArchitecture::from_config(6, times, 4, &config);
        group.bench_with_input(BenchmarkId::from_parameter(attention), &arch, |b, arch| {
            b.iter(|| {
                let mut model = DualNetwork::new(arch.clone(), 1).unwrap();
                model.compile(1e-3, LossKind::DualMaxGap);
                model.fit(black_box(&batch), None, &FitOptions::new(64, 1))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_regressor_predict,
    benchmark_regressor_fit,
    benchmark_dual_fit
);
criterion_main!(benches);
