//! Criterion benchmarks for model fitting and prediction.
//!
//! Benchmarks:
//! 1. OLS fit on a few hundred rows
//! 2. Logistic gradient descent fit
//! 3. KNN prediction (brute-force distances)
//! 4. Moving average + correlation over a year of bars

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};

use stockml_core::data::source::bars_to_table;
use stockml_core::data::SyntheticProvider;
use stockml_core::features::{add_close_moving_average, correlation_matrix};
use stockml_core::model::{Estimator, KnnRegressor, LinearRegression, LogisticRegression};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_xy(n: usize, p: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, p), |(i, j)| ((i * (j + 3)) as f64 * 0.37).sin() * 10.0);
    let y = Array1::from_shape_fn(n, |i| {
        (0..p).map(|j| x[[i, j]] * (j as f64 + 1.0)).sum::<f64>() + (i as f64 * 0.01)
    });
    (x, y)
}

fn bench_linear_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_fit");
    for &n in &[250usize, 1_000] {
        let (x, y) = make_xy(n, 5);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let mut m = LinearRegression::new();
                m.fit(black_box(&x), black_box(&y)).ok();
                m
            })
        });
    }
    group.finish();
}

fn bench_logistic_fit(c: &mut Criterion) {
    let (x, y) = make_xy(250, 5);
    let labels = y.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
    c.bench_function("logistic_fit_250x5", |b| {
        b.iter(|| {
            let mut m = LogisticRegression::default();
            m.fit(black_box(&x), black_box(&labels)).ok();
            m
        })
    });
}

fn bench_knn_predict(c: &mut Criterion) {
    let (x, y) = make_xy(1_000, 5);
    let (q, _) = make_xy(200, 5);
    let mut m = KnnRegressor::new(5);
    m.fit(&x, &y).ok();
    c.bench_function("knn_predict_200_vs_1000", |b| {
        b.iter(|| m.predict(black_box(&q)).ok())
    });
}

fn bench_features(c: &mut Criterion) {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let table = bars_to_table(SyntheticProvider::bars("SPY", start, end)).unwrap();
    let cols: Vec<String> = ["Open", "High", "Low", "Close", "Volume", "MA_20"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    c.bench_function("ma_and_correlation_1y", |b| {
        b.iter(|| {
            let mut t = table.clone();
            add_close_moving_average(&mut t, 20).ok();
            correlation_matrix(black_box(&t), &cols).ok()
        })
    });
}

criterion_group!(
    benches,
    bench_linear_fit,
    bench_logistic_fit,
    bench_knn_predict,
    bench_features
);
criterion_main!(benches);
