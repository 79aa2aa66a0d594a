//! End-to-end scenarios over the core crate: upload → impute → features →
//! split → fit → score.

use std::fmt::Write as _;

use chrono::NaiveDate;
use stockml_core::data::upload::load_upload;
use stockml_core::features::{add_close_moving_average, design_matrix, FeatureSelection, Standardizer};
use stockml_core::metrics::RegressionMetrics;
use stockml_core::model::{fit_model, ModelError, ModelKind, ModelVariant};
use stockml_core::preprocess::impute_missing_with_mean;
use stockml_core::split::{train_test_split, TestFraction};
use stockml_core::{Column, Table};

/// 100 daily rows with five blank Close cells.
fn write_prices_csv(dir: &std::path::Path) -> std::path::PathBuf {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut body = String::from("Date,Open,Close,Volume\n");
    for i in 0..100 {
        let date = start + chrono::Duration::days(i);
        let close = 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.2;
        let close_cell = if i % 20 == 7 {
            String::new()
        } else {
            format!("{close:.4}")
        };
        writeln!(
            body,
            "{date},{:.4},{close_cell},{}",
            close - 0.5,
            1_000_000 + i * 1_000
        )
        .unwrap();
    }
    let path = dir.join("prices.csv");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn imputed_close_equals_mean_of_observed() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = load_upload(&write_prices_csv(dir.path())).unwrap();
    assert_eq!(table.n_rows(), 100);

    let before: Vec<Option<f64>> = table.numeric("Close").unwrap().to_vec();
    let observed: Vec<f64> = before.iter().flatten().copied().collect();
    assert_eq!(observed.len(), 95);
    let mean = observed.iter().sum::<f64>() / 95.0;

    let report = impute_missing_with_mean(&mut table);
    assert_eq!(report.total_missing(), 5);

    let after = table.numeric("Close").unwrap();
    for (b, a) in before.iter().zip(after) {
        match b {
            Some(v) => assert_eq!(Some(*v), *a),
            None => assert!((a.unwrap() - mean).abs() < 1e-9),
        }
    }
}

#[test]
fn exact_linear_data_scores_r2_of_one() {
    let n = 60;
    let table = Table::new(vec![
        Column::numeric("a", (0..n).map(|i| Some(i as f64)).collect()),
        Column::numeric("b", (0..n).map(|i| Some(((i * 13) % 17) as f64)).collect()),
        Column::numeric(
            "y",
            (0..n)
                .map(|i| Some(2.5 * i as f64 - 1.5 * ((i * 13) % 17) as f64 + 4.0))
                .collect(),
        ),
    ])
    .unwrap();
    let selection = FeatureSelection::new(&table, "y", &["a".into(), "b".into()]).unwrap();
    let dm = design_matrix(&table, &selection).unwrap();
    let split = train_test_split(&dm, TestFraction::from_percent(25).unwrap(), 42).unwrap();

    let model = fit_model(ModelKind::LinearRegression, 5, &split).unwrap();
    assert_eq!(model.variant, ModelVariant::LinearRegressor);
    let pred = model.predict(&split.x_test).unwrap();
    let metrics = RegressionMetrics::compute(&split.y_test, &pred).unwrap();
    assert!((metrics.r2 - 1.0).abs() < 1e-9, "r2 = {}", metrics.r2);
    assert!(metrics.rmse < 1e-6);

    let importance = model.feature_importance().unwrap();
    assert_eq!(importance[0].0, "a");
    assert!((importance[0].1 - 2.5).abs() < 1e-6);
}

#[test]
fn logistic_on_continuous_close_is_a_type_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut table = load_upload(&write_prices_csv(dir.path())).unwrap();
    impute_missing_with_mean(&mut table);
    add_close_moving_average(&mut table, 5).unwrap();

    let selection =
        FeatureSelection::new(&table, "Close", &["Open".into(), "MA_5".into()]).unwrap();
    let dm = design_matrix(&table, &selection).unwrap();
    let split = train_test_split(&dm, TestFraction::default(), 42).unwrap();

    let err = fit_model(ModelKind::LogisticRegression, 5, &split).unwrap_err();
    assert!(matches!(err, ModelError::TargetTypeMismatch { .. }));
    assert!(err.is_validation());
}

#[test]
fn knn_classifier_on_direction_target() {
    let n = 80;
    let table = Table::new(vec![
        Column::numeric("ret", (0..n).map(|i| Some((i as f64 * 0.7).sin())).collect()),
        Column::numeric(
            "up",
            (0..n)
                .map(|i| Some(if (i as f64 * 0.7).sin() > 0.0 { 1.0 } else { 0.0 }))
                .collect(),
        ),
    ])
    .unwrap();
    let selection = FeatureSelection::new(&table, "up", &["ret".into()]).unwrap();
    let dm = design_matrix(&table, &selection).unwrap();
    let split = train_test_split(&dm, TestFraction::default(), 7).unwrap();

    let knn = fit_model(ModelKind::KNearestNeighbors, 3, &split).unwrap();
    assert_eq!(knn.variant, ModelVariant::KnnClassifier);
    assert_eq!(knn.k, Some(3));
    let pred = knn.predict(&split.x_test).unwrap();
    assert!(pred.iter().all(|p| *p == 0.0 || *p == 1.0));

    let logistic = fit_model(ModelKind::LogisticRegression, 3, &split).unwrap();
    let table = logistic.coefficient_table().unwrap();
    assert_eq!(table.rows[0].0, "Intercept");
    assert_eq!(table.rows[1].0, "ret");
}

#[test]
fn scaled_features_round_trip_a_single_row() {
    let table = Table::new(vec![
        Column::numeric("f", (0..20).map(|i| Some(i as f64 * 10.0)).collect()),
        Column::numeric("y", (0..20).map(|i| Some(i as f64 * 3.0 + 1.0)).collect()),
    ])
    .unwrap();
    let features = vec!["f".to_string()];
    let scaler = Standardizer::fit(&table, &features).unwrap();
    let mut scaled = table.clone();
    scaler.transform_table(&mut scaled).unwrap();

    let selection = FeatureSelection::new(&scaled, "y", &features).unwrap();
    let dm = design_matrix(&scaled, &selection).unwrap();
    let split = train_test_split(&dm, TestFraction::default(), 42).unwrap();
    let model = fit_model(ModelKind::LinearRegression, 5, &split).unwrap();

    let row = scaler.transform_row(&[50.0]).unwrap();
    let pred = model.predict_row(&row).unwrap();
    assert!((pred - 16.0).abs() < 1e-9);
}
