//! Step-by-step scenarios through the gated pipeline.

use chrono::NaiveDate;
use stockml_core::data::mock::MockProvider;
use stockml_core::data::{bars_to_table, FetchRequest, RawBar, RemoteSource, RetryPolicy};
use stockml_core::model::{ModelKind, ModelVariant};
use stockml_core::Table;
use stockml_pipeline::steps::{self, FeatureRequest, SplitRequest, TrainRequest, ValueScale};
use stockml_pipeline::{
    apply, run_plan, DataInput, InMemorySessionStore, Palette, PipelineConfig, PipelineState,
    RunPlan, RunReport, SessionStore, Step, StepError, Transition, ValidationError,
};

// ── Fixtures ─────────────────────────────────────────────────────────

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

/// `n` daily bars with a wavy close and independent volume.
fn wavy_bars(n: usize) -> Vec<RawBar> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + (t * 0.3).sin() * 5.0 + t * 0.2;
            RawBar {
                date: day(1) + chrono::Duration::days(i as i64),
                open: Some(close - 0.5 + (t * 1.7).cos() * 0.4),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(1_000_000.0 + ((i * 37) % 11) as f64 * 1_000.0),
            }
        })
        .collect()
}

fn wavy_table(n: usize) -> Table {
    bars_to_table(wavy_bars(n)).unwrap()
}

fn feature_request() -> FeatureRequest {
    FeatureRequest {
        ma_window: Some(5),
        target: "Close".into(),
        features: vec!["Open".into(), "Volume".into(), "MA_5".into()],
        scale: true,
    }
}

/// Load through Split with the default 20 % / seed 42.
fn split_state(n: usize) -> PipelineState {
    let mut state = PipelineState::new();
    steps::load_table(&mut state, wavy_table(n), "fixture").unwrap();
    steps::preprocess(&mut state).unwrap();
    steps::engineer_features(&mut state, &feature_request()).unwrap();
    steps::split(&mut state, SplitRequest::default()).unwrap();
    state
}

fn linear() -> TrainRequest {
    TrainRequest {
        kind: ModelKind::LinearRegression,
        k: 5,
    }
}

// ── Load ─────────────────────────────────────────────────────────────

#[test]
fn zero_rows_from_provider_is_data_unavailable_and_stays_in_load() {
    let source = RemoteSource::new(Box::new(MockProvider::with_bars(Vec::new())), RetryPolicy::none());
    let mut state = PipelineState::new();
    apply(&mut state, Transition::Continue).unwrap();
    assert_eq!(state.current_step(), Step::Load);

    let request = FetchRequest::new("AAPL", day(1), day(10)).unwrap();
    let err = steps::load_remote(&mut state, &source, &request).unwrap_err();

    assert!(matches!(err, StepError::DataUnavailable(_)), "{err}");
    assert_eq!(state.current_step(), Step::Load);
    assert!(!state.is_complete(Step::Load));
    assert!(state.raw().is_none());
}

#[test]
fn remote_load_records_symbol_price_and_fingerprint() {
    let provider = MockProvider::with_bars(wavy_bars(30)).with_price(123.0);
    let source = RemoteSource::new(Box::new(provider), RetryPolicy::none());
    let mut state = PipelineState::new();
    let request = FetchRequest::new("aapl", day(1), day(31)).unwrap();

    steps::load_remote(&mut state, &source, &request).unwrap();

    assert_eq!(state.symbol(), Some("AAPL"));
    assert_eq!(state.current_price(), Some(123.0));
    assert_eq!(state.current_step(), Step::Preprocess);
    assert_eq!(state.dataset_hash(), Some(wavy_table(30).fingerprint().as_str()));
}

#[test]
fn empty_table_is_rejected() {
    let mut state = PipelineState::new();
    let err = steps::load_table(&mut state, Table::default(), "empty").unwrap_err();
    assert_eq!(err.category(), "DataUnavailable");
}

// ── Gating ───────────────────────────────────────────────────────────

#[test]
fn handlers_refuse_to_run_without_upstream() {
    let mut state = PipelineState::new();
    apply(&mut state, Transition::Jump(Step::Train)).unwrap();

    let err = steps::train(&mut state, linear()).unwrap_err();
    assert!(matches!(
        err,
        StepError::Validation(ValidationError::MissingUpstream {
            step: Step::Train,
            required: Step::Split
        })
    ));
    assert!(state.models().is_empty());
    assert_eq!(state.current_step(), Step::Train);
}

#[test]
fn empty_feature_list_is_rejected_without_side_effects() {
    let mut state = PipelineState::new();
    steps::load_table(&mut state, wavy_table(40), "fixture").unwrap();
    steps::preprocess(&mut state).unwrap();

    let request = FeatureRequest {
        features: Vec::new(),
        ..feature_request()
    };
    let err = steps::engineer_features(&mut state, &request).unwrap_err();
    assert!(matches!(err, StepError::Validation(ValidationError::NoFeatures)));
    assert!(state.featured().is_none());
    assert!(!state.is_complete(Step::FeatureEngineer));
}

#[test]
fn rerunning_features_invalidates_downstream() {
    let mut state = split_state(60);
    steps::train(&mut state, linear()).unwrap();
    assert!(state.is_complete(Step::Train));

    steps::engineer_features(&mut state, &feature_request()).unwrap();

    assert!(state.is_complete(Step::FeatureEngineer));
    assert!(!state.is_complete(Step::Split));
    assert!(!state.is_complete(Step::Train));
    assert!(state.split().is_none());
    assert!(state.models().is_empty());
}

// ── Split ────────────────────────────────────────────────────────────

#[test]
fn twenty_percent_of_one_hundred_rows_is_reproducible() {
    let first = split_state(100);
    let second = split_state(100);

    let a = first.split().unwrap();
    let b = second.split().unwrap();
    assert_eq!(a.n_test(), 20);
    assert_eq!(a.n_train(), 80);
    assert_eq!(a.test_index, b.test_index);
    assert_eq!(a.train_index, b.train_index);
}

#[test]
fn split_percent_outside_range_is_validation() {
    let mut state = split_state(50);
    let err = steps::split(
        &mut state,
        SplitRequest {
            test_percent: 45,
            seed: 42,
        },
    )
    .unwrap_err();
    assert!(err.is_validation());
    assert!(state.is_complete(Step::Split));
}

// ── Train ────────────────────────────────────────────────────────────

#[test]
fn logistic_on_close_is_validation_and_stores_nothing() {
    let mut state = split_state(100);
    let err = steps::train(
        &mut state,
        TrainRequest {
            kind: ModelKind::LogisticRegression,
            k: 5,
        },
    )
    .unwrap_err();

    assert!(matches!(
        err,
        StepError::Validation(ValidationError::TargetTypeMismatch(_))
    ));
    assert!(state.models().is_empty());
    assert!(!state.is_complete(Step::Train));
}

#[test]
fn knn_k_out_of_range_is_validation() {
    let mut state = split_state(100);
    let err = steps::train(
        &mut state,
        TrainRequest {
            kind: ModelKind::KNearestNeighbors,
            k: 51,
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        StepError::Validation(ValidationError::OutOfRange { name: "k", .. })
    ));
}

#[test]
fn training_a_second_model_keeps_the_first() {
    let mut state = split_state(100);
    steps::train(&mut state, linear()).unwrap();
    steps::train(
        &mut state,
        TrainRequest {
            kind: ModelKind::KNearestNeighbors,
            k: 3,
        },
    )
    .unwrap();

    let variants: Vec<ModelVariant> = state.models().keys().copied().collect();
    assert_eq!(
        variants,
        vec![ModelVariant::LinearRegressor, ModelVariant::KnnRegressor]
    );

    steps::evaluate(&mut state).unwrap();
    assert_eq!(state.metrics().len(), 2);
    for metrics in state.metrics().values() {
        assert!(metrics.rmse >= 0.0);
        assert_eq!(metrics.n_samples, 20);
    }
}

// ── Visualize ────────────────────────────────────────────────────────

#[test]
fn full_remote_run_builds_every_view() {
    let provider = MockProvider::with_bars(wavy_bars(80)).with_price(115.0);
    let source = RemoteSource::new(Box::new(provider), RetryPolicy::none());
    let mut state = PipelineState::new();
    let request = FetchRequest::new("AAPL", day(1), day(31)).unwrap();

    steps::load_remote(&mut state, &source, &request).unwrap();
    steps::preprocess(&mut state).unwrap();
    steps::engineer_features(&mut state, &feature_request()).unwrap();
    steps::split(&mut state, SplitRequest::default()).unwrap();
    steps::train(&mut state, linear()).unwrap();
    steps::evaluate(&mut state).unwrap();
    steps::visualize(&mut state).unwrap();

    assert!(state.is_complete(Step::Visualize));
    let viz = state.visualization().unwrap();
    assert_eq!(viz.primary, ModelVariant::LinearRegressor);

    let importance = viz.feature_importance.as_ref().unwrap();
    assert_eq!(importance.len(), 3);
    assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));

    let series = viz.time_series.as_ref().unwrap();
    assert_eq!(series.actual.len(), 80);
    assert_eq!(series.predicted.len(), state.split().unwrap().n_test());

    let forecast = viz.forecast.as_ref().unwrap();
    assert_eq!(forecast.symbol, "AAPL");
    assert!((forecast.change - (forecast.predicted - 115.0)).abs() < 1e-9);

    assert_eq!(viz.ranges.len(), 3);
    assert!(viz.ranges_scaled.is_some());
    let open = &viz.ranges[0];
    assert!(open.min <= open.mean && open.mean <= open.max);
    assert!(open.min > 50.0, "raw ranges should be in price units");
}

#[test]
fn single_prediction_applies_the_stored_scaler() {
    let mut state = split_state(80);
    steps::train(&mut state, linear()).unwrap();

    let raw = [101.0, 1_004_000.0, 102.0];
    let scaled = state.scaler().unwrap().transform_row(&raw).unwrap();

    let from_raw =
        steps::predict_single(&state, ModelVariant::LinearRegressor, &raw, ValueScale::Raw).unwrap();
    let from_scaled = steps::predict_single(
        &state,
        ModelVariant::LinearRegressor,
        &scaled,
        ValueScale::Scaled,
    )
    .unwrap();
    assert!((from_raw - from_scaled).abs() < 1e-9);

    let err = steps::predict_single(&state, ModelVariant::LinearRegressor, &raw[..2], ValueScale::Raw)
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn visualize_without_price_notes_missing_forecast() {
    let mut state = split_state(60);
    steps::train(&mut state, linear()).unwrap();
    steps::evaluate(&mut state).unwrap();
    steps::visualize(&mut state).unwrap();

    let viz = state.visualization().unwrap();
    assert!(viz.forecast.is_none());
    assert!(viz.notes.iter().any(|n| n.contains("forecast")));
}

// ── Sessions and runs ────────────────────────────────────────────────

#[test]
fn restart_keeps_palette_and_clears_pipeline() {
    let mut store = InMemorySessionStore::new();
    let session = store.get_or_create("user-1");
    session.palette = Palette::RedOrangeGrey;
    steps::load_table(&mut session.pipeline, wavy_table(20), "fixture").unwrap();

    session.restart();

    let session = store.get("user-1").unwrap();
    assert_eq!(session.palette, Palette::RedOrangeGrey);
    assert_eq!(session.pipeline.current_step(), Step::Welcome);
    assert!(session.pipeline.raw().is_none());
    assert!(session.pipeline.flags().completed().is_empty());
}

#[test]
fn run_plan_skips_mismatched_models() {
    let mut config = PipelineConfig::default();
    config.features.ma_window = 5;
    config.features.features = vec!["Open".into(), "Volume".into()];

    let output = run_plan(
        &config,
        RunPlan {
            input: DataInput::Table {
                table: wavy_table(100),
                label: "fixture".into(),
            },
            models: vec![ModelKind::LinearRegression, ModelKind::LogisticRegression],
            visualize: true,
        },
    )
    .unwrap();

    assert_eq!(output.state.models().len(), 1);
    assert!(output
        .outcomes
        .iter()
        .flat_map(|o| &o.notices)
        .any(|n| n.contains("Logistic Regression skipped")));

    let report = RunReport::from_state(&output.state);
    assert_eq!(report.n_test, Some(20));
    assert_eq!(report.models.len(), 1);
    assert!(report.models[0].metrics.is_some());
    assert_eq!(report.completed.len(), 7);
}

#[test]
fn default_config_run_uses_the_moving_average_as_a_feature() {
    let output = run_plan(
        &PipelineConfig::default(),
        RunPlan {
            input: DataInput::Table {
                table: wavy_table(60),
                label: "fixture".into(),
            },
            models: vec![ModelKind::KNearestNeighbors],
            visualize: false,
        },
    )
    .unwrap();

    let state = &output.state;
    assert_eq!(state.ma_column(), Some("MA_20"));
    assert!(state.features().iter().any(|f| f == "MA_20"));
    assert!(!state.features().iter().any(|f| f == "Close"));
    assert!(state
        .split()
        .unwrap()
        .feature_names
        .iter()
        .any(|f| f == "MA_20"));
}

#[test]
fn run_plan_fails_when_no_model_fits() {
    let mut config = PipelineConfig::default();
    config.features.features = vec!["Open".into(), "Volume".into()];
    let err = run_plan(
        &config,
        RunPlan {
            input: DataInput::Table {
                table: wavy_table(60),
                label: "fixture".into(),
            },
            models: vec![ModelKind::LogisticRegression],
            visualize: false,
        },
    )
    .unwrap_err();
    assert_eq!(err.step, Step::Train);
    assert!(err.source.is_validation());
}

// ── Upload and config files ──────────────────────────────────────────

/// 100 daily rows with five blank Close cells; returns the observed closes.
fn write_upload(dir: &std::path::Path) -> (std::path::PathBuf, Vec<f64>) {
    let mut body = String::from("Date,Open,Close,Volume\n");
    let mut observed = Vec::new();
    for (i, bar) in wavy_bars(100).into_iter().enumerate() {
        let close = bar.close.unwrap();
        let cell = if i % 20 == 3 {
            String::new()
        } else {
            observed.push(close);
            format!("{close}")
        };
        body.push_str(&format!(
            "{},{},{cell},{}\n",
            bar.date,
            bar.open.unwrap(),
            bar.volume.unwrap()
        ));
    }
    let path = dir.join("prices.csv");
    std::fs::write(&path, body).unwrap();
    (path, observed)
}

#[test]
fn uploaded_gaps_are_filled_with_the_observed_mean() {
    let dir = tempfile::tempdir().unwrap();
    let (path, observed) = write_upload(dir.path());
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;

    let mut state = PipelineState::new();
    steps::load_upload(&mut state, &path).unwrap();
    assert_eq!(state.current_step(), Step::Preprocess);
    assert!(state.symbol().is_none());

    steps::preprocess(&mut state).unwrap();
    let report = state.imputation().unwrap();
    assert_eq!(report.total_missing(), 5);
    let close = report.columns.iter().find(|c| c.name == "Close").unwrap();
    assert_eq!(close.missing, 5);
    assert!((close.fill_value.unwrap() - mean).abs() < 1e-9);
}

#[test]
fn config_file_drives_an_upload_run() {
    let dir = tempfile::tempdir().unwrap();
    let (csv, _) = write_upload(dir.path());
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
            [features]
            add_moving_average = false
            features = ["Open", "Volume"]

            [split]
            test_percent = 25
            seed = 7

            [model]
            kind = "knn"
            k = 3
        "#,
    )
    .unwrap();

    let config = PipelineConfig::load(&config_path).unwrap();
    let run = run_plan(
        &config,
        RunPlan {
            input: DataInput::Upload(csv),
            models: Vec::new(),
            visualize: false,
        },
    )
    .unwrap();

    let split = run.state.split().unwrap();
    assert_eq!(split.n_test(), 25);
    assert_eq!(split.seed, 7);
    assert!(run.state.models().contains_key(&ModelVariant::KnnRegressor));
}

#[test]
fn missing_upload_fails_without_touching_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = PipelineState::new();
    let err = steps::load_upload(&mut state, &dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, StepError::Source(_)));
    assert!(state.raw().is_none());
    assert!(!state.is_complete(Step::Load));
}
