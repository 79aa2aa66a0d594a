//! Property tests for the numeric building blocks.
//!
//! Uses proptest to verify:
//! 1. Imputation leaves no numeric gaps and keeps observed values
//! 2. Splitting is reproducible and partitions every row exactly once
//! 3. The continuity test matches its distinct-count definition
//! 4. Training-set RMSE is never negative

use proptest::prelude::*;
use stockml_core::features::{design_matrix, FeatureSelection};
use stockml_core::metrics::RegressionMetrics;
use stockml_core::model::{fit_model, is_continuous, ModelKind, CONTINUITY_THRESHOLD};
use stockml_core::preprocess::{impute_missing_with_mean, numeric_missing};
use stockml_core::split::{split_indices, train_test_split, TestFraction};
use stockml_core::{Column, Table};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_gappy_column() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.8, -1e6..1e6_f64), 1..200)
}

fn arb_percent() -> impl Strategy<Value = u32> {
    10u32..=40
}

// ── 1. Imputation ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn imputation_fills_every_gap(values in arb_gappy_column()) {
        let original = values.clone();
        let mut table = Table::new(vec![Column::numeric("x", values)]).unwrap();
        impute_missing_with_mean(&mut table);

        let observed: Vec<f64> = original.iter().flatten().copied().collect();
        if observed.is_empty() {
            prop_assert_eq!(numeric_missing(&table), original.len());
        } else {
            prop_assert_eq!(numeric_missing(&table), 0);
            let mean = observed.iter().sum::<f64>() / observed.len() as f64;
            let after = table.numeric("x").unwrap();
            for (before, now) in original.iter().zip(after) {
                match before {
                    Some(v) => prop_assert_eq!(Some(*v), *now),
                    None => prop_assert!((now.unwrap() - mean).abs() <= 1e-9 * mean.abs().max(1.0)),
                }
            }
        }
    }
}

// ── 2. Split reproducibility ─────────────────────────────────────────

proptest! {
    #[test]
    fn split_is_reproducible(n in 2usize..500, percent in arb_percent(), seed in any::<u64>()) {
        let fraction = TestFraction::from_percent(percent).unwrap();
        let first = split_indices(n, fraction, seed);
        let second = split_indices(n, fraction, seed);
        prop_assert_eq!(&first, &second);

        if let Ok((train, test)) = first {
            prop_assert_eq!(test.len(), fraction.test_size(n));
            let mut all: Vec<usize> = train.into_iter().chain(test).collect();
            all.sort_unstable();
            prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
        }
    }
}

// ── 3. Continuity ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn continuity_matches_distinct_count(values in prop::collection::vec(0i32..30, 0..100)) {
        let as_f64: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
        let mut distinct = values.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(is_continuous(&as_f64), distinct.len() > CONTINUITY_THRESHOLD);
    }
}

// ── 4. RMSE sign ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn training_rmse_is_non_negative(
        slope in -5.0..5.0_f64,
        noise in prop::collection::vec(-1.0..1.0_f64, 30),
    ) {
        let x: Vec<Option<f64>> = (0..30).map(|i| Some(i as f64)).collect();
        let y: Vec<Option<f64>> = noise
            .iter()
            .enumerate()
            .map(|(i, e)| Some(slope * i as f64 + e))
            .collect();
        let table = Table::new(vec![Column::numeric("x", x), Column::numeric("y", y)]).unwrap();
        let selection = FeatureSelection::new(&table, "y", &["x".to_string()]).unwrap();
        let dm = design_matrix(&table, &selection).unwrap();
        let split = train_test_split(&dm, TestFraction::default(), 42).unwrap();

        // Noise can collapse the target to few distinct values only in
        // degenerate draws; KNN handles either target kind.
        let model = fit_model(ModelKind::KNearestNeighbors, 3, &split).unwrap();
        let pred = model.predict(&split.x_train).unwrap();
        let m = RegressionMetrics::compute(&split.y_train, &pred).unwrap();
        prop_assert!(m.rmse >= 0.0);
        prop_assert!(m.mse >= 0.0);
    }
}
