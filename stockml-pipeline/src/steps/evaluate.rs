use std::collections::BTreeMap;

use tracing::{info, warn};

use stockml_core::metrics::RegressionMetrics;

use super::StepOutcome;
use crate::error::StepError;
use crate::state::PipelineState;
use crate::step::Step;

/// Score every trained model on the test set. A model that fails is
/// reported and skipped; the step fails only when none can be scored.
pub fn evaluate(state: &mut PipelineState) -> Result<StepOutcome, StepError> {
    state.ensure_ready(Step::Evaluate)?;
    let Some(parts) = state.split.as_ref() else {
        return Err(StepError::missing_upstream(Step::Evaluate, Step::Split));
    };

    let mut predictions = BTreeMap::new();
    let mut metrics = BTreeMap::new();
    let mut failures = BTreeMap::new();
    let mut outcome = StepOutcome::new(Step::Evaluate);

    for (variant, model) in &state.models {
        let scored = model
            .predict(&parts.x_test)
            .map_err(StepError::from)
            .and_then(|pred| {
                let m = RegressionMetrics::compute(&parts.y_test, &pred)?;
                Ok((pred, m))
            });
        match scored {
            Ok((pred, m)) => {
                outcome = outcome.notice(format!(
                    "{variant}: RMSE {:.4}, R² {:.4}",
                    m.rmse, m.r2
                ));
                predictions.insert(*variant, pred);
                metrics.insert(*variant, m);
            }
            Err(e) => {
                warn!(variant = %variant, error = %e, "evaluation failed");
                outcome = outcome.notice(format!("{variant}: evaluation failed: {e}"));
                failures.insert(*variant, e.to_string());
            }
        }
    }

    if metrics.is_empty() {
        let detail: Vec<String> = failures.iter().map(|(v, e)| format!("{v}: {e}")).collect();
        return Err(StepError::Computation(format!(
            "no model could be evaluated ({})",
            detail.join("; ")
        )));
    }
    info!(scored = metrics.len(), failed = failures.len(), "evaluation complete");

    state.invalidate_after(Step::Evaluate);
    state.predictions = predictions;
    state.metrics = metrics;
    state.eval_failures = failures;
    state.flags.complete(Step::Evaluate)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{self, FeatureRequest, SplitRequest, TrainRequest};
    use ndarray::array;
    use stockml_core::model::{Estimator, FittedModel, KnnRegressor, ModelVariant, TrainedModel};
    use stockml_core::{Column, Table};

    /// Trained on Open and Volume with a linear model.
    fn trained_state() -> PipelineState {
        let n = 40;
        let open: Vec<Option<f64>> = (0..n).map(|i| Some(100.0 + i as f64)).collect();
        let volume: Vec<Option<f64>> = (0..n).map(|i| Some(((i * 7) % 11) as f64 * 100.0)).collect();
        let close: Vec<Option<f64>> = open
            .iter()
            .zip(&volume)
            .map(|(o, v)| Some(2.0 * o.unwrap() + v.unwrap() / 200.0))
            .collect();
        let table = Table::new(vec![
            Column::numeric("Open", open),
            Column::numeric("Volume", volume),
            Column::numeric("Close", close),
        ])
        .unwrap();

        let mut state = PipelineState::new();
        steps::load_table(&mut state, table, "fixture").unwrap();
        steps::preprocess(&mut state).unwrap();
        let request = FeatureRequest {
            ma_window: None,
            target: "Close".into(),
            features: vec!["Open".into(), "Volume".into()],
            scale: false,
        };
        steps::engineer_features(&mut state, &request).unwrap();
        steps::split(&mut state, SplitRequest::default()).unwrap();
        steps::train(&mut state, TrainRequest::default()).unwrap();
        state
    }

    /// A regressor fitted on a single column, so it cannot score the
    /// two-column test set.
    fn one_column_knn() -> TrainedModel {
        let mut knn = KnnRegressor::new(1);
        knn.fit(&array![[0.0], [1.0], [2.0]], &array![0.0, 1.0, 2.0]).unwrap();
        TrainedModel {
            variant: ModelVariant::KnnRegressor,
            model: FittedModel::KnnRegressor(knn),
            features: vec!["Open".into()],
            target: "Close".into(),
            k: Some(1),
            n_train: 3,
        }
    }

    #[test]
    fn failing_model_is_reported_and_the_rest_are_scored() {
        let mut state = trained_state();
        state.models.insert(ModelVariant::KnnRegressor, one_column_knn());

        evaluate(&mut state).unwrap();

        assert!(state.flags().evaluated);
        assert_eq!(state.metrics().len(), 1);
        assert!(state.metrics().contains_key(&ModelVariant::LinearRegressor));
        assert_eq!(state.eval_failures().len(), 1);
        assert!(state.eval_failures().contains_key(&ModelVariant::KnnRegressor));
        assert!(!state.predictions().contains_key(&ModelVariant::KnnRegressor));
    }

    #[test]
    fn step_fails_when_no_model_can_be_scored() {
        let mut state = trained_state();
        state.models.clear();
        state.models.insert(ModelVariant::KnnRegressor, one_column_knn());

        let err = evaluate(&mut state).unwrap_err();

        assert!(matches!(err, StepError::Computation(_)));
        assert!(!state.flags().evaluated);
        assert!(state.metrics().is_empty());
        assert!(state.eval_failures().is_empty());
    }
}
