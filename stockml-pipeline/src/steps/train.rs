use serde::{Deserialize, Serialize};
use tracing::info;

use stockml_core::model::{fit_model, ModelKind, DEFAULT_K, MAX_K};

use super::StepOutcome;
use crate::error::{StepError, ValidationError};
use crate::state::PipelineState;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub kind: ModelKind,
    /// Neighbour count, used by KNN only.
    pub k: usize,
}

impl Default for TrainRequest {
    fn default() -> Self {
        Self {
            kind: ModelKind::LinearRegression,
            k: DEFAULT_K,
        }
    }
}

/// Fit the selected model. The fitted model replaces any earlier model of
/// the same variant; models of other variants are kept for comparison.
pub fn train(state: &mut PipelineState, request: TrainRequest) -> Result<StepOutcome, StepError> {
    state.ensure_ready(Step::Train)?;
    if request.kind.uses_k() && !(1..=MAX_K).contains(&request.k) {
        return Err(ValidationError::out_of_range("k", request.k, 1, MAX_K).into());
    }
    let Some(parts) = state.split.as_ref() else {
        return Err(StepError::missing_upstream(Step::Train, Step::Split));
    };

    let model = fit_model(request.kind, request.k, parts)?;
    let variant = model.variant;
    let mut outcome = StepOutcome::new(Step::Train).notice(format!(
        "{} trained on {} rows",
        variant, model.n_train
    ));
    if let Some(table) = model.coefficient_table() {
        for (term, values) in table.rows.iter().take(6) {
            let shown: Vec<String> = values.iter().map(|v| format!("{v:.4}")).collect();
            outcome = outcome.notice(format!("{term}: {}", shown.join(", ")));
        }
    }
    info!(variant = %variant, "training complete");

    state.invalidate_after(Step::Train);
    let replaced = state.models.insert(variant, model).is_some();
    if replaced {
        outcome = outcome.notice(format!("Replaced previous {variant}"));
    }
    state.flags.complete(Step::Train)?;
    Ok(outcome)
}
