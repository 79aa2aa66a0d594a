use serde::{Deserialize, Serialize};
use tracing::info;

use stockml_core::features::design_matrix;
use stockml_core::split::{
    train_test_split, TestFraction, DEFAULT_SEED, DEFAULT_TEST_PERCENT, MAX_TEST_PERCENT,
    MIN_TEST_PERCENT,
};

use super::StepOutcome;
use crate::error::{StepError, ValidationError};
use crate::state::PipelineState;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRequest {
    pub test_percent: u32,
    pub seed: u64,
}

impl Default for SplitRequest {
    fn default() -> Self {
        Self {
            test_percent: DEFAULT_TEST_PERCENT,
            seed: DEFAULT_SEED,
        }
    }
}

/// Partition the feature table into train and test sets.
pub fn split(state: &mut PipelineState, request: SplitRequest) -> Result<StepOutcome, StepError> {
    state.ensure_ready(Step::Split)?;
    if !(MIN_TEST_PERCENT..=MAX_TEST_PERCENT).contains(&request.test_percent) {
        return Err(ValidationError::out_of_range(
            "test size %",
            request.test_percent,
            MIN_TEST_PERCENT,
            MAX_TEST_PERCENT,
        )
        .into());
    }
    let (Some(table), Some(selection)) = (state.featured.as_ref(), state.selection.as_ref())
    else {
        return Err(StepError::missing_upstream(Step::Split, Step::FeatureEngineer));
    };

    let data = design_matrix(table, selection)?;
    let dropped = table.n_rows() - data.n_samples();
    let fraction = TestFraction::from_percent(request.test_percent)?;
    let parts = train_test_split(&data, fraction, request.seed)?;

    let mut outcome = StepOutcome::new(Step::Split).notice(format!(
        "{} training rows, {} test rows (seed {})",
        parts.n_train(),
        parts.n_test(),
        request.seed
    ));
    if dropped > 0 {
        outcome = outcome.notice(format!("{dropped} incomplete rows skipped"));
    }
    info!(
        train = parts.n_train(),
        test = parts.n_test(),
        seed = request.seed,
        "split complete"
    );

    state.invalidate_after(Step::Split);
    state.split = Some(parts);
    state.flags.complete(Step::Split)?;
    Ok(outcome)
}
