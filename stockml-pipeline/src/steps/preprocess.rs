use tracing::info;

use stockml_core::preprocess::impute_missing_with_mean;

use super::StepOutcome;
use crate::error::StepError;
use crate::state::PipelineState;
use crate::step::Step;

/// Mean-impute the raw table into the processed table.
pub fn preprocess(state: &mut PipelineState) -> Result<StepOutcome, StepError> {
    state.ensure_ready(Step::Preprocess)?;
    let Some(raw) = state.raw.as_ref() else {
        return Err(StepError::missing_upstream(Step::Preprocess, Step::Load));
    };

    let mut processed = raw.clone();
    let report = impute_missing_with_mean(&mut processed);

    let mut outcome = StepOutcome::new(Step::Preprocess);
    if report.is_clean() {
        outcome = outcome.notice("No missing numeric values");
    }
    for col in &report.columns {
        outcome = outcome.notice(match col.fill_value {
            Some(v) => format!("{}: filled {} cells with mean {v:.4}", col.name, col.missing),
            None => format!("{}: {} cells left missing (no observed values)", col.name, col.missing),
        });
    }
    info!(
        columns = report.columns.len(),
        filled = report.total_filled(),
        "preprocess complete"
    );

    state.invalidate_after(Step::Preprocess);
    state.processed = Some(processed);
    state.imputation = Some(report);
    state.flags.complete(Step::Preprocess)?;
    Ok(outcome)
}
