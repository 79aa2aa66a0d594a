use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockml_core::features::{
    add_close_moving_average, correlation_matrix, FeatureSelection, Standardizer,
    DEFAULT_MA_WINDOW,
};

use super::StepOutcome;
use crate::error::{StepError, ValidationError};
use crate::state::PipelineState;
use crate::step::Step;

/// User choices for the feature step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequest {
    /// Add `MA_{w}` over Close when set.
    pub ma_window: Option<usize>,
    pub target: String,
    pub features: Vec<String>,
    /// Standardize the feature columns.
    pub scale: bool,
}

impl Default for FeatureRequest {
    fn default() -> Self {
        Self {
            ma_window: Some(DEFAULT_MA_WINDOW),
            target: "Close".into(),
            features: Vec::new(),
            scale: true,
        }
    }
}

/// Derive the moving average, validate the selection, compute correlations
/// and optionally standardize the features.
pub fn engineer_features(
    state: &mut PipelineState,
    request: &FeatureRequest,
) -> Result<StepOutcome, StepError> {
    state.ensure_ready(Step::FeatureEngineer)?;
    if request.features.is_empty() {
        return Err(ValidationError::NoFeatures.into());
    }
    let Some(processed) = state.processed.as_ref() else {
        return Err(StepError::missing_upstream(Step::FeatureEngineer, Step::Preprocess));
    };

    let mut table = processed.clone();
    let ma_column = match request.ma_window {
        Some(w) => Some(add_close_moving_average(&mut table, w)?),
        None => None,
    };

    let selection = FeatureSelection::new(&table, &request.target, &request.features)?;
    let correlation = correlation_matrix(&table, &selection.all_columns())?;

    let scaler = if request.scale {
        let scaler = Standardizer::fit(&table, selection.features())?;
        scaler.transform_table(&mut table)?;
        Some(scaler)
    } else {
        None
    };

    let mut outcome = StepOutcome::new(Step::FeatureEngineer).notice(format!(
        "Target {} with {} feature(s): {}",
        selection.target(),
        selection.features().len(),
        selection.features().join(", ")
    ));
    if let Some(name) = &ma_column {
        outcome = outcome.notice(format!("Added {name}"));
    }
    if scaler.is_some() {
        outcome = outcome.notice("Features standardized");
    }
    for (name, r) in correlation.ranked_against(selection.target()).iter().take(3) {
        debug!(feature = name.as_str(), r, "correlation with target");
        outcome = outcome.notice(format!("corr({name}, {}) = {r:.3}", selection.target()));
    }
    info!(
        target = selection.target(),
        features = selection.features().len(),
        scaled = scaler.is_some(),
        "features engineered"
    );

    state.invalidate_after(Step::FeatureEngineer);
    state.featured = Some(table);
    state.selection = Some(selection);
    state.ma_column = ma_column;
    state.scaler = scaler;
    state.correlation = Some(correlation);
    state.flags.complete(Step::FeatureEngineer)?;
    Ok(outcome)
}
