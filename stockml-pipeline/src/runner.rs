//! Headless end-to-end run: every step in order with configured inputs.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use stockml_core::data::RemoteSource;
use stockml_core::model::ModelKind;
use stockml_core::Table;

use crate::config::PipelineConfig;
use crate::error::StepError;
use crate::state::PipelineState;
use crate::step::Step;
use crate::steps::{self, StepOutcome, TrainRequest};

#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct RunError {
    pub step: Step,
    #[source]
    pub source: StepError,
}

fn at(step: Step) -> impl FnOnce(StepError) -> RunError {
    move |source| RunError { step, source }
}

/// Where the run gets its data.
pub enum DataInput {
    Remote(RemoteSource),
    Upload(PathBuf),
    Table { table: Table, label: String },
}

pub struct RunPlan {
    pub input: DataInput,
    /// Model selectors to train, in order. Empty means the configured one.
    pub models: Vec<ModelKind>,
    /// Build the result views after evaluation.
    pub visualize: bool,
}

#[derive(Debug)]
pub struct RunOutput {
    pub state: PipelineState,
    pub outcomes: Vec<StepOutcome>,
}

/// Run Load through Evaluate (and optionally Visualize). A selector that
/// does not fit the target is skipped with a notice; the run fails only if
/// no model could be trained.
pub fn run_plan(config: &PipelineConfig, plan: RunPlan) -> Result<RunOutput, RunError> {
    let mut state = PipelineState::new();
    let mut outcomes = Vec::new();

    let loaded = match &plan.input {
        DataInput::Remote(source) => {
            let request = config.fetch_request().map_err(|e| at(Step::Load)(e.into()))?;
            steps::load_remote(&mut state, source, &request)
        }
        DataInput::Upload(path) => steps::load_upload(&mut state, path),
        DataInput::Table { table, label } => steps::load_table(&mut state, table.clone(), label),
    };
    outcomes.push(loaded.map_err(at(Step::Load))?);
    outcomes.push(steps::preprocess(&mut state).map_err(at(Step::Preprocess))?);

    let request = config.feature_request(&state.numeric_columns());
    outcomes.push(steps::engineer_features(&mut state, &request).map_err(at(Step::FeatureEngineer))?);
    outcomes.push(steps::split(&mut state, config.split_request()).map_err(at(Step::Split))?);

    let kinds = if plan.models.is_empty() {
        vec![config.model.kind]
    } else {
        plan.models.clone()
    };
    let mut last_failure = None;
    for kind in kinds {
        let request = TrainRequest {
            kind,
            k: config.model.k,
        };
        match steps::train(&mut state, request) {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) if e.is_validation() => {
                warn!(model = %kind, error = %e, "model skipped");
                outcomes.push(StepOutcome::new(Step::Train).notice(format!("{kind} skipped: {e}")));
                last_failure = Some(e);
            }
            Err(e) => return Err(at(Step::Train)(e)),
        }
    }
    if state.models().is_empty() {
        let source = last_failure.unwrap_or_else(|| StepError::missing_upstream(Step::Evaluate, Step::Train));
        return Err(at(Step::Train)(source));
    }

    outcomes.push(steps::evaluate(&mut state).map_err(at(Step::Evaluate))?);
    if plan.visualize {
        outcomes.push(steps::visualize(&mut state).map_err(at(Step::Visualize))?);
    }
    info!(
        models = state.models().len(),
        steps = state.flags().completed().len(),
        "run complete"
    );
    Ok(RunOutput { state, outcomes })
}
