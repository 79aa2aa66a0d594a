//! Pipeline state: completion flags plus every intermediate artifact.
//!
//! Handlers in `steps` are the only writers. Readers get borrowed views
//! through the getters below.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use stockml_core::features::{CorrelationMatrix, FeatureSelection, Standardizer};
use stockml_core::metrics::RegressionMetrics;
use stockml_core::model::{ModelVariant, TrainedModel};
use stockml_core::preprocess::ImputationReport;
use stockml_core::split::TrainTestSplit;
use stockml_core::Table;

use crate::error::ValidationError;
use crate::step::Step;
use crate::steps::visualize::Visualization;

/// One completion flag per step after Welcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFlags {
    pub loaded: bool,
    pub preprocessed: bool,
    pub features_engineered: bool,
    pub split: bool,
    pub trained: bool,
    pub evaluated: bool,
    pub visualized: bool,
}

impl StepFlags {
    /// Welcome is always complete.
    pub fn is_complete(&self, step: Step) -> bool {
        match step {
            Step::Welcome => true,
            Step::Load => self.loaded,
            Step::Preprocess => self.preprocessed,
            Step::FeatureEngineer => self.features_engineered,
            Step::Split => self.split,
            Step::Train => self.trained,
            Step::Evaluate => self.evaluated,
            Step::Visualize => self.visualized,
        }
    }

    fn slot(&mut self, step: Step) -> Option<&mut bool> {
        match step {
            Step::Welcome => None,
            Step::Load => Some(&mut self.loaded),
            Step::Preprocess => Some(&mut self.preprocessed),
            Step::FeatureEngineer => Some(&mut self.features_engineered),
            Step::Split => Some(&mut self.split),
            Step::Train => Some(&mut self.trained),
            Step::Evaluate => Some(&mut self.evaluated),
            Step::Visualize => Some(&mut self.visualized),
        }
    }

    /// Mark `step` complete. Every earlier flag must already be set; every
    /// later flag is cleared.
    pub fn complete(&mut self, step: Step) -> Result<(), ValidationError> {
        if let Some(missing) = Step::ALL[..step.index()]
            .iter()
            .find(|s| !self.is_complete(**s))
        {
            return Err(ValidationError::MissingUpstream {
                step,
                required: *missing,
            });
        }
        if let Some(flag) = self.slot(step) {
            *flag = true;
        }
        self.clear_after(step);
        Ok(())
    }

    /// Clear the flags of every step after `step`.
    pub fn clear_after(&mut self, step: Step) {
        for later in step.downstream() {
            if let Some(flag) = self.slot(later) {
                *flag = false;
            }
        }
    }

    pub fn completed(&self) -> Vec<Step> {
        Step::ALL
            .into_iter()
            .skip(1)
            .filter(|s| self.is_complete(*s))
            .collect()
    }
}

/// Where the loaded table came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataOrigin {
    Upload { file: String },
    Remote { symbol: String, provider: String },
    Provided { label: String },
}

impl DataOrigin {
    pub fn describe(&self) -> String {
        match self {
            DataOrigin::Upload { file } => format!("upload {file}"),
            DataOrigin::Remote { symbol, provider } => format!("{symbol} via {provider}"),
            DataOrigin::Provided { label } => label.clone(),
        }
    }
}

/// Everything one wizard run has produced so far.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    pub(crate) current: Step,
    pub(crate) flags: StepFlags,

    pub(crate) raw: Option<Table>,
    pub(crate) origin: Option<DataOrigin>,
    pub(crate) dataset_hash: Option<String>,
    pub(crate) symbol: Option<String>,
    pub(crate) current_price: Option<f64>,

    pub(crate) processed: Option<Table>,
    pub(crate) imputation: Option<ImputationReport>,

    pub(crate) featured: Option<Table>,
    pub(crate) selection: Option<FeatureSelection>,
    pub(crate) ma_column: Option<String>,
    pub(crate) scaler: Option<Standardizer>,
    pub(crate) correlation: Option<CorrelationMatrix>,

    pub(crate) split: Option<TrainTestSplit>,

    pub(crate) models: BTreeMap<ModelVariant, TrainedModel>,

    pub(crate) predictions: BTreeMap<ModelVariant, Array1<f64>>,
    pub(crate) metrics: BTreeMap<ModelVariant, RegressionMetrics>,
    pub(crate) eval_failures: BTreeMap<ModelVariant, String>,

    pub(crate) visualization: Option<Visualization>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to Welcome with every flag and artifact cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_step(&self) -> Step {
        self.current
    }

    pub(crate) fn set_current(&mut self, step: Step) {
        self.current = step;
    }

    pub fn flags(&self) -> &StepFlags {
        &self.flags
    }

    pub fn is_complete(&self, step: Step) -> bool {
        self.flags.is_complete(step)
    }

    /// Refuse to run `step` unless its upstream flag is set.
    pub fn ensure_ready(&self, step: Step) -> Result<(), ValidationError> {
        match step.requires() {
            Some(required) if !self.flags.is_complete(required) => {
                Err(ValidationError::MissingUpstream { step, required })
            }
            _ => Ok(()),
        }
    }

    /// Drop the artifacts and flags of every step after `step`.
    pub(crate) fn invalidate_after(&mut self, step: Step) {
        for later in step.downstream() {
            self.clear_artifacts(later);
        }
        self.flags.clear_after(step);
    }

    fn clear_artifacts(&mut self, step: Step) {
        match step {
            Step::Welcome => {}
            Step::Load => {
                self.raw = None;
                self.origin = None;
                self.dataset_hash = None;
                self.symbol = None;
                self.current_price = None;
            }
            Step::Preprocess => {
                self.processed = None;
                self.imputation = None;
            }
            Step::FeatureEngineer => {
                self.featured = None;
                self.selection = None;
                self.ma_column = None;
                self.scaler = None;
                self.correlation = None;
            }
            Step::Split => self.split = None,
            Step::Train => self.models.clear(),
            Step::Evaluate => {
                self.predictions.clear();
                self.metrics.clear();
                self.eval_failures.clear();
            }
            Step::Visualize => self.visualization = None,
        }
    }

    pub fn raw(&self) -> Option<&Table> {
        self.raw.as_ref()
    }

    pub fn origin(&self) -> Option<&DataOrigin> {
        self.origin.as_ref()
    }

    pub fn dataset_hash(&self) -> Option<&str> {
        self.dataset_hash.as_deref()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    pub fn processed(&self) -> Option<&Table> {
        self.processed.as_ref()
    }

    pub fn imputation(&self) -> Option<&ImputationReport> {
        self.imputation.as_ref()
    }

    pub fn featured(&self) -> Option<&Table> {
        self.featured.as_ref()
    }

    pub fn selection(&self) -> Option<&FeatureSelection> {
        self.selection.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.target())
    }

    pub fn features(&self) -> &[String] {
        self.selection.as_ref().map(|s| s.features()).unwrap_or(&[])
    }

    pub fn ma_column(&self) -> Option<&str> {
        self.ma_column.as_deref()
    }

    pub fn scaler(&self) -> Option<&Standardizer> {
        self.scaler.as_ref()
    }

    pub fn correlation(&self) -> Option<&CorrelationMatrix> {
        self.correlation.as_ref()
    }

    pub fn split(&self) -> Option<&TrainTestSplit> {
        self.split.as_ref()
    }

    pub fn models(&self) -> &BTreeMap<ModelVariant, TrainedModel> {
        &self.models
    }

    pub fn predictions(&self) -> &BTreeMap<ModelVariant, Array1<f64>> {
        &self.predictions
    }

    pub fn metrics(&self) -> &BTreeMap<ModelVariant, RegressionMetrics> {
        &self.metrics
    }

    pub fn eval_failures(&self) -> &BTreeMap<ModelVariant, String> {
        &self.eval_failures
    }

    pub fn visualization(&self) -> Option<&Visualization> {
        self.visualization.as_ref()
    }

    /// Numeric columns of the newest table, for feature/target pickers.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.featured
            .as_ref()
            .or(self.processed.as_ref())
            .or(self.raw.as_ref())
            .map(Table::numeric_column_names)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_require_prior_steps() {
        let mut flags = StepFlags::default();
        assert_eq!(
            flags.complete(Step::Preprocess),
            Err(ValidationError::MissingUpstream {
                step: Step::Preprocess,
                required: Step::Load
            })
        );
        flags.complete(Step::Load).unwrap();
        flags.complete(Step::Preprocess).unwrap();
        assert_eq!(flags.completed(), vec![Step::Load, Step::Preprocess]);
    }

    #[test]
    fn completing_a_step_clears_later_flags() {
        let mut flags = StepFlags::default();
        for step in [Step::Load, Step::Preprocess, Step::FeatureEngineer, Step::Split] {
            flags.complete(step).unwrap();
        }
        flags.complete(Step::Preprocess).unwrap();
        assert!(flags.preprocessed);
        assert!(!flags.features_engineered);
        assert!(!flags.split);
    }

    #[test]
    fn ensure_ready_checks_upstream_only() {
        let state = PipelineState::new();
        assert!(state.ensure_ready(Step::Load).is_ok());
        assert!(state.ensure_ready(Step::Welcome).is_ok());
        assert!(state.ensure_ready(Step::Train).is_err());
    }
}
