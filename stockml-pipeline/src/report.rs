//! JSON run report: what was loaded, how it was prepared, and how each
//! model scored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockml_core::metrics::RegressionMetrics;
use stockml_core::model::{CoefficientTable, ModelVariant};

use crate::state::PipelineState;
use crate::step::Step;
use crate::steps::visualize::NextDayForecast;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported report schema version {found} (max supported: {max})")]
    Schema { found: u32, max: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub variant: ModelVariant,
    pub k: Option<usize>,
    pub n_train: usize,
    pub metrics: Option<RegressionMetrics>,
    pub coefficients: Option<CoefficientTable>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub completed: Vec<Step>,
    pub origin: Option<String>,
    pub dataset_hash: Option<String>,
    pub rows: Option<usize>,
    pub imputed_cells: usize,
    pub target: Option<String>,
    pub features: Vec<String>,
    pub scaled: bool,
    pub n_train: Option<usize>,
    pub n_test: Option<usize>,
    pub seed: Option<u64>,
    pub models: Vec<ModelReport>,
    pub forecast: Option<NextDayForecast>,
}

impl RunReport {
    pub fn from_state(state: &PipelineState) -> Self {
        let models = state
            .models()
            .iter()
            .map(|(variant, model)| ModelReport {
                variant: *variant,
                k: model.k,
                n_train: model.n_train,
                metrics: state.metrics().get(variant).cloned(),
                coefficients: model.coefficient_table(),
                error: state.eval_failures().get(variant).cloned(),
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION,
            completed: state.flags().completed(),
            origin: state.origin().map(|o| o.describe()),
            dataset_hash: state.dataset_hash().map(str::to_string),
            rows: state.raw().map(|t| t.n_rows()),
            imputed_cells: state.imputation().map(|r| r.total_filled()).unwrap_or(0),
            target: state.target().map(str::to_string),
            features: state.features().to_vec(),
            scaled: state.scaler().is_some(),
            n_train: state.split().map(|s| s.n_train()),
            n_test: state.split().map(|s| s.n_test()),
            seed: state.split().map(|s| s.seed),
            models,
            forecast: state.visualization().and_then(|v| v.forecast.clone()),
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        let report: Self = serde_json::from_str(json)?;
        if report.schema_version > SCHEMA_VERSION {
            return Err(ReportError::Schema {
                found: report.schema_version,
                max: SCHEMA_VERSION,
            });
        }
        Ok(report)
    }
}
