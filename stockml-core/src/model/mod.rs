//! Supervised models behind one `Estimator` trait, plus the rules that map a
//! model selector and a target column onto a concrete variant.

pub mod knn;
pub mod linear;
pub mod logistic;

use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::split::TrainTestSplit;

pub use knn::{KnnClassifier, KnnRegressor, DEFAULT_K, MAX_K};
pub use linear::LinearRegression;
pub use logistic::LogisticRegression;

/// A target with more distinct values than this is continuous.
pub const CONTINUITY_THRESHOLD: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("{model} needs a {expected} target, but '{target}' is {found}")]
    TargetTypeMismatch {
        model: ModelKind,
        target: String,
        expected: TargetKind,
        found: TargetKind,
    },

    #[error("k = {k} outside 1..={max}")]
    InvalidK { k: usize, max: usize },

    #[error("k = {k} exceeds the {n} training rows")]
    KExceedsSamples { k: usize, n: usize },

    #[error("normal equations are singular; features may be collinear or constant")]
    SingularMatrix,

    #[error("need at least {needed} training rows, got {got}")]
    TooFewSamples { needed: usize, got: usize },

    #[error("training target holds a single class")]
    SingleClass,

    #[error("expected {expected} columns, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-finite value in model input")]
    NonFinite,

    #[error("model has not been fitted")]
    NotFitted,
}

impl ModelError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ModelError::TargetTypeMismatch { .. }
                | ModelError::InvalidK { .. }
                | ModelError::DimensionMismatch { .. }
        )
    }
}

/// What the user picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    LogisticRegression,
    #[serde(alias = "knn")]
    KNearestNeighbors,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LinearRegression,
        ModelKind::LogisticRegression,
        ModelKind::KNearestNeighbors,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::KNearestNeighbors => "K-Nearest Neighbors",
        }
    }

    pub fn uses_k(self) -> bool {
        self == ModelKind::KNearestNeighbors
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What actually gets fitted. Ordered so model maps iterate stably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    LinearRegressor,
    LogisticClassifier,
    KnnRegressor,
    KnnClassifier,
}

impl ModelVariant {
    pub fn label(self) -> &'static str {
        match self {
            ModelVariant::LinearRegressor => "Linear Regression",
            ModelVariant::LogisticClassifier => "Logistic Regression",
            ModelVariant::KnnRegressor => "KNN Regressor",
            ModelVariant::KnnClassifier => "KNN Classifier",
        }
    }

    pub fn kind(self) -> ModelKind {
        match self {
            ModelVariant::LinearRegressor => ModelKind::LinearRegression,
            ModelVariant::LogisticClassifier => ModelKind::LogisticRegression,
            ModelVariant::KnnRegressor | ModelVariant::KnnClassifier => {
                ModelKind::KNearestNeighbors
            }
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Continuous,
    Discrete,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetKind::Continuous => "continuous",
            TargetKind::Discrete => "discrete",
        })
    }
}

impl TargetKind {
    pub fn of(values: &[f64]) -> Self {
        if is_continuous(values) {
            TargetKind::Continuous
        } else {
            TargetKind::Discrete
        }
    }
}

/// More than `CONTINUITY_THRESHOLD` distinct values.
pub fn is_continuous(values: &[f64]) -> bool {
    distinct_sorted(values.iter().copied()).len() > CONTINUITY_THRESHOLD
}

/// Sorted distinct values; `-0.0` and `0.0` count as one.
pub(crate) fn distinct_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut v: Vec<f64> = values.map(|x| if x == 0.0 { 0.0 } else { x }).collect();
    v.sort_by(f64::total_cmp);
    v.dedup_by(|a, b| a.to_bits() == b.to_bits());
    v
}

/// Uniform fit/predict surface shared by every model.
pub trait Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;
    /// Width of the fitted feature matrix, `None` before fitting.
    fn n_features(&self) -> Option<usize>;
}

pub(crate) fn check_fit_input(
    x: &Array2<f64>,
    y: &Array1<f64>,
    min_rows: usize,
) -> Result<(), ModelError> {
    if x.nrows() != y.len() {
        return Err(ModelError::DimensionMismatch {
            expected: x.nrows(),
            got: y.len(),
        });
    }
    if x.nrows() < min_rows.max(1) {
        return Err(ModelError::TooFewSamples {
            needed: min_rows.max(1),
            got: x.nrows(),
        });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite);
    }
    Ok(())
}

pub(crate) fn check_predict_input(x: &Array2<f64>, width: usize) -> Result<(), ModelError> {
    if x.ncols() != width {
        return Err(ModelError::DimensionMismatch {
            expected: width,
            got: x.ncols(),
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite);
    }
    Ok(())
}

/// One fitted model of any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum FittedModel {
    Linear(LinearRegression),
    Logistic(LogisticRegression),
    KnnRegressor(KnnRegressor),
    KnnClassifier(KnnClassifier),
}

impl FittedModel {
    fn estimator(&self) -> &dyn Estimator {
        match self {
            FittedModel::Linear(m) => m,
            FittedModel::Logistic(m) => m,
            FittedModel::KnnRegressor(m) => m,
            FittedModel::KnnClassifier(m) => m,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        self.estimator().predict(x)
    }
}

/// A coefficient table: intercept first, then one row per feature. One
/// value column for regression and binary classification, one per class for
/// one-vs-rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientTable {
    pub value_columns: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

/// A fitted model plus the exact columns it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub variant: ModelVariant,
    pub model: FittedModel,
    pub features: Vec<String>,
    pub target: String,
    pub k: Option<usize>,
    pub n_train: usize,
}

impl TrainedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        self.model.predict(x)
    }

    /// Predict one row given in feature order.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64, ModelError> {
        let x = Array2::from_shape_vec((1, row.len()), row.to_vec()).map_err(|_| {
            ModelError::DimensionMismatch {
                expected: self.features.len(),
                got: row.len(),
            }
        })?;
        self.predict(&x)?
            .first()
            .copied()
            .ok_or(ModelError::NotFitted)
    }

    pub fn coefficient_table(&self) -> Option<CoefficientTable> {
        match &self.model {
            FittedModel::Linear(m) => {
                let coef = m.coefficients()?;
                let mut rows = vec![("Intercept".to_string(), vec![m.intercept()?])];
                rows.extend(
                    self.features
                        .iter()
                        .zip(coef.iter())
                        .map(|(f, c)| (f.clone(), vec![*c])),
                );
                Some(CoefficientTable {
                    value_columns: vec!["Coefficient".into()],
                    rows,
                })
            }
            FittedModel::Logistic(m) => {
                let coef = m.coefficients()?;
                let intercepts = m.intercepts()?;
                let value_columns = if coef.nrows() == 1 {
                    vec!["Coefficient".to_string()]
                } else {
                    m.classes().iter().map(|c| format!("class {c}")).collect()
                };
                let mut rows = vec![("Intercept".to_string(), intercepts.to_vec())];
                rows.extend(
                    self.features
                        .iter()
                        .enumerate()
                        .map(|(j, f)| (f.clone(), coef.column(j).to_vec())),
                );
                Some(CoefficientTable {
                    value_columns,
                    rows,
                })
            }
            FittedModel::KnnRegressor(_) | FittedModel::KnnClassifier(_) => None,
        }
    }

    /// |coefficient| per feature, largest first. For one-vs-rest the
    /// magnitudes are averaged across classes. `None` for KNN.
    pub fn feature_importance(&self) -> Option<Vec<(String, f64)>> {
        let table = self.coefficient_table()?;
        let mut importance: Vec<(String, f64)> = table
            .rows
            .into_iter()
            .skip(1)
            .map(|(name, values)| {
                let n = values.len().max(1) as f64;
                let mag = values.iter().map(|v| v.abs()).sum::<f64>() / n;
                (name, mag)
            })
            .collect();
        importance.sort_by(|a, b| b.1.total_cmp(&a.1));
        Some(importance)
    }
}

/// Pick the concrete variant for a selector and a target kind.
pub fn resolve_variant(
    kind: ModelKind,
    target: &str,
    target_kind: TargetKind,
) -> Result<ModelVariant, ModelError> {
    let mismatch = |expected| ModelError::TargetTypeMismatch {
        model: kind,
        target: target.to_string(),
        expected,
        found: target_kind,
    };
    match (kind, target_kind) {
        (ModelKind::LinearRegression, TargetKind::Continuous) => Ok(ModelVariant::LinearRegressor),
        (ModelKind::LinearRegression, TargetKind::Discrete) => {
            Err(mismatch(TargetKind::Continuous))
        }
        (ModelKind::LogisticRegression, TargetKind::Discrete) => {
            Ok(ModelVariant::LogisticClassifier)
        }
        (ModelKind::LogisticRegression, TargetKind::Continuous) => {
            Err(mismatch(TargetKind::Discrete))
        }
        (ModelKind::KNearestNeighbors, TargetKind::Continuous) => Ok(ModelVariant::KnnRegressor),
        (ModelKind::KNearestNeighbors, TargetKind::Discrete) => Ok(ModelVariant::KnnClassifier),
    }
}

/// Fit the selected model on the training side of a split. The target kind
/// is judged on the training targets.
pub fn fit_model(
    kind: ModelKind,
    k: usize,
    split: &TrainTestSplit,
) -> Result<TrainedModel, ModelError> {
    let y_train: Vec<f64> = split.y_train.to_vec();
    let target_kind = TargetKind::of(&y_train);
    let variant = resolve_variant(kind, &split.target, target_kind)?;

    let model = match variant {
        ModelVariant::LinearRegressor => {
            let mut m = LinearRegression::new();
            m.fit(&split.x_train, &split.y_train)?;
            FittedModel::Linear(m)
        }
        ModelVariant::LogisticClassifier => {
            let mut m = LogisticRegression::default();
            m.fit(&split.x_train, &split.y_train)?;
            FittedModel::Logistic(m)
        }
        ModelVariant::KnnRegressor => {
            let mut m = KnnRegressor::new(k);
            m.fit(&split.x_train, &split.y_train)?;
            FittedModel::KnnRegressor(m)
        }
        ModelVariant::KnnClassifier => {
            let mut m = KnnClassifier::new(k);
            m.fit(&split.x_train, &split.y_train)?;
            FittedModel::KnnClassifier(m)
        }
    };

    info!(
        variant = %variant,
        target = split.target.as_str(),
        features = split.feature_names.len(),
        rows = split.n_train(),
        "model fitted"
    );
    Ok(TrainedModel {
        variant,
        model,
        features: split.feature_names.clone(),
        target: split.target.clone(),
        k: kind.uses_k().then_some(k),
        n_train: split.n_train(),
    })
}
