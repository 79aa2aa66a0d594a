//! Feature engineering: moving average, feature/target selection,
//! standardization, correlation and the design matrix handed to models.

use std::ops::RangeInclusive;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::data::source::CLOSE;
use crate::table::{Column, ColumnKind, Table, TableError};

/// Accepted moving-average windows.
pub const MA_WINDOW_RANGE: RangeInclusive<usize> = 5..=50;
pub const DEFAULT_MA_WINDOW: usize = 20;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("moving-average window {window} outside {min}..={max}")]
    WindowOutOfRange {
        window: usize,
        min: usize,
        max: usize,
    },

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{name}' is {kind}, a numeric column is required")]
    NotNumeric { name: String, kind: &'static str },

    #[error("no features selected; pick at least one feature column")]
    NoFeatures,

    #[error("target column '{0}' cannot also be a feature")]
    TargetInFeatures(String),

    #[error("feature '{0}' selected more than once")]
    DuplicateFeature(String),

    #[error("column '{0}' has no observed values")]
    EmptyColumn(String),

    #[error("no rows with complete feature and target values")]
    NoCompleteRows,

    #[error("expected {expected} feature values, got {got}")]
    WidthMismatch { expected: usize, got: usize },

    #[error("correlation failed: {0}")]
    Correlation(String),

    #[error("matrix shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl FeatureError {
    /// Caller mistakes, as opposed to numeric failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FeatureError::WindowOutOfRange { .. }
                | FeatureError::MissingColumn(_)
                | FeatureError::NotNumeric { .. }
                | FeatureError::NoFeatures
                | FeatureError::TargetInFeatures(_)
                | FeatureError::DuplicateFeature(_)
                | FeatureError::WidthMismatch { .. }
        )
    }
}

pub fn moving_average_name(window: usize) -> String {
    format!("MA_{window}")
}

/// Trailing rolling mean. Rows before the window fills, and rows whose
/// window holds a gap, take the raw value instead.
pub fn moving_average_column(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return values[i];
            }
            let slice = &values[i + 1 - window..=i];
            let sum: Option<f64> = slice.iter().copied().sum();
            sum.map(|s| s / window as f64).or(values[i])
        })
        .collect()
}

/// Add (or replace) `MA_{window}` computed over Close. Returns the column name.
pub fn add_close_moving_average(table: &mut Table, window: usize) -> Result<String, FeatureError> {
    if !MA_WINDOW_RANGE.contains(&window) {
        return Err(FeatureError::WindowOutOfRange {
            window,
            min: *MA_WINDOW_RANGE.start(),
            max: *MA_WINDOW_RANGE.end(),
        });
    }
    let close = numeric_column(table, CLOSE)?;
    let name = moving_average_name(window);
    let ma = moving_average_column(close, window);
    table.upsert_column(Column::numeric(name.clone(), ma))?;
    debug!(column = name.as_str(), window, "moving average added");
    Ok(name)
}

fn numeric_column<'a>(table: &'a Table, name: &str) -> Result<&'a [Option<f64>], FeatureError> {
    match table.kind_of(name) {
        None => Err(FeatureError::MissingColumn(name.to_string())),
        Some(ColumnKind::Numeric) => Ok(table.numeric(name)?),
        Some(kind) => Err(FeatureError::NotNumeric {
            name: name.to_string(),
            kind: kind.label(),
        }),
    }
}

/// A validated target plus an ordered, disjoint set of feature columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSelection {
    target: String,
    features: Vec<String>,
}

impl FeatureSelection {
    pub fn new(table: &Table, target: &str, features: &[String]) -> Result<Self, FeatureError> {
        numeric_column(table, target)?;
        if features.is_empty() {
            return Err(FeatureError::NoFeatures);
        }
        for (i, f) in features.iter().enumerate() {
            if f == target {
                return Err(FeatureError::TargetInFeatures(f.clone()));
            }
            if features[..i].contains(f) {
                return Err(FeatureError::DuplicateFeature(f.clone()));
            }
            numeric_column(table, f)?;
        }
        Ok(Self {
            target: target.to_string(),
            features: features.to_vec(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Features followed by the target.
    pub fn all_columns(&self) -> Vec<String> {
        let mut cols = self.features.clone();
        cols.push(self.target.clone());
        cols
    }
}

/// Per-feature centring and scaling fitted on one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    features: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    /// Fit mean and population standard deviation per column. A column with
    /// zero variance gets scale 1 and is only centred.
    pub fn fit(table: &Table, features: &[String]) -> Result<Self, FeatureError> {
        let mut means = Vec::with_capacity(features.len());
        let mut scales = Vec::with_capacity(features.len());
        for name in features {
            let observed: Vec<f64> = numeric_column(table, name)?.iter().flatten().copied().collect();
            if observed.is_empty() {
                return Err(FeatureError::EmptyColumn(name.clone()));
            }
            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let var = observed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            means.push(mean);
            scales.push(if std > f64::EPSILON { std } else { 1.0 });
        }
        Ok(Self {
            features: features.to_vec(),
            means,
            scales,
        })
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Replace each fitted column in `table` with its standardized values.
    pub fn transform_table(&self, table: &mut Table) -> Result<(), FeatureError> {
        for (i, name) in self.features.iter().enumerate() {
            let (mean, scale) = (self.means[i], self.scales[i]);
            let values = table.numeric_mut(name)?;
            for v in values.iter_mut().flatten() {
                *v = (*v - mean) / scale;
            }
        }
        Ok(())
    }

    /// Standardize one row of raw feature values, in fitted order.
    pub fn transform_row(&self, raw: &[f64]) -> Result<Vec<f64>, FeatureError> {
        if raw.len() != self.features.len() {
            return Err(FeatureError::WidthMismatch {
                expected: self.features.len(),
                got: raw.len(),
            });
        }
        Ok(raw
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    /// Map a standardized row back to raw units.
    pub fn inverse_row(&self, scaled: &[f64]) -> Result<Vec<f64>, FeatureError> {
        if scaled.len() != self.features.len() {
            return Err(FeatureError::WidthMismatch {
                expected: self.features.len(),
                got: scaled.len(),
            });
        }
        Ok(scaled
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(z, (m, s))| z * s + m)
            .collect())
    }
}

/// Symmetric Pearson correlation matrix. Cells are `None` where a pair has
/// fewer than two complete rows or either side has zero variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// Correlation of every other column with `target`, strongest first.
    pub fn ranked_against(&self, target: &str) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .columns
            .iter()
            .filter(|c| c.as_str() != target)
            .filter_map(|c| self.get(c, target).map(|r| (c.clone(), r)))
            .collect();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked
    }
}

/// Pairwise-complete Pearson correlation over the named numeric columns.
pub fn correlation_matrix(
    table: &Table,
    columns: &[String],
) -> Result<CorrelationMatrix, FeatureError> {
    if table.n_rows() < 2 {
        return Err(FeatureError::Correlation(format!(
            "need at least 2 rows, table has {}",
            table.n_rows()
        )));
    }
    let data: Vec<&[Option<f64>]> = columns
        .iter()
        .map(|c| numeric_column(table, c))
        .collect::<Result<_, _>>()?;

    let k = columns.len();
    let mut values = vec![vec![None; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = pearson(data[i], data[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    (denom > f64::EPSILON).then(|| (sxy / denom).clamp(-1.0, 1.0))
}

/// Features and target as dense arrays, restricted to complete rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Table row each matrix row came from.
    pub row_index: Vec<usize>,
    pub feature_names: Vec<String>,
    pub target: String,
}

impl DesignMatrix {
    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Build the design matrix, skipping rows with any missing value in the
/// selected columns.
pub fn design_matrix(
    table: &Table,
    selection: &FeatureSelection,
) -> Result<DesignMatrix, FeatureError> {
    let features: Vec<&[Option<f64>]> = selection
        .features()
        .iter()
        .map(|f| numeric_column(table, f))
        .collect::<Result<_, _>>()?;
    let target = numeric_column(table, selection.target())?;

    let mut row_index = Vec::with_capacity(table.n_rows());
    let mut flat = Vec::with_capacity(table.n_rows() * features.len());
    let mut y = Vec::with_capacity(table.n_rows());
    'rows: for row in 0..table.n_rows() {
        let Some(t) = target[row] else { continue };
        let start = flat.len();
        for col in &features {
            match col[row] {
                Some(v) => flat.push(v),
                None => {
                    flat.truncate(start);
                    continue 'rows;
                }
            }
        }
        y.push(t);
        row_index.push(row);
    }
    if row_index.is_empty() {
        return Err(FeatureError::NoCompleteRows);
    }

    let x = Array2::from_shape_vec((row_index.len(), features.len()), flat)
        .map_err(|e| FeatureError::Shape(e.to_string()))?;
    Ok(DesignMatrix {
        x,
        y: Array1::from_vec(y),
        row_index,
        feature_names: selection.features().to_vec(),
        target: selection.target().to_string(),
    })
}
