//! Mean imputation for numeric columns.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table::{ColumnData, Table};

/// One numeric column that had gaps before imputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedColumn {
    pub name: String,
    pub missing: usize,
    /// `None` when the column had no observed values to average.
    pub fill_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub columns: Vec<ImputedColumn>,
}

impl ImputationReport {
    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.missing).sum()
    }

    pub fn total_filled(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.fill_value.is_some())
            .map(|c| c.missing)
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Replace every missing numeric cell with the mean of the observed cells in
/// its column. Observed values are untouched; non-numeric columns are
/// skipped. An all-missing column is left as is.
pub fn impute_missing_with_mean(table: &mut Table) -> ImputationReport {
    let mut report = ImputationReport::default();
    for name in table.numeric_column_names() {
        let Ok(values) = table.numeric_mut(&name) else {
            continue;
        };
        let missing = values.iter().filter(|v| v.is_none()).count();
        if missing == 0 {
            continue;
        }
        let fill_value = mean_observed(values);
        if let Some(mean) = fill_value {
            for cell in values.iter_mut().filter(|v| v.is_none()) {
                *cell = Some(mean);
            }
        }
        debug!(column = name.as_str(), missing, ?fill_value, "imputed");
        report.columns.push(ImputedColumn {
            name,
            missing,
            fill_value,
        });
    }
    report
}

/// Mean of the non-missing entries, if there are any.
pub fn mean_observed(values: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Missing cells left in numeric columns.
pub fn numeric_missing(table: &Table) -> usize {
    table
        .columns()
        .iter()
        .filter_map(|c| match &c.data {
            ColumnData::Numeric(v) => Some(v.iter().filter(|x| x.is_none()).count()),
            _ => None,
        })
        .sum()
}
