//! Column-major table shared by every pipeline stage.
//!
//! Each column has a fixed kind (numeric, date, text) for the lifetime of a
//! run. Missing cells are `None`; NaN never appears in a numeric column.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of values a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Date,
    Text,
}

impl ColumnKind {
    pub fn label(self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Date => "date",
            ColumnKind::Text => "text",
        }
    }
}

/// Typed cell storage for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Date(_) => ColumnKind::Date,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn missing_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Date(v) => v.iter().filter(|c| c.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    /// Render one cell for display. Missing cells render as an empty string.
    pub fn display_cell(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(format_number)
                .unwrap_or_default(),
            ColumnData::Date(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            ColumnData::Text(v) => v.get(row).cloned().flatten().unwrap_or_default(),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn date(name: impl Into<String>, values: Vec<Option<NaiveDate>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Date(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.data.kind()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("column '{name}' has {got} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("column '{name}' is {kind}, expected {expected}")]
    WrongKind {
        name: String,
        kind: &'static str,
        expected: &'static str,
    },
}

/// Summary statistics for one numeric column (pandas `describe` subset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Ordered collection of equal-length named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table, checking column lengths and name uniqueness.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        for (i, col) in columns.iter().enumerate() {
            if col.data.len() != rows {
                return Err(TableError::LengthMismatch {
                    name: col.name.clone(),
                    expected: rows,
                    got: col.data.len(),
                });
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(TableError::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(Column::kind)
    }

    /// Names of all numeric columns, in table order.
    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind() == ColumnKind::Numeric)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>], TableError> {
        let col = self
            .column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        match &col.data {
            ColumnData::Numeric(v) => Ok(v),
            other => Err(TableError::WrongKind {
                name: name.to_string(),
                kind: other.kind().label(),
                expected: ColumnKind::Numeric.label(),
            }),
        }
    }

    pub fn numeric_mut(&mut self, name: &str) -> Result<&mut Vec<Option<f64>>, TableError> {
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        match &mut col.data {
            ColumnData::Numeric(v) => Ok(v),
            other => Err(TableError::WrongKind {
                name: name.to_string(),
                kind: other.kind().label(),
                expected: ColumnKind::Numeric.label(),
            }),
        }
    }

    pub fn dates(&self, name: &str) -> Result<&[Option<NaiveDate>], TableError> {
        let col = self
            .column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))?;
        match &col.data {
            ColumnData::Date(v) => Ok(v),
            other => Err(TableError::WrongKind {
                name: name.to_string(),
                kind: other.kind().label(),
                expected: ColumnKind::Date.label(),
            }),
        }
    }

    /// Replace the column with the same name, or append a new one.
    ///
    /// Replacing a column may not change its kind.
    pub fn upsert_column(&mut self, column: Column) -> Result<(), TableError> {
        if !self.columns.is_empty() && column.data.len() != self.rows {
            return Err(TableError::LengthMismatch {
                name: column.name,
                expected: self.rows,
                got: column.data.len(),
            });
        }
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            if existing.kind() != column.kind() {
                return Err(TableError::WrongKind {
                    name: column.name,
                    kind: column.data.kind().label(),
                    expected: existing.kind().label(),
                });
            }
            *existing = column;
        } else {
            if self.columns.is_empty() {
                self.rows = column.data.len();
            }
            self.columns.push(column);
        }
        Ok(())
    }

    /// Missing-cell count per column, in table order (zero counts included).
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.data.missing_count()))
            .collect()
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|c| c.data.missing_count()).sum()
    }

    /// Descriptive statistics for every numeric column.
    pub fn describe(&self) -> Vec<ColumnSummary> {
        self.columns
            .iter()
            .filter_map(|c| match &c.data {
                ColumnData::Numeric(values) => Some(summarize(&c.name, values)),
                _ => None,
            })
            .collect()
    }

    /// Deterministic BLAKE3 fingerprint over column names, kinds and cells.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.rows as u64).to_le_bytes());
        for col in &self.columns {
            hasher.update(col.name.as_bytes());
            hasher.update(col.kind().label().as_bytes());
            match &col.data {
                ColumnData::Numeric(v) => {
                    for cell in v {
                        match cell {
                            Some(x) => hasher.update(&x.to_le_bytes()),
                            None => hasher.update(b"\0na"),
                        };
                    }
                }
                ColumnData::Date(v) => {
                    for cell in v {
                        match cell {
                            Some(d) => hasher.update(d.to_string().as_bytes()),
                            None => hasher.update(b"\0na"),
                        };
                    }
                }
                ColumnData::Text(v) => {
                    for cell in v {
                        match cell {
                            Some(s) => hasher.update(s.as_bytes()).update(b"\0"),
                            None => hasher.update(b"\0na"),
                        };
                    }
                }
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn summarize(name: &str, values: &[Option<f64>]) -> ColumnSummary {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    let count = observed.len();
    let mean = (count > 0).then(|| observed.iter().sum::<f64>() / count as f64);
    let std = match (mean, count) {
        (Some(m), n) if n > 1 => {
            let var = observed.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
            Some(var.sqrt())
        }
        _ => None,
    };
    ColumnSummary {
        name: name.to_string(),
        count,
        missing: values.len() - count,
        mean,
        std,
        min: observed.iter().copied().reduce(f64::min),
        max: observed.iter().copied().reduce(f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> Table {
        Table::new(vec![
            Column::date("Date", vec![Some(d(2024, 1, 3)), Some(d(2024, 1, 1)), None]),
            Column::numeric("Close", vec![Some(3.0), Some(1.0), Some(9.0)]),
            Column::text("Note", vec![Some("c".into()), None, Some("x".into())]),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("b", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Table::new(vec![
            Column::numeric("a", vec![Some(1.0)]),
            Column::numeric("a", vec![Some(2.0)]),
        ])
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("a".into()));
    }

    #[test]
    fn numeric_accessor_checks_kind() {
        let t = sample();
        assert!(matches!(
            t.numeric("Note"),
            Err(TableError::WrongKind { .. })
        ));
        assert!(matches!(
            t.numeric("Nope"),
            Err(TableError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn upsert_replaces_same_kind_only() {
        let mut t = sample();
        t.upsert_column(Column::numeric("Close", vec![Some(0.0); 3]))
            .unwrap();
        assert_eq!(t.numeric("Close").unwrap()[0], Some(0.0));
        assert!(t
            .upsert_column(Column::text("Close", vec![None; 3]))
            .is_err());
        t.upsert_column(Column::numeric("MA_5", vec![None; 3])).unwrap();
        assert_eq!(t.n_cols(), 4);
    }

    #[test]
    fn describe_skips_missing() {
        let t = Table::new(vec![Column::numeric(
            "x",
            vec![Some(1.0), None, Some(3.0)],
        )])
        .unwrap();
        let s = &t.describe()[0];
        assert_eq!(s.count, 2);
        assert_eq!(s.missing, 1);
        assert_eq!(s.mean, Some(2.0));
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.max, Some(3.0));
        assert!((s.std.unwrap() - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.numeric_mut("Close").unwrap()[0] = Some(4.0);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
