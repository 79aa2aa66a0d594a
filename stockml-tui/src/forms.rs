//! Per-step input forms. Each form owns its field values and turns them
//! into the request its step handler takes.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockml_core::features::{moving_average_name, MA_WINDOW_RANGE};
use stockml_core::model::{ModelKind, ModelVariant, MAX_K};
use stockml_core::split::{MAX_TEST_PERCENT, MIN_TEST_PERCENT};
use stockml_pipeline::steps::FeatureRequest;
use stockml_pipeline::{PipelineConfig, PipelineState, SplitRequest, TrainRequest, ValueScale};

// ── Load ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    Remote,
    Upload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadForm {
    pub mode: LoadMode,
    pub symbol: String,
    pub start: String,
    pub end: String,
    pub path: String,
}

/// What the Load form asks for once parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadInput {
    Remote {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    Upload(String),
}

impl LoadForm {
    pub const FIELDS: [&'static str; 5] = ["Source", "Symbol", "Start", "End", "File"];

    fn from_config(config: &PipelineConfig) -> Self {
        Self {
            mode: LoadMode::Remote,
            symbol: config.data.symbol.clone(),
            start: config.data.start.to_string(),
            end: config.data.end.to_string(),
            path: String::new(),
        }
    }

    pub fn text_mut(&mut self, field: usize) -> Option<&mut String> {
        match field {
            1 => Some(&mut self.symbol),
            2 => Some(&mut self.start),
            3 => Some(&mut self.end),
            4 => Some(&mut self.path),
            _ => None,
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            LoadMode::Remote => LoadMode::Upload,
            LoadMode::Upload => LoadMode::Remote,
        };
    }

    pub fn input(&self) -> Result<LoadInput, String> {
        match self.mode {
            LoadMode::Remote => Ok(LoadInput::Remote {
                symbol: self.symbol.trim().to_string(),
                start: parse_date("start", &self.start)?,
                end: parse_date("end", &self.end)?,
            }),
            LoadMode::Upload => {
                let path = self.path.trim();
                if path.is_empty() {
                    return Err("enter a CSV or Parquet file path".into());
                }
                Ok(LoadInput::Upload(path.to_string()))
            }
        }
    }
}

fn parse_date(label: &str, text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{label} date '{}' is not YYYY-MM-DD", text.trim()))
}

// ── Feature engineering ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureForm {
    pub add_ma: bool,
    pub ma_window: usize,
    pub scale: bool,
    pub target: String,
    /// Numeric columns of the cleaned table.
    pub columns: Vec<String>,
    pub selected: BTreeSet<String>,
}

impl FeatureForm {
    /// Rows before the per-column feature toggles.
    pub const HEADER_ROWS: usize = 4;

    fn from_config(config: &PipelineConfig) -> Self {
        Self {
            add_ma: config.features.add_moving_average,
            ma_window: config.features.ma_window,
            scale: config.features.scale,
            target: config.features.target.clone(),
            columns: Vec::new(),
            selected: config.features.features.iter().cloned().collect(),
        }
    }

    pub fn rows(&self) -> usize {
        Self::HEADER_ROWS + self.columns.len()
    }

    /// Pick up the columns of the newest table. An empty selection becomes
    /// every column except the target.
    pub fn refresh(&mut self, state: &PipelineState) {
        let columns = state
            .processed()
            .or(state.raw())
            .map(|t| t.numeric_column_names())
            .unwrap_or_default();
        if !columns.contains(&self.target) {
            if let Some(first) = columns
                .iter()
                .find(|c| c.as_str() == "Close")
                .or(columns.first())
            {
                self.target = first.clone();
            }
        }
        self.selected.retain(|s| columns.contains(s));
        if self.selected.is_empty() {
            self.selected = columns
                .iter()
                .filter(|c| **c != self.target)
                .cloned()
                .collect();
        }
        self.selected.remove(&self.target);
        self.columns = columns;
    }

    pub fn adjust(&mut self, row: usize, direction: i32) {
        match row {
            0 => self.add_ma = !self.add_ma,
            1 => {
                let w = self.ma_window as i64 + direction as i64;
                self.ma_window = (w.max(0) as usize)
                    .clamp(*MA_WINDOW_RANGE.start(), *MA_WINDOW_RANGE.end());
            }
            2 => self.scale = !self.scale,
            3 if !self.columns.is_empty() => {
                let n = self.columns.len();
                let i = self.columns.iter().position(|c| *c == self.target).unwrap_or(0);
                let next = (i as i64 + direction as i64).rem_euclid(n as i64) as usize;
                self.target = self.columns[next].clone();
                self.selected.remove(&self.target);
            }
            _ => self.toggle(row),
        }
    }

    pub fn toggle(&mut self, row: usize) {
        match row {
            0 | 2 => self.adjust(row, 1),
            r if r >= Self::HEADER_ROWS => {
                if let Some(col) = self.columns.get(r - Self::HEADER_ROWS) {
                    if *col == self.target {
                        return;
                    }
                    if !self.selected.remove(col) {
                        self.selected.insert(col.clone());
                    }
                }
            }
            _ => {}
        }
    }

    /// Features in column order, plus the moving average when it is on.
    pub fn request(&self) -> FeatureRequest {
        let mut features: Vec<String> = self
            .columns
            .iter()
            .filter(|c| self.selected.contains(*c))
            .cloned()
            .collect();
        if self.add_ma {
            let ma = moving_average_name(self.ma_window);
            if !features.contains(&ma) && ma != self.target {
                features.push(ma);
            }
        }
        FeatureRequest {
            ma_window: self.add_ma.then_some(self.ma_window),
            target: self.target.clone(),
            features,
            scale: self.scale,
        }
    }
}

// ── Split and train ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitForm {
    pub test_percent: u32,
    pub seed: u64,
}

impl SplitForm {
    pub fn adjust(&mut self, row: usize, direction: i32) {
        match row {
            0 => {
                let p = self.test_percent as i64 + direction as i64;
                self.test_percent =
                    (p.max(0) as u32).clamp(MIN_TEST_PERCENT, MAX_TEST_PERCENT);
            }
            1 => {
                self.seed = if direction < 0 {
                    self.seed.saturating_sub(1)
                } else {
                    self.seed.saturating_add(1)
                }
            }
            _ => {}
        }
    }

    pub fn request(&self) -> SplitRequest {
        SplitRequest {
            test_percent: self.test_percent,
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainForm {
    pub kind: ModelKind,
    pub k: usize,
}

impl TrainForm {
    pub fn adjust(&mut self, row: usize, direction: i32) {
        match row {
            0 => {
                let n = ModelKind::ALL.len() as i64;
                let i = ModelKind::ALL.iter().position(|k| *k == self.kind).unwrap_or(0) as i64;
                self.kind = ModelKind::ALL[(i + direction as i64).rem_euclid(n) as usize];
            }
            1 => {
                let k = self.k as i64 + direction as i64;
                self.k = (k.max(1) as usize).min(MAX_K);
            }
            _ => {}
        }
    }

    pub fn rows(&self) -> usize {
        if self.kind.uses_k() {
            2
        } else {
            1
        }
    }

    pub fn request(&self) -> TrainRequest {
        TrainRequest {
            kind: self.kind,
            k: self.k,
        }
    }
}

// ── Visualize ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VizView {
    #[default]
    Importance,
    Series,
    Comparison,
    Forecast,
    Predict,
}

impl VizView {
    pub const ALL: [VizView; 5] = [
        VizView::Importance,
        VizView::Series,
        VizView::Comparison,
        VizView::Forecast,
        VizView::Predict,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VizView::Importance => "Feature Importance",
            VizView::Series => "Actual vs Predicted",
            VizView::Comparison => "Model Comparison",
            VizView::Forecast => "Next Day",
            VizView::Predict => "Interactive Prediction",
        }
    }

    pub fn next(self) -> VizView {
        let i = Self::ALL.iter().position(|v| *v == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictForm {
    pub view: VizView,
    pub variant: Option<ModelVariant>,
    pub scale: ValueScale,
    pub values: Vec<f64>,
    pub last: Option<f64>,
}

impl PredictForm {
    /// Start every input at its feature mean, in the current value scale.
    pub fn reset(&mut self, state: &PipelineState) {
        self.last = None;
        self.values = self.ranges(state).iter().map(|(_, _, mean, _)| *mean).collect();
        if self.variant.map_or(true, |v| !state.models().contains_key(&v)) {
            self.variant = state.models().keys().next().copied();
        }
    }

    /// (name, min, mean, max) per feature in the current value scale.
    pub fn ranges(&self, state: &PipelineState) -> Vec<(String, f64, f64, f64)> {
        let Some(viz) = state.visualization() else {
            return Vec::new();
        };
        let ranges = match (self.scale, &viz.ranges_scaled) {
            (ValueScale::Scaled, Some(scaled)) => scaled,
            _ => &viz.ranges,
        };
        ranges
            .iter()
            .map(|r| (r.name.clone(), r.min, r.mean, r.max))
            .collect()
    }

    pub fn adjust(&mut self, state: &PipelineState, row: usize, direction: i32) {
        let ranges = self.ranges(state);
        if let (Some(value), Some((_, min, _, max))) = (self.values.get_mut(row), ranges.get(row)) {
            let step = ((max - min) / 20.0).max(f64::EPSILON);
            *value = (*value + step * direction as f64).clamp(*min, *max);
            self.last = None;
        }
    }

    /// Switch units, carrying the current inputs across through the fitted
    /// scaler. Without a scaler both units are the same.
    pub fn toggle_scale(&mut self, state: &PipelineState) {
        let Some(scaler) = state.scaler() else {
            self.scale = ValueScale::Raw;
            return;
        };
        let (next, converted) = match self.scale {
            ValueScale::Raw => (ValueScale::Scaled, scaler.transform_row(&self.values)),
            ValueScale::Scaled => (ValueScale::Raw, scaler.inverse_row(&self.values)),
        };
        self.scale = next;
        self.last = None;
        match converted {
            Ok(values) => self.values = values,
            Err(_) => self.reset(state),
        }
    }

    pub fn cycle_model(&mut self, state: &PipelineState) {
        let variants: Vec<ModelVariant> = state.models().keys().copied().collect();
        if variants.is_empty() {
            self.variant = None;
            return;
        }
        let i = self
            .variant
            .and_then(|v| variants.iter().position(|x| *x == v))
            .map_or(0, |i| (i + 1) % variants.len());
        self.variant = Some(variants[i]);
        self.last = None;
    }
}

// ── All forms ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Forms {
    pub load: LoadForm,
    pub features: FeatureForm,
    pub split: SplitForm,
    pub train: TrainForm,
    pub predict: PredictForm,
    /// Focused row in the current step's form.
    pub cursor: usize,
}

impl Forms {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            load: LoadForm::from_config(config),
            features: FeatureForm::from_config(config),
            split: SplitForm {
                test_percent: config.split.test_percent,
                seed: config.split.seed,
            },
            train: TrainForm {
                kind: config.model.kind,
                k: config.model.k,
            },
            predict: PredictForm::default(),
            cursor: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockml_core::{Column, Table};
    use stockml_pipeline::steps;

    fn loaded_state() -> PipelineState {
        let mut state = PipelineState::new();
        let table = Table::new(vec![
            Column::numeric("Open", (0..30).map(|i| Some(i as f64)).collect()),
            Column::numeric("Close", (0..30).map(|i| Some(i as f64 * 2.0)).collect()),
            Column::numeric("Volume", (0..30).map(|i| Some((i % 7) as f64)).collect()),
        ])
        .unwrap();
        steps::load_table(&mut state, table, "fixture").unwrap();
        state
    }

    #[test]
    fn load_form_rejects_bad_dates() {
        let mut form = LoadForm::from_config(&PipelineConfig::default());
        assert!(matches!(form.input(), Ok(LoadInput::Remote { .. })));
        form.start = "2024/01/01".into();
        assert!(form.input().unwrap_err().contains("YYYY-MM-DD"));
        form.toggle_mode();
        assert!(form.input().is_err());
        form.path = "prices.csv".into();
        assert_eq!(form.input(), Ok(LoadInput::Upload("prices.csv".into())));
    }

    #[test]
    fn feature_form_defaults_to_all_but_target() {
        let mut form = FeatureForm::from_config(&PipelineConfig::default());
        form.refresh(&loaded_state());
        let req = form.request();
        assert_eq!(req.target, "Close");
        assert_eq!(
            req.features,
            vec!["Open".to_string(), "Volume".to_string(), "MA_20".to_string()]
        );
    }

    #[test]
    fn feature_form_toggles_columns_but_not_target() {
        let mut form = FeatureForm::from_config(&PipelineConfig::default());
        form.refresh(&loaded_state());
        let close_row = FeatureForm::HEADER_ROWS + 1;
        form.toggle(close_row);
        assert!(!form.selected.contains("Close"));
        form.toggle(FeatureForm::HEADER_ROWS);
        assert!(!form.selected.contains("Open"));
        form.adjust(0, 1);
        assert_eq!(form.request().features, vec!["Volume".to_string()]);
    }

    #[test]
    fn numeric_fields_clamp() {
        let mut split = SplitForm {
            test_percent: 40,
            seed: 0,
        };
        split.adjust(0, 1);
        split.adjust(1, -1);
        assert_eq!(split.request(), SplitRequest { test_percent: 40, seed: 0 });

        let mut train = TrainForm {
            kind: ModelKind::KNearestNeighbors,
            k: MAX_K,
        };
        train.adjust(1, 1);
        assert_eq!(train.k, MAX_K);
        train.adjust(0, 1);
        assert_eq!(train.kind, ModelKind::LinearRegression);
        assert_eq!(train.rows(), 1);
    }

    #[test]
    fn viz_views_cycle() {
        let mut v = VizView::default();
        for _ in 0..VizView::ALL.len() {
            v = v.next();
        }
        assert_eq!(v, VizView::Importance);
    }
}
