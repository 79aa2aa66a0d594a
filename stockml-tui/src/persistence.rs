//! App state persistence — JSON save/load across restarts.
//!
//! Only form inputs and preferences are kept. Fitted models and tables are
//! never written; every launch starts a fresh pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use stockml_core::model::ModelKind;
use stockml_pipeline::Palette;

use crate::app::{AppState, Overlay};

/// Serializable subset of app state that persists across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub palette: Palette,
    pub symbol: String,
    pub start: String,
    pub end: String,
    pub upload_path: String,
    pub ma_window: usize,
    pub test_percent: u32,
    pub seed: u64,
    pub model_kind: ModelKind,
    pub k: usize,
    pub welcome_dismissed: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            symbol: "AAPL".into(),
            start: "2024-01-01".into(),
            end: "2024-12-31".into(),
            upload_path: String::new(),
            ma_window: 20,
            test_percent: 20,
            seed: 42,
            model_kind: ModelKind::LinearRegression,
            k: 5,
            welcome_dismissed: false,
        }
    }
}

/// Load persisted state from disk. `None` if the file is missing or corrupt.
pub fn load(path: &Path) -> Option<PersistedState> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Save persisted state to disk. Creates parent directories if needed.
pub fn save(path: &Path, state: &PersistedState) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn extract(app: &AppState) -> PersistedState {
    let forms = &app.forms;
    PersistedState {
        palette: app.session.palette,
        symbol: forms.load.symbol.clone(),
        start: forms.load.start.clone(),
        end: forms.load.end.clone(),
        upload_path: forms.load.path.clone(),
        ma_window: forms.features.ma_window,
        test_percent: forms.split.test_percent,
        seed: forms.split.seed,
        model_kind: forms.train.kind,
        k: forms.train.k,
        welcome_dismissed: app.overlay != Overlay::Welcome,
    }
}

/// Apply persisted state over the config-derived defaults. Values that no
/// longer pass validation are dropped.
pub fn apply(app: &mut AppState, state: PersistedState) {
    app.session.palette = state.palette;
    let forms = &mut app.forms;
    forms.load.symbol = state.symbol;
    forms.load.start = state.start;
    forms.load.end = state.end;
    forms.load.path = state.upload_path;
    if stockml_core::features::MA_WINDOW_RANGE.contains(&state.ma_window) {
        forms.features.ma_window = state.ma_window;
    }
    if (stockml_core::split::MIN_TEST_PERCENT..=stockml_core::split::MAX_TEST_PERCENT)
        .contains(&state.test_percent)
    {
        forms.split.test_percent = state.test_percent;
    }
    forms.split.seed = state.seed;
    forms.train.kind = state.model_kind;
    if (1..=stockml_core::model::MAX_K).contains(&state.k) {
        forms.train.k = state.k;
    }
    if !state.welcome_dismissed {
        app.overlay = Overlay::Welcome;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockml_pipeline::PipelineConfig;

    #[test]
    fn roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let state = PersistedState {
            palette: Palette::Blue,
            symbol: "MSFT".into(),
            seed: 7,
            model_kind: ModelKind::KNearestNeighbors,
            welcome_dismissed: true,
            ..PersistedState::default()
        };

        save(&path, &state).unwrap();
        assert_eq!(load(&path), Some(state));
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("state.json")), None);
    }

    #[test]
    fn corrupt_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not valid json {{{").unwrap();
        assert_eq!(load(&path), None);
    }

    #[test]
    fn apply_then_extract_preserves_inputs() {
        let mut app = AppState::new(PipelineConfig::default(), None);
        let state = PersistedState {
            palette: Palette::RedOrangeGrey,
            symbol: "NVDA".into(),
            test_percent: 30,
            k: 9,
            welcome_dismissed: true,
            ..PersistedState::default()
        };
        apply(&mut app, state.clone());
        assert_eq!(extract(&app), state);
    }

    #[test]
    fn out_of_range_values_fall_back() {
        let mut app = AppState::new(PipelineConfig::default(), None);
        let state = PersistedState {
            test_percent: 90,
            k: 0,
            ma_window: 500,
            ..PersistedState::default()
        };
        apply(&mut app, state);
        assert_eq!(app.forms.split.test_percent, 20);
        assert_eq!(app.forms.train.k, 5);
        assert_eq!(app.forms.features.ma_window, 20);
        assert_eq!(app.overlay, Overlay::Welcome);
    }
}
