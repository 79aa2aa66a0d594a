//! Application state — single-owner, main-thread only.
//!
//! Step handlers are synchronous, so every key press that runs a step
//! blocks the draw loop until the handler returns.

use std::collections::VecDeque;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use stockml_core::data::{FetchRequest, RemoteSource};
use stockml_pipeline::steps::{self, predict_single, StepOutcome};
use stockml_pipeline::{
    apply, PipelineConfig, Session, Step, StepError, Transition, ValidationError,
};

use crate::forms::{Forms, LoadInput, VizView};
use crate::theme::Theme;

pub const ERROR_HISTORY_CAP: usize = 50;

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// An error record for the error history overlay.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub category: ErrorCategory,
    pub message: String,
    pub context: String,
}

/// Error category for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Source,
    NoData,
    Validation,
    Computation,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Source => "SRC",
            ErrorCategory::NoData => "DATA",
            ErrorCategory::Validation => "VAL",
            ErrorCategory::Computation => "CALC",
        }
    }
}

impl From<&StepError> for ErrorCategory {
    fn from(err: &StepError) -> Self {
        match err {
            StepError::Source(_) => ErrorCategory::Source,
            StepError::DataUnavailable(_) => ErrorCategory::NoData,
            StepError::Validation(_) => ErrorCategory::Validation,
            StepError::Computation(_) => ErrorCategory::Computation,
        }
    }
}

/// Which overlay (if any) is shown on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Welcome,
    ErrorHistory,
    Help,
}

/// Top-level application state.
pub struct AppState {
    pub running: bool,
    pub session: Session,
    pub config: PipelineConfig,
    /// `None` when the configured provider could not be built.
    pub source: Option<RemoteSource>,
    pub forms: Forms,
    pub last_outcome: Option<StepOutcome>,

    // Cross-cutting
    pub status_message: Option<(String, StatusLevel)>,
    pub error_history: VecDeque<ErrorRecord>,
    pub error_scroll: usize,
    pub overlay: Overlay,
    /// A text field is capturing keystrokes.
    pub editing: bool,
}

impl AppState {
    pub fn new(config: PipelineConfig, source: Option<RemoteSource>) -> Self {
        let session_id = format!("s_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let mut session = Session::new(session_id);
        session.palette = config.ui.palette;
        Self {
            running: true,
            session,
            forms: Forms::from_config(&config),
            config,
            source,
            last_outcome: None,
            status_message: None,
            error_history: VecDeque::with_capacity(ERROR_HISTORY_CAP),
            error_scroll: 0,
            overlay: Overlay::None,
            editing: false,
        }
    }

    pub fn theme(&self) -> Theme {
        Theme::for_palette(self.session.palette)
    }

    pub fn current_step(&self) -> Step {
        self.session.pipeline.current_step()
    }

    /// Push an error to the history, capping at 50.
    pub fn push_error(&mut self, category: ErrorCategory, message: String, context: String) {
        let record = ErrorRecord {
            timestamp: chrono::Local::now().naive_local(),
            category,
            message: message.clone(),
            context,
        };
        self.error_history.push_front(record);
        if self.error_history.len() > ERROR_HISTORY_CAP {
            self.error_history.pop_back();
        }
        self.status_message = Some((message, StatusLevel::Error));
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }

    /// Record a failed step. Validation failures are shown as warnings;
    /// every failure still lands in the error history.
    fn report(&mut self, step: Step, err: StepError) {
        warn!(step = %step, category = err.category(), error = %err, "step failed");
        let message = err.to_string();
        self.push_error(ErrorCategory::from(&err), message.clone(), step.label().to_string());
        if matches!(err, StepError::Validation(_)) {
            self.set_warning(message);
        }
    }

    pub fn navigate(&mut self, transition: Transition) {
        match apply(&mut self.session.pipeline, transition) {
            Ok(step) => {
                self.forms.cursor = 0;
                self.editing = false;
                if transition == Transition::Restart {
                    self.last_outcome = None;
                    self.forms = Forms {
                        load: self.forms.load.clone(),
                        ..Forms::from_config(&self.config)
                    };
                    info!(palette = %self.session.palette, "restarted");
                    self.set_status("Restarted. Palette kept.");
                } else {
                    self.set_status(format!("→ {}", step.label()));
                }
            }
            Err(e) => self.set_warning(e.to_string()),
        }
    }

    pub fn cycle_palette(&mut self) {
        self.session.palette = self.session.palette.next();
        self.set_status(format!("Palette: {}", self.session.palette));
    }

    /// Run the handler behind the current step with the form values.
    pub fn run_step(&mut self) {
        let step = self.current_step();
        let result = match step {
            Step::Welcome => {
                self.navigate(Transition::Continue);
                return;
            }
            Step::Load => self.run_load(),
            Step::Preprocess => steps::preprocess(&mut self.session.pipeline),
            Step::FeatureEngineer => {
                let request = self.forms.features.request();
                steps::engineer_features(&mut self.session.pipeline, &request)
            }
            Step::Split => steps::split(&mut self.session.pipeline, self.forms.split.request()),
            Step::Train => steps::train(&mut self.session.pipeline, self.forms.train.request()),
            Step::Evaluate => steps::evaluate(&mut self.session.pipeline),
            Step::Visualize => {
                if self.forms.predict.view == VizView::Predict
                    && self.session.pipeline.visualization().is_some()
                {
                    self.run_prediction();
                    return;
                }
                steps::visualize(&mut self.session.pipeline)
            }
        };
        match result {
            Ok(outcome) => self.accept(outcome),
            Err(e) => self.report(step, e),
        }
    }

    fn run_load(&mut self) -> Result<StepOutcome, StepError> {
        let input = self
            .forms
            .load
            .input()
            .map_err(|msg| StepError::from(ValidationError::Invalid(msg)))?;
        match input {
            LoadInput::Remote { symbol, start, end } => {
                let request = FetchRequest::new(&symbol, start, end)?;
                let Some(source) = self.source.as_ref() else {
                    return Err(ValidationError::Invalid(
                        "no market data provider is configured".into(),
                    )
                    .into());
                };
                steps::load_remote(&mut self.session.pipeline, source, &request)
            }
            LoadInput::Upload(path) => steps::load_upload(&mut self.session.pipeline, Path::new(&path)),
        }
    }

    fn run_prediction(&mut self) {
        let Some(variant) = self.forms.predict.variant else {
            self.set_warning("train a model first");
            return;
        };
        let result = predict_single(
            &self.session.pipeline,
            variant,
            &self.forms.predict.values,
            self.forms.predict.scale,
        );
        match result {
            Ok(value) => {
                self.forms.predict.last = Some(value);
                self.set_status(format!("{variant}: predicted {value:.4}"));
            }
            Err(e) => self.report(Step::Visualize, e),
        }
    }

    fn accept(&mut self, outcome: StepOutcome) {
        let step = outcome.step;
        info!(step = %step, notices = outcome.notices.len(), "step complete");
        match step {
            Step::Load | Step::Preprocess => self.forms.features.refresh(&self.session.pipeline),
            Step::Visualize => self.forms.predict.reset(&self.session.pipeline),
            _ => {}
        }
        let summary = match outcome.notices.first() {
            Some(first) => format!("{} complete: {first}", step.label()),
            None => format!("{} complete", step.label()),
        };
        self.set_status(summary);
        self.last_outcome = Some(outcome);
    }
}
