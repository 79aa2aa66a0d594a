//! StockML pipeline — the gated wizard behind every front end.
//!
//! This crate builds on `stockml-core` to provide:
//! - `PipelineState` with per-step completion flags and artifacts
//! - One handler per step, with downstream invalidation on re-run
//! - Navigation (`Continue`, `Jump`, `Restart`)
//! - Sessions with a palette preference that survives restart
//! - TOML configuration and a JSON run report

pub mod config;
pub mod error;
pub mod machine;
pub mod report;
pub mod runner;
pub mod session;
pub mod state;
pub mod step;
pub mod steps;

pub use config::{ConfigError, PipelineConfig, ProviderKind};
pub use error::{StepError, ValidationError};
pub use machine::{apply, can_run, Transition};
pub use report::{ReportError, RunReport};
pub use runner::{run_plan, DataInput, RunError, RunOutput, RunPlan};
pub use session::{InMemorySessionStore, Palette, Session, SessionStore};
pub use state::{DataOrigin, PipelineState, StepFlags};
pub use step::Step;
pub use steps::{
    FeatureRequest, SplitRequest, StepOutcome, TrainRequest, ValueScale, Visualization,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn pipeline_state_is_send_sync() {
        assert_send::<PipelineState>();
        assert_sync::<PipelineState>();
        assert_send::<Session>();
    }
}
