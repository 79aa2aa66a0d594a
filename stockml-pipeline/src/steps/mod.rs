//! One handler per pipeline step.
//!
//! Each handler checks its upstream flag, computes into locals, and only
//! writes to `PipelineState` once everything has succeeded. A failing
//! handler leaves the state exactly as it found it.

pub mod evaluate;
pub mod features;
pub mod load;
pub mod preprocess;
pub mod split;
pub mod train;
pub mod visualize;

use serde::{Deserialize, Serialize};

use crate::step::Step;

pub use evaluate::evaluate;
pub use features::{engineer_features, FeatureRequest};
pub use load::{load_remote, load_table, load_upload};
pub use preprocess::preprocess;
pub use split::{split, SplitRequest};
pub use train::{train, TrainRequest};
pub use visualize::{predict_single, visualize, ValueScale, Visualization};

/// What a successful handler reports back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: Step,
    /// Human-readable notes: warnings, counts, skipped work.
    pub notices: Vec<String>,
}

impl StepOutcome {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            notices: Vec::new(),
        }
    }

    pub fn notice(mut self, message: impl Into<String>) -> Self {
        self.notices.push(message.into());
        self
    }

    pub fn with_notices(mut self, messages: impl IntoIterator<Item = String>) -> Self {
        self.notices.extend(messages);
        self
    }
}
