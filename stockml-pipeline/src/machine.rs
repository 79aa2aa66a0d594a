//! Navigation between wizard states.
//!
//! Navigation never runs a handler. `Jump` may land on any state; the
//! handler for that state re-checks its own upstream flag when invoked.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValidationError;
use crate::state::PipelineState;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Advance to the next state. Only allowed once the current step is done.
    Continue,
    Jump(Step),
    /// Back to Welcome with everything cleared.
    Restart,
}

/// Apply `transition` and return the new current step.
pub fn apply(state: &mut PipelineState, transition: Transition) -> Result<Step, ValidationError> {
    let from = state.current_step();
    let to = match transition {
        Transition::Continue => {
            if !state.is_complete(from) {
                return Err(ValidationError::StepIncomplete(from));
            }
            from.next().unwrap_or(from)
        }
        Transition::Jump(step) => step,
        Transition::Restart => {
            state.reset();
            Step::Welcome
        }
    };
    state.set_current(to);
    debug!(from = %from, to = %to, ?transition, "transition");
    Ok(to)
}

/// Whether `step` could run right now.
pub fn can_run(state: &PipelineState, step: Step) -> bool {
    state.ensure_ready(step).is_ok()
}
