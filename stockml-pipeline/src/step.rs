//! The eight wizard states and the gate each one sits behind.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline states, in order. The discriminant is the sidebar index.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Welcome = 0,
    Load = 1,
    Preprocess = 2,
    FeatureEngineer = 3,
    Split = 4,
    Train = 5,
    Evaluate = 6,
    Visualize = 7,
}

/// Each state with the step whose completion it requires.
pub const TRANSITIONS: [(Step, Option<Step>); 8] = [
    (Step::Welcome, None),
    (Step::Load, None),
    (Step::Preprocess, Some(Step::Load)),
    (Step::FeatureEngineer, Some(Step::Preprocess)),
    (Step::Split, Some(Step::FeatureEngineer)),
    (Step::Train, Some(Step::Split)),
    (Step::Evaluate, Some(Step::Train)),
    (Step::Visualize, Some(Step::Evaluate)),
];

impl Step {
    pub const ALL: [Step; 8] = [
        Step::Welcome,
        Step::Load,
        Step::Preprocess,
        Step::FeatureEngineer,
        Step::Split,
        Step::Train,
        Step::Evaluate,
        Step::Visualize,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Welcome => "Welcome",
            Step::Load => "Load Data",
            Step::Preprocess => "Preprocess",
            Step::FeatureEngineer => "Feature Engineering",
            Step::Split => "Train/Test Split",
            Step::Train => "Train Model",
            Step::Evaluate => "Evaluate",
            Step::Visualize => "Visualize",
        }
    }

    pub fn next(self) -> Option<Step> {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Option<Step> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// The upstream step that must be complete before this one can run.
    pub fn requires(self) -> Option<Step> {
        TRANSITIONS[self.index()].1
    }

    /// Steps after this one, nearest first.
    pub fn downstream(self) -> impl Iterator<Item = Step> {
        Self::ALL.into_iter().skip(self.index() + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_round_trip() {
        for step in Step::ALL {
            assert_eq!(Step::from_index(step.index()), Some(step));
        }
        assert_eq!(Step::from_index(8), None);
    }

    #[test]
    fn navigation_ends() {
        assert_eq!(Step::Welcome.prev(), None);
        assert_eq!(Step::Visualize.next(), None);
        assert_eq!(Step::Load.next(), Some(Step::Preprocess));
    }

    #[test]
    fn transition_table_is_a_chain() {
        for (i, (step, req)) in TRANSITIONS.iter().enumerate() {
            assert_eq!(step.index(), i);
            if i >= 2 {
                assert_eq!(*req, step.prev());
            }
        }
        assert_eq!(Step::Train.downstream().collect::<Vec<_>>(), vec![Step::Evaluate, Step::Visualize]);
    }
}
