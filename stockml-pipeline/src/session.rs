//! Per-user sessions: one pipeline plus preferences that outlive a restart.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::PipelineState;

/// Named colour theme. Front ends decide what the names look like.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Palette {
    #[default]
    DefaultDark,
    Cyberpunk,
    Blue,
    RedOrangeGrey,
}

impl Palette {
    pub const ALL: [Palette; 4] = [
        Palette::DefaultDark,
        Palette::Cyberpunk,
        Palette::Blue,
        Palette::RedOrangeGrey,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Palette::DefaultDark => "Default Dark",
            Palette::Cyberpunk => "Cyberpunk",
            Palette::Blue => "Blue",
            Palette::RedOrangeGrey => "Red Orange Grey",
        }
    }

    /// The next palette, wrapping around.
    pub fn next(self) -> Palette {
        let i = Self::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub pipeline: PipelineState,
    pub palette: Palette,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pipeline: PipelineState::new(),
            palette: Palette::default(),
        }
    }

    /// Reset the pipeline. The palette is kept.
    pub fn restart(&mut self) {
        self.pipeline.reset();
        info!(session = self.id.as_str(), palette = %self.palette, "session restarted");
    }
}

/// Where sessions live between user actions.
pub trait SessionStore {
    fn get(&self, id: &str) -> Option<&Session>;
    fn get_mut(&mut self, id: &str) -> Option<&mut Session>;
    fn insert(&mut self, session: Session);
    fn remove(&mut self, id: &str) -> Option<Session>;

    /// Fetch a session, creating an empty one on first use.
    fn get_or_create(&mut self, id: &str) -> &mut Session;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: HashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    fn get_or_create(&mut self, id: &str) -> &mut Session {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id))
    }
}
