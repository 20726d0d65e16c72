//! Run state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current state of a session controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Starting,
    Running,
    StoppingRequested,
    /// Stopped on request, with the worker's exit code if it had one.
    Stopped(Option<i32>),
    Completed,
    Failed(String),
}

impl RunState {
    /// Returns true for states that end a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped(_) | Self::Completed | Self::Failed(_))
    }

    /// Returns true while a worker may be alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::StoppingRequested)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Starting => f.write_str("Starting"),
            Self::Running => f.write_str("Running"),
            Self::StoppingRequested => f.write_str("Stopping"),
            Self::Stopped(Some(code)) => write!(f, "Stopped (exit code {code})"),
            Self::Stopped(None) => f.write_str("Stopped"),
            Self::Completed => f.write_str("Completed"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}

/// State machine guarding run transitions.
#[derive(Debug, Clone, Default)]
pub struct RunStateMachine {
    state: RunState,
    runs_started: usize,
    runs_failed: usize,
}

impl RunStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Whether `from -> to` is a legal transition.
    #[must_use]
    pub fn can_transition(from: &RunState, to: &RunState) -> bool {
        use RunState::{Completed, Failed, Idle, Running, Starting, Stopped, StoppingRequested};

        match (from, to) {
            (Idle, Starting)
            | (Starting, Running | Failed(_) | StoppingRequested)
            | (Running, StoppingRequested | Completed | Failed(_) | Stopped(_))
            | (StoppingRequested, Stopped(_) | Failed(_))
            | (Stopped(_) | Completed | Failed(_), Idle) => true,
            _ => false,
        }
    }

    /// Move to `new_state`. Returns false and leaves the state untouched if
    /// the transition is not legal.
    pub fn transition(&mut self, new_state: RunState) -> bool {
        if !Self::can_transition(&self.state, &new_state) {
            tracing::warn!(from = %self.state, to = %new_state, "Refusing state transition");
            return false;
        }
        tracing::debug!(from = %self.state, to = %new_state, "State transition");
        if matches!(new_state, RunState::Starting) {
            self.runs_started = self.runs_started.saturating_add(1);
        }
        if matches!(new_state, RunState::Failed(_)) {
            self.runs_failed = self.runs_failed.saturating_add(1);
        }
        self.state = new_state;
        true
    }

    /// Reset a terminal state to `Idle`. Returns true if the state changed.
    pub fn settle(&mut self) -> bool {
        if self.state.is_terminal() {
            return self.transition(RunState::Idle);
        }
        false
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        RunStats {
            runs_started: self.runs_started,
            runs_failed: self.runs_failed,
        }
    }
}

/// Counters kept across runs of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub runs_started: usize,
    pub runs_failed: usize,
}
