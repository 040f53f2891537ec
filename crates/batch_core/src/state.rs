use serde::{Deserialize, Serialize};

/// Lifecycle of one batch. A controller walks this once; see `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
    /// The run loop went through every item without being stopped.
    Completed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Stopped | RunState::Completed)
    }

    /// Whether the run loop may still dispatch items.
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

/// What `stop` does to the item that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Let the in-flight process exit on its own; start nothing new.
    #[default]
    Finish,
    /// Kill the in-flight process. Partial output files may be left behind.
    Immediate,
}
