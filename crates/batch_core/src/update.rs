use thiserror::Error;

use crate::{Control, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("batch already started (state {0:?})")]
    AlreadyStarted(RunState),
}

/// Pure transition function for the run state.
///
/// Only `Start` outside `Idle` is rejected; every other control that does not
/// apply to the current state leaves it unchanged.
pub fn update(state: RunState, control: Control) -> Result<RunState, ControlError> {
    let next = match (state, control) {
        (RunState::Idle, Control::Start) => RunState::Running,
        (_, Control::Start) => return Err(ControlError::AlreadyStarted(state)),
        (RunState::Running, Control::Pause) => RunState::Paused,
        (RunState::Paused, Control::Resume) => RunState::Running,
        (RunState::Running | RunState::Paused, Control::Stop) => RunState::Stopped,
        (RunState::Running | RunState::Paused, Control::LoopEnded) => RunState::Completed,
        (unchanged, _) => unchanged,
    };
    Ok(next)
}
