use serde::{Deserialize, Serialize};

/// Execution state of one block instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Initial state; also reached from Running via Stop.
    Stopped,
    Running,
    /// Terminal. A killed block never reacts again.
    Killed,
}

/// Lifecycle command applied to a block, a resource, or a whole device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateCommand {
    Start,
    Stop,
    Kill,
    /// Reinitialize port values; only legal while Stopped.
    Reset,
}

/// Outcome of a state transition. Illegal transitions are reported,
/// never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateResponse {
    /// Transition accepted.
    Ready,
    /// Command is illegal in the current state.
    InvalidState,
    /// The block is Killed; nothing can be applied anymore.
    Terminated,
}

impl ExecutionState {
    /// Applies `cmd`, mutating the state only on acceptance.
    pub fn apply(&mut self, cmd: StateCommand) -> StateResponse {
        let (next, resp) = match (*self, cmd) {
            (ExecutionState::Killed, _) => (ExecutionState::Killed, StateResponse::Terminated),
            (_, StateCommand::Kill) => (ExecutionState::Killed, StateResponse::Ready),
            (ExecutionState::Stopped, StateCommand::Start) => {
                (ExecutionState::Running, StateResponse::Ready)
            }
            (ExecutionState::Stopped, StateCommand::Reset) => {
                (ExecutionState::Stopped, StateResponse::Ready)
            }
            (ExecutionState::Running, StateCommand::Stop) => {
                (ExecutionState::Stopped, StateResponse::Ready)
            }
            (cur, _) => (cur, StateResponse::InvalidState),
        };
        *self = next;
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_cycle() {
        let mut s = ExecutionState::Stopped;
        assert_eq!(s.apply(StateCommand::Start), StateResponse::Ready);
        assert_eq!(s, ExecutionState::Running);
        assert_eq!(s.apply(StateCommand::Stop), StateResponse::Ready);
        assert_eq!(s, ExecutionState::Stopped);
    }

    #[test]
    fn illegal_transitions_are_reported_not_fatal() {
        let mut s = ExecutionState::Stopped;
        assert_eq!(s.apply(StateCommand::Stop), StateResponse::InvalidState);
        assert_eq!(s, ExecutionState::Stopped);
        s.apply(StateCommand::Start);
        assert_eq!(s.apply(StateCommand::Start), StateResponse::InvalidState);
        assert_eq!(s.apply(StateCommand::Reset), StateResponse::InvalidState);
        assert_eq!(s, ExecutionState::Running);
    }

    #[test]
    fn kill_is_terminal_from_any_state() {
        for initial in [ExecutionState::Stopped, ExecutionState::Running] {
            let mut s = initial;
            assert_eq!(s.apply(StateCommand::Kill), StateResponse::Ready);
            assert_eq!(s, ExecutionState::Killed);
            assert_eq!(s.apply(StateCommand::Start), StateResponse::Terminated);
            assert_eq!(s.apply(StateCommand::Kill), StateResponse::Terminated);
            assert_eq!(s, ExecutionState::Killed);
        }
    }

    #[test]
    fn reset_only_in_stopped() {
        let mut s = ExecutionState::Stopped;
        assert_eq!(s.apply(StateCommand::Reset), StateResponse::Ready);
        assert_eq!(s, ExecutionState::Stopped);
    }
}
