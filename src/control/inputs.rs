use crate::block::{BlockId, StateCommand};
use crate::spec::PortId;

/// Command delivered to a resource thread over its control lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandInput {
    /// Transition contained blocks to Running.
    Start,
    /// Drain pending chain entries and transition contained blocks to Stopped.
    Stop,
    /// Force contained blocks to Killed, cancel owned timers, exit the thread.
    Kill,
    /// Reinitialize port values of Stopped blocks.
    Reset,
    /// Stop contained blocks and exit the thread.
    Shutdown,
}

impl CommandInput {
    /// Per-block command this control input maps to, when any.
    pub(crate) fn block_command(self) -> Option<StateCommand> {
        match self {
            CommandInput::Start => Some(StateCommand::Start),
            CommandInput::Stop | CommandInput::Shutdown => Some(StateCommand::Stop),
            CommandInput::Kill => Some(StateCommand::Kill),
            CommandInput::Reset => Some(StateCommand::Reset),
        }
    }
}

/// One event delivery queued on a resource's run queue: either handed over
/// from a chain on another resource or re-injected by the timer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedEvent {
    pub block: BlockId,
    pub input: PortId,
}
