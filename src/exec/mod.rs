//! Event propagation: the per-resource chain executor and the shared
//! timer thread that re-injects delayed events.

pub(crate) mod chain;
pub mod timer;

pub use timer::TimerService;

use std::time::Duration;

use crate::control::QueuedEvent;
use crate::error::SendError;
use crate::io::base::BaseTx;
use crate::io::MpmcSender;
use crate::utils::CancelToken;

/// Cloneable handle onto one resource's run queue. Captured by timer
/// registrations so a timed event fires back into the executor that was
/// active when it was registered.
#[derive(Clone)]
pub struct ExecutorHandle {
    tx: MpmcSender<QueuedEvent>,
}

impl ExecutorHandle {
    pub(crate) fn new(tx: MpmcSender<QueuedEvent>) -> Self {
        Self { tx }
    }

    /// Non-blocking push onto the run queue. A full or closed queue returns
    /// the event to the caller, which drops it with a warning: callers on
    /// the timer thread hold the registry lock and must not wait here.
    pub(crate) fn deliver(&mut self, event: QueuedEvent) -> Result<(), SendError<QueuedEvent>> {
        self.tx.try_send(event)
    }

    /// Cooperative push that waits out short bursts of backpressure before
    /// giving up. Used where no lock is held.
    pub(crate) fn send(
        &mut self,
        event: QueuedEvent,
        cancel: &CancelToken,
        timeout: Duration,
    ) -> Result<(), SendError<QueuedEvent>> {
        self.tx.send(event, cancel, Some(timeout))
    }
}
