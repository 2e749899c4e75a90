use std::time::Duration;

use crate::error::{RecvError, SendError, TryRecvError};
use crate::utils::CancelToken;

/// Sending half of an event transport.
pub trait BaseTx: Send + 'static {
    /// Item type carried by this transport.
    type Item: Send + 'static;

    /// Non-blocking send. `Err` when the queue is full or disconnected.
    fn try_send(&mut self, item: Self::Item) -> Result<(), SendError<Self::Item>>;

    /// Cooperative send with optional timeout and cancellation.
    fn send(
        &mut self,
        item: Self::Item,
        cancel: &CancelToken,
        timeout: Option<Duration>,
    ) -> Result<(), SendError<Self::Item>>;
}

/// Receiving half of an event transport.
pub trait BaseRx: Send + 'static {
    /// Item type carried by this transport.
    type Item: Send + 'static;

    /// Non-blocking receive. `Empty` when no data, `Disconnected` when closed.
    fn try_recv(&mut self) -> Result<Self::Item, TryRecvError>;

    /// Cooperative receive with optional timeout and cancellation.
    fn recv(
        &mut self,
        cancel: &CancelToken,
        timeout: Option<Duration>,
    ) -> Result<Self::Item, RecvError>;

    /// Drains up to `max` currently queued items.
    fn drain(&mut self, max: usize) -> Vec<Self::Item> {
        let mut out = Vec::new();
        for _ in 0..max {
            match self.try_recv() {
                Ok(item) => out.push(item),
                Err(_) => break,
            }
        }
        out
    }
}
