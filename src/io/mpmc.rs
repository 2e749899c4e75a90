use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel as cbchan;
use crossbeam::utils::Backoff;

use crate::error::{RecvError, SendError, TryRecvError};
use crate::io::base::{BaseRx, BaseTx};
use crate::utils::CancelToken;

/// MPMC channel used for resource run queues: many producers (peer
/// resources, the timer thread, the device) feed one consuming thread.
pub struct MpmcChannel;

impl MpmcChannel {
    #[inline]
    pub fn bounded<T: Send + 'static>(capacity: usize) -> (MpmcSender<T>, MpmcReceiver<T>) {
        let (tx, rx) = cbchan::bounded::<T>(capacity);
        (MpmcSender { tx }, MpmcReceiver { rx })
    }

    #[inline]
    pub fn unbounded<T: Send + 'static>() -> (MpmcSender<T>, MpmcReceiver<T>) {
        let (tx, rx) = cbchan::unbounded::<T>();
        (MpmcSender { tx }, MpmcReceiver { rx })
    }
}

#[derive(Clone)]
pub struct MpmcSender<T> {
    tx: cbchan::Sender<T>,
}

impl<T: Send + 'static> BaseTx for MpmcSender<T> {
    type Item = T;

    #[inline]
    fn try_send(&mut self, item: T) -> Result<(), SendError<T>> {
        match self.tx.try_send(item) {
            Ok(()) => Ok(()),
            Err(cbchan::TrySendError::Full(v)) => Err(SendError::full(Some(v))),
            Err(cbchan::TrySendError::Disconnected(v)) => Err(SendError::closed(Some(v))),
        }
    }

    fn send(
        &mut self,
        mut item: T,
        cancel: &CancelToken,
        timeout: Option<Duration>,
    ) -> Result<(), SendError<T>> {
        let start = Instant::now();
        let backoff = Backoff::new();
        let mut spins: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SendError::cancelled(Some(item)));
            }
            if let Some(t) = timeout
                && start.elapsed() >= t
            {
                return Err(SendError::timeout(Some(item)));
            }

            match self.tx.try_send(item) {
                Ok(()) => return Ok(()),
                Err(cbchan::TrySendError::Full(v)) => {
                    item = v;
                    spins = spins.saturating_add(1);
                    if spins < 64 {
                        backoff.spin();
                    } else if spins < 256 {
                        backoff.snooze();
                    } else {
                        thread::sleep(Duration::from_micros(2));
                    }
                }
                Err(cbchan::TrySendError::Disconnected(v)) => {
                    return Err(SendError::closed(Some(v)));
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct MpmcReceiver<T> {
    rx: cbchan::Receiver<T>,
}

impl<T: Send + 'static> BaseRx for MpmcReceiver<T> {
    type Item = T;

    #[inline]
    fn try_recv(&mut self) -> Result<T, TryRecvError> {
        match self.rx.try_recv() {
            Ok(v) => Ok(v),
            Err(cbchan::TryRecvError::Empty) => Err(TryRecvError::Empty),
            Err(cbchan::TryRecvError::Disconnected) => Err(TryRecvError::Disconnected),
        }
    }

    fn recv(&mut self, cancel: &CancelToken, timeout: Option<Duration>) -> Result<T, RecvError> {
        let start = Instant::now();
        let backoff = Backoff::new();
        let mut spins: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RecvError::Cancelled);
            }
            if let Some(t) = timeout
                && start.elapsed() >= t
            {
                return Err(RecvError::Timeout);
            }

            match self.rx.try_recv() {
                Ok(v) => return Ok(v),
                Err(cbchan::TryRecvError::Empty) => {
                    spins = spins.saturating_add(1);
                    if spins < 64 {
                        backoff.spin();
                    } else if spins < 256 {
                        backoff.snooze();
                    } else {
                        thread::sleep(Duration::from_micros(2));
                    }
                }
                Err(cbchan::TryRecvError::Disconnected) => {
                    return Err(RecvError::Disconnected);
                }
            }
        }
    }
}
