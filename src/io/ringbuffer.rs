use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use ringbuf::consumer::Consumer;
use ringbuf::producer::Producer;
use ringbuf::traits::Split;
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::error::{RecvError, SendError, TryRecvError};
use crate::io::base::{BaseRx, BaseTx};
use crate::utils::CancelToken;

/// Bounded SPSC ring used for the single-producer command lane between a
/// device and one resource thread.
pub struct RingBuffer;

impl RingBuffer {
    pub fn bounded<T>(capacity: usize) -> (RingSender<T>, RingReceiver<T>) {
        let rb = HeapRb::<T>::new(capacity);
        let (prod, cons) = rb.split();
        (RingSender { prod }, RingReceiver { cons })
    }
}

pub struct RingSender<T> {
    prod: HeapProd<T>,
}

impl<T: Send + 'static> BaseTx for RingSender<T> {
    type Item = T;

    #[inline]
    fn try_send(&mut self, item: T) -> Result<(), SendError<T>> {
        self.prod
            .try_push(item)
            .map_err(|v| SendError::full(Some(v)))
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

            match self.prod.try_push(item) {
                Ok(()) => return Ok(()),
                Err(v) => {
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
            }
        }
    }
}

pub struct RingReceiver<T> {
    cons: HeapCons<T>,
}

impl<T: Send + 'static> BaseRx for RingReceiver<T> {
    type Item = T;

    #[inline]
    fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.cons.try_pop().ok_or(TryRecvError::Empty)
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

            match self.cons.try_pop() {
                Some(item) => return Ok(item),
                None => {
                    spins = spins.saturating_add(1);
                    if spins < 64 {
                        backoff.spin();
                    } else if spins < 256 {
                        backoff.snooze();
                    } else {
                        thread::sleep(Duration::from_micros(2));
                    }
                }
            }
        }
    }
}
