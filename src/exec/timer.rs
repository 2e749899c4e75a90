use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::block::{BlockAddr, ResourceId};
use crate::control::QueuedEvent;
use crate::exec::ExecutorHandle;
use crate::spec::PortId;

/// One timed re-delivery request: which event input to re-inject, and the
/// executor handle captured at registration time.
pub struct TimerEntry {
    pub(crate) addr: BlockAddr,
    pub(crate) event: PortId,
    pub(crate) executor: ExecutorHandle,
}

struct Scheduled {
    due: Instant,
    /// Registration order, used to break ties between equal deadlines.
    seq: u64,
    entry: TimerEntry,
}

#[derive(Default)]
struct TimerState {
    queue: Vec<Scheduled>,
    next_seq: u64,
    shutdown: bool,
}

struct TimerInner {
    state: Mutex<TimerState>,
    cv: Condvar,
}

/// Device-wide timer service, one thread per device.
///
/// Keeps at most one pending entry per block: re-registering replaces the
/// existing entry and restarts its deadline. Due entries fire in deadline
/// order; equal deadlines fire in registration order.
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<TimerInner>,
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState::default()),
                cv: Condvar::new(),
            }),
        }
    }

    /// Schedules `entry` to fire after `delay`. Any pending entry for the
    /// same block is replaced.
    pub(crate) fn register_timed_fb(&self, entry: TimerEntry, delay: Duration) {
        let due = Instant::now() + delay;
        let mut state = self.inner.state.lock();
        state.queue.retain(|s| s.entry.addr != entry.addr);
        let seq = state.next_seq;
        state.next_seq += 1;
        let pos = state
            .queue
            .partition_point(|s| (s.due, s.seq) <= (due, seq));
        state.queue.insert(pos, Scheduled { due, seq, entry });
        self.inner.cv.notify_one();
    }

    /// Removes any pending entry for `addr`. Idempotent; a no-op when the
    /// block has nothing registered.
    pub(crate) fn unregister_timed_fb(&self, addr: BlockAddr) {
        let mut state = self.inner.state.lock();
        state.queue.retain(|s| s.entry.addr != addr);
    }

    /// Removes every pending entry owned by blocks of `resource`.
    pub(crate) fn unregister_resource(&self, resource: ResourceId) {
        let mut state = self.inner.state.lock();
        state.queue.retain(|s| s.entry.addr.resource != resource);
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Spawns the timer thread. The thread sleeps until the earliest
    /// deadline, fires every due entry through its captured executor, and
    /// exits on [`TimerService::shutdown`].
    pub fn spawn(&self) -> std::io::Result<JoinHandle<()>> {
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("fbrt-timer".to_string())
            .spawn(move || {
                tracing::debug!("timer thread started");
                let mut state = inner.state.lock();
                loop {
                    if state.shutdown {
                        break;
                    }
                    let now = Instant::now();
                    while let Some(first) = state.queue.first()
                        && first.due <= now
                    {
                        let Scheduled { mut entry, .. } = state.queue.remove(0);
                        let event = QueuedEvent {
                            block: entry.addr.block,
                            input: entry.event,
                        };
                        if let Err(err) = entry.executor.deliver(event) {
                            tracing::warn!(block = %entry.addr, %err, "timed event dropped");
                        }
                    }
                    match state.queue.first().map(|s| s.due) {
                        Some(due) => {
                            inner.cv.wait_until(&mut state, due);
                        }
                        None => inner.cv.wait(&mut state),
                    }
                }
                tracing::debug!("timer thread stopped");
            })
    }

    /// Asks the timer thread to exit. Pending entries are discarded.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        state.shutdown = true;
        state.queue.clear();
        self.inner.cv.notify_all();
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockId;
    use crate::io::base::BaseRx;
    use crate::io::MpmcChannel;
    use crate::utils::CancelToken;

    fn addr(resource: usize, block: usize) -> BlockAddr {
        BlockAddr {
            resource: ResourceId(resource),
            block: BlockId(block),
        }
    }

    fn entry(addr: BlockAddr, event: PortId, executor: &ExecutorHandle) -> TimerEntry {
        TimerEntry {
            addr,
            event,
            executor: executor.clone(),
        }
    }

    #[test]
    fn reregistration_replaces_pending_entry() {
        let timer = TimerService::new();
        let (tx, _rx) = MpmcChannel::bounded::<QueuedEvent>(8);
        let exec = ExecutorHandle::new(tx);

        timer.register_timed_fb(entry(addr(0, 0), 0, &exec), Duration::from_secs(60));
        timer.register_timed_fb(entry(addr(0, 0), 1, &exec), Duration::from_secs(60));
        assert_eq!(timer.pending(), 1);

        timer.register_timed_fb(entry(addr(0, 1), 0, &exec), Duration::from_secs(60));
        assert_eq!(timer.pending(), 2);
    }

    #[test]
    fn unregister_is_idempotent() {
        let timer = TimerService::new();
        let (tx, _rx) = MpmcChannel::bounded::<QueuedEvent>(8);
        let exec = ExecutorHandle::new(tx);

        timer.unregister_timed_fb(addr(0, 0));
        timer.register_timed_fb(entry(addr(0, 0), 0, &exec), Duration::from_secs(60));
        timer.unregister_timed_fb(addr(0, 0));
        timer.unregister_timed_fb(addr(0, 0));
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn zero_delay_fires_through_captured_executor() {
        let timer = TimerService::new();
        let (tx, mut rx) = MpmcChannel::bounded::<QueuedEvent>(8);
        let exec = ExecutorHandle::new(tx);
        let join = timer.spawn().unwrap();

        timer.register_timed_fb(entry(addr(0, 3), 2, &exec), Duration::ZERO);

        let cancel = CancelToken::new_root();
        let got = rx.recv(&cancel, Some(Duration::from_secs(2))).unwrap();
        assert_eq!(got.block, BlockId(3));
        assert_eq!(got.input, 2);

        timer.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn equal_deadlines_fire_in_registration_order() {
        let timer = TimerService::new();
        let (tx, mut rx) = MpmcChannel::bounded::<QueuedEvent>(8);
        let exec = ExecutorHandle::new(tx);

        timer.register_timed_fb(entry(addr(0, 0), 0, &exec), Duration::from_millis(20));
        timer.register_timed_fb(entry(addr(0, 1), 0, &exec), Duration::from_millis(20));
        timer.register_timed_fb(entry(addr(0, 2), 0, &exec), Duration::from_millis(5));

        let join = timer.spawn().unwrap();
        let cancel = CancelToken::new_root();
        let mut order = Vec::new();
        for _ in 0..3 {
            let got = rx.recv(&cancel, Some(Duration::from_secs(2))).unwrap();
            order.push(got.block.0);
        }
        assert_eq!(order, vec![2, 0, 1]);

        timer.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn resource_teardown_drops_owned_entries() {
        let timer = TimerService::new();
        let (tx, _rx) = MpmcChannel::bounded::<QueuedEvent>(8);
        let exec = ExecutorHandle::new(tx);

        timer.register_timed_fb(entry(addr(0, 0), 0, &exec), Duration::from_secs(60));
        timer.register_timed_fb(entry(addr(1, 0), 0, &exec), Duration::from_secs(60));
        timer.unregister_resource(ResourceId(0));
        assert_eq!(timer.pending(), 1);
    }
}
