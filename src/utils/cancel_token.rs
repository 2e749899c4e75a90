use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

struct CancelState {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelState>>,
}

impl CancelState {
    #[inline]
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match &self.parent {
            Some(p) => p.is_cancelled(),
            None => false,
        }
    }
}

/// Hierarchical cancellation token.
///
/// Cheap to clone and check. Cancelling a parent cancels all of its
/// descendants: the device holds the root, each resource a child.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    #[inline]
    pub fn new_root() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Child token linked to this one.
    #[inline]
    pub fn new_child(&self) -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                parent: Some(self.state.clone()),
            }),
        }
    }

    #[inline]
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Sleeps until cancelled or `total` elapsed; false when cancelled.
    pub fn sleep_cancellable(&self, total: Duration) -> bool {
        let tick = Duration::from_millis(50);
        let mut slept = Duration::ZERO;
        while slept < total {
            if self.is_cancelled() {
                return false;
            }
            std::thread::sleep(tick.min(total - slept));
            slept += tick;
        }
        !self.is_cancelled()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_cancellation_reaches_children() {
        let root = CancelToken::new_root();
        let child = root.new_child();
        assert!(!child.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn child_cancellation_stays_local() {
        let root = CancelToken::new_root();
        let child = root.new_child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }
}
