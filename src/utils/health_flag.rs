use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::CachePadded;

/// Cheaply clonable liveness flag for a resource thread.
/// Padded to avoid false sharing on the hot path.
#[derive(Clone)]
#[repr(transparent)]
pub struct HealthFlag(Arc<CachePadded<AtomicBool>>);

impl HealthFlag {
    #[inline]
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(CachePadded::new(AtomicBool::new(initial))))
    }

    #[inline(always)]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn set(&self, v: bool) {
        self.0.store(v, Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn up(&self) {
        self.set(true);
    }

    #[inline(always)]
    pub fn down(&self) {
        self.set(false);
    }
}

impl fmt::Debug for HealthFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthFlag").field("value", &self.get()).finish()
    }
}
