use crate::runtime::registry::Registry;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot completion signal set by whoever executes a job.
pub(super) trait Latch {
    /// Marks the latch as set.
    ///
    /// # Safety
    ///
    /// `this` must be valid on entry. The owner may free it the moment it
    /// observes the latch as set, so implementations must not touch `this`
    /// after publishing.
    unsafe fn set(this: *const Self);
}

/// Latch awaited by a worker inside `join`. The waiting worker keeps running
/// other jobs and polls `probe`; `set` wakes it if it went to sleep.
#[derive(Debug)]
pub(super) struct SpinLatch<'r> {
    set: AtomicBool,
    registry: &'r Registry,
    owner: usize,
}

impl<'r> SpinLatch<'r> {
    pub(super) fn new(registry: &'r Registry, owner: usize) -> Self {
        Self {
            set: AtomicBool::new(false),
            registry,
            owner,
        }
    }

    #[inline]
    pub(super) fn probe(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}

impl Latch for SpinLatch<'_> {
    unsafe fn set(this: *const Self) {
        // Copy out what we need first, `this` may dangle right after the store.
        // The registry itself outlives the call: the setter is one of its
        // workers and holds an `Arc` to it.
        let (registry, owner) = unsafe { ((*this).registry, (*this).owner) };
        unsafe { (*this).set.store(true, Ordering::Release) };
        registry.wake_worker(owner);
    }
}

/// Latch awaited by a thread outside the pool, blocks on a condvar.
#[derive(Debug, Default)]
pub(super) struct LockLatch {
    done: Mutex<bool>,
    cond: Condvar,
}

impl LockLatch {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    #[cfg(test)]
    pub(super) fn probe(&self) -> bool {
        *self.done.lock()
    }
}

impl Latch for LockLatch {
    unsafe fn set(this: *const Self) {
        let this = unsafe { &*this };
        let mut done = this.done.lock();
        *done = true;
        this.cond.notify_all();
    }
}
