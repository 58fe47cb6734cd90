use crate::error::{Error, Result};
use crate::runtime::builder::PoolConfig;
use crate::runtime::job::{JobRef, StackJob};
use crate::runtime::latch::LockLatch;
use crate::runtime::queue::{RemoteQueue, WorkQueue};
use crate::runtime::worker::WorkerThread;
use crate::runtime::{PoolStats, WorkerState};
use crate::utils::ScopeGuard;
use crossbeam_deque::Injector;
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::Instant;
use tracing::trace;

/// Per-worker data visible to the whole pool.
#[derive(Debug, Default)]
pub(super) struct WorkerSlot {
    thread: OnceLock<Thread>,

    /// Set by whoever pops this worker off the parked list.
    should_unpark: AtomicBool,

    state: AtomicU8,
    executed: AtomicUsize,
    stolen: AtomicUsize,
    parks: AtomicUsize,
}

/// State shared by every worker of one pool and by the `ThreadPool` handle.
#[derive(Debug)]
pub(crate) struct Registry {
    pub(super) cfg: PoolConfig,

    /// Root jobs submitted from outside the pool.
    injector: Injector<JobRef>,

    /// Thief side of every worker's deque, indexed by worker.
    stealers: Vec<RemoteQueue<JobRef>>,

    slots: Vec<CachePadded<WorkerSlot>>,

    /// LIFO list of idle parked workers. The last one to park has the hottest
    /// cache so it's the first one we wake up.
    parked: Mutex<VecDeque<usize>>,
    num_parked: AtomicUsize,

    shutdown: AtomicBool,

    /// Roots accepted but not yet resolved. Workers only exit once shutdown
    /// is requested and this drops to 0.
    pending_roots: AtomicUsize,

    /// Orders "check shutdown + count the root" in submitters against
    /// "set shutdown" in `terminate`.
    gate: RwLock<()>,

    roots_submitted: AtomicUsize,
}

impl Registry {
    pub(super) fn new(cfg: PoolConfig) -> (Arc<Registry>, Vec<WorkQueue<JobRef>>) {
        let num_workers = cfg.worker_threads;

        let queues = (0..num_workers)
            .map(|_| WorkQueue::new())
            .collect::<Vec<_>>();
        let stealers = queues.iter().map(WorkQueue::remote).collect();
        let slots = (0..num_workers)
            .map(|_| CachePadded::new(WorkerSlot::default()))
            .collect();

        let registry = Arc::new(Registry {
            cfg,
            injector: Injector::new(),
            stealers,
            slots,
            parked: Mutex::new(VecDeque::with_capacity(num_workers)),
            num_parked: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            pending_roots: AtomicUsize::new(0),
            gate: RwLock::new(()),
            roots_submitted: AtomicUsize::new(0),
        });

        (registry, queues)
    }

    pub(super) fn num_threads(&self) -> usize {
        self.slots.len()
    }

    pub(super) fn register_thread(&self, index: usize, thread: Thread) {
        // Only the spawner sets this, once per worker.
        let _ = self.slots[index].thread.set(thread);
    }

    pub(super) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub(super) fn should_exit(&self) -> bool {
        self.is_shutdown() && self.pending_roots.load(Ordering::SeqCst) == 0
    }

    /// Requests shutdown and wakes every parked worker. Returns false if
    /// shutdown was already requested.
    pub(super) fn terminate(&self) -> bool {
        let first = {
            let _gate = self.gate.write();
            !self.shutdown.swap(true, Ordering::SeqCst)
        };

        self.unpark_all();
        first
    }

    // --- Submission ---

    pub(super) fn note_submission(&self) {
        self.roots_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Runs `op` on one of our workers and blocks the calling thread, which
    /// is not a worker of this pool, until it returns.
    pub(super) fn inject_and_wait<OP, R>(&self, op: OP) -> Result<R>
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        {
            let _gate = self.gate.read();
            if self.is_shutdown() {
                return Err(Error::PoolShutdown);
            }
            self.pending_roots.fetch_add(1, Ordering::SeqCst);
        }

        // Runs on the way out even when `op` panicked and we resume it below.
        let _pending = ScopeGuard::new(|| self.root_resolved());

        let job = StackJob::new(op, LockLatch::new());
        // Safety: `job` outlives its execution, we block on its latch below.
        self.injector.push(unsafe { job.as_job_ref() });
        self.wake_any();

        job.latch().wait();
        // Safety: the latch is set.
        Ok(unsafe { job.into_result() })
    }

    fn root_resolved(&self) {
        if self.pending_roots.fetch_sub(1, Ordering::SeqCst) == 1 && self.is_shutdown() {
            // Last root drained, let the workers observe `should_exit`.
            self.unpark_all();
        }
    }

    // --- Work discovery ---

    pub(super) fn take_injected(&self, queue: &WorkQueue<JobRef>) -> Option<JobRef> {
        queue.steal_batch_from(&self.injector, self.cfg.max_steal_retries)
    }

    /// Tries every other worker once, starting from a random victim and
    /// walking round-robin.
    pub(super) fn steal_for(&self, thief: usize) -> Option<JobRef> {
        let num_workers = self.stealers.len();
        if num_workers < 2 {
            return None;
        }

        let start = fastrand::usize(..num_workers);
        let job = (start..num_workers)
            .chain(0..start)
            .filter(|&victim| victim != thief)
            .find_map(|victim| {
                self.stealers[victim]
                    .pop_remote(self.cfg.max_steal_retries)
                    .inspect(|_| trace!(thief, victim, "stole job"))
            })?;

        self.slots[thief].stolen.fetch_add(1, Ordering::Relaxed);
        Some(job)
    }

    // --- Parking ---

    /// Parks an idle worker until it is woken up or `park_timeout` elapses.
    ///
    /// Pushes to peers' deques are not checked under the parked lock, so a
    /// wakeup can be missed. The timeout bounds how long such work waits.
    pub(super) fn park_worker(&self, index: usize) {
        let slot = &self.slots[index];
        {
            let mut parked = self.parked.lock();
            if !self.injector.is_empty() || self.should_exit() {
                return;
            }

            slot.should_unpark.store(false, Ordering::Release);
            parked.push_back(index);
            self.num_parked.fetch_add(1, Ordering::SeqCst);
        }

        self.set_state(index, WorkerState::Idle);
        slot.parks.fetch_add(1, Ordering::Relaxed);
        trace!(worker = index, "parking");

        let deadline = Instant::now() + self.cfg.park_timeout;
        while !slot.should_unpark.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                self.unlist_parked(index);
                return;
            }
            thread::park_timeout(deadline - now);
        }
    }

    fn unlist_parked(&self, index: usize) {
        let mut parked = self.parked.lock();
        if let Some(pos) = parked.iter().position(|&i| i == index) {
            parked.remove(pos);
            self.num_parked.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Wakes the most recently parked worker, if any.
    pub(super) fn wake_any(&self) -> bool {
        if self.num_parked.load(Ordering::SeqCst) == 0 {
            return false;
        }

        let index = {
            let mut parked = self.parked.lock();
            let Some(index) = parked.pop_back() else {
                return false;
            };
            self.num_parked.fetch_sub(1, Ordering::SeqCst);
            index
        };

        self.slots[index].should_unpark.store(true, Ordering::Release);
        self.wake_worker(index);
        true
    }

    pub(super) fn unpark_all(&self) -> usize {
        let mut parked = self.parked.lock();
        let mut num_unparked = 0;

        while let Some(index) = parked.pop_back() {
            num_unparked += 1;
            self.num_parked.fetch_sub(1, Ordering::SeqCst);
            self.slots[index].should_unpark.store(true, Ordering::Release);
            self.wake_worker(index);
        }

        num_unparked
    }

    /// Unparks a worker's thread, parked or not. Also used to wake a worker
    /// sleeping inside `join` once its latch is set.
    pub(super) fn wake_worker(&self, index: usize) {
        if let Some(thread) = self.slots[index].thread.get() {
            thread.unpark();
        }
    }

    // --- Observability ---

    pub(super) fn set_state(&self, index: usize, state: WorkerState) {
        self.slots[index].state.store(state as u8, Ordering::Relaxed);
    }

    pub(super) fn note_executed(&self, index: usize) {
        self.slots[index].executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn worker_states(&self) -> Vec<WorkerState> {
        self.slots
            .iter()
            .map(|slot| WorkerState::from(slot.state.load(Ordering::Relaxed)))
            .collect()
    }

    pub(super) fn stats(&self) -> PoolStats {
        let sum = |f: fn(&WorkerSlot) -> &AtomicUsize| {
            self.slots
                .iter()
                .map(|slot| f(slot).load(Ordering::Relaxed))
                .sum::<usize>()
        };

        PoolStats {
            jobs_executed: sum(|s| &s.executed),
            jobs_stolen: sum(|s| &s.stolen),
            parks: sum(|s| &s.parks),
            roots_submitted: self.roots_submitted.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub(super) fn num_parked(&self) -> usize {
        self.parked.lock().len()
    }

    /// True if the current thread is one of our workers.
    pub(super) fn is_current_worker(self: &Arc<Self>) -> bool {
        WorkerThread::with_current(|worker| worker.is_some_and(|w| w.belongs_to(self)))
    }
}
