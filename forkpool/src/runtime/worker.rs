use crate::runtime::WorkerState;
use crate::runtime::job::JobRef;
use crate::runtime::latch::SpinLatch;
use crate::runtime::queue::WorkQueue;
use crate::runtime::registry::Registry;
use crate::utils::ScopeGuard;
use crossbeam_utils::Backoff;
use std::cell::Cell;
use std::ptr;
use std::sync::Arc;
use std::thread;
use tracing::debug;

thread_local! {
    // Points at the `WorkerThread` living on this thread's stack while its
    // main loop runs, null otherwise.
    static WORKER_THREAD: Cell<*const WorkerThread> = const { Cell::new(ptr::null()) };
}

#[derive(Debug)]
pub(crate) struct WorkerThread {
    index: usize,
    queue: WorkQueue<JobRef>,
    registry: Arc<Registry>,
}

impl WorkerThread {
    pub(super) fn new(index: usize, queue: WorkQueue<JobRef>, registry: Arc<Registry>) -> Self {
        Self {
            index,
            queue,
            registry,
        }
    }

    /// Calls `f` with the worker running on the current thread, if any.
    pub(crate) fn with_current<R>(f: impl FnOnce(Option<&WorkerThread>) -> R) -> R {
        let worker = WORKER_THREAD.with(Cell::get);
        // Safety: the pointer is only non-null while `main_loop` runs, and the
        // worker outlives that call.
        f(unsafe { worker.as_ref() })
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub(crate) fn belongs_to(&self, registry: &Arc<Registry>) -> bool {
        Arc::ptr_eq(&self.registry, registry)
    }

    /// Pushes a job on our deque, where peers may steal it.
    pub(super) fn push(&self, job: JobRef) {
        self.queue.push_local(job);
        self.registry.wake_any();
    }

    pub(super) fn take_local(&self) -> Option<JobRef> {
        self.queue.pop_local()
    }

    /// Local deque first, then peers, then the global injector.
    fn find_task(&self) -> Option<JobRef> {
        self.queue.pop_local().or_else(|| {
            self.registry.set_state(self.index, WorkerState::Stealing);
            self.registry
                .steal_for(self.index)
                .or_else(|| self.registry.take_injected(&self.queue))
        })
    }

    pub(super) fn execute(&self, job: JobRef) {
        self.registry.set_state(self.index, WorkerState::Executing);
        // Counted first: running the job may release a blocked submitter.
        self.registry.note_executed(self.index);
        // Safety: each `JobRef` is popped by exactly one worker.
        unsafe { job.execute() };
    }

    /// Keeps running other jobs until `latch` is set. Sleeps briefly when
    /// there is nothing to do, `SpinLatch::set` wakes us up early.
    pub(super) fn wait_until(&self, latch: &SpinLatch<'_>) {
        let backoff = Backoff::new();

        while !latch.probe() {
            if let Some(job) = self.find_task() {
                self.execute(job);
                backoff.reset();
            } else if backoff.is_completed() {
                self.registry.set_state(self.index, WorkerState::Idle);
                thread::park_timeout(self.registry.cfg.park_timeout);
            } else {
                backoff.snooze();
            }
        }
    }

    pub(super) fn main_loop(self) {
        WORKER_THREAD.with(|current| current.set(&self));
        let _reset = ScopeGuard::new(|| WORKER_THREAD.with(|current| current.set(ptr::null())));
        debug!(worker = self.index, "worker started");

        let backoff = Backoff::new();
        loop {
            if let Some(job) = self.find_task() {
                self.execute(job);
                backoff.reset();
                continue;
            }

            if self.registry.should_exit() {
                break;
            }

            if backoff.is_completed() {
                self.registry.park_worker(self.index);
                backoff.reset();
            } else {
                self.registry.set_state(self.index, WorkerState::Idle);
                backoff.snooze();
            }
        }

        debug_assert!(self.queue.is_empty(), "worker exiting with queued jobs");
        self.registry.set_state(self.index, WorkerState::Stopped);
        debug!(worker = self.index, "worker stopped");
    }
}
