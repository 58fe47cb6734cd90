use crate::error::Result;
use crate::runtime::builder::PoolConfig;
use crate::runtime::job::JobRef;
use crate::runtime::queue::WorkQueue;
use crate::runtime::registry::Registry;
use crate::runtime::worker::WorkerThread;
use crate::runtime::{PoolStats, WorkerState};
use crate::task::{ForkJoin, Task};
use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::{debug, debug_span, error, warn};

/// Fixed-size pool of worker threads executing fork-join tasks.
///
/// Build one per process with [`crate::Builder`] and pass it by reference to
/// the call sites that submit work. Dropping the pool shuts it down.
#[derive(Debug)]
pub struct ThreadPool {
    registry: Arc<Registry>,
    pub(super) handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    /// Pool with one worker per available core.
    pub fn new() -> anyhow::Result<Self> {
        crate::Builder::new().try_build()
    }

    pub(super) fn spawn(cfg: PoolConfig) -> anyhow::Result<Self> {
        let num_workers = cfg.worker_threads;
        let (registry, queues) = Registry::new(cfg);

        let pool = ThreadPool {
            registry,
            handles: Mutex::new(Vec::with_capacity(num_workers)),
        };

        // On failure `pool` is dropped here, which stops the workers already
        // spawned.
        for (index, queue) in queues.into_iter().enumerate() {
            let handle = spawn_worker_thread(&pool.registry, index, queue)
                .with_context(|| format!("failed to spawn worker thread {index}"))?;

            pool.registry.register_thread(index, handle.thread().clone());
            pool.handles.lock().push(handle);
        }

        debug!(num_workers, "thread pool started");
        Ok(pool)
    }

    pub fn num_threads(&self) -> usize {
        self.registry.num_threads()
    }

    /// Index of the current thread if it is one of this pool's workers.
    pub fn current_thread_index(&self) -> Option<usize> {
        WorkerThread::with_current(|worker| {
            worker
                .filter(|w| w.belongs_to(&self.registry))
                .map(WorkerThread::index)
        })
    }

    /// Runs `op` on a worker of this pool and blocks until it returns.
    ///
    /// Called from one of this pool's workers, `op` runs inline. A panic in
    /// `op` is resumed on the calling thread.
    pub fn install<OP, R>(&self, op: OP) -> Result<R>
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        if self.registry.is_current_worker() {
            return Ok(op());
        }
        self.registry.inject_and_wait(op)
    }

    /// Runs a task tree to completion and returns the root's result.
    ///
    /// Blocks the caller until every split of the tree has been joined. The
    /// first failure of the tree is returned, a panic in a leaf or a combine
    /// becomes [`crate::Error::Panicked`].
    pub fn submit<J: ForkJoin>(&self, task: Task<'_, J>) -> Result<J::Output> {
        let range = task.range();
        range.validate()?;

        let _span = debug_span!("submit", %range, granularity = task.granularity()).entered();
        let registry = &self.registry;
        self.install(move || {
            registry.note_submission();
            task.execute()
        })?
    }

    /// Stops accepting submissions, lets accepted ones drain and joins the
    /// workers. Calling it again is a no-op.
    ///
    /// Called from one of our own workers, shutdown is only requested: a
    /// worker can't join itself, the remaining handles are joined on drop.
    pub fn shutdown(&self) -> anyhow::Result<()> {
        if self.registry.terminate() {
            debug!("thread pool shutting down");
        }

        if self.registry.is_current_worker() {
            warn!("shutdown called from a worker thread, not joining workers");
            return Ok(());
        }

        self.join_all()
    }

    pub fn is_shutdown(&self) -> bool {
        self.registry.is_shutdown()
    }

    pub fn stats(&self) -> PoolStats {
        self.registry.stats()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.registry.worker_states()
    }

    fn join_all(&self) -> anyhow::Result<()> {
        let handles = std::mem::take(&mut *self.handles.lock());

        let panicked = handles
            .into_iter()
            .filter_map(|handle| {
                let name = handle.thread().name().map(str::to_owned);
                handle.join().err().map(|_| name)
            })
            .inspect(|name| warn!(?name, "worker thread panicked"))
            .count();

        if panicked == 0 {
            Ok(())
        } else {
            Err(anyhow!("{panicked} worker thread(s) panicked"))
        }
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = ?e, "error during thread pool shutdown");
        }
    }
}

fn spawn_worker_thread(
    registry: &Arc<Registry>,
    index: usize,
    queue: WorkQueue<JobRef>,
) -> std::io::Result<thread::JoinHandle<()>> {
    let mut builder = thread::Builder::new().name((registry.cfg.thread_name.0)());

    if let Some(stack_size) = registry.cfg.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    let registry = Arc::clone(registry);
    builder.spawn(move || WorkerThread::new(index, queue, registry).main_loop())
}
