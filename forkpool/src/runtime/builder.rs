use crate::runtime::ThreadPool;
use anyhow::Result;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Maximum number of attempts on a contended deque before moving on.
const MAX_STEAL_RETRIES: usize = 3;

/// How long an idle worker sleeps before scanning for work again, when
/// nobody woke it up.
const PARK_TIMEOUT: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub(crate) struct ThreadNameFn(pub(crate) Arc<dyn Fn() -> String + Send + Sync + 'static>);

fn default_thread_name_fn() -> ThreadNameFn {
    let worker_count = Arc::new(AtomicUsize::new(0));

    ThreadNameFn(Arc::new(move || {
        let id = worker_count.fetch_add(1, Ordering::Relaxed);
        format!("forkpool-{id}")
    }))
}

impl fmt::Debug for ThreadNameFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadNameFn").field(&"<function>").finish()
    }
}

/// Configures and builds a [`ThreadPool`].
///
/// ```no_run
/// let pool = forkpool::Builder::new()
///     .worker_threads(4)
///     .thread_name("sorter")
///     .try_build()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Builder {
    /// Number of workers, fixed for the lifetime of the pool. Defaults to the
    /// available parallelism of the machine.
    worker_threads: Option<usize>,

    thread_name: ThreadNameFn,

    thread_stack_size: Option<usize>,

    /// Attempts made on a contended deque or on the injector before giving up
    /// on it for this round.
    max_steal_retries: usize,

    /// Upper bound on how long an idle worker sleeps between scans.
    park_timeout: Duration,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            worker_threads: None,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
            max_steal_retries: MAX_STEAL_RETRIES,
            park_timeout: PARK_TIMEOUT,
        }
    }

    /// Number of worker threads.
    ///
    /// Defaults to [`std::thread::available_parallelism`].
    #[track_caller]
    pub fn worker_threads(mut self, val: usize) -> Self {
        assert!(val > 0, "worker_threads must be greater than 0");
        self.worker_threads = Some(val);
        self
    }

    /// Sets the name of every worker thread.
    ///
    /// The default name is "forkpool-{id}", where id is monotonically
    /// increasing.
    pub fn thread_name(mut self, val: impl Into<String>) -> Self {
        let val = val.into();
        self.thread_name = ThreadNameFn(Arc::new(move || val.clone()));
        self
    }

    /// Sets a function used to generate worker thread names.
    pub fn thread_name_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = ThreadNameFn(Arc::new(f));
        self
    }

    /// Sets the stack size (in bytes) for worker threads. Deep fork trees
    /// recurse on the worker stack, raise this for very small granularities.
    #[track_caller]
    pub fn thread_stack_size(mut self, val: usize) -> Self {
        assert!(
            val.is_power_of_two(),
            "thread_stack_size must be a power of two"
        );
        self.thread_stack_size = Some(val);
        self
    }

    #[track_caller]
    pub fn max_steal_retries(mut self, val: usize) -> Self {
        assert!(val > 0, "max_steal_retries must be greater than 0");
        self.max_steal_retries = val;
        self
    }

    #[track_caller]
    pub fn park_timeout(mut self, val: Duration) -> Self {
        assert!(!val.is_zero(), "park_timeout must be greater than 0");
        self.park_timeout = val;
        self
    }

    /// Spawns the workers. The returned pool is ready to accept submissions.
    pub fn try_build(self) -> Result<ThreadPool> {
        let cfg = PoolConfig::try_from(self)?;
        ThreadPool::spawn(cfg)
    }
}

/// Validated `Builder`, shared by the pool and its workers.
#[derive(Debug, Clone)]
pub(crate) struct PoolConfig {
    pub(crate) worker_threads: usize,
    pub(crate) thread_name: ThreadNameFn,
    pub(crate) thread_stack_size: Option<usize>,
    pub(crate) max_steal_retries: usize,
    pub(crate) park_timeout: Duration,
}

impl TryFrom<Builder> for PoolConfig {
    type Error = anyhow::Error;

    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        let worker_threads = match builder.worker_threads {
            Some(n) => n,
            None => thread::available_parallelism()?.get(),
        };

        Ok(PoolConfig {
            worker_threads,
            thread_name: builder.thread_name,
            thread_stack_size: builder.thread_stack_size,
            max_steal_retries: builder.max_steal_retries,
            park_timeout: builder.park_timeout,
        })
    }
}
