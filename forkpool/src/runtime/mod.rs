mod builder;
pub use builder::Builder;

mod job;

mod join;
pub use join::join;

mod latch;

mod pool;
pub use pool::ThreadPool;

mod queue;

mod registry;

mod worker;
use worker::WorkerThread;

use crate::error::{Error, Result};
use crate::task::{ForkJoin, Task};

/// What a worker is doing right now, as last reported by the worker itself.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    #[default]
    Idle = 0,
    Executing = 1,
    Stealing = 2,
    Stopped = 3,
}

impl From<u8> for WorkerState {
    fn from(val: u8) -> Self {
        match val {
            1 => WorkerState::Executing,
            2 => WorkerState::Stealing,
            3 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

/// Counters aggregated over all workers since the pool was built.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub jobs_executed: usize,
    pub jobs_stolen: usize,
    pub parks: usize,
    pub roots_submitted: usize,
}

/// Runs `task` on the pool owning the current thread and returns its result.
///
/// Meant for nested submissions from inside a running job: the task runs
/// inline on the calling worker, its forks are stolen by idle peers as usual.
/// Fails with [`Error::NoActivePool`] when called outside a pool.
pub fn submit<J: ForkJoin>(task: Task<'_, J>) -> Result<J::Output> {
    task.range().validate()?;

    WorkerThread::with_current(|worker| match worker {
        Some(worker) => {
            worker.registry().note_submission();
            task.execute()
        }
        None => Err(Error::NoActivePool),
    })
}

/// Index of the current worker in its pool, `None` outside a pool.
pub fn current_thread_index() -> Option<usize> {
    WorkerThread::with_current(|worker| worker.map(WorkerThread::index))
}

/// Size of the pool owning the current thread, `None` outside a pool.
pub fn current_num_threads() -> Option<usize> {
    WorkerThread::with_current(|worker| worker.map(|w| w.registry().num_threads()))
}

#[cfg(test)]
mod tests;
