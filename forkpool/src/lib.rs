//! Fork-join thread pool with per-worker deques and work stealing.
//!
//! Implement [`ForkJoin`] for your algorithm, wrap the input region in a
//! [`Task`] with a granularity, and hand it to [`ThreadPool::submit`]:
//!
//! ```no_run
//! use forkpool::{ForkJoin, Task, TaskRange, ThreadPool};
//!
//! struct Sum<'a>(&'a [i64]);
//!
//! impl ForkJoin for Sum<'_> {
//!     type Part = TaskRange;
//!     type Output = i64;
//!
//!     fn compute_base(&self, part: TaskRange) -> anyhow::Result<i64> {
//!         Ok(self.0[part.as_range()].iter().sum())
//!     }
//!
//!     fn combine(&self, left: i64, right: i64) -> anyhow::Result<i64> {
//!         Ok(left + right)
//!     }
//! }
//!
//! let data = (1..=1_000).collect::<Vec<i64>>();
//! let pool = ThreadPool::new()?;
//! let job = Sum(&data);
//! let total = pool.submit(Task::new(&job, TaskRange::new(0, data.len()), 100))?;
//! assert_eq!(total, 500_500);
//! # Ok::<(), anyhow::Error>(())
//! ```

#[doc(inline)]
pub use forkpool_macros::test;

pub mod buffer;
pub use buffer::{Rows, SliceMut};

mod error;
pub use error::{Error, Result};

pub mod runtime;
pub use runtime::{
    Builder, PoolStats, ThreadPool, WorkerState, current_num_threads, current_thread_index, join,
    submit,
};

pub mod task;
pub use task::{ForkJoin, Splittable, Task, TaskRange, TaskState};

mod utils;

#[cfg(test)]
mod test_utils;
