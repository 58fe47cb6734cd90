//! Benchmark workloads for `forkpool`.
//!
//! Every workload comes as a sequential reference and a pool variant driven by
//! [`forkpool::ThreadPool::submit`] (or [`forkpool::join`] for quicksort). The
//! harness in `src/bin/main.rs` runs both on the same seeded input, checks they
//! agree and prints the timings.

pub mod data;

mod error;
pub use error::VerifyError;

pub mod workloads;
pub use workloads::{Report, Workload};
