//! The benchmark workloads and a runner timing each one against its
//! sequential reference.

pub mod blur;
pub mod concat;
pub mod knn;
pub mod logistic;
pub mod matmul;
pub mod min;
pub mod sort;
pub mod sum;

use crate::VerifyError;
use crate::data::{self, Point};
use forkpool::ThreadPool;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const KNN_K: usize = 5;
const LOGISTIC_FEATURES: usize = 8;
const LOGISTIC_EPOCHS: usize = 10;
const LOGISTIC_LEARNING_RATE: f64 = 0.01;
const BLUR_RADIUS: usize = 2;
const FLOAT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Workload {
    Sum,
    Min,
    Concat,
    MergeSort,
    Quicksort,
    Matmul,
    Knn,
    Logistic,
    Blur,
}

impl Workload {
    pub const ALL: [Workload; 9] = [
        Workload::Sum,
        Workload::Min,
        Workload::Concat,
        Workload::MergeSort,
        Workload::Quicksort,
        Workload::Matmul,
        Workload::Knn,
        Workload::Logistic,
        Workload::Blur,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Workload::Sum => "sum",
            Workload::Min => "min",
            Workload::Concat => "concat",
            Workload::MergeSort => "merge-sort",
            Workload::Quicksort => "quicksort",
            Workload::Matmul => "matmul",
            Workload::Knn => "knn",
            Workload::Logistic => "logistic",
            Workload::Blur => "blur",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Timings of one run of a workload.
#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub workload: Workload,
    pub size: usize,
    pub sequential: Duration,
    pub parallel: Duration,
}

impl Report {
    pub fn speedup(&self) -> f64 {
        self.sequential.as_secs_f64() / self.parallel.as_secs_f64().max(f64::EPSILON)
    }
}

/// Generates the input of `workload` from `seed`, runs the sequential and the
/// pool variant on it and checks they agree.
///
/// `size` counts input elements: matrices and images are `sqrt(size)` wide,
/// k-NN trains on `size` points and logistic regression on `size` samples.
pub fn run(
    pool: &ThreadPool,
    workload: Workload,
    size: usize,
    seed: u64,
) -> anyhow::Result<Report> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let side = size.isqrt();
    debug!(%workload, size, seed, "generating input");

    let (sequential, parallel) = match workload {
        Workload::Sum => {
            let input = data::ints(&mut rng, size);
            compare(workload, || sum::sum_sequential(&input), || {
                sum::sum_parallel(pool, &input)
            })?
        }
        Workload::Min => {
            let input = data::ints(&mut rng, size);
            compare(workload, || min::min_sequential(&input), || {
                min::min_parallel(pool, &input)
            })?
        }
        Workload::Concat => {
            let input = data::words(&mut rng, size);
            compare(workload, || concat::concat_sequential(&input), || {
                concat::concat_parallel(pool, &input)
            })?
        }
        Workload::MergeSort => {
            let input = data::ints(&mut rng, size);
            compare(
                workload,
                || sorted_with(&input, sort::merge_sort_sequential),
                || {
                    let mut out = input.clone();
                    sort::merge_sort_parallel(pool, &mut out).map(|()| out)
                },
            )?
        }
        Workload::Quicksort => {
            let input = data::ints(&mut rng, size);
            compare(
                workload,
                || sorted_with(&input, sort::quicksort_sequential),
                || {
                    let mut out = input.clone();
                    sort::quicksort_parallel(pool, &mut out).map(|()| out)
                },
            )?
        }
        Workload::Matmul => {
            let a = data::square_matrix(&mut rng, side);
            let b = data::square_matrix(&mut rng, side);
            compare(workload, || matmul::matmul_sequential(&a, &b, side), || {
                matmul::matmul_parallel(pool, &a, &b, side, matmul::THRESHOLD)
            })?
        }
        Workload::Knn => {
            let training = data::points(&mut rng, size);
            let query = Point {
                x: 50.0,
                y: 50.0,
                label: 0,
            };
            compare(
                workload,
                || knn::classify_sequential(&training, query, KNN_K),
                || knn::classify_parallel(pool, &training, query, KNN_K),
            )?
        }
        Workload::Logistic => {
            let samples = data::samples(&mut rng, size, LOGISTIC_FEATURES);
            let (seq, par, timings) = timed(
                || logistic::train_sequential(&samples, LOGISTIC_LEARNING_RATE, LOGISTIC_EPOCHS),
                || {
                    logistic::train_parallel(
                        pool,
                        &samples,
                        LOGISTIC_LEARNING_RATE,
                        LOGISTIC_EPOCHS,
                    )
                },
            )?;
            if !approx_eq(&seq, &par, FLOAT_TOLERANCE) {
                return Err(VerifyError::new(workload.name(), format!("{seq:?} != {par:?}")).into());
            }
            timings
        }
        Workload::Blur => {
            let image = data::image(&mut rng, side, side);
            compare(
                workload,
                || blur::blur_sequential(&image, BLUR_RADIUS),
                || blur::blur_parallel(pool, &image, BLUR_RADIUS),
            )?
        }
    };

    let report = Report {
        workload,
        size,
        sequential,
        parallel,
    };
    info!(
        %workload,
        size,
        sequential_ms = sequential.as_secs_f64() * 1e3,
        parallel_ms = parallel.as_secs_f64() * 1e3,
        speedup = report.speedup(),
        "workload verified"
    );
    Ok(report)
}

fn sorted_with(input: &[i32], sort: impl FnOnce(&mut [i32])) -> Vec<i32> {
    let mut out = input.to_vec();
    sort(&mut out);
    out
}

/// Runs both variants and returns their outputs with the elapsed times.
fn timed<T>(
    sequential: impl FnOnce() -> T,
    parallel: impl FnOnce() -> forkpool::Result<T>,
) -> anyhow::Result<(T, T, (Duration, Duration))> {
    let start = Instant::now();
    let seq = sequential();
    let seq_elapsed = start.elapsed();

    let start = Instant::now();
    let par = parallel()?;
    let par_elapsed = start.elapsed();

    Ok((seq, par, (seq_elapsed, par_elapsed)))
}

fn compare<T: PartialEq + fmt::Debug>(
    workload: Workload,
    sequential: impl FnOnce() -> T,
    parallel: impl FnOnce() -> forkpool::Result<T>,
) -> anyhow::Result<(Duration, Duration)> {
    let (seq, par, timings) = timed(sequential, parallel)?;
    if seq != par {
        let detail = format!("{:.80}", format!("{seq:?} != {par:?}"));
        return Err(VerifyError::new(workload.name(), detail).into());
    }
    Ok(timings)
}

/// Element-wise comparison with a tolerance relative to the magnitude of the
/// values, floating point sums depend on the order of the additions.
pub fn approx_eq(a: &[f64], b: &[f64], tolerance: f64) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= tolerance * x.abs().max(y.abs()).max(1.0))
}

#[cfg(test)]
pub(crate) fn test_pool(worker_threads: usize) -> anyhow::Result<ThreadPool> {
    forkpool::Builder::new()
        .worker_threads(worker_threads)
        .thread_name("bench-test")
        .try_build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_every_workload_verifies(
        #[values(1, 3)] threads: usize,
        #[values(0, 1, 4_096)] size: usize,
    ) -> anyhow::Result<()> {
        let pool = test_pool(threads)?;
        for workload in Workload::ALL {
            let report = run(&pool, workload, size, 17)?;
            assert_eq!(report.workload, workload);
        }
        Ok(())
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(&[1.0, 1e6], &[1.0 + 1e-12, 1e6 + 1e-5], 1e-9));
        assert!(!approx_eq(&[1.0], &[1.1], 1e-9));
        assert!(!approx_eq(&[1.0], &[], 1e-9));
    }

    #[test]
    fn test_names_match_cli_values() {
        use clap::ValueEnum;

        for workload in Workload::ALL {
            let value = workload.to_possible_value().map(|v| v.get_name().to_owned());
            assert_eq!(value.as_deref(), Some(workload.name()));
        }
    }
}
