use super::*;
use crate as forkpool;
use crate::buffer::Rows;
use crate::test_utils::*;
use crate::{Error, TaskRange};
use anyhow::Result;
use rstest::rstest;
use static_assertions::assert_impl_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

assert_impl_all!(ThreadPool: Send, Sync);
assert_impl_all!(registry::Registry: Send, Sync);
assert_impl_all!(PoolStats: Send, Sync, Copy);

fn pool(worker_threads: usize) -> Result<ThreadPool> {
    Builder::new().worker_threads(worker_threads).try_build()
}

#[test]
fn test_pool_init_and_thread_names() -> Result<()> {
    let pool = Builder::new()
        .worker_threads(3)
        .thread_name_fn({
            let count = Arc::new(AtomicUsize::new(0));
            move || format!("leaf-{}", count.fetch_add(1, Ordering::Relaxed))
        })
        .try_build()?;

    assert_eq!(pool.num_threads(), 3);
    assert_eq!(pool.worker_states().len(), 3);
    assert!(!pool.is_shutdown());

    let mut names = pool
        .handles
        .lock()
        .iter()
        .map(|h| h.thread().name().map(str::to_owned))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default();
    names.sort();
    assert_eq!(names, vec!["leaf-0", "leaf-1", "leaf-2"]);

    Ok(())
}

#[test]
fn test_install_runs_on_worker() -> Result<()> {
    let pool = pool(2)?;
    assert_eq!(current_thread_index(), None);
    assert_eq!(pool.current_thread_index(), None);

    let (index, size) = pool.install(|| (current_thread_index(), current_num_threads()))?;
    assert!(matches!(index, Some(i) if i < 2));
    assert_eq!(size, Some(2));

    // Same pool from a worker: runs inline.
    let nested = pool.install(|| pool.install(|| pool.current_thread_index()))?;
    assert!(nested?.is_some());
    Ok(())
}

#[test]
fn test_join_outside_pool_runs_sequentially() {
    let caller = thread::current().id();
    let (a, b) = join(|| thread::current().id(), || thread::current().id());
    assert_eq!(a, caller);
    assert_eq!(b, caller);
}

#[rstest]
#[case::one_worker(1)]
#[case::two_workers(2)]
#[case::four_workers(4)]
fn test_sum(#[case] worker_threads: usize) -> Result<()> {
    let pool = pool(worker_threads)?;
    let data = (1..=10_000).collect::<Vec<i64>>();
    let job = SumJob { data: &data };

    let total = pool.submit(Task::new(&job, TaskRange::new(0, data.len()), 100))?;
    assert_eq!(total, 50_005_000);
    Ok(())
}

#[test]
fn test_min_scenario() -> Result<()> {
    let pool = pool(2)?;
    let data = [5, 3, 9, 1, 7, 2];
    let job = MinJob { data: &data };

    let min = pool.submit(Task::new(&job, TaskRange::new(0, data.len()), 2))?;
    assert_eq!(min, Some(1));
    assert_eq!(min, data.iter().copied().min());
    Ok(())
}

#[test]
fn test_concat_preserves_order() -> Result<()> {
    let pool = pool(4)?;
    let words = ["a", "b", "c", "d"];
    let job = ConcatJob { words: &words };

    let joined = pool.submit(Task::new(&job, TaskRange::new(0, words.len()), 1))?;
    assert_eq!(joined, "abcd");
    Ok(())
}

#[test]
fn test_concat_many_words_repeatedly() -> Result<()> {
    let pool = pool(4)?;
    let words = (0..500).map(|i| i.to_string()).collect::<Vec<_>>();
    let refs = words.iter().map(String::as_str).collect::<Vec<_>>();
    let job = ConcatJob { words: &refs };
    let expected = words.concat();

    for _ in 0..10 {
        let joined = pool.submit(Task::new(&job, TaskRange::new(0, refs.len()), 2))?;
        assert_eq!(joined, expected);
    }
    Ok(())
}

#[test]
fn test_matmul_by_rows_matches_reference() -> Result<()> {
    const N: usize = 8;
    let pool = pool(3)?;
    let a = (0..N * N).map(|x| (x % 7) as i64 - 3).collect::<Vec<_>>();
    let b = (0..N * N).map(|x| (x % 5) as i64 * 2 - 1).collect::<Vec<_>>();

    let mut c = vec![0i64; N * N];
    let job = MatMulJob { a: &a, b: &b, n: N };
    pool.submit(Task::new(&job, Rows::new(&mut c, N), 2))?;

    assert_eq!(c, matmul_reference(&a, &b, N));
    Ok(())
}

#[rstest]
#[case::empty(0, 4)]
#[case::single(1, 4)]
#[case::below_threshold(3, 4)]
#[case::uneven(1_001, 7)]
#[case::singletons(257, 0)]
fn test_every_index_runs_exactly_once(
    #[case] len: usize,
    #[case] granularity: usize,
) -> Result<()> {
    let pool = pool(4)?;
    let job = RecordingJob::new(len);

    let covered = pool.submit(Task::new(&job, TaskRange::new(0, len), granularity))?;
    assert_eq!(covered, TaskRange::new(0, len));
    assert!(job.hit_counts().iter().all(|&hits| hits == 1));

    let leaves = job.sorted_leaves();
    assert_eq!(leaves, split_leaves(TaskRange::new(0, len), granularity));
    assert_eq!(job.combines.load(Ordering::Relaxed), leaves.len() - 1);
    Ok(())
}

#[test]
fn test_single_worker_deep_fork_tree() -> Result<()> {
    // Granularity 0 forks down to single elements, ~100k joins on one worker.
    let pool = Builder::new()
        .worker_threads(1)
        .thread_stack_size(8 << 20)
        .try_build()?;
    let len = 100_000;
    let job = RecordingJob::new(len);

    let covered = pool.submit(Task::new(&job, TaskRange::new(0, len), 0))?;
    assert_eq!(covered, TaskRange::new(0, len));
    assert_eq!(job.leaves.lock().len(), len);
    Ok(())
}

#[test]
fn test_nested_submit_does_not_deadlock() -> Result<()> {
    for worker_threads in [1, 2] {
        let pool = pool(worker_threads)?;
        let job = NestedJob { inner_len: 64 };

        let total = pool.submit(Task::new(&job, TaskRange::new(0, 32), 4))?;
        assert_eq!(total, 32 * 64);
        assert_eq!(pool.stats().roots_submitted, 1 + 32);
    }
    Ok(())
}

#[test]
fn test_submit_outside_pool_fails() {
    let data = [1i64, 2, 3];
    let job = SumJob { data: &data };
    let res = crate::submit(Task::new(&job, TaskRange::new(0, 3), 1));
    assert!(matches!(res, Err(Error::NoActivePool)));
}

#[test]
fn test_concurrent_submitters() -> Result<()> {
    let pool = pool(4)?;
    let data = (0..20_000).collect::<Vec<i64>>();
    let expected = data.iter().sum::<i64>();

    thread::scope(|s| {
        let handles = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let job = SumJob { data: &data };
                    pool.submit(Task::new(&job, TaskRange::new(0, data.len()), 64))
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let total = handle.join().expect("submitter panicked");
            assert!(matches!(total, Ok(t) if t == expected));
        }
    });

    assert_eq!(pool.stats().roots_submitted, 8);
    Ok(())
}

#[test]
fn test_malformed_range_rejected() -> Result<()> {
    let pool = pool(2)?;
    let job = RecordingJob::new(10);

    let res = pool.submit(Task::new(&job, TaskRange::new(7, 3), 2));
    assert!(matches!(res, Err(Error::Split { start: 7, end: 3 })));
    assert!(job.sorted_leaves().is_empty());
    assert_eq!(pool.stats().roots_submitted, 0);
    Ok(())
}

#[test]
fn test_leaf_failure_propagates_without_combining_parents() -> Result<()> {
    let pool = pool(1)?;
    let job = FaultyJob::new(Fault::FailLeaf, 0);

    // Index 0 lives in the very first leaf, which a single worker runs
    // before anything else: every other subtree is skipped.
    let res = pool.submit(Task::new(&job, TaskRange::new(0, 64), 4));
    match res {
        Err(Error::BaseCompute { range, source }) => {
            assert_eq!(range, TaskRange::new(0, 4));
            assert_eq!(source.to_string(), "bad element at 0");
        }
        other => panic!("unexpected result {other:?}"),
    }

    assert_eq!(job.leaves_run.load(Ordering::Relaxed), 1);
    assert_eq!(job.combines.load(Ordering::Relaxed), 0);
    Ok(())
}

#[test]
fn test_leaf_failure_surfaces_with_many_workers() -> Result<()> {
    let pool = pool(4)?;
    let job = FaultyJob::new(Fault::FailLeaf, 777);

    let res = pool.submit(Task::new(&job, TaskRange::new(0, 4_096), 16));
    let err = res.expect_err("leaf failure must surface");
    assert!(matches!(err, Error::BaseCompute { .. }));
    assert!(err.range().is_some_and(|r| r.contains(777)));
    Ok(())
}

#[test]
fn test_concurrent_sibling_failures_surface_one_real_error() -> Result<()> {
    let pool = pool(4)?;

    for _ in 0..200 {
        let job = FaultyJob::new(Fault::FailEveryLeaf, 0);
        let res = pool.submit(Task::new(&job, TaskRange::new(0, 1_024), 8));

        let err = res.expect_err("leaf failures must surface");
        assert!(matches!(err, Error::BaseCompute { .. }), "{err:?}");
        assert!(!err.is_skipped());
        assert_eq!(job.combines.load(Ordering::Relaxed), 0);
    }

    // Still usable afterwards.
    let data = vec![1i64; 1_024];
    let sum = SumJob { data: &data };
    assert_eq!(pool.submit(Task::new(&sum, TaskRange::new(0, 1_024), 8))?, 1_024);
    Ok(())
}

#[test]
fn test_combine_failure() -> Result<()> {
    let pool = pool(2)?;
    // 8 splits into [0, 4) and [4, 8) at the root.
    let job = FaultyJob::new(Fault::FailCombine, 4);

    let res = pool.submit(Task::new(&job, TaskRange::new(0, 8), 1));
    match res {
        Err(Error::Combine { left, right, .. }) => {
            assert_eq!(left, TaskRange::new(0, 4));
            assert_eq!(right, TaskRange::new(4, 8));
        }
        other => panic!("unexpected result {other:?}"),
    }
    Ok(())
}

#[test]
fn test_panicking_leaf_is_contained() -> Result<()> {
    let pool = pool(2)?;
    let job = FaultyJob::new(Fault::PanicLeaf, 10);

    let res = pool.submit(Task::new(&job, TaskRange::new(0, 100), 3));
    match res {
        Err(Error::Panicked(msg)) => assert_eq!(msg, "leaf exploded at 10"),
        other => panic!("unexpected result {other:?}"),
    }

    // The pool survives and keeps serving submissions.
    let data = [4i64; 100];
    let sum = SumJob { data: &data };
    assert_eq!(pool.submit(Task::new(&sum, TaskRange::new(0, 100), 10))?, 400);
    Ok(())
}

#[test]
fn test_install_resumes_panic_on_caller() -> Result<()> {
    let pool = pool(2)?;
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = pool.install(|| -> u32 { panic!("install body") });
    }));
    assert!(res.is_err());
    assert_eq!(pool.install(|| 5)?, 5);
    Ok(())
}

#[test]
fn test_submit_after_shutdown() -> Result<()> {
    let pool = pool(2)?;
    pool.shutdown()?;
    assert!(pool.is_shutdown());

    let job = RecordingJob::new(16);
    let res = pool.submit(Task::new(&job, TaskRange::new(0, 16), 2));
    assert!(matches!(res, Err(Error::PoolShutdown)));
    assert!(job.sorted_leaves().is_empty());
    assert!(matches!(pool.install(|| ()), Err(Error::PoolShutdown)));
    Ok(())
}

#[test]
fn test_shutdown_is_idempotent_and_stops_workers() -> Result<()> {
    let pool = pool(3)?;
    pool.shutdown()?;
    pool.shutdown()?;

    assert!(pool.handles.lock().is_empty());
    assert!(
        pool.worker_states()
            .iter()
            .all(|state| *state == WorkerState::Stopped)
    );
    Ok(())
}

#[test]
fn test_shutdown_drains_running_roots() -> Result<()> {
    let pool = pool(2)?;
    let len = 2_000;
    let job = RecordingJob::new(len);

    let res = thread::scope(|s| {
        let submitter = s.spawn(|| pool.submit(Task::new(&job, TaskRange::new(0, len), 1)));

        // Wait for the root to be picked up, then shut down underneath it.
        while job.leaves.lock().is_empty() {
            thread::yield_now();
        }
        pool.shutdown().map(|_| submitter.join().expect("submitter panicked"))
    })?;

    assert_eq!(res?, TaskRange::new(0, len));
    assert!(job.hit_counts().iter().all(|&hits| hits == 1));
    Ok(())
}

#[test]
fn test_shutdown_from_worker_does_not_join_itself() -> Result<()> {
    let pool = pool(2)?;
    pool.install(|| pool.shutdown())??;
    assert!(pool.is_shutdown());

    // Remaining handles are joined here.
    pool.shutdown()?;
    assert!(pool.handles.lock().is_empty());
    Ok(())
}

#[test]
fn test_idle_workers_park() -> Result<()> {
    let pool = Builder::new()
        .worker_threads(2)
        .park_timeout(Duration::from_secs(5))
        .try_build()?;

    let start = Instant::now();
    while pool.registry().num_parked() < 2 {
        assert!(start.elapsed() < Duration::from_secs(5), "workers never parked");
        thread::yield_now();
    }
    assert!(pool.stats().parks >= 2);

    // Submitting wakes them up and the result comes back promptly.
    let data = vec![1i64; 10_000];
    let job = SumJob { data: &data };
    let start = Instant::now();
    assert_eq!(pool.submit(Task::new(&job, TaskRange::new(0, data.len()), 16))?, 10_000);
    assert!(start.elapsed() < Duration::from_secs(1));

    // Shutdown must not wait for the park timeout either.
    let start = Instant::now();
    pool.shutdown()?;
    assert!(start.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[rstest]
fn test_stats_count_jobs(#[values(1, 4)] worker_threads: usize) -> Result<()> {
    let pool = pool(worker_threads)?;
    let job = RecordingJob::new(4_096);

    for round in 1..=20 {
        pool.submit(Task::new(&job, TaskRange::new(0, 4_096), 8))?;

        // Read right after `submit` returns, the root is already counted.
        let stats = pool.stats();
        assert_eq!(stats.roots_submitted, round);
        assert!(stats.jobs_executed >= round, "{stats:?}");
        assert!(stats.jobs_stolen <= stats.jobs_executed, "{stats:?}");
    }
    Ok(())
}

#[test]
fn test_single_worker_counts_only_roots() -> Result<()> {
    let pool = pool(1)?;
    let job = RecordingJob::new(1_024);
    pool.submit(Task::new(&job, TaskRange::new(0, 1_024), 4))?;
    pool.submit(Task::new(&job, TaskRange::new(0, 1_024), 4))?;

    // Forks popped back by their owner run inline and are not counted.
    let stats = pool.stats();
    assert_eq!(stats.jobs_executed, 2);
    assert_eq!(stats.jobs_stolen, 0);
    assert_eq!(stats.roots_submitted, 2);
    Ok(())
}

#[test]
fn test_rejected_submission_is_not_counted() -> Result<()> {
    let pool = pool(2)?;
    let data = vec![1i64; 64];
    let job = SumJob { data: &data };
    assert_eq!(pool.submit(Task::new(&job, TaskRange::new(0, 64), 8))?, 64);
    pool.shutdown()?;

    let res = pool.submit(Task::new(&job, TaskRange::new(0, 64), 8));
    assert!(matches!(res, Err(Error::PoolShutdown)));
    assert_eq!(pool.stats().roots_submitted, 1);
    Ok(())
}

#[forkpool::test(worker_threads = 2)]
fn test_macro_runs_body_on_pool() -> Result<()> {
    assert!(current_thread_index().is_some());
    assert_eq!(current_num_threads(), Some(2));

    let (a, b) = join(current_thread_index, || 40 + 2);
    assert!(a.is_some());
    assert_eq!(b, 42);
    Ok(())
}

#[forkpool::test(worker_threads = 1, thread_name = "solo")]
fn test_macro_with_thread_name() {
    assert_eq!(thread::current().name(), Some("solo"));

    let data = (0..1_000).collect::<Vec<i64>>();
    let job = SumJob { data: &data };
    let total = crate::submit(Task::new(&job, TaskRange::new(0, data.len()), 10));
    assert!(matches!(total, Ok(499_500)));
}

#[forkpool::test]
#[should_panic(expected = "join side b")]
fn test_panic_in_join_propagates() {
    let _ = join(|| 1, || -> u32 { panic!("join side b") });
}
