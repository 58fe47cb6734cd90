use crate::runtime::job::StackJob;
use crate::runtime::latch::SpinLatch;
use crate::runtime::worker::WorkerThread;
use std::panic::{self, AssertUnwindSafe};

/// Runs `oper_a` and `oper_b`, potentially in parallel, and returns both
/// results.
///
/// On a pool worker, `oper_b` is pushed on the local deque where idle peers can
/// steal it while `oper_a` runs on the current thread. If nobody took it, it is
/// popped back and run inline; otherwise the worker keeps executing other jobs
/// until the thief is done. Outside a pool both closures run sequentially.
///
/// A panic in either closure is propagated once both have finished.
pub fn join<A, B, RA, RB>(oper_a: A, oper_b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    WorkerThread::with_current(|worker| match worker {
        Some(worker) => join_on_worker(worker, oper_a, oper_b),
        None => (oper_a(), oper_b()),
    })
}

fn join_on_worker<A, B, RA, RB>(worker: &WorkerThread, oper_a: A, oper_b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    let job_b = StackJob::new(oper_b, SpinLatch::new(worker.registry(), worker.index()));
    // Safety: we don't return before `job_b` ran, either here or on a thief.
    let job_b_ref = unsafe { job_b.as_job_ref() };
    let job_b_id = job_b_ref.id();
    worker.push(job_b_ref);

    let result_a = match panic::catch_unwind(AssertUnwindSafe(oper_a)) {
        Ok(value) => value,
        Err(payload) => {
            // `job_b` lives in this frame, it has to finish before we unwind.
            worker.wait_until(job_b.latch());
            panic::resume_unwind(payload);
        }
    };

    while !job_b.latch().probe() {
        match worker.take_local() {
            Some(job) if job.id() == job_b_id => {
                // Nobody stole it.
                let result_b = job_b.run_inline();
                return (result_a, result_b);
            }
            Some(job) => worker.execute(job),
            None => {
                // Stolen, help out until the thief sets the latch.
                worker.wait_until(job_b.latch());
                break;
            }
        }
    }

    // Safety: the latch is set.
    (result_a, unsafe { job_b.into_result() })
}
