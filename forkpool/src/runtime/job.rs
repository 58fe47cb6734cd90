use crate::runtime::latch::Latch;
use std::any::Any;
use std::cell::UnsafeCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Type erased unit of execution stored in the work queues.
pub(super) trait Job {
    /// # Safety
    ///
    /// `this` must point to a live job of type `Self` that was never executed.
    unsafe fn execute(this: *const ());
}

/// Pointer to a job living on some worker's (or caller's) stack, plus the
/// function that knows how to run it. The owner of the job keeps it alive
/// until its latch is set.
#[derive(Clone, Copy)]
pub(crate) struct JobRef {
    pointer: *const (),
    execute_fn: unsafe fn(*const ()),
}

// Safety: a `JobRef` is handed to exactly one executor, and the jobs behind it
// only capture `Send` state.
unsafe impl Send for JobRef {}
unsafe impl Sync for JobRef {}

impl JobRef {
    /// # Safety
    ///
    /// The caller must keep `data` alive until the job has executed.
    pub(super) unsafe fn new<T: Job>(data: *const T) -> JobRef {
        JobRef {
            pointer: data.cast(),
            execute_fn: <T as Job>::execute,
        }
    }

    /// Identity of the job, stable while it sits in a queue.
    #[inline]
    pub(super) fn id(&self) -> *const () {
        self.pointer
    }

    /// # Safety
    ///
    /// Must be called at most once per job.
    #[inline]
    pub(super) unsafe fn execute(self) {
        unsafe { (self.execute_fn)(self.pointer) }
    }
}

impl fmt::Debug for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobRef").field(&self.pointer).finish()
    }
}

pub(super) enum JobResult<T> {
    None,
    Ok(T),
    Panic(Box<dyn Any + Send>),
}

impl<T> JobResult<T> {
    fn call(func: impl FnOnce() -> T) -> Self {
        match panic::catch_unwind(AssertUnwindSafe(func)) {
            Ok(value) => JobResult::Ok(value),
            Err(payload) => JobResult::Panic(payload),
        }
    }

    /// Returns the value, or resumes the panic captured on the executing
    /// thread on the current one.
    fn into_return_value(self) -> T {
        match self {
            JobResult::None => unreachable!("job result read before the job ran"),
            JobResult::Ok(value) => value,
            JobResult::Panic(payload) => panic::resume_unwind(payload),
        }
    }
}

/// A job allocated on the stack of the thread that will wait for it.
pub(super) struct StackJob<L, F, R> {
    latch: L,
    func: UnsafeCell<Option<F>>,
    result: UnsafeCell<JobResult<R>>,
}

impl<L, F, R> StackJob<L, F, R>
where
    L: Latch,
    F: FnOnce() -> R + Send,
    R: Send,
{
    pub(super) fn new(func: F, latch: L) -> Self {
        Self {
            latch,
            func: UnsafeCell::new(Some(func)),
            result: UnsafeCell::new(JobResult::None),
        }
    }

    /// # Safety
    ///
    /// `self` must not move nor be dropped until the job has either run
    /// (latch set) or been popped back and run inline.
    pub(super) unsafe fn as_job_ref(&self) -> JobRef {
        unsafe { JobRef::new(self) }
    }

    pub(super) fn latch(&self) -> &L {
        &self.latch
    }

    /// Runs the closure on the current thread. Only valid when the job was
    /// taken back before anyone else executed it.
    pub(super) fn run_inline(self) -> R {
        let func = self
            .func
            .into_inner()
            .expect("job taken back after it was executed");
        func()
    }

    /// # Safety
    ///
    /// The latch must be set.
    pub(super) unsafe fn into_result(self) -> R {
        self.result.into_inner().into_return_value()
    }
}

impl<L, F, R> Job for StackJob<L, F, R>
where
    L: Latch,
    F: FnOnce() -> R + Send,
    R: Send,
{
    unsafe fn execute(this: *const ()) {
        let this = unsafe { &*this.cast::<Self>() };
        let func = unsafe { (*this.func.get()).take() }.expect("job executed twice");

        unsafe {
            *this.result.get() = JobResult::call(func);
            L::set(&this.latch);
        }
    }
}
