//! The split / base case / combine contract driven by the pool.
//!
//! A [`ForkJoin`] job holds the read-only input and knows how to compute a
//! leaf and how to merge two partial results. The region of work is a
//! [`Splittable`] part: a plain [`TaskRange`] when the job only reads, or a
//! disjoint mutable view from [`crate::buffer`] when leaves write output.
//!
//! A [`Task`] ties a job, a part and a granularity together. Running it splits
//! at the midpoint until the part is no larger than the granularity, forks the
//! halves with [`crate::join`] and combines results left to right.

mod range;
pub use range::TaskRange;

use crate::error::{Error, Result, panic_message};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// A region of work that can be cut into two disjoint halves.
pub trait Splittable: Send + Sized {
    /// Absolute index range covered by this part.
    fn range(&self) -> TaskRange;

    /// Cuts the part at offset `mid` (relative to its start). The left half
    /// covers `[start, start + mid)` and the right half the rest.
    fn split_at(self, mid: usize) -> (Self, Self);

    fn len(&self) -> usize {
        self.range().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Algorithm plugged into the engine.
///
/// `combine` always receives the result of the lower range as `left`, whatever
/// worker computed it, so order sensitive merges stay deterministic.
pub trait ForkJoin: Sync {
    type Part: Splittable;
    type Output: Send;

    /// Computes a leaf. Must only write through the part it is handed.
    fn compute_base(&self, part: Self::Part) -> anyhow::Result<Self::Output>;

    fn combine(&self, left: Self::Output, right: Self::Output) -> anyhow::Result<Self::Output>;
}

/// Lifecycle of a task, advanced only by the worker running it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    Forked,
    Done,
}

impl TaskState {
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, next),
            (Pending, Running) | (Running, Forked) | (Running, Done) | (Forked, Done)
        )
    }
}

pub struct Task<'j, J: ForkJoin> {
    job: &'j J,
    range: TaskRange,
    // Taken when the task computes its leaf or forks.
    part: Option<J::Part>,
    granularity: usize,
    state: TaskState,
}

impl<'j, J: ForkJoin> Task<'j, J> {
    /// Creates a root task. Parts longer than `granularity` get split; a
    /// granularity of 0 splits all the way down to single elements.
    pub fn new(job: &'j J, part: J::Part, granularity: usize) -> Self {
        Self {
            job,
            range: part.range(),
            part: Some(part),
            granularity,
            state: TaskState::Pending,
        }
    }

    pub fn range(&self) -> TaskRange {
        self.range
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// True iff the part is longer than the granularity. Parts of length 0 or
    /// 1 are never split.
    pub fn should_split(&self) -> bool {
        let len = self.len();
        len > 1 && len > self.granularity
    }

    /// Splits at the midpoint into two pending siblings.
    ///
    /// # Panics
    ///
    /// Panics if the task covers fewer than two elements.
    #[track_caller]
    pub fn split(mut self) -> (Self, Self) {
        self.split_part()
    }

    #[track_caller]
    fn split_part(&mut self) -> (Self, Self) {
        let len = self.len();
        assert!(len > 1, "cannot split task over {}", self.range);

        let (left, right) = self.take_part().split_at(len / 2);
        (
            Task::new(self.job, left, self.granularity),
            Task::new(self.job, right, self.granularity),
        )
    }

    fn take_part(&mut self) -> J::Part {
        self.part.take().expect("task part already consumed")
    }

    #[track_caller]
    fn advance(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal task transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    pub(crate) fn start(&mut self) {
        self.advance(TaskState::Running);
    }

    /// Splits a running task. The parent stays `Forked` until its children
    /// are joined and it is finished.
    #[track_caller]
    pub(crate) fn fork(&mut self) -> (Self, Self) {
        self.advance(TaskState::Forked);
        self.split_part()
    }

    /// Runs the leaf computation of a running task and marks it done.
    pub(crate) fn compute(&mut self) -> Result<J::Output> {
        let range = self.range;
        let part = self.take_part();
        let res = self
            .job
            .compute_base(part)
            .map_err(|source| Error::BaseCompute { range, source });

        self.advance(TaskState::Done);
        res
    }

    pub(crate) fn finish(&mut self) {
        self.advance(TaskState::Done);
    }

    /// Runs a root task, turning a panic anywhere in the tree into
    /// [`Error::Panicked`].
    pub(crate) fn execute(self) -> Result<J::Output> {
        let abort = AtomicBool::new(false);

        match panic::catch_unwind(AssertUnwindSafe(|| self.run(&abort))) {
            Ok(res) => res,
            Err(payload) => Err(Error::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn run(mut self, abort: &AtomicBool) -> Result<J::Output> {
        self.start();

        // Another subtree of this submission failed, don't bother computing.
        if abort.load(Ordering::Acquire) {
            self.finish();
            return Err(Error::Skipped);
        }

        if !self.should_split() {
            return self
                .compute()
                .inspect_err(|_| abort.store(true, Ordering::Release));
        }

        let (left, right) = self.fork();
        let (left_range, right_range) = (left.range(), right.range());

        let res = match crate::join(|| left.run(abort), || right.run(abort)) {
            (Ok(left), Ok(right)) => self
                .job
                .combine(left, right)
                .map_err(|source| Error::Combine {
                    left: left_range,
                    right: right_range,
                    source,
                })
                .inspect_err(|_| abort.store(true, Ordering::Release)),
            (Err(left), Err(right)) => Err(if left.is_skipped() { right } else { left }),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        };

        self.finish();
        res
    }
}

impl<J: ForkJoin> fmt::Debug for Task<'_, J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("range", &self.range())
            .field("granularity", &self.granularity)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
