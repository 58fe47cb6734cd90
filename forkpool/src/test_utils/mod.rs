use crate::buffer::Rows;
use crate::task::{ForkJoin, Splittable, TaskRange};
use anyhow::{Result, bail, ensure};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct SumJob<'a> {
    pub(crate) data: &'a [i64],
}

impl ForkJoin for SumJob<'_> {
    type Part = TaskRange;
    type Output = i64;

    fn compute_base(&self, part: TaskRange) -> Result<i64> {
        Ok(self.data[part.as_range()].iter().sum())
    }

    fn combine(&self, left: i64, right: i64) -> Result<i64> {
        Ok(left + right)
    }
}

pub(crate) struct MinJob<'a> {
    pub(crate) data: &'a [i32],
}

impl ForkJoin for MinJob<'_> {
    type Part = TaskRange;
    type Output = Option<i32>;

    fn compute_base(&self, part: TaskRange) -> Result<Option<i32>> {
        Ok(self.data[part.as_range()].iter().copied().min())
    }

    fn combine(&self, left: Option<i32>, right: Option<i32>) -> Result<Option<i32>> {
        Ok(match (left, right) {
            (Some(l), Some(r)) => Some(l.min(r)),
            (l, r) => l.or(r),
        })
    }
}

pub(crate) struct ConcatJob<'a> {
    pub(crate) words: &'a [&'a str],
}

impl ForkJoin for ConcatJob<'_> {
    type Part = TaskRange;
    type Output = String;

    fn compute_base(&self, part: TaskRange) -> Result<String> {
        Ok(self.words[part.as_range()].concat())
    }

    fn combine(&self, mut left: String, right: String) -> Result<String> {
        left.push_str(&right);
        Ok(left)
    }
}

/// `C = A x B` for square `n x n` matrices, one output row per index.
pub(crate) struct MatMulJob<'a> {
    pub(crate) a: &'a [i64],
    pub(crate) b: &'a [i64],
    pub(crate) n: usize,
}

impl<'a> ForkJoin for MatMulJob<'a> {
    type Part = Rows<'a, i64>;
    type Output = ();

    fn compute_base(&self, mut rows: Rows<'a, i64>) -> Result<()> {
        let n = self.n;
        for (i, row) in rows.rows_mut() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..n).map(|k| self.a[i * n + k] * self.b[k * n + j]).sum();
            }
        }
        Ok(())
    }

    fn combine(&self, _: (), _: ()) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn matmul_reference(a: &[i64], b: &[i64], n: usize) -> Vec<i64> {
    let mut c = vec![0; n * n];
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                c[i * n + j] += a[i * n + k] * b[k * n + j];
            }
        }
    }
    c
}

/// Records every leaf it runs. The output is the range covered so combines can
/// check they only ever merge adjacent, ordered halves.
pub(crate) struct RecordingJob {
    pub(crate) hits: Vec<AtomicUsize>,
    pub(crate) leaves: Mutex<Vec<TaskRange>>,
    pub(crate) combines: AtomicUsize,
}

impl RecordingJob {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            hits: (0..len).map(|_| AtomicUsize::new(0)).collect(),
            leaves: Mutex::new(Vec::new()),
            combines: AtomicUsize::new(0),
        }
    }

    pub(crate) fn hit_counts(&self) -> Vec<usize> {
        self.hits.iter().map(|h| h.load(Ordering::Relaxed)).collect()
    }

    pub(crate) fn sorted_leaves(&self) -> Vec<TaskRange> {
        let mut leaves = self.leaves.lock().clone();
        leaves.sort_by_key(|r| r.start);
        leaves
    }
}

impl ForkJoin for RecordingJob {
    type Part = TaskRange;
    type Output = TaskRange;

    fn compute_base(&self, part: TaskRange) -> Result<TaskRange> {
        for i in part.as_range() {
            self.hits[i].fetch_add(1, Ordering::Relaxed);
        }
        self.leaves.lock().push(part);
        Ok(part)
    }

    fn combine(&self, left: TaskRange, right: TaskRange) -> Result<TaskRange> {
        self.combines.fetch_add(1, Ordering::Relaxed);
        ensure!(left.end == right.start, "out of order halves {left} {right}");
        Ok(TaskRange::new(left.start, right.end))
    }
}

/// What a [`FaultyJob`] does when it reaches `at`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Fault {
    FailLeaf,
    /// Every leaf fails, `at` is ignored.
    FailEveryLeaf,
    PanicLeaf,
    FailCombine,
}

/// Counts like [`RecordingJob`] but misbehaves around index `at`.
pub(crate) struct FaultyJob {
    pub(crate) fault: Fault,
    pub(crate) at: usize,
    pub(crate) leaves_run: AtomicUsize,
    pub(crate) combines: AtomicUsize,
}

impl FaultyJob {
    pub(crate) fn new(fault: Fault, at: usize) -> Self {
        Self {
            fault,
            at,
            leaves_run: AtomicUsize::new(0),
            combines: AtomicUsize::new(0),
        }
    }
}

impl ForkJoin for FaultyJob {
    type Part = TaskRange;
    type Output = TaskRange;

    fn compute_base(&self, part: TaskRange) -> Result<TaskRange> {
        self.leaves_run.fetch_add(1, Ordering::Relaxed);
        if matches!(self.fault, Fault::FailEveryLeaf) {
            bail!("bad leaf {part}");
        }
        if part.contains(self.at) {
            match self.fault {
                Fault::FailLeaf => bail!("bad element at {}", self.at),
                Fault::PanicLeaf => panic!("leaf exploded at {}", self.at),
                Fault::FailCombine | Fault::FailEveryLeaf => {}
            }
        }
        Ok(part)
    }

    fn combine(&self, left: TaskRange, right: TaskRange) -> Result<TaskRange> {
        self.combines.fetch_add(1, Ordering::Relaxed);
        if matches!(self.fault, Fault::FailCombine) && right.start == self.at {
            bail!("cannot merge into {}", self.at);
        }
        Ok(TaskRange::new(left.start, right.end))
    }
}

/// Every leaf submits a nested task summing `inner_len` ones on the current
/// pool.
pub(crate) struct NestedJob {
    pub(crate) inner_len: usize,
}

impl ForkJoin for NestedJob {
    type Part = TaskRange;
    type Output = i64;

    fn compute_base(&self, part: TaskRange) -> Result<i64> {
        let ones = vec![1i64; self.inner_len];
        let inner = SumJob { data: &ones };

        let mut total = 0;
        for _ in part.as_range() {
            total += crate::submit(crate::Task::new(&inner, TaskRange::new(0, ones.len()), 8))?;
        }
        Ok(total)
    }

    fn combine(&self, left: i64, right: i64) -> Result<i64> {
        Ok(left + right)
    }
}

/// Recursively splits `range` the way the pool does and returns the leaves.
pub(crate) fn split_leaves(range: TaskRange, granularity: usize) -> Vec<TaskRange> {
    if range.len() <= 1 || range.len() <= granularity {
        return vec![range];
    }
    let (left, right) = range.split_at(range.len() / 2);
    let mut leaves = split_leaves(left, granularity);
    leaves.extend(split_leaves(right, granularity));
    leaves
}
