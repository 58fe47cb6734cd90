use forkpool::{ForkJoin, Task, TaskRange, ThreadPool};

pub const THRESHOLD: usize = 100;

/// Sums `i32`s into an `i64` so large inputs can't overflow.
pub struct ArraySum<'a> {
    data: &'a [i32],
}

impl<'a> ArraySum<'a> {
    pub fn new(data: &'a [i32]) -> Self {
        Self { data }
    }
}

impl ForkJoin for ArraySum<'_> {
    type Part = TaskRange;
    type Output = i64;

    fn compute_base(&self, part: TaskRange) -> anyhow::Result<i64> {
        Ok(sum_sequential(&self.data[part.as_range()]))
    }

    fn combine(&self, left: i64, right: i64) -> anyhow::Result<i64> {
        Ok(left + right)
    }
}

pub fn sum_sequential(data: &[i32]) -> i64 {
    data.iter().copied().map(i64::from).sum()
}

pub fn sum_parallel(pool: &ThreadPool, data: &[i32]) -> forkpool::Result<i64> {
    let job = ArraySum::new(data);
    pool.submit(Task::new(&job, TaskRange::new(0, data.len()), THRESHOLD))
}
