use forkpool::{ForkJoin, Task, TaskRange, ThreadPool};

pub const THRESHOLD: usize = 100;

/// Smallest element, `None` for an empty input.
pub struct MinElement<'a> {
    data: &'a [i32],
}

impl<'a> MinElement<'a> {
    pub fn new(data: &'a [i32]) -> Self {
        Self { data }
    }
}

impl ForkJoin for MinElement<'_> {
    type Part = TaskRange;
    type Output = Option<i32>;

    fn compute_base(&self, part: TaskRange) -> anyhow::Result<Option<i32>> {
        Ok(min_sequential(&self.data[part.as_range()]))
    }

    fn combine(&self, left: Option<i32>, right: Option<i32>) -> anyhow::Result<Option<i32>> {
        Ok(match (left, right) {
            (Some(l), Some(r)) => Some(l.min(r)),
            (l, r) => l.or(r),
        })
    }
}

pub fn min_sequential(data: &[i32]) -> Option<i32> {
    data.iter().copied().min()
}

pub fn min_parallel(pool: &ThreadPool, data: &[i32]) -> forkpool::Result<Option<i32>> {
    let job = MinElement::new(data);
    pool.submit(Task::new(&job, TaskRange::new(0, data.len()), THRESHOLD))
}
