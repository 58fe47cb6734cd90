use forkpool::{ForkJoin, Task, TaskRange, ThreadPool};

pub const THRESHOLD: usize = 2;

/// Joins words in input order. Leaves run out of order, `combine` keeps the
/// left half first.
pub struct Concat<'a, S> {
    words: &'a [S],
}

impl<'a, S: AsRef<str>> Concat<'a, S> {
    pub fn new(words: &'a [S]) -> Self {
        Self { words }
    }
}

impl<S: AsRef<str> + Sync> ForkJoin for Concat<'_, S> {
    type Part = TaskRange;
    type Output = String;

    fn compute_base(&self, part: TaskRange) -> anyhow::Result<String> {
        Ok(concat_sequential(&self.words[part.as_range()]))
    }

    fn combine(&self, mut left: String, right: String) -> anyhow::Result<String> {
        left.push_str(&right);
        Ok(left)
    }
}

pub fn concat_sequential<S: AsRef<str>>(words: &[S]) -> String {
    words.iter().map(AsRef::as_ref).collect()
}

pub fn concat_parallel<S: AsRef<str> + Sync>(
    pool: &ThreadPool,
    words: &[S],
) -> forkpool::Result<String> {
    let job = Concat::new(words);
    pool.submit(Task::new(&job, TaskRange::new(0, words.len()), THRESHOLD))
}
