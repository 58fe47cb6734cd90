use forkpool::{ForkJoin, Rows, Task, ThreadPool};

/// Rows of the output per leaf.
pub const THRESHOLD: usize = 2;

/// `C = A x B` for square row-major `n x n` matrices. Each leaf fills a band
/// of rows of `C`.
pub struct MatMul<'a> {
    a: &'a [i64],
    b: &'a [i64],
    n: usize,
}

impl<'a> MatMul<'a> {
    /// # Panics
    ///
    /// Panics if `a` or `b` is not `n x n`.
    #[track_caller]
    pub fn new(a: &'a [i64], b: &'a [i64], n: usize) -> Self {
        assert_eq!(a.len(), n * n, "left matrix is not {n} x {n}");
        assert_eq!(b.len(), n * n, "right matrix is not {n} x {n}");
        Self { a, b, n }
    }

    fn fill_row(&self, i: usize, row: &mut [i64]) {
        row.fill(0);
        for k in 0..self.n {
            let a_ik = self.a[i * self.n + k];
            let b_row = &self.b[k * self.n..(k + 1) * self.n];
            for (cell, &b_kj) in row.iter_mut().zip(b_row) {
                *cell += a_ik * b_kj;
            }
        }
    }
}

impl<'a> ForkJoin for MatMul<'a> {
    type Part = Rows<'a, i64>;
    type Output = ();

    fn compute_base(&self, mut rows: Rows<'a, i64>) -> anyhow::Result<()> {
        for (i, row) in rows.rows_mut() {
            self.fill_row(i, row);
        }
        Ok(())
    }

    fn combine(&self, _: (), _: ()) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn matmul_sequential(a: &[i64], b: &[i64], n: usize) -> Vec<i64> {
    let job = MatMul::new(a, b, n);
    let mut c = vec![0; n * n];
    for (i, row) in c.chunks_exact_mut(n.max(1)).enumerate() {
        job.fill_row(i, row);
    }
    c
}

/// Multiplies on `pool` with leaves of `granularity` output rows.
pub fn matmul_parallel(
    pool: &ThreadPool,
    a: &[i64],
    b: &[i64],
    n: usize,
    granularity: usize,
) -> forkpool::Result<Vec<i64>> {
    let job = MatMul::new(a, b, n);
    let mut c = vec![0; n * n];
    if n > 0 {
        pool.submit(Task::new(&job, Rows::new(&mut c, n), granularity))?;
    }
    Ok(c)
}
