use super::{THRESHOLD, insertion_sort};
use forkpool::{ForkJoin, SliceMut, Splittable, Task, TaskRange, ThreadPool};
use std::marker::PhantomData;

/// A run of the input together with the scratch cells backing it.
///
/// Both views always cover the same indices, so merging two sibling runs only
/// ever writes the scratch owned by those two runs.
#[derive(Debug)]
pub struct SortRun<'a, T> {
    data: SliceMut<'a, T>,
    scratch: SliceMut<'a, T>,
}

impl<'a, T> SortRun<'a, T> {
    /// # Panics
    ///
    /// Panics if `scratch` is not as long as `data`.
    #[track_caller]
    pub fn new(data: &'a mut [T], scratch: &'a mut [T]) -> Self {
        assert_eq!(
            data.len(),
            scratch.len(),
            "scratch buffer must match the input length"
        );

        Self {
            data: SliceMut::new(data),
            scratch: SliceMut::new(scratch),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        self.data.as_slice()
    }
}

impl<T: Send> Splittable for SortRun<'_, T> {
    fn range(&self) -> TaskRange {
        self.data.range()
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        let (data_left, data_right) = self.data.split_at(mid);
        let (scratch_left, scratch_right) = self.scratch.split_at(mid);
        (
            Self {
                data: data_left,
                scratch: scratch_left,
            },
            Self {
                data: data_right,
                scratch: scratch_right,
            },
        )
    }
}

/// Sorts leaves with insertion sort and merges sibling runs through their
/// scratch cells.
pub struct MergeSort<'a, T> {
    _marker: PhantomData<fn(SortRun<'a, T>)>,
}

impl<T> MergeSort<'_, T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for MergeSort<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> ForkJoin for MergeSort<'a, T>
where
    T: Ord + Copy + Send,
{
    type Part = SortRun<'a, T>;
    type Output = SortRun<'a, T>;

    fn compute_base(&self, mut run: SortRun<'a, T>) -> anyhow::Result<SortRun<'a, T>> {
        insertion_sort(run.data.as_mut_slice());
        Ok(run)
    }

    fn combine(
        &self,
        left: SortRun<'a, T>,
        right: SortRun<'a, T>,
    ) -> anyhow::Result<SortRun<'a, T>> {
        let mut scratch = SliceMut::unsplit(left.scratch, right.scratch)?;
        merge(
            left.data.as_slice(),
            right.data.as_slice(),
            scratch.as_mut_slice(),
        );

        let mut data = SliceMut::unsplit(left.data, right.data)?;
        data.as_mut_slice().copy_from_slice(scratch.as_slice());

        Ok(SortRun { data, scratch })
    }
}

/// Stable merge of two sorted runs into `out`.
fn merge<T: Ord + Copy>(left: &[T], right: &[T], out: &mut [T]) {
    debug_assert_eq!(left.len() + right.len(), out.len());

    let (mut i, mut j) = (0, 0);
    for slot in out.iter_mut() {
        *slot = if j == right.len() || (i < left.len() && left[i] <= right[j]) {
            i += 1;
            left[i - 1]
        } else {
            j += 1;
            right[j - 1]
        };
    }
}

pub fn merge_sort_sequential<T: Ord + Copy>(data: &mut [T]) {
    let mut scratch = data.to_vec();
    sort_into(data, &mut scratch);
}

fn sort_into<T: Ord + Copy>(data: &mut [T], scratch: &mut [T]) {
    if data.len() <= THRESHOLD {
        insertion_sort(data);
        return;
    }

    let mid = data.len() / 2;
    {
        let (left, right) = data.split_at_mut(mid);
        let (scratch_left, scratch_right) = scratch.split_at_mut(mid);
        sort_into(left, scratch_left);
        sort_into(right, scratch_right);
    }

    let (left, right) = data.split_at(mid);
    merge(left, right, scratch);
    data.copy_from_slice(scratch);
}

pub fn merge_sort_parallel<T>(pool: &ThreadPool, data: &mut [T]) -> forkpool::Result<()>
where
    T: Ord + Copy + Send,
{
    let mut scratch = data.to_vec();
    let job = MergeSort::new();
    pool.submit(Task::new(&job, SortRun::new(data, &mut scratch), THRESHOLD))?;
    Ok(())
}
