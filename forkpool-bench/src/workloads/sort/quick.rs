use super::{THRESHOLD, insertion_sort};
use forkpool::{SliceMut, Splittable, ThreadPool};
use std::cmp::Ordering;

pub fn quicksort_sequential<T: Ord + Copy>(data: &mut [T]) {
    if data.len() <= THRESHOLD {
        insertion_sort(data);
        return;
    }

    let (lt, gt) = partition(data);
    let (left, rest) = data.split_at_mut(lt);
    quicksort_sequential(left);
    quicksort_sequential(&mut rest[gt - lt..]);
}

/// Sorts in place on `pool`, forking both sides of every partition.
pub fn quicksort_parallel<T>(pool: &ThreadPool, data: &mut [T]) -> forkpool::Result<()>
where
    T: Ord + Copy + Send,
{
    pool.install(|| sort_view(SliceMut::new(data)))
}

fn sort_view<T: Ord + Copy + Send>(mut view: SliceMut<'_, T>) {
    if view.len() <= THRESHOLD {
        insertion_sort(view.as_mut_slice());
        return;
    }

    let (lt, gt) = partition(view.as_mut_slice());

    // Cells equal to the pivot are in their final place.
    let (left, rest) = view.split_at(lt);
    let (_, right) = rest.split_at(gt - lt);
    forkpool::join(|| sort_view(left), || sort_view(right));
}

/// Three-way partition around the median of the first, middle and last
/// elements. Returns `(lt, gt)` such that `data[..lt]` is below the pivot,
/// `data[lt..gt]` equals it and `data[gt..]` is above it.
fn partition<T: Ord + Copy>(data: &mut [T]) -> (usize, usize) {
    let pivot = median_of_three(data[0], data[data.len() / 2], data[data.len() - 1]);

    let (mut lt, mut i, mut gt) = (0, 0, data.len());
    while i < gt {
        match data[i].cmp(&pivot) {
            Ordering::Less => {
                data.swap(lt, i);
                lt += 1;
                i += 1;
            }
            Ordering::Greater => {
                gt -= 1;
                data.swap(i, gt);
            }
            Ordering::Equal => i += 1,
        }
    }
    (lt, gt)
}

fn median_of_three<T: Ord>(a: T, b: T, c: T) -> T {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    lo.max(hi.min(c))
}
