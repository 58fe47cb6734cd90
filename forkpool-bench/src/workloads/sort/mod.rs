//! Merge sort over a scratch buffer and an in-place quicksort.
//!
//! Both switch to insertion sort below [`THRESHOLD`] elements.

mod merge;
pub use merge::{MergeSort, SortRun, merge_sort_parallel, merge_sort_sequential};

mod quick;
pub use quick::{quicksort_parallel, quicksort_sequential};

pub const THRESHOLD: usize = 32;

fn insertion_sort<T: Ord + Copy>(data: &mut [T]) {
    for i in 1..data.len() {
        let item = data[i];
        let mut j = i;
        while j > 0 && data[j - 1] > item {
            data[j] = data[j - 1];
            j -= 1;
        }
        data[j] = item;
    }
}
