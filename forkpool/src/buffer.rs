//! Disjoint mutable views into one output buffer.
//!
//! A [`SliceMut`] starts out covering a whole `&mut [T]` and can only be cut
//! into non-overlapping halves, so tasks writing their own region never alias.
//! [`SliceMut::unsplit`] reverses a cut and refuses views that do not come from
//! the same buffer or are not adjacent in order.
//!
//! [`Rows`] is the row-major flavor used by matrix and image workloads: its
//! task range counts rows, not cells.

use crate::task::{Splittable, TaskRange};
use anyhow::ensure;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

pub struct SliceMut<'a, T> {
    // Start of the buffer the view was first created from. Used to tell
    // buffers apart in `unsplit`.
    root: NonNull<T>,
    root_len: usize,

    offset: usize,
    len: usize,

    _marker: PhantomData<&'a mut [T]>,
}

// Safety: a view is an exclusive borrow of its cells, same as `&'a mut [T]`.
unsafe impl<T: Send> Send for SliceMut<'_, T> {}
unsafe impl<T: Sync> Sync for SliceMut<'_, T> {}

impl<'a, T> SliceMut<'a, T> {
    pub fn new(buf: &'a mut [T]) -> Self {
        let root_len = buf.len();
        Self {
            root: NonNull::from(buf).cast(),
            root_len,
            offset: 0,
            len: root_len,
            _marker: PhantomData,
        }
    }

    /// Offset of the view inside its root buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[T] {
        // Safety: `[offset, offset + len)` is inside the root buffer and owned
        // exclusively by this view for `'a`.
        unsafe { slice::from_raw_parts(self.cells_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // Safety: see `as_slice`, `&mut self` guarantees unique access.
        unsafe { slice::from_raw_parts_mut(self.cells_ptr(), self.len) }
    }

    pub fn into_mut_slice(self) -> &'a mut [T] {
        // Safety: see `as_slice`, the view is consumed so the borrow moves out.
        unsafe { slice::from_raw_parts_mut(self.cells_ptr(), self.len) }
    }

    /// Re-joins two views previously produced by splitting.
    ///
    /// Fails unless both views come from the same root buffer and `right`
    /// starts exactly where `left` ends.
    pub fn unsplit(left: Self, right: Self) -> anyhow::Result<Self> {
        ensure!(
            left.root == right.root && left.root_len == right.root_len,
            "cannot unsplit views of different buffers"
        );
        ensure!(
            left.offset + left.len == right.offset,
            "cannot unsplit non adjacent views {} and {}",
            TaskRange::new(left.offset, left.offset + left.len),
            TaskRange::new(right.offset, right.offset + right.len)
        );

        Ok(Self {
            root: left.root,
            root_len: left.root_len,
            offset: left.offset,
            len: left.len + right.len,
            _marker: PhantomData,
        })
    }

    fn cells_ptr(&self) -> *mut T {
        // Safety: `offset <= root_len`, stays within (or one past) the buffer.
        unsafe { self.root.as_ptr().add(self.offset) }
    }
}

impl<T> Splittable for SliceMut<'_, T>
where
    T: Send,
{
    fn range(&self) -> TaskRange {
        TaskRange::new(self.offset, self.offset + self.len)
    }

    #[track_caller]
    fn split_at(self, mid: usize) -> (Self, Self) {
        assert!(
            mid <= self.len,
            "split point {mid} out of bounds for view of len {}",
            self.len
        );

        let left = Self {
            len: mid,
            ..self
        };
        let right = Self {
            offset: self.offset + mid,
            len: self.len - mid,
            ..self
        };
        (left, right)
    }
}

impl<T> fmt::Debug for SliceMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceMut")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("root_len", &self.root_len)
            .finish()
    }
}

/// Row-major view over whole rows of a `width` wide grid.
pub struct Rows<'a, T> {
    cells: SliceMut<'a, T>,
    width: usize,
}

impl<'a, T> Rows<'a, T> {
    /// # Panics
    ///
    /// Panics if `width` is 0 or the buffer is not made of whole rows.
    #[track_caller]
    pub fn new(buf: &'a mut [T], width: usize) -> Self {
        assert!(width > 0, "row width must be greater than 0");
        assert!(
            buf.len() % width == 0,
            "buffer of len {} is not a whole number of rows of width {width}",
            buf.len()
        );

        Self {
            cells: SliceMut::new(buf),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows in the view.
    pub fn num_rows(&self) -> usize {
        self.cells.len() / self.width
    }

    /// Absolute index of the first row of the view.
    pub fn first_row(&self) -> usize {
        self.cells.offset() / self.width
    }

    /// Row `i` of the view, counted from `first_row`.
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        let width = self.width;
        &mut self.cells.as_mut_slice()[i * width..(i + 1) * width]
    }

    /// Iterates rows with their absolute row index.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (usize, &mut [T])> {
        let first = self.first_row();
        let width = self.width;
        self.cells
            .as_mut_slice()
            .chunks_exact_mut(width)
            .enumerate()
            .map(move |(i, row)| (first + i, row))
    }

    pub fn into_cells(self) -> SliceMut<'a, T> {
        self.cells
    }
}

impl<T: Send> Splittable for Rows<'_, T> {
    fn range(&self) -> TaskRange {
        let first = self.first_row();
        TaskRange::new(first, first + self.num_rows())
    }

    #[track_caller]
    fn split_at(self, mid: usize) -> (Self, Self) {
        let width = self.width;
        let (top, bottom) = self.cells.split_at(mid * width);
        (
            Self { cells: top, width },
            Self {
                cells: bottom,
                width,
            },
        )
    }
}

impl<T> fmt::Debug for Rows<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("first_row", &self.first_row())
            .field("num_rows", &self.num_rows())
            .field("width", &self.width)
            .finish()
    }
}
