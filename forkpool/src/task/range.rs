use crate::error::{Error, Result};
use crate::task::Splittable;
use std::fmt;
use std::ops::Range;

/// Half-open index range `[start, end)` covered by a task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskRange {
    pub start: usize,
    pub end: usize,
}

impl TaskRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of indices covered. A malformed range reports 0.
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects ranges where `start > end`.
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::Split {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Absolute index of the split point, `start + len / 2`.
    pub const fn midpoint(&self) -> usize {
        self.start + self.len() / 2
    }

    pub const fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for TaskRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl From<Range<usize>> for TaskRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl Splittable for TaskRange {
    fn range(&self) -> TaskRange {
        *self
    }

    #[track_caller]
    fn split_at(self, mid: usize) -> (Self, Self) {
        assert!(mid <= self.len(), "split point {mid} out of bounds for {self}");
        let at = self.start + mid;
        (Self::new(self.start, at), Self::new(at, self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(TaskRange::new(3, 3), 0, 3)]
    #[case::single(TaskRange::new(0, 1), 1, 0)]
    #[case::even(TaskRange::new(0, 8), 8, 4)]
    #[case::odd(TaskRange::new(10, 17), 7, 13)]
    fn test_len_and_midpoint(
        #[case] range: TaskRange,
        #[case] len: usize,
        #[case] midpoint: usize,
    ) {
        assert_eq!(range.len(), len);
        assert_eq!(range.is_empty(), len == 0);
        assert_eq!(range.midpoint(), midpoint);
    }

    #[test]
    fn test_validate() {
        assert!(TaskRange::new(0, 0).validate().is_ok());
        assert!(TaskRange::new(2, 9).validate().is_ok());

        let err = TaskRange::new(9, 2).validate().unwrap_err();
        assert!(matches!(err, Error::Split { start: 9, end: 2 }));
        assert_eq!(TaskRange::new(9, 2).len(), 0);
    }

    #[test]
    fn test_split_is_disjoint_and_covering() {
        let (left, right) = TaskRange::new(5, 12).split_at(3);
        assert_eq!(left, TaskRange::new(5, 8));
        assert_eq!(right, TaskRange::new(8, 12));
        assert_eq!(left.end, right.start);
        assert_eq!(left.len() + right.len(), 7);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_split_past_end_panics() {
        let _ = TaskRange::new(0, 4).split_at(5);
    }

    #[test]
    fn test_display_and_conversions() {
        let range = TaskRange::from(2..6);
        assert_eq!(range.to_string(), "[2, 6)");
        assert_eq!(range.as_range(), 2..6);
        assert!(range.contains(2));
        assert!(!range.contains(6));
    }
}
