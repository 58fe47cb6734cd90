//! k-nearest-neighbors classification of one query point.
//!
//! Leaves keep the `k` nearest training points of their range and combines
//! merge two candidate lists keeping the `k` smallest, so the parallel vote is
//! taken over exactly the same neighbors as the sequential one.

use crate::data::{NUM_LABELS, Point};
use forkpool::{ForkJoin, Task, TaskRange, ThreadPool};
use std::cmp::Ordering;

pub const THRESHOLD: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub index: usize,
    pub label: u8,
}

impl Neighbor {
    /// Nearest first, ties broken by training set index.
    fn cmp_nearest(&self, other: &Neighbor) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
    }
}

pub struct Knn<'a> {
    training: &'a [Point],
    query: Point,
    k: usize,
}

impl<'a> Knn<'a> {
    pub fn new(training: &'a [Point], query: Point, k: usize) -> Self {
        Self { training, query, k }
    }

    fn nearest_in(&self, range: TaskRange) -> Vec<Neighbor> {
        let mut candidates = self.training[range.as_range()]
            .iter()
            .zip(range.as_range())
            .map(|(p, index)| Neighbor {
                distance: p.distance(&self.query),
                index,
                label: p.label,
            })
            .collect::<Vec<_>>();

        candidates.sort_unstable_by(Neighbor::cmp_nearest);
        candidates.truncate(self.k);
        candidates
    }
}

impl ForkJoin for Knn<'_> {
    type Part = TaskRange;
    type Output = Vec<Neighbor>;

    fn compute_base(&self, part: TaskRange) -> anyhow::Result<Vec<Neighbor>> {
        Ok(self.nearest_in(part))
    }

    fn combine(&self, left: Vec<Neighbor>, right: Vec<Neighbor>) -> anyhow::Result<Vec<Neighbor>> {
        let mut merged = Vec::with_capacity(self.k.min(left.len() + right.len()));
        let (mut left, mut right) = (left.into_iter().peekable(), right.into_iter().peekable());

        while merged.len() < self.k {
            let take_right = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => l.cmp_nearest(r).is_gt(),
                (Some(_), None) => false,
                (None, _) => true,
            };
            let next = if take_right { right.next() } else { left.next() };

            match next {
                Some(n) => merged.push(n),
                None => break,
            }
        }
        Ok(merged)
    }
}

/// Majority label among `neighbors`, the smallest label wins a tie. `None`
/// without neighbors.
pub fn vote(neighbors: &[Neighbor]) -> Option<u8> {
    if neighbors.is_empty() {
        return None;
    }

    let mut votes = [0usize; NUM_LABELS];
    for n in neighbors {
        votes[usize::from(n.label)] += 1;
    }

    // `max_by_key` keeps the last maximum, walk labels backwards.
    (0..NUM_LABELS)
        .rev()
        .max_by_key(|&label| votes[label])
        .and_then(|label| u8::try_from(label).ok())
}

pub fn nearest_sequential(training: &[Point], query: Point, k: usize) -> Vec<Neighbor> {
    Knn::new(training, query, k).nearest_in(TaskRange::new(0, training.len()))
}

pub fn nearest_parallel(
    pool: &ThreadPool,
    training: &[Point],
    query: Point,
    k: usize,
) -> forkpool::Result<Vec<Neighbor>> {
    let job = Knn::new(training, query, k);
    pool.submit(Task::new(&job, TaskRange::new(0, training.len()), THRESHOLD))
}

pub fn classify_sequential(training: &[Point], query: Point, k: usize) -> Option<u8> {
    vote(&nearest_sequential(training, query, k))
}

pub fn classify_parallel(
    pool: &ThreadPool,
    training: &[Point],
    query: Point,
    k: usize,
) -> forkpool::Result<Option<u8>> {
    Ok(vote(&nearest_parallel(pool, training, query, k)?))
}
