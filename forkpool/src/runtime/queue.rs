use crossbeam_deque::{Injector, Steal, Stealer, Worker as CbWorker};
use std::iter;

/// Per-worker deque. The owner pushes and pops the same end (LIFO) so the
/// most recently split, smallest job runs next while it's still in cache.
#[derive(Debug)]
pub(crate) struct WorkQueue<T> {
    local: CbWorker<T>,
}

/// Thief side of a [`WorkQueue`]. Pops the opposite end (FIFO relative to
/// pushes), which hands out the oldest and largest piece of work.
#[derive(Debug, Clone)]
pub(crate) struct RemoteQueue<T> {
    stealer: Stealer<T>,
}

impl<T> WorkQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            local: CbWorker::new_lifo(),
        }
    }

    pub(crate) fn remote(&self) -> RemoteQueue<T> {
        RemoteQueue {
            stealer: self.local.stealer(),
        }
    }

    pub(crate) fn push_local(&self, item: T) {
        self.local.push(item);
    }

    pub(crate) fn pop_local(&self) -> Option<T> {
        self.local.pop()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Moves a batch of jobs from the global injector into this queue and
    /// returns one of them.
    pub(crate) fn steal_batch_from(
        &self,
        injector: &Injector<T>,
        max_retries: usize,
    ) -> Option<T> {
        retry(max_retries, || injector.steal_batch_and_pop(&self.local))
    }
}

impl<T> RemoteQueue<T> {
    /// Steals one item, retrying up to `max_retries` times while the owner or
    /// another thief races us. Never blocks.
    pub(crate) fn pop_remote(&self, max_retries: usize) -> Option<T> {
        retry(max_retries, || self.stealer.steal())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.stealer.is_empty()
    }
}

fn retry<T>(max_retries: usize, steal: impl FnMut() -> Steal<T>) -> Option<T> {
    iter::repeat_with(steal)
        .take(max_retries)
        .find(|s| !s.is_retry())
        .and_then(|s| s.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    const RETRIES: usize = 3;

    #[test]
    fn test_local_pops_are_lifo() {
        let queue = WorkQueue::new();
        (1..=3).for_each(|i| queue.push_local(i));

        assert_eq!(queue.pop_local(), Some(3));
        assert_eq!(queue.pop_local(), Some(2));
        assert_eq!(queue.pop_local(), Some(1));
        assert_eq!(queue.pop_local(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remote_pops_are_fifo() {
        let queue = WorkQueue::new();
        let remote = queue.remote();
        (1..=3).for_each(|i| queue.push_local(i));

        assert_eq!(remote.pop_remote(RETRIES), Some(1));
        assert_eq!(queue.pop_local(), Some(3));
        assert_eq!(remote.pop_remote(RETRIES), Some(2));
        assert_eq!(remote.pop_remote(RETRIES), None);
        assert!(remote.is_empty());
    }

    #[test]
    fn test_steal_batch_from_injector() {
        let injector = Injector::new();
        let queue = WorkQueue::new();
        assert_eq!(queue.steal_batch_from(&injector, RETRIES), None);

        (0..4).for_each(|i| injector.push(i));
        let first = queue.steal_batch_from(&injector, RETRIES);
        assert_eq!(first, Some(0));

        let mut rest = Vec::new();
        while let Some(i) = queue.pop_local().or_else(|| injector.steal().success()) {
            rest.push(i);
        }
        rest.sort_unstable();
        assert_eq!(rest, vec![1, 2, 3]);
    }

    #[test]
    fn test_each_item_popped_once_under_concurrent_thieves() {
        const ITEMS: usize = 10_000;
        const THIEVES: usize = 4;

        let queue = WorkQueue::new();
        let done_pushing = Arc::new(AtomicBool::new(false));

        let thieves = (0..THIEVES)
            .map(|_| {
                let remote = queue.remote();
                let done_pushing = Arc::clone(&done_pushing);
                thread::spawn(move || {
                    let mut stolen = Vec::new();
                    loop {
                        match remote.pop_remote(RETRIES) {
                            Some(i) => stolen.push(i),
                            None if done_pushing.load(Ordering::Acquire) && remote.is_empty() => {
                                break stolen;
                            }
                            None => thread::yield_now(),
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        let mut popped = Vec::new();
        for i in 0..ITEMS {
            queue.push_local(i);
            if i % 3 == 0 {
                popped.extend(queue.pop_local());
            }
        }
        done_pushing.store(true, Ordering::Release);
        while let Some(item) = queue.pop_local() {
            popped.push(item);
        }

        for thief in thieves {
            popped.extend(thief.join().unwrap());
        }

        assert_eq!(popped.len(), ITEMS);
        assert_eq!(popped.into_iter().collect::<HashSet<_>>().len(), ITEMS);
    }
}
