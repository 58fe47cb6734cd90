use crate::task::TaskRange;

/// Failure surfaced by a submission to the pool.
///
/// A submission resolves to exactly one of these. When several leaves fail
/// concurrently the first one observed at a join wins, the others are dropped.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed task range: start {start} is past end {end}")]
    Split { start: usize, end: usize },

    #[error("base case failed on range {range}")]
    BaseCompute {
        range: TaskRange,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to combine results of {left} and {right}")]
    Combine {
        left: TaskRange,
        right: TaskRange,
        #[source]
        source: anyhow::Error,
    },

    #[error("thread pool is shut down, submission rejected")]
    PoolShutdown,

    #[error("not running on a forkpool worker thread")]
    NoActivePool,

    #[error("task panicked: {0}")]
    Panicked(String),

    /// A subtree that never ran because a sibling had already failed. Always
    /// loses against a real failure when two children are joined, so it can't
    /// reach the submitter.
    #[error("task skipped after an earlier failure")]
    Skipped,
}

impl Error {
    pub(crate) fn is_skipped(&self) -> bool {
        matches!(self, Error::Skipped)
    }

    /// Range the failure is attributed to, if any.
    pub fn range(&self) -> Option<TaskRange> {
        match self {
            Error::Split { start, end } => Some(TaskRange::new(*start, *end)),
            Error::BaseCompute { range, .. } => Some(*range),
            Error::Combine { left, right, .. } => Some(TaskRange::new(left.start, right.end)),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Best effort extraction of a panic message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
