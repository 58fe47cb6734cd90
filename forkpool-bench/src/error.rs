/// A pool variant disagreed with its sequential reference.
#[derive(Debug, thiserror::Error)]
#[error("{workload}: parallel result differs from sequential ({detail})")]
pub struct VerifyError {
    pub workload: &'static str,
    pub detail: String,
}

impl VerifyError {
    pub(crate) fn new(workload: &'static str, detail: impl Into<String>) -> Self {
        Self {
            workload,
            detail: detail.into(),
        }
    }
}
