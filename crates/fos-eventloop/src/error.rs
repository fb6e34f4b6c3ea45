//! Event Loop Errors

/// Event loop error
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("Microtask budget of {0} exhausted")]
    MicrotaskBudgetExceeded(usize),

    #[error("No remote settlement is pending")]
    NoPendingRemote,

    #[error("Ingress channel closed")]
    IngressClosed,
}
