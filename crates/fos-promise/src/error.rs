//! Bridge Errors

use fos_eventloop::LoopError;

/// Promise bridge error
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Global '{0}' is already defined")]
    GlobalInUse(String),

    #[error("Event loop error: {0}")]
    Loop(#[from] LoopError),
}
