use std::time::Duration;
use thiserror::Error;

/// Reasons a worker could not be handed out.
///
/// `NotFoundOrForbidden` covers both a missing publication and a denied
/// requester.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Flow not found or access denied")]
    NotFoundOrForbidden,

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Worker failed to start: {0}")]
    SpawnFailure(String),

    #[error("Worker not ready after {timeout:?}")]
    ReadinessTimeout { timeout: Duration },

    #[error("Pool is shut down")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
