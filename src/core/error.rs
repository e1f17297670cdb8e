use thiserror::Error;

/// Error taxonomy for the scheduling core. Job-level failures are recorded on
/// the job itself and never propagate out of the dispatch loop; these variants
/// surface through the submission API and the orchestrator.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("remote call failed: {0}")]
    RemoteCall(String),

    #[error("remote call timed out after {0} seconds")]
    Timeout(u64),

    #[error("job {0} cannot be cancelled")]
    NotCancellable(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
