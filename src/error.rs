//! XR error types.

use thiserror::Error;

use crate::types::SessionState;

/// Errors reported by the XR context.
///
/// Every variant is recoverable: the host loop is expected to re-poll or
/// re-request rather than abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XrError {
    /// The hosting environment has no XR support.
    #[error("XR is not available")]
    Unavailable,
    /// A session already occupies the context.
    #[error("XR session already active")]
    AlreadyActive,
    /// A handle or device was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation is not valid in the session's current state.
    #[error("session not ready (state: {0:?})")]
    NotReady(SessionState),
    /// The environment reported an asynchronous failure.
    #[error("XR session failed: {0}")]
    EnvironmentFailure(String),
}

pub type XrResult<T> = Result<T, XrError>;
