//! Error taxonomy shared by the registry, the reconciliation engine and the
//! placement controller.
//!
//! Every variant is recoverable: callers surface it, log it, or swallow it
//! per entry during batch work. Nothing in here is process-fatal.

use thiserror::Error;

pub type MatchResult<T> = Result<T, MatchError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// Match, participant record or zone is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks the role or privilege the operation requires.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Duplicate match or zone already owned by another match.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed policy value, same-zone swap, missing roster, ...
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An external move / zone call failed.
    #[error("actuator failure: {0}")]
    ActuatorFailure(String),

    /// Store backend or (de)serialization failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl MatchError {
    pub fn not_found(what: impl Into<String>) -> Self {
        MatchError::NotFound(what.into())
    }

    pub fn permission_denied(why: impl Into<String>) -> Self {
        MatchError::PermissionDenied(why.into())
    }

    pub fn conflict(why: impl Into<String>) -> Self {
        MatchError::Conflict(why.into())
    }

    pub fn invalid(why: impl Into<String>) -> Self {
        MatchError::InvalidArgument(why.into())
    }

    /// Stable identifier used by the daemon's error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::NotFound(_) => "not_found",
            MatchError::PermissionDenied(_) => "permission_denied",
            MatchError::Conflict(_) => "conflict",
            MatchError::InvalidArgument(_) => "invalid_argument",
            MatchError::ActuatorFailure(_) => "actuator_failure",
            MatchError::Storage(_) => "storage",
        }
    }
}
