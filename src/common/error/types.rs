//! Unified error types for the render core.
use std::time::Duration;

use thiserror::Error;

/// Main error type for render operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend resources failed to load or initialize
    #[error("Backend '{backend}' is not ready: {reason}")]
    BackendNotReady { backend: &'static str, reason: String },

    /// Backend threw while typesetting
    #[error("Backend '{backend}' failed: {reason}")]
    BackendFailed { backend: &'static str, reason: String },

    /// Engine returned no markup for the content
    #[error("Backend '{backend}' rejected the content")]
    BackendRejected { backend: &'static str },

    /// Notation the engine does not understand
    #[error("Unsupported notation: {0}")]
    Unsupported(String),

    /// Element never became part of a live tree
    #[error("Element '{element}' was not attached within {timeout:?}")]
    NotAttached { element: String, timeout: Duration },

    /// Typesetting call did not settle before its deadline
    #[error("Backend '{backend}' did not finish within {timeout:?}")]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    /// A newer outcome was committed before this attempt could apply its result
    #[error("Render attempt was superseded")]
    Superseded,

    /// Solution payload could not be understood
    #[error("Invalid solution document: {0}")]
    InvalidSolution(String),

    /// The owning service has been disposed
    #[error("Render service has been disposed")]
    Disposed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::InvalidSolution(_) | Error::Disposed)
    }

    /// Whether the failure came from a backend that could not be loaded.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::BackendNotReady { .. })
    }

    /// Short stable tag for diagnostics and notifications.
    pub fn reason_tag(&self) -> &'static str {
        match self {
            Error::BackendNotReady { .. } => "not-ready",
            Error::BackendFailed { .. } => "backend-failed",
            Error::BackendRejected { .. } => "rejected",
            Error::Unsupported(_) => "unsupported",
            Error::NotAttached { .. } => "not-attached",
            Error::Timeout { .. } => "timeout",
            Error::Superseded => "superseded",
            Error::InvalidSolution(_) => "invalid-solution",
            Error::Disposed => "disposed",
            Error::Other(_) => "other",
        }
    }
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tags_are_distinct_for_attachment_and_timeout() {
        let attach = Error::NotAttached {
            element: "mr-1".to_string(),
            timeout: Duration::from_millis(10),
        };
        let timeout = Error::Timeout {
            backend: "fast",
            timeout: Duration::from_millis(10),
        };
        assert_eq!(attach.reason_tag(), "not-attached");
        assert_eq!(timeout.reason_tag(), "timeout");
        assert!(attach.is_retryable());
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_disposed_is_terminal() {
        assert!(!Error::Disposed.is_retryable());
        assert!(Error::BackendNotReady {
            backend: "robust",
            reason: "script missing".to_string()
        }
        .is_unavailable());
    }
}
