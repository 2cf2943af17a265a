//! Error types for the embedding layer
//!
//! Host failures are folded into a small taxonomy. Every variant maps onto
//! one of the normalized [`Status`] codes, so callers that only care about
//! the status can use [`Error::status`].

use otter_napi_sys::{
    napi_closing, napi_escape_called_twice, napi_handle_scope_mismatch, napi_pending_exception,
    napi_queue_full, napi_status, napi_would_deadlock,
};
use thiserror::Error;

use crate::status::Status;

/// Result type alias for layer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Misuse of the layer that a well-formed program never triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UsageViolation {
    #[error("handle scope closed out of order, or a handle used after its scope closed")]
    HandleScope,

    #[error("escapable handle scope escaped more than once")]
    EscapeCalledTwice,

    #[error("reference count decremented below zero")]
    UnrefBelowZero,

    #[error("threadsafe function released more times than acquired")]
    ReleaseUnderflow,

    #[error("threadsafe function called after its last release")]
    CallAfterRelease,

    #[error("blocking call on the engine thread would deadlock")]
    WouldDeadlock,

    #[error("accessor property has neither getter nor setter")]
    EmptyAccessor,

    #[error("teardown callback already registered for this data")]
    DuplicateTeardown,

    #[error("teardown callback was not registered")]
    UnknownTeardown,

    #[error("deferred teardown already finished")]
    TeardownFinished,
}

/// Errors returned by layer operations
#[derive(Debug, Error)]
pub enum Error {
    /// A script exception is pending in the environment
    #[error("a script exception is pending")]
    PendingException,

    /// The host rejected the operation without further detail
    #[error("host operation failed")]
    Failed,

    /// A script exception escaped a top-level call and was escalated
    #[error("uncaught script exception")]
    UncaughtException,

    #[error("usage violation: {0}")]
    Usage(#[from] UsageViolation),

    /// Nonblocking call on a full threadsafe function queue
    #[error("threadsafe function queue is full")]
    QueueFull,

    /// The threadsafe function is shutting down
    #[error("threadsafe function is closing")]
    Closing,

    /// Operation needs a newer interface version than the environment provides
    #[error("{operation} requires interface version {required}, environment provides {available}")]
    Unsupported {
        operation: &'static str,
        required: u32,
        available: u32,
    },

    /// An argument was rejected before reaching the host
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Native data or value had an unexpected type
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

impl Error {
    /// Translate a raw host status. Must not be called with `napi_ok`.
    pub fn from_host(status: napi_status) -> Self {
        let error = match status {
            napi_pending_exception => Self::PendingException,
            napi_handle_scope_mismatch => Self::Usage(UsageViolation::HandleScope),
            napi_escape_called_twice => Self::Usage(UsageViolation::EscapeCalledTwice),
            napi_would_deadlock => Self::Usage(UsageViolation::WouldDeadlock),
            napi_queue_full => Self::QueueFull,
            napi_closing => Self::Closing,
            _ => Self::Failed,
        };
        if let Self::Usage(violation) = &error {
            tracing::error!(%violation, "host reported usage violation");
        } else {
            tracing::trace!(status, "host call failed");
        }
        error
    }

    pub fn usage(violation: UsageViolation) -> Self {
        tracing::error!(%violation, "usage violation");
        Self::Usage(violation)
    }

    pub fn unsupported(operation: &'static str, required: u32, available: u32) -> Self {
        Self::Unsupported {
            operation,
            required,
            available,
        }
    }

    pub fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// Normalized status for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::UncaughtException => Status::UncaughtException,
            _ => Status::PendingException,
        }
    }

    /// Error code attached when the error is rethrown into script.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PendingException => "ERR_NAPI_PENDING_EXCEPTION",
            Self::Failed => "ERR_NAPI_FAILED",
            Self::UncaughtException => "ERR_NAPI_UNCAUGHT_EXCEPTION",
            Self::Usage(_) => "ERR_NAPI_USAGE",
            Self::QueueFull => "ERR_NAPI_QUEUE_FULL",
            Self::Closing => "ERR_NAPI_CLOSING",
            Self::Unsupported { .. } => "ERR_NAPI_UNSUPPORTED",
            Self::InvalidArgument(_) => "ERR_INVALID_ARG_VALUE",
            Self::TypeMismatch { .. } => "ERR_INVALID_ARG_TYPE",
        }
    }

    pub fn is_pending_exception(&self) -> bool {
        matches!(self, Self::PendingException)
    }
}

/// Turn a host call result into a layer result.
pub(crate) fn check<T>(result: otter_napi_sys::HostResult<T>) -> Result<T> {
    result.map_err(Error::from_host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_napi_sys::{napi_generic_failure, napi_invalid_arg, napi_object_expected};

    #[test]
    fn test_from_host_mapping() {
        assert!(matches!(
            Error::from_host(napi_pending_exception),
            Error::PendingException
        ));
        assert!(matches!(
            Error::from_host(napi_handle_scope_mismatch),
            Error::Usage(UsageViolation::HandleScope)
        ));
        assert!(matches!(Error::from_host(napi_queue_full), Error::QueueFull));
        assert!(matches!(Error::from_host(napi_closing), Error::Closing));
        assert!(matches!(Error::from_host(napi_object_expected), Error::Failed));
        assert!(matches!(Error::from_host(napi_generic_failure), Error::Failed));
    }

    #[test]
    fn test_status_folding() {
        assert_eq!(Error::Failed.status(), Status::PendingException);
        assert_eq!(Error::QueueFull.status(), Status::PendingException);
        assert_eq!(
            Error::usage(UsageViolation::EmptyAccessor).status(),
            Status::PendingException
        );
        assert_eq!(Error::UncaughtException.status(), Status::UncaughtException);
        assert_eq!(Error::from_host(napi_invalid_arg).status().code(), -1);
    }

    #[test]
    fn test_display() {
        let err = Error::unsupported("symbol_for", 9, 8);
        assert_eq!(
            err.to_string(),
            "symbol_for requires interface version 9, environment provides 8"
        );
        let err = Error::type_mismatch("Counter", "other native data");
        assert!(err.to_string().contains("Counter"));
    }
}
