//! Normalized status codes.
//!
//! Hosts report a wide set of raw statuses. Embedders only ever observe
//! three: success, a recoverable failure (usually a pending script
//! exception) and an uncaught exception that was escalated to the host.

use otter_napi_sys::{napi_ok, napi_status};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok = 0,
    /// The operation failed; a script exception may be pending.
    PendingException = -1,
    /// A script exception escaped a top-level call and was escalated.
    UncaughtException = -2,
}

impl Status {
    /// Fold a raw host status. Every non-success code becomes `PendingException`.
    pub fn from_host(status: napi_status) -> Self {
        if status == napi_ok {
            Self::Ok
        } else {
            Self::PendingException
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<Status> for i32 {
    fn from(status: Status) -> Self {
        status.code()
    }
}
