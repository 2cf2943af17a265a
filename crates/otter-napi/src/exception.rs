//! Error construction, throwing and pending-exception handling
//!
//! `create_*` build an error object without throwing it. `throw_*` leave
//! an exception pending; native code should then return
//! [`Error::PendingException`] so the exception reaches script. The
//! `*_fmt` variants and the `throw_*f!` macros format the message first.

use std::fmt;

#[cfg(any(feature = "napi3", feature = "napi9"))]
use crate::capability::version;
use crate::env::Env;
use crate::error::{Result, check};
use crate::format::format_message;
use crate::handle::Value;

#[derive(Debug, Clone, Copy)]
enum ErrorClass {
    Error,
    TypeError,
    RangeError,
    #[cfg(feature = "napi9")]
    SyntaxError,
}

impl Env {
    fn error_of(&self, class: ErrorClass, code: Option<&str>, message: &str) -> Result<Value<'_>> {
        let code = code
            .map(|code| self.create_string_utf8(code).map(Value::raw))
            .transpose()?;
        let message = self.create_string_utf8(message)?.raw();
        let host = self.host();
        let raw = match class {
            ErrorClass::Error => host.create_error(self.raw(), code, message),
            ErrorClass::TypeError => host.create_type_error(self.raw(), code, message),
            ErrorClass::RangeError => host.create_range_error(self.raw(), code, message),
            #[cfg(feature = "napi9")]
            ErrorClass::SyntaxError => host.create_syntax_error(self.raw(), code, message),
        };
        Ok(self.value(check(raw)?))
    }

    fn throw_of(&self, class: ErrorClass, code: Option<&str>, message: &str) -> Result<()> {
        let host = self.host();
        check(match class {
            ErrorClass::Error => host.throw_error(self.raw(), code, message),
            ErrorClass::TypeError => host.throw_type_error(self.raw(), code, message),
            ErrorClass::RangeError => host.throw_range_error(self.raw(), code, message),
            #[cfg(feature = "napi9")]
            ErrorClass::SyntaxError => host.throw_syntax_error(self.raw(), code, message),
        })
    }

    pub fn create_error(&self, code: Option<&str>, message: &str) -> Result<Value<'_>> {
        self.error_of(ErrorClass::Error, code, message)
    }

    pub fn create_type_error(&self, code: Option<&str>, message: &str) -> Result<Value<'_>> {
        self.error_of(ErrorClass::TypeError, code, message)
    }

    pub fn create_range_error(&self, code: Option<&str>, message: &str) -> Result<Value<'_>> {
        self.error_of(ErrorClass::RangeError, code, message)
    }

    #[cfg(feature = "napi9")]
    pub fn create_syntax_error(&self, code: Option<&str>, message: &str) -> Result<Value<'_>> {
        self.require("create_syntax_error", version::SYNTAX_ERRORS)?;
        self.error_of(ErrorClass::SyntaxError, code, message)
    }

    /// Throw any value.
    pub fn throw(&self, error: Value<'_>) -> Result<()> {
        check(self.host().throw(self.raw(), error.raw()))
    }

    pub fn throw_error(&self, code: Option<&str>, message: &str) -> Result<()> {
        self.throw_of(ErrorClass::Error, code, message)
    }

    pub fn throw_type_error(&self, code: Option<&str>, message: &str) -> Result<()> {
        self.throw_of(ErrorClass::TypeError, code, message)
    }

    pub fn throw_range_error(&self, code: Option<&str>, message: &str) -> Result<()> {
        self.throw_of(ErrorClass::RangeError, code, message)
    }

    #[cfg(feature = "napi9")]
    pub fn throw_syntax_error(&self, code: Option<&str>, message: &str) -> Result<()> {
        self.require("throw_syntax_error", version::SYNTAX_ERRORS)?;
        self.throw_of(ErrorClass::SyntaxError, code, message)
    }

    pub fn throw_error_fmt(&self, code: Option<&str>, args: fmt::Arguments<'_>) -> Result<()> {
        self.throw_error(code, &format_message(args))
    }

    pub fn throw_type_error_fmt(&self, code: Option<&str>, args: fmt::Arguments<'_>) -> Result<()> {
        self.throw_type_error(code, &format_message(args))
    }

    pub fn throw_range_error_fmt(&self, code: Option<&str>, args: fmt::Arguments<'_>) -> Result<()> {
        self.throw_range_error(code, &format_message(args))
    }

    #[cfg(feature = "napi9")]
    pub fn throw_syntax_error_fmt(
        &self,
        code: Option<&str>,
        args: fmt::Arguments<'_>,
    ) -> Result<()> {
        self.throw_syntax_error(code, &format_message(args))
    }

    pub fn is_exception_pending(&self) -> Result<bool> {
        check(self.host().is_exception_pending(self.raw()))
    }

    /// Clear and return the pending exception, if any.
    pub fn take_pending_exception(&self) -> Result<Option<Value<'_>>> {
        if !self.is_exception_pending()? {
            return Ok(None);
        }
        let raw = check(self.host().get_and_clear_last_exception(self.raw()))?;
        Ok(Some(self.value(raw)))
    }

    /// Report `error` to the host as an uncaught exception.
    #[cfg(feature = "napi3")]
    pub fn fatal_exception(&self, error: Value<'_>) -> Result<()> {
        self.require("fatal_exception", version::FATAL_EXCEPTION)?;
        tracing::error!("escalating fatal exception");
        check(self.host().fatal_exception(self.raw(), error.raw()))
    }
}

/// Throw an `Error` with a formatted message.
///
/// ```
/// # use otter_napi::{Env, throw_errorf};
/// # use otter_napi_host::{HostConfig, MemoryHost};
/// # let host = MemoryHost::new(HostConfig::default());
/// # let env = Env::new(host.clone(), host.env()).unwrap();
/// let (index, length) = (7, 4);
/// throw_errorf!(env, Some("ERR_OUT_OF_RANGE"), "index {} exceeds {}", index, length).unwrap();
/// assert!(env.is_exception_pending().unwrap());
/// ```
#[macro_export]
macro_rules! throw_errorf {
    ($env:expr, $code:expr, $($arg:tt)+) => {
        $env.throw_error_fmt($code, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! throw_type_errorf {
    ($env:expr, $code:expr, $($arg:tt)+) => {
        $env.throw_type_error_fmt($code, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! throw_range_errorf {
    ($env:expr, $code:expr, $($arg:tt)+) => {
        $env.throw_range_error_fmt($code, format_args!($($arg)+))
    };
}

#[cfg(feature = "napi9")]
#[macro_export]
macro_rules! throw_syntax_errorf {
    ($env:expr, $code:expr, $($arg:tt)+) => {
        $env.throw_syntax_error_fmt($code, format_args!($($arg)+))
    };
}
