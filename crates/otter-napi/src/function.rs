//! Native functions and calls into script
//!
//! A native callback returns `Result<Value>`. An `Err` is thrown into the
//! engine before control returns: a pending exception is left as is,
//! everything else becomes an error carrying [`Error::code`].
//!
//! Functions keep their [`Env`] alive until the host releases them.

use std::fmt;
use std::rc::Rc;

use otter_napi_sys::{
    napi_callback, napi_callback_frame, napi_callback_info, napi_env, napi_value,
};
use smallvec::SmallVec;

#[cfg(feature = "napi3")]
use crate::capability::version;
use crate::env::Env;
use crate::error::{Error, Result, check};
use crate::handle::Value;

type CallbackFn = dyn for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>>;

/// Native function body, bound to an environment when a function or
/// property is created from it.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>> + 'static,
    {
        Self(Rc::new(f))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// Receiver, arguments and `new.target` of the current native call.
#[derive(Debug, Clone)]
pub struct CallbackInfo<'env> {
    this: Value<'env>,
    args: SmallVec<[Value<'env>; 8]>,
    new_target: Option<Value<'env>>,
}

impl<'env> CallbackInfo<'env> {
    fn from_frame(frame: napi_callback_frame) -> Self {
        Self {
            this: Value::from_raw(frame.this),
            args: frame.args.into_iter().map(Value::from_raw).collect(),
            new_target: frame.new_target.map(Value::from_raw),
        }
    }

    pub fn this(&self) -> Value<'env> {
        self.this
    }

    pub fn args(&self) -> &[Value<'env>] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<Value<'env>> {
        self.args.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn new_target(&self) -> Option<Value<'env>> {
        self.new_target
    }

    pub fn is_construct_call(&self) -> bool {
        self.new_target.is_some()
    }
}

fn raw_args(args: &[Value<'_>]) -> SmallVec<[napi_value; 8]> {
    args.iter().map(|arg| arg.raw()).collect()
}

impl Env {
    pub fn create_function<F>(&self, name: &str, f: F) -> Result<Value<'_>>
    where
        F: for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>> + 'static,
    {
        self.create_function_from(name, &Callback::new(f))
    }

    pub fn create_function_from(&self, name: &str, callback: &Callback) -> Result<Value<'_>> {
        let raw = check(
            self.host()
                .create_function(self.raw(), name, self.bind_callback(callback)),
        )?;
        Ok(self.value(raw))
    }

    pub fn call_function<'a>(
        &'a self,
        recv: Value<'_>,
        function: Value<'_>,
        args: &[Value<'_>],
    ) -> Result<Value<'a>> {
        let args = raw_args(args);
        let raw = check(
            self.host()
                .call_function(self.raw(), recv.raw(), function.raw(), &args),
        )?;
        Ok(self.value(raw))
    }

    /// Call `function` as a top-level entry from native code.
    ///
    /// There is no script frame to propagate to, so an exception thrown by
    /// the call is cleared and reported as fatal, and the result is
    /// [`Error::UncaughtException`].
    #[cfg(feature = "napi3")]
    pub fn call_function_with_checkpoint<'a>(
        &'a self,
        recv: Value<'_>,
        function: Value<'_>,
        args: &[Value<'_>],
    ) -> Result<Value<'a>> {
        self.require("call_function_with_checkpoint", version::CALLBACK_CHECKPOINT)?;
        let args = raw_args(args);
        let result = self
            .host()
            .make_callback(self.raw(), recv.raw(), function.raw(), &args);
        match check(result) {
            Ok(raw) => Ok(self.value(raw)),
            Err(err) => Err(self.escalate(err)),
        }
    }

    pub fn new_instance<'a>(
        &'a self,
        constructor: Value<'_>,
        args: &[Value<'_>],
    ) -> Result<Value<'a>> {
        let args = raw_args(args);
        let raw = check(
            self.host()
                .new_instance(self.raw(), constructor.raw(), &args),
        )?;
        Ok(self.value(raw))
    }

    /// Turn a layer callback into a host callback bound to this environment.
    pub(crate) fn bind_callback(&self, callback: &Callback) -> napi_callback {
        let env = self.clone();
        let callback = Rc::clone(&callback.0);
        Rc::new(move |raw_env: napi_env, info: napi_callback_info| {
            let frame = match check(env.host().get_cb_info(raw_env, info)) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::warn!(%err, "callback invoked without a frame");
                    return None;
                }
            };
            let info = CallbackInfo::from_frame(frame);
            match callback(&env, &info) {
                Ok(value) => Some(value.raw()),
                Err(err) => {
                    env.raise(&err);
                    None
                }
            }
        })
    }

    /// Throw `err` into the engine unless an exception is already pending.
    pub(crate) fn raise(&self, err: &Error) {
        if matches!(err, Error::PendingException | Error::UncaughtException) {
            return;
        }
        if let Ok(true) = check(self.host().is_exception_pending(self.raw())) {
            return;
        }
        let message = err.to_string();
        let code = Some(err.code());
        let thrown = match err {
            Error::TypeMismatch { .. } | Error::InvalidArgument(_) => {
                self.host().throw_type_error(self.raw(), code, &message)
            }
            _ => self.host().throw_error(self.raw(), code, &message),
        };
        if let Err(status) = thrown {
            tracing::error!(status, %err, "failed to throw native error");
        }
    }

    /// Report a pending exception as fatal after a top-level call failed.
    #[cfg(feature = "napi3")]
    pub(crate) fn escalate(&self, err: Error) -> Error {
        if !err.is_pending_exception() {
            return err;
        }
        let exception = check(self.host().get_and_clear_last_exception(self.raw()))
            .and_then(|exception| check(self.host().fatal_exception(self.raw(), exception)));
        match exception {
            Ok(()) => {
                tracing::error!("uncaught exception escalated");
                Error::UncaughtException
            }
            Err(err) => err,
        }
    }
}
