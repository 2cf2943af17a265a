//! Value handles, handle scopes and counted references
//!
//! A [`Value`] is only valid while the handle scope it was created in is
//! open. The host detects use after close and reports it as
//! [`UsageViolation::HandleScope`](crate::UsageViolation::HandleScope).
//! A [`Reference`] keeps its target alive across scopes while its count
//! is above zero.

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use otter_napi_sys::{napi_escapable_handle_scope, napi_handle_scope, napi_ref, napi_value};

use crate::env::Env;
use crate::error::{Error, Result, UsageViolation, check};

/// Scope-bound engine value.
///
/// Tied to the environment by lifetime and never `Send`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Value<'env> {
    raw: napi_value,
    _env: PhantomData<&'env Env>,
}

impl<'env> Value<'env> {
    pub(crate) fn from_raw(raw: napi_value) -> Self {
        Self {
            raw,
            _env: PhantomData,
        }
    }

    pub fn raw(self) -> napi_value {
        self.raw
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:#x})", self.raw.0)
    }
}

/// Handle scope, closed on drop or explicitly with [`HandleScope::close`].
#[must_use = "a handle scope closes as soon as it is dropped"]
pub struct HandleScope<'env> {
    env: &'env Env,
    raw: napi_handle_scope,
    open: bool,
}

impl<'env> HandleScope<'env> {
    pub fn open(env: &'env Env) -> Result<Self> {
        let raw = check(env.host().open_handle_scope(env.raw()))?;
        Ok(Self {
            env,
            raw,
            open: true,
        })
    }

    /// Close the scope. Scopes must close in reverse order of opening.
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        check(self.env.host().close_handle_scope(self.env.raw(), self.raw))
    }
}

impl Drop for HandleScope<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = check(self.env.host().close_handle_scope(self.env.raw(), self.raw)) {
                tracing::warn!(%err, "failed to close handle scope");
            }
        }
    }
}

/// Handle scope that can promote exactly one value to its parent scope.
#[must_use = "a handle scope closes as soon as it is dropped"]
pub struct EscapableHandleScope<'env> {
    env: &'env Env,
    raw: napi_escapable_handle_scope,
    open: bool,
}

impl<'env> EscapableHandleScope<'env> {
    pub fn open(env: &'env Env) -> Result<Self> {
        let raw = check(env.host().open_escapable_handle_scope(env.raw()))?;
        Ok(Self {
            env,
            raw,
            open: true,
        })
    }

    /// Promote `value` to the parent scope. A second escape fails.
    pub fn escape(&self, value: Value<'env>) -> Result<Value<'env>> {
        let raw = check(
            self.env
                .host()
                .escape_handle(self.env.raw(), self.raw, value.raw()),
        )?;
        Ok(Value::from_raw(raw))
    }

    pub fn close(mut self) -> Result<()> {
        self.open = false;
        check(
            self.env
                .host()
                .close_escapable_handle_scope(self.env.raw(), self.raw),
        )
    }
}

impl Drop for EscapableHandleScope<'_> {
    fn drop(&mut self) {
        if self.open {
            let closed = self
                .env
                .host()
                .close_escapable_handle_scope(self.env.raw(), self.raw);
            if let Err(err) = check(closed) {
                tracing::warn!(%err, "failed to close escapable handle scope");
            }
        }
    }
}

impl Env {
    pub fn open_handle_scope(&self) -> Result<HandleScope<'_>> {
        HandleScope::open(self)
    }

    pub fn open_escapable_handle_scope(&self) -> Result<EscapableHandleScope<'_>> {
        EscapableHandleScope::open(self)
    }

    /// Run `f` inside a fresh handle scope.
    pub fn with_handle_scope<R>(&self, f: impl FnOnce(&Env) -> Result<R>) -> Result<R> {
        let scope = self.open_handle_scope()?;
        let result = f(self);
        scope.close()?;
        result
    }

    /// Create a reference with an initial count. A count of zero is weak.
    pub fn create_reference(&self, value: Value<'_>, initial_refcount: u32) -> Result<Reference> {
        let raw = check(
            self.host()
                .create_reference(self.raw(), value.raw(), initial_refcount),
        )?;
        Ok(Reference {
            env: self.clone(),
            raw,
            count: Cell::new(initial_refcount),
            deleted: false,
        })
    }
}

/// Counted reference to an engine value.
///
/// Strong while the count is above zero. A weak reference yields `None`
/// once the target has been collected. Deleted on drop.
pub struct Reference {
    env: Env,
    raw: napi_ref,
    count: Cell<u32>,
    deleted: bool,
}

impl Reference {
    pub fn raw(&self) -> napi_ref {
        self.raw
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    /// Increment the count ("ref"). Returns the new count.
    pub fn increment(&self) -> Result<u32> {
        let count = check(self.env.host().reference_ref(self.env.raw(), self.raw))?;
        self.count.set(count);
        Ok(count)
    }

    /// Decrement the count ("unref"). Returns the new count.
    pub fn decrement(&self) -> Result<u32> {
        if self.count.get() == 0 {
            return Err(Error::usage(UsageViolation::UnrefBelowZero));
        }
        let count = check(self.env.host().reference_unref(self.env.raw(), self.raw))?;
        self.count.set(count);
        Ok(count)
    }

    /// Current target, or `None` if a weak target was collected.
    pub fn get(&self) -> Result<Option<Value<'_>>> {
        let raw = check(
            self.env
                .host()
                .get_reference_value(self.env.raw(), self.raw),
        )?;
        Ok(raw.map(Value::from_raw))
    }

    pub fn delete(mut self) -> Result<()> {
        self.deleted = true;
        check(self.env.host().delete_reference(self.env.raw(), self.raw))
    }
}

impl Drop for Reference {
    fn drop(&mut self) {
        if !self.deleted {
            if let Err(err) = check(self.env.host().delete_reference(self.env.raw(), self.raw)) {
                tracing::debug!(%err, "failed to delete reference on drop");
            }
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("raw", &self.raw)
            .field("count", &self.count.get())
            .finish()
    }
}
