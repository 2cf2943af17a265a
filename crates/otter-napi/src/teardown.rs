//! Teardown hooks run when the environment shuts down
//!
//! Synchronous hooks run first, in reverse registration order. Deferred
//! hooks then start and shutdown waits until every one of them has called
//! [`DeferredTeardown::finish`], which may happen from any thread.
//!
//! A hook is identified by its callback function together with the
//! address of its data, so the same pair cannot be registered twice.

use std::rc::Rc;
#[cfg(feature = "napi8")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "napi8")]
use std::sync::{Arc, OnceLock};

use otter_napi_sys::napi_cleanup_hook_id;
#[cfg(feature = "napi8")]
use otter_napi_sys::napi_async_cleanup_hook_handle;
use rustc_hash::FxHashMap;

#[cfg(feature = "napi3")]
use crate::capability::version;
#[cfg(feature = "napi3")]
use crate::env::Env;
#[cfg(feature = "napi3")]
use crate::error::{Error, Result, UsageViolation, check};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct HookKey {
    callback: usize,
    data: usize,
}

impl HookKey {
    fn new<T>(callback: usize, data: &Rc<T>) -> Self {
        Self {
            callback,
            data: Rc::as_ptr(data) as *const () as usize,
        }
    }
}

#[derive(Default)]
pub(crate) struct TeardownRegistry {
    hooks: FxHashMap<HookKey, napi_cleanup_hook_id>,
    #[cfg(feature = "napi8")]
    deferred: FxHashMap<HookKey, DeferredTeardown>,
}

impl TeardownRegistry {
    pub(crate) fn len(&self) -> usize {
        #[cfg(feature = "napi8")]
        let deferred = self.deferred.values().filter(|d| !d.is_finished()).count();
        #[cfg(not(feature = "napi8"))]
        let deferred = 0;
        self.hooks.len() + deferred
    }
}

#[cfg(feature = "napi3")]
impl Env {
    /// Run `callback(&data)` during environment shutdown.
    pub fn add_teardown<T: 'static>(&self, callback: fn(&T), data: Rc<T>) -> Result<()> {
        self.require("add_teardown", version::CLEANUP_HOOKS)?;
        let key = HookKey::new(callback as usize, &data);
        if self.inner.teardown.borrow().hooks.contains_key(&key) {
            return Err(Error::usage(UsageViolation::DuplicateTeardown));
        }

        let env = self.downgrade();
        let hook = Box::new(move || {
            if let Some(env) = Env::upgrade(&env) {
                if let Ok(mut registry) = env.inner.teardown.try_borrow_mut() {
                    registry.hooks.remove(&key);
                }
            }
            callback(&data);
        });
        let id = check(self.host().add_env_cleanup_hook(self.raw(), hook))?;
        self.inner.teardown.borrow_mut().hooks.insert(key, id);
        tracing::debug!(hook = id.0, "teardown hook registered");
        Ok(())
    }

    /// Remove a hook registered with the same callback and data.
    pub fn remove_teardown<T: 'static>(&self, callback: fn(&T), data: &Rc<T>) -> Result<()> {
        self.require("remove_teardown", version::CLEANUP_HOOKS)?;
        let key = HookKey::new(callback as usize, data);
        let id = self.inner.teardown.borrow_mut().hooks.remove(&key);
        match id {
            Some(id) => check(self.host().remove_env_cleanup_hook(self.raw(), id)),
            None => Err(Error::usage(UsageViolation::UnknownTeardown)),
        }
    }

    /// Number of registered hooks that have not yet completed.
    pub fn pending_teardowns(&self) -> usize {
        self.inner.teardown.borrow().len()
    }
}

#[cfg(feature = "napi8")]
impl Env {
    /// Run `callback` during shutdown and keep shutdown waiting until the
    /// handle it receives is finished.
    ///
    /// Finishing the returned handle before shutdown unregisters the hook.
    pub fn add_deferred_teardown<T: 'static>(
        &self,
        callback: fn(DeferredTeardown, &T),
        data: Rc<T>,
    ) -> Result<DeferredTeardown> {
        self.require("add_deferred_teardown", version::DEFERRED_TEARDOWN)?;
        let key = HookKey::new(callback as usize, &data);
        {
            let mut registry = self.inner.teardown.borrow_mut();
            registry.deferred.retain(|_, handle| !handle.is_finished());
            if registry.deferred.contains_key(&key) {
                return Err(Error::usage(UsageViolation::DuplicateTeardown));
            }
        }

        let handle = DeferredTeardown::new();
        let started = handle.clone();
        let hook = Box::new(move |token: napi_async_cleanup_hook_handle| {
            started.attach(token);
            tracing::debug!("deferred teardown started");
            callback(started, &data);
        });
        let token = check(self.host().add_async_cleanup_hook(self.raw(), hook))?;
        handle.attach(token);
        self.inner
            .teardown
            .borrow_mut()
            .deferred
            .insert(key, handle.clone());
        Ok(handle)
    }
}

/// Completion handle of a deferred teardown hook.
///
/// Cloneable and `Send`, so completion can be signalled from a worker
/// thread after native resources are released.
#[cfg(feature = "napi8")]
#[derive(Clone)]
pub struct DeferredTeardown {
    inner: Arc<DeferredInner>,
}

#[cfg(feature = "napi8")]
struct DeferredInner {
    token: OnceLock<napi_async_cleanup_hook_handle>,
    finished: AtomicBool,
}

#[cfg(feature = "napi8")]
impl DeferredTeardown {
    fn new() -> Self {
        Self {
            inner: Arc::new(DeferredInner {
                token: OnceLock::new(),
                finished: AtomicBool::new(false),
            }),
        }
    }

    fn attach(&self, token: napi_async_cleanup_hook_handle) {
        let _ = self.inner.token.set(token);
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Signal completion. Finishing twice is a usage violation.
    pub fn finish(&self) -> Result<()> {
        if self.inner.finished.swap(true, Ordering::AcqRel) {
            return Err(Error::usage(UsageViolation::TeardownFinished));
        }
        match self.inner.token.get() {
            Some(token) => check(match token.remove() {
                otter_napi_sys::napi_ok => Ok(()),
                status => Err(status),
            }),
            None => Err(Error::Failed),
        }
    }
}

#[cfg(feature = "napi8")]
impl std::fmt::Debug for DeferredTeardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredTeardown")
            .field("finished", &self.is_finished())
            .finish()
    }
}
