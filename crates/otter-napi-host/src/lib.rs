//! # Otter N-API reference host
//!
//! A single-environment, in-process engine implementing the
//! [`otter_napi_sys::NodeApi`] function table. It models enough of a
//! script engine to exercise embedding code end to end: a cell heap with
//! explicit mark-sweep collection, scoped handles, counted references,
//! finalizers, pending exceptions, a signal-driven engine loop and
//! environment teardown.
//!
//! ```ignore
//! let host = MemoryHost::new(HostConfig::default());
//! let api: Rc<dyn NodeApi> = host.clone();
//! // ... build an otter_napi::Env over `api` and `host.env()`
//! host.run_loop();
//! host.teardown();
//! ```

mod api;
mod event_loop;
mod handles;
mod heap;
mod state;

use std::cell::{RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use otter_napi_sys::{
    HostResult, NAPI_VERSION_MAX, NodeApi, napi_cannot_run_js, napi_closing, napi_env,
    napi_finalize, napi_invalid_arg, napi_pending_exception, napi_value,
};

use crate::event_loop::{CleanupToken, EventLoop, LoopMessage};
use crate::handles::FrameKind;
use crate::heap::{CellId, ObjectKind};
use crate::state::{HostState, Phase};

static NEXT_ENV: AtomicU64 = AtomicU64::new(1);

/// Reference host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Interface version reported to embedders.
    pub version: u32,
    /// Collect whenever a plain handle scope closes with more live cells
    /// than this. `None` leaves collection to [`MemoryHost::collect_garbage`].
    pub gc_threshold: Option<usize>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            version: NAPI_VERSION_MAX,
            gc_threshold: None,
        }
    }
}

impl HostConfig {
    pub fn with_version(version: u32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn with_gc_threshold(mut self, threshold: usize) -> Self {
        self.gc_threshold = Some(threshold);
        self
    }
}

/// In-process engine environment.
pub struct MemoryHost {
    config: HostConfig,
    env: napi_env,
    state: RefCell<HostState>,
    event_loop: EventLoop,
    this: Weak<MemoryHost>,
}

impl MemoryHost {
    pub fn new(config: HostConfig) -> Rc<Self> {
        let env = napi_env(NEXT_ENV.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(env = env.0, version = config.version, "creating reference host");
        Rc::new_cyclic(|this| Self {
            config,
            env,
            state: RefCell::new(HostState::new()),
            event_loop: EventLoop::new(),
            this: this.clone(),
        })
    }

    pub fn env(&self) -> napi_env {
        self.env
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Number of live heap cells.
    pub fn live_cells(&self) -> usize {
        self.state.borrow().heap.live()
    }

    /// Number of live value handles across all open scopes.
    pub fn live_handles(&self) -> usize {
        self.state.borrow().handles.len()
    }

    /// Number of open handle scopes above the root scope.
    pub fn scope_depth(&self) -> usize {
        self.state.borrow().handles.depth()
    }

    pub fn external_memory(&self) -> i64 {
        self.state.borrow().external_memory
    }

    /// Exceptions escalated to the host, oldest first.
    pub fn uncaught_exceptions(&self) -> Vec<String> {
        self.state.borrow().uncaught.clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.state.borrow().phase == Phase::Terminated
    }

    pub fn open_signals(&self) -> usize {
        self.event_loop.open_signals()
    }

    /// Run a full collection and the finalizers of everything swept.
    /// Returns the number of cells reclaimed.
    pub fn collect_garbage(&self) -> usize {
        let (finalizers, swept) = {
            let mut state = self.state.borrow_mut();
            let roots = state.roots();
            let mut swept = state.heap.collect(roots);
            let finalizers = state.release(&mut swept);
            (finalizers, swept)
        };
        let count = swept.len();
        tracing::trace!(count, finalizers = finalizers.len(), "collected cells");
        drop(swept);
        self.run_finalizers(finalizers);
        count
    }

    /// Run the engine loop until no refed signal remains and the queue is empty.
    /// Returns the number of signal callbacks dispatched.
    pub fn run_loop(&self) -> usize {
        let mut dispatched = 0;
        loop {
            let alive = self.event_loop.is_alive();
            match self.event_loop.next_message(alive) {
                Some(message) => dispatched += usize::from(self.dispatch(message)),
                None => break,
            }
        }
        self.event_loop.sweep_closed();
        dispatched
    }

    /// Dispatch whatever is already queued without blocking.
    pub fn run_pending(&self) -> usize {
        let mut dispatched = 0;
        while let Some(message) = self.event_loop.next_message(false) {
            dispatched += usize::from(self.dispatch(message));
        }
        self.event_loop.sweep_closed();
        dispatched
    }

    /// Load a registered module into a fresh exports object.
    pub fn load_module(&self, filename: &str) -> HostResult<napi_value> {
        let (module, exports) = {
            let mut state = self.state.borrow_mut();
            let module = state
                .modules
                .iter()
                .rev()
                .find(|module| module.nm_filename == filename)
                .cloned()
                .ok_or(napi_invalid_arg)?;
            let exports = state.new_object(ObjectKind::Ordinary);
            (module, state.handle(exports))
        };
        let host: Rc<dyn NodeApi> = self.this.upgrade().ok_or(napi_closing)?;
        tracing::debug!(filename, "loading module");
        let returned = (module.nm_register_func)(host, self.env, exports);
        let state = self.state.borrow();
        if state.pending_exception.is_some() {
            return Err(napi_pending_exception);
        }
        Ok(returned.unwrap_or(exports))
    }

    /// Tear the environment down.
    ///
    /// Synchronous hooks run in reverse registration order, then deferred
    /// hooks start and the loop keeps running until every one of them has
    /// finished. Remaining finalizers run last.
    pub fn teardown(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != Phase::Running {
                return;
            }
            state.phase = Phase::TearingDown;
        }
        tracing::debug!(env = self.env.0, "environment teardown started");

        loop {
            let hook = self.state.borrow_mut().cleanup_hooks.pop();
            match hook {
                Some((_, hook)) => hook(),
                None => break,
            }
        }

        let deferred = std::mem::take(&mut self.state.borrow_mut().async_hooks);
        let mut outstanding: Vec<Arc<CleanupToken>> = Vec::new();
        for (token, hook) in deferred.into_iter().rev() {
            if token.is_removed() {
                continue;
            }
            hook(token.clone());
            outstanding.push(token);
        }
        while outstanding.iter().any(|token| !token.is_removed()) {
            match self.event_loop.next_message(true) {
                Some(message) => {
                    self.dispatch(message);
                }
                None => break,
            }
        }

        self.event_loop.close_all();
        let (finalizers, swept, modules) = {
            let mut state = self.state.borrow_mut();
            state.refs.clear();
            state.deferreds.clear();
            state.pending_exception = None;
            let roots = [state.undefined, state.null, state.true_, state.false_];
            let mut swept = state.heap.collect(roots);
            let finalizers = state.release(&mut swept);
            let modules = std::mem::take(&mut state.modules);
            (finalizers, swept, modules)
        };
        drop(swept);
        drop(modules);
        self.run_finalizers(finalizers);
        self.state.borrow_mut().phase = Phase::Terminated;
        tracing::debug!(env = self.env.0, "environment teardown finished");
    }

    // Internals shared with the api module

    fn state(&self, env: napi_env) -> HostResult<RefMut<'_, HostState>> {
        if env != self.env {
            return Err(napi_invalid_arg);
        }
        let state = self.state.borrow_mut();
        if state.phase == Phase::Terminated {
            return Err(napi_closing);
        }
        Ok(state)
    }

    /// Fail calls into script once teardown has started or an exception is pending.
    fn enter_script(&self, state: &HostState) -> HostResult<()> {
        if state.phase != Phase::Running {
            return Err(if self.config.version >= 9 {
                napi_cannot_run_js
            } else {
                napi_pending_exception
            });
        }
        if state.pending_exception.is_some() {
            return Err(napi_pending_exception);
        }
        Ok(())
    }

    /// Invoke a native callback inside its own handle frame.
    fn invoke(
        &self,
        callback: &otter_napi_sys::napi_callback,
        this: CellId,
        args: Vec<CellId>,
        new_target: Option<CellId>,
    ) -> HostResult<CellId> {
        let (frame, info) = {
            let mut state = self.state.borrow_mut();
            let undefined = state.undefined;
            let frame = state.handles.open(FrameKind::Callback, undefined);
            let info = state.next_id();
            state.frames.insert(
                info,
                state::CallbackFrame {
                    this,
                    args,
                    new_target,
                },
            );
            (frame, info)
        };
        let guard = scopeguard::guard((), |_| {
            if let Ok(mut state) = self.state.try_borrow_mut() {
                state.frames.remove(&info);
                state.handles.unwind_to(frame);
            }
        });
        let returned = callback(self.env, otter_napi_sys::napi_callback_info(info));
        scopeguard::ScopeGuard::into_inner(guard);

        let mut state = self.state.borrow_mut();
        state.frames.remove(&info);
        let undefined = state.undefined;
        let result = returned
            .and_then(|value| state.handles.resolve(value).ok())
            .unwrap_or(undefined);
        let leaked = state.handles.unwind_to(frame);
        if leaked > 0 {
            tracing::warn!(leaked, "native callback returned with open handle scopes");
        }
        if state.pending_exception.is_some() {
            return Err(napi_pending_exception);
        }
        Ok(result)
    }

    fn dispatch(&self, message: LoopMessage) -> bool {
        let LoopMessage::Signal(id) = message else {
            self.event_loop.sweep_closed();
            return false;
        };
        let Some(mut callback) = self.event_loop.take_callback(id) else {
            return false;
        };
        let frame = {
            let mut state = self.state.borrow_mut();
            let undefined = state.undefined;
            state.handles.open(FrameKind::Callback, undefined)
        };
        callback(self.env);
        self.leave_frame(frame);
        self.event_loop.restore_callback(id, callback);
        self.event_loop.sweep_closed();
        true
    }

    fn run_finalizers(&self, finalizers: Vec<napi_finalize>) {
        for finalize in finalizers {
            let frame = {
                let mut state = self.state.borrow_mut();
                let undefined = state.undefined;
                state.handles.open(FrameKind::Callback, undefined)
            };
            finalize(self.env);
            self.leave_frame(frame);
        }
    }

    /// Close a host-opened frame and escalate anything left pending.
    fn leave_frame(&self, frame: u64) {
        let mut state = self.state.borrow_mut();
        state.handles.unwind_to(frame);
        if let Some(exception) = state.pending_exception.take() {
            let description = state.describe(exception);
            tracing::error!(exception = %description, "uncaught exception");
            state.uncaught.push(description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reclaims_unrooted_cells() {
        let host = MemoryHost::new(HostConfig::default());
        let env = host.env();
        let scope = host.open_handle_scope(env).unwrap();
        host.create_object(env).unwrap();
        host.create_string_utf8(env, "temp").unwrap();
        let before = host.live_cells();
        host.close_handle_scope(env, scope).unwrap();
        assert_eq!(host.collect_garbage(), 2);
        assert_eq!(host.live_cells(), before - 2);
    }

    #[test]
    fn test_gc_threshold_collects_on_scope_close() {
        let host = MemoryHost::new(HostConfig::default().with_gc_threshold(0));
        let env = host.env();
        let baseline = host.live_cells();
        let scope = host.open_handle_scope(env).unwrap();
        for _ in 0..8 {
            host.create_object(env).unwrap();
        }
        assert_eq!(host.live_cells(), baseline + 8);
        host.close_handle_scope(env, scope).unwrap();
        assert_eq!(host.live_cells(), baseline);
    }

    #[test]
    fn test_foreign_env_is_rejected() {
        let host = MemoryHost::new(HostConfig::default());
        assert_eq!(host.get_undefined(napi_env(u64::MAX)), Err(napi_invalid_arg));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let host = MemoryHost::new(HostConfig::default());
        host.teardown();
        host.teardown();
        assert!(host.is_torn_down());
        assert_eq!(host.get_undefined(host.env()), Err(napi_closing));
    }
}
