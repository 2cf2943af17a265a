//! Cross-thread calls into the engine
//!
//! A [`ThreadsafeFunction`] is the only handle in this crate that is
//! `Send + Sync`. Producers on any thread submit data; each item is
//! delivered on the engine thread, in submission order per producer, by
//! calling `call_js` inside a fresh handle scope.
//!
//! The function is finalized once on the engine thread, when every holder
//! has released and the queue has drained, or right after an abort. An
//! abort drops undelivered items without calling into script. If the
//! environment tears down first, a teardown hook closes the function:
//! pending items are dropped and the finalizer runs.

mod queue;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use otter_napi_sys::{napi_cleanup_hook_id, napi_loop_signal, napi_ok};

use crate::capability::version;
use crate::env::Env;
use crate::error::{Error, Result, UsageViolation, check};
use crate::handle::{Reference, Value};
use crate::types::{CallMode, ReleaseMode};

use self::queue::{BoundedQueue, PushError, ReleaseError};

/// Items delivered per loop wakeup before yielding back to the loop.
const MAX_BATCH: usize = 1000;

type CallJs<T, C> = Box<dyn FnMut(&Env, Option<Value<'_>>, &C, T) -> Result<()>>;
type Finalizer<C> = Box<dyn FnOnce(&Env, &C)>;

struct Shared<T, C> {
    queue: BoundedQueue<T>,
    context: C,
    signal: OnceLock<napi_loop_signal>,
    engine_thread: ThreadId,
}

impl<T, C> Shared<T, C> {
    fn wake(&self) -> bool {
        match self.signal.get() {
            Some(signal) => signal.send() == napi_ok,
            None => false,
        }
    }
}

/// Engine-thread half, owned by the loop signal callback and reachable
/// from the environment's teardown hook.
struct Dispatcher<T, C> {
    env: Env,
    shared: Arc<Shared<T, C>>,
    function: Option<Reference>,
    call_js: CallJs<T, C>,
    finalizer: Option<Finalizer<C>>,
    cleanup: Option<napi_cleanup_hook_id>,
    finalized: bool,
}

impl<T, C> Dispatcher<T, C> {
    fn dispatch(&mut self) {
        if self.finalized {
            return;
        }
        let mut delivered = 0;
        while delivered < MAX_BATCH {
            let Some(item) = self.shared.queue.pop() else {
                break;
            };
            delivered += 1;
            let Self {
                env,
                shared,
                function,
                call_js,
                ..
            } = &mut *self;
            let result = env.with_handle_scope(|env| {
                let target = match function {
                    Some(function) => function.get()?,
                    None => None,
                };
                (*call_js)(env, target, &shared.context, item)
            });
            if let Err(err) = result {
                self.report(err);
            }
        }
        tracing::trace!(delivered, "threadsafe function dispatched");

        if self.shared.queue.is_finished() {
            self.finalize();
        } else if !self.shared.queue.is_empty() {
            self.shared.wake();
        }
    }

    fn report(&self, err: Error) {
        self.env.raise(&err);
        let err = match self.env.is_exception_pending() {
            Ok(true) => self.env.escalate(Error::PendingException),
            _ => err,
        };
        tracing::error!(%err, "threadsafe function call failed");
    }

    /// Environment shutdown: close without delivering what is still queued.
    fn close_on_teardown(&mut self) {
        if self.finalized {
            return;
        }
        self.cleanup = None;
        let dropped = self.shared.queue.close();
        tracing::debug!(dropped = dropped.len(), "threadsafe function closed by teardown");
        drop(dropped);
        self.finalize();
    }

    fn finalize(&mut self) {
        self.finalized = true;
        if let Some(id) = self.cleanup.take() {
            let _ = self.env.host().remove_env_cleanup_hook(self.env.raw(), id);
        }
        if let Some(signal) = self.shared.signal.get() {
            signal.close();
        }
        drop(self.shared.queue.close());
        drop(self.function.take());
        if let Some(finalizer) = self.finalizer.take() {
            finalizer(&self.env, &self.shared.context);
        }
        tracing::debug!("threadsafe function finalized");
    }
}

/// Cross-thread handle to an engine function with a bounded work queue.
///
/// Cloning shares the same function; it does not acquire.
pub struct ThreadsafeFunction<T, C = ()> {
    shared: Arc<Shared<T, C>>,
}

impl<T, C> Clone for ThreadsafeFunction<T, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static, C: Send + Sync + 'static> ThreadsafeFunction<T, C> {
    pub fn context(&self) -> &C {
        &self.shared.context
    }

    /// Queue `data` for delivery on the engine thread.
    ///
    /// A nonblocking call fails with [`Error::QueueFull`] at capacity. A
    /// blocking call waits for space, except on the engine thread, where
    /// waiting could never end.
    pub fn call(&self, data: T, mode: CallMode) -> Result<()> {
        let on_engine = std::thread::current().id() == self.shared.engine_thread;
        let wait = mode == CallMode::Blocking && !on_engine;
        match self.shared.queue.push(data, wait) {
            Ok(()) => {}
            Err(PushError::Full) if mode == CallMode::Blocking => {
                return Err(Error::usage(UsageViolation::WouldDeadlock));
            }
            Err(PushError::Full) => return Err(Error::QueueFull),
            Err(PushError::Closing) => return Err(Error::Closing),
            Err(PushError::Released) => {
                return Err(Error::usage(UsageViolation::CallAfterRelease));
            }
        }
        tracing::trace!(queued = self.shared.queue.len(), "threadsafe call queued");
        if self.shared.wake() {
            Ok(())
        } else {
            drop(self.shared.queue.close());
            Err(Error::Closing)
        }
    }

    /// Register one more holder.
    pub fn acquire(&self) -> Result<()> {
        match self.shared.queue.acquire() {
            Ok(count) => {
                tracing::trace!(count, "threadsafe function acquired");
                Ok(())
            }
            Err(PushError::Released) => Err(Error::usage(UsageViolation::CallAfterRelease)),
            Err(_) => Err(Error::Closing),
        }
    }

    /// Give up one claim. With [`ReleaseMode::Abort`] queued data is dropped
    /// and later calls fail with [`Error::Closing`].
    pub fn release(&self, mode: ReleaseMode) -> Result<()> {
        let abort = mode == ReleaseMode::Abort;
        let (remaining, dropped) = self
            .shared
            .queue
            .release(abort)
            .map_err(|ReleaseError::Underflow| Error::usage(UsageViolation::ReleaseUnderflow))?;
        tracing::trace!(remaining, dropped = dropped.len(), abort, "threadsafe function released");
        drop(dropped);
        if abort || remaining == 0 {
            self.shared.wake();
        }
        Ok(())
    }

    pub fn abort(&self) -> Result<()> {
        self.release(ReleaseMode::Abort)
    }

    /// Keep the engine loop alive while this function is open (the default).
    pub fn refer(&self, _env: &Env) {
        if let Some(signal) = self.shared.signal.get() {
            signal.set_ref(true);
        }
    }

    /// Let the engine loop exit even though this function is open.
    pub fn unref(&self, _env: &Env) {
        if let Some(signal) = self.shared.signal.get() {
            signal.set_ref(false);
        }
    }

    pub fn is_closing(&self) -> bool {
        self.shared.queue.is_closing()
    }

    pub fn thread_count(&self) -> usize {
        self.shared.queue.thread_count()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }
}

impl<T, C> fmt::Debug for ThreadsafeFunction<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadsafeFunction")
            .field("thread_count", &self.shared.queue.thread_count())
            .field("queued", &self.shared.queue.len())
            .field("closing", &self.shared.queue.is_closing())
            .finish()
    }
}

/// Builder for [`ThreadsafeFunction`].
pub struct ThreadsafeFunctionBuilder<T, C = ()> {
    queue_limit: usize,
    initial_thread_count: usize,
    context: C,
    call_js: Option<CallJs<T, C>>,
    finalizer: Option<Finalizer<C>>,
}

impl<T: Send + 'static> ThreadsafeFunctionBuilder<T, ()> {
    pub fn new() -> Self {
        Self::with_context(())
    }
}

impl<T: Send + 'static> Default for ThreadsafeFunctionBuilder<T, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static, C: Send + Sync + 'static> ThreadsafeFunctionBuilder<T, C> {
    /// Builder whose function carries `context`, shared by every holder.
    pub fn with_context(context: C) -> Self {
        Self {
            queue_limit: 0,
            initial_thread_count: 1,
            context,
            call_js: None,
            finalizer: None,
        }
    }

    /// Maximum queued items; zero means unbounded.
    pub fn queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    pub fn initial_thread_count(mut self, count: usize) -> Self {
        self.initial_thread_count = count;
        self
    }

    /// Deliver items with `f` instead of calling the function with no arguments.
    pub fn call_js<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Env, Option<Value<'_>>, &C, T) -> Result<()> + 'static,
    {
        self.call_js = Some(Box::new(f));
        self
    }

    pub fn finalizer<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Env, &C) + 'static,
    {
        self.finalizer = Some(Box::new(f));
        self
    }

    /// Create the function. `function` may be omitted when `call_js` is set.
    pub fn build(self, env: &Env, function: Option<Value<'_>>) -> Result<ThreadsafeFunction<T, C>> {
        env.require("threadsafe functions", version::THREADSAFE_FUNCTIONS)?;
        if function.is_none() && self.call_js.is_none() {
            return Err(Error::InvalidArgument(
                "threadsafe function needs a function or call_js",
            ));
        }
        if self.initial_thread_count == 0 {
            return Err(Error::InvalidArgument("initial thread count must be positive"));
        }
        let function = function
            .map(|function| env.create_reference(function, 1))
            .transpose()?;

        let shared = Arc::new(Shared {
            queue: BoundedQueue::new(self.queue_limit, self.initial_thread_count),
            context: self.context,
            signal: OnceLock::new(),
            engine_thread: env.engine_thread(),
        });
        let call_js: CallJs<T, C> = match self.call_js {
            Some(call_js) => call_js,
            None => Box::new(call_function::<C, T>),
        };
        let dispatcher = Rc::new(RefCell::new(Dispatcher {
            env: env.clone(),
            shared: Arc::clone(&shared),
            function,
            call_js,
            finalizer: self.finalizer,
            cleanup: None,
            finalized: false,
        }));

        let weak = Rc::downgrade(&dispatcher);
        let cleanup = check(
            env.host()
                .add_env_cleanup_hook(env.raw(), Box::new(move || close_on_teardown(&weak))),
        )?;
        dispatcher.borrow_mut().cleanup = Some(cleanup);

        let callback = Rc::clone(&dispatcher);
        let signal = env.host().create_loop_signal(
            env.raw(),
            Box::new(move |_| callback.borrow_mut().dispatch()),
        );
        let signal = match check(signal) {
            Ok(signal) => signal,
            Err(err) => {
                let _ = env.host().remove_env_cleanup_hook(env.raw(), cleanup);
                return Err(err);
            }
        };
        let _ = shared.signal.set(signal);
        tracing::debug!(
            queue_limit = self.queue_limit,
            threads = self.initial_thread_count,
            "threadsafe function created"
        );
        Ok(ThreadsafeFunction { shared })
    }
}

fn close_on_teardown<T, C>(dispatcher: &Weak<RefCell<Dispatcher<T, C>>>) {
    if let Some(dispatcher) = dispatcher.upgrade() {
        if let Ok(mut dispatcher) = dispatcher.try_borrow_mut() {
            dispatcher.close_on_teardown();
        }
    }
}

fn call_function<C, T>(env: &Env, function: Option<Value<'_>>, _: &C, _: T) -> Result<()> {
    if let Some(function) = function {
        let recv = env.get_undefined()?;
        env.call_function(recv, function, &[])?;
    }
    Ok(())
}
