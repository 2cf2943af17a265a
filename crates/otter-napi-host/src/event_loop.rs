//! Engine loop: cross-thread signals and deferred cleanup tokens.
//!
//! Producers on any thread post to a crossbeam channel. The engine thread
//! owns the callback table and runs callbacks between messages. The loop
//! stays alive while at least one open signal is refed.

use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use otter_napi_sys::{
    AsyncCleanupHandle, LoopSignal, napi_closing, napi_invalid_arg, napi_ok,
    napi_signal_callback, napi_status,
};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopMessage {
    Signal(u64),
    /// Liveness changed; re-evaluate.
    Wake,
}

pub(crate) struct SignalState {
    id: u64,
    pending: AtomicBool,
    refed: AtomicBool,
    closed: AtomicBool,
    tx: Sender<LoopMessage>,
}

impl LoopSignal for SignalState {
    fn send(&self) -> napi_status {
        if self.closed.load(Ordering::Acquire) {
            return napi_closing;
        }
        if !self.pending.swap(true, Ordering::AcqRel)
            && self.tx.send(LoopMessage::Signal(self.id)).is_err()
        {
            return napi_closing;
        }
        napi_ok
    }

    fn set_ref(&self, refed: bool) {
        self.refed.store(refed, Ordering::Release);
        let _ = self.tx.send(LoopMessage::Wake);
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(LoopMessage::Wake);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct SignalEntry {
    state: Arc<SignalState>,
    /// Taken out while the callback runs.
    callback: Option<napi_signal_callback>,
}

pub(crate) struct EventLoop {
    tx: Sender<LoopMessage>,
    rx: Receiver<LoopMessage>,
    signals: RefCell<FxHashMap<u64, SignalEntry>>,
    next_id: Cell<u64>,
}

impl EventLoop {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            signals: RefCell::new(FxHashMap::default()),
            next_id: Cell::new(1),
        }
    }

    pub(crate) fn sender(&self) -> Sender<LoopMessage> {
        self.tx.clone()
    }

    pub(crate) fn create_signal(&self, callback: napi_signal_callback) -> Arc<SignalState> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let state = Arc::new(SignalState {
            id,
            pending: AtomicBool::new(false),
            refed: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            tx: self.tx.clone(),
        });
        self.signals.borrow_mut().insert(
            id,
            SignalEntry {
                state: Arc::clone(&state),
                callback: Some(callback),
            },
        );
        state
    }

    /// Whether any open signal keeps the loop running.
    pub(crate) fn is_alive(&self) -> bool {
        self.signals.borrow().values().any(|entry| {
            !entry.state.closed.load(Ordering::Acquire) && entry.state.refed.load(Ordering::Acquire)
        })
    }

    pub(crate) fn open_signals(&self) -> usize {
        self.signals
            .borrow()
            .values()
            .filter(|entry| !entry.state.closed.load(Ordering::Acquire))
            .count()
    }

    pub(crate) fn next_message(&self, block: bool) -> Option<LoopMessage> {
        if block {
            self.rx.recv().ok()
        } else {
            self.rx.try_recv().ok()
        }
    }

    /// Take the callback of a signal that fired. Closed signals yield nothing.
    pub(crate) fn take_callback(&self, id: u64) -> Option<napi_signal_callback> {
        let mut signals = self.signals.borrow_mut();
        let entry = signals.get_mut(&id)?;
        entry.state.pending.store(false, Ordering::Release);
        if entry.state.closed.load(Ordering::Acquire) {
            return None;
        }
        entry.callback.take()
    }

    pub(crate) fn restore_callback(&self, id: u64, callback: napi_signal_callback) {
        if let Some(entry) = self.signals.borrow_mut().get_mut(&id) {
            entry.callback = Some(callback);
        }
    }

    /// Drop the callbacks of closed signals.
    pub(crate) fn sweep_closed(&self) {
        let removed: Vec<SignalEntry> = {
            let mut signals = self.signals.borrow_mut();
            let closed: Vec<u64> = signals
                .iter()
                .filter(|(_, entry)| entry.state.closed.load(Ordering::Acquire))
                .map(|(id, _)| *id)
                .collect();
            closed.into_iter().filter_map(|id| signals.remove(&id)).collect()
        };
        drop(removed);
    }

    /// Close every signal and drop its callback.
    pub(crate) fn close_all(&self) {
        let removed: Vec<SignalEntry> = self.signals.borrow_mut().drain().map(|(_, e)| e).collect();
        for entry in &removed {
            entry.state.closed.store(true, Ordering::Release);
        }
        drop(removed);
    }
}

/// Outstanding deferred cleanup; teardown waits until it is removed.
pub(crate) struct CleanupToken {
    removed: AtomicBool,
    tx: Sender<LoopMessage>,
}

impl CleanupToken {
    pub(crate) fn new(tx: Sender<LoopMessage>) -> Self {
        Self {
            removed: AtomicBool::new(false),
            tx,
        }
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

impl AsyncCleanupHandle for CleanupToken {
    fn remove(&self) -> napi_status {
        if self.removed.swap(true, Ordering::AcqRel) {
            return napi_invalid_arg;
        }
        let _ = self.tx.send(LoopMessage::Wake);
        napi_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sends_coalesce_until_taken() {
        let event_loop = EventLoop::new();
        let signal = event_loop.create_signal(Box::new(|_| {}));
        assert_eq!(signal.send(), napi_ok);
        assert_eq!(signal.send(), napi_ok);
        assert_eq!(event_loop.next_message(false), Some(LoopMessage::Signal(1)));
        assert_eq!(event_loop.next_message(false), None);

        let callback = event_loop.take_callback(1).unwrap();
        event_loop.restore_callback(1, callback);
        assert_eq!(signal.send(), napi_ok);
        assert_eq!(event_loop.next_message(false), Some(LoopMessage::Signal(1)));
    }

    #[test]
    fn test_unref_and_close_end_liveness() {
        let event_loop = EventLoop::new();
        let signal = event_loop.create_signal(Box::new(|_| {}));
        assert!(event_loop.is_alive());
        signal.set_ref(false);
        assert!(!event_loop.is_alive());
        signal.set_ref(true);
        signal.close();
        assert!(!event_loop.is_alive());
        assert_eq!(signal.send(), napi_closing);
        event_loop.sweep_closed();
        assert_eq!(event_loop.open_signals(), 0);
    }

    #[test]
    fn test_cleanup_token_removes_once() {
        let event_loop = EventLoop::new();
        let token = CleanupToken::new(event_loop.sender());
        assert_eq!(token.remove(), napi_ok);
        assert!(token.is_removed());
        assert_eq!(token.remove(), napi_invalid_arg);
    }
}
