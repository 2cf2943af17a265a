//! Environment teardown hooks

mod common;

use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;

use otter_napi::{DeferredTeardown, Error, UsageViolation};

#[derive(Default)]
struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    fn record(&self, entry: &'static str) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

fn close_sockets(journal: &Journal) {
    journal.record("close sockets");
}

fn flush_cache(journal: &Journal) {
    journal.record("flush cache");
}

fn drain_workers(handle: DeferredTeardown, journal: &Journal) {
    journal.record("drain started");
    let journal = Arc::clone(&journal.0);
    thread::spawn(move || {
        journal.lock().unwrap().push("drain finished");
        handle.finish().unwrap();
    });
}

fn never_runs(_handle: DeferredTeardown, journal: &Journal) {
    journal.record("unexpected");
}

#[test]
fn test_hooks_run_in_reverse_then_deferred() {
    common::init_tracing();
    let (host, env) = common::setup();
    let journal = Rc::new(Journal::default());

    env.add_deferred_teardown(drain_workers, Rc::clone(&journal))
        .unwrap();
    env.add_teardown(close_sockets, Rc::clone(&journal)).unwrap();
    env.add_teardown(flush_cache, Rc::clone(&journal)).unwrap();
    assert_eq!(env.pending_teardowns(), 3);

    host.teardown();

    assert!(host.is_torn_down());
    assert_eq!(
        journal.entries(),
        ["flush cache", "close sockets", "drain started", "drain finished"]
    );
    assert_eq!(env.pending_teardowns(), 0);
}

#[test]
fn test_duplicate_and_unknown_hooks() {
    let (_host, env) = common::setup();
    let journal = Rc::new(Journal::default());

    env.add_teardown(close_sockets, Rc::clone(&journal)).unwrap();
    assert!(matches!(
        env.add_teardown(close_sockets, Rc::clone(&journal)),
        Err(Error::Usage(UsageViolation::DuplicateTeardown))
    ));

    let other = Rc::new(Journal::default());
    env.add_teardown(close_sockets, Rc::clone(&other)).unwrap();
    assert!(matches!(
        env.remove_teardown(flush_cache, &journal),
        Err(Error::Usage(UsageViolation::UnknownTeardown))
    ));
    assert_eq!(env.pending_teardowns(), 2);
}

#[test]
fn test_removed_hook_does_not_run() {
    let (host, env) = common::setup();
    let journal = Rc::new(Journal::default());

    env.add_teardown(close_sockets, Rc::clone(&journal)).unwrap();
    env.add_teardown(flush_cache, Rc::clone(&journal)).unwrap();
    env.remove_teardown(close_sockets, &journal).unwrap();
    assert_eq!(env.pending_teardowns(), 1);

    host.teardown();
    assert_eq!(journal.entries(), ["flush cache"]);
}

#[test]
fn test_finished_deferred_hook_is_skipped() {
    let (host, env) = common::setup();
    let journal = Rc::new(Journal::default());

    let handle = env
        .add_deferred_teardown(never_runs, Rc::clone(&journal))
        .unwrap();
    assert_eq!(env.pending_teardowns(), 1);
    assert!(matches!(
        env.add_deferred_teardown(never_runs, Rc::clone(&journal)),
        Err(Error::Usage(UsageViolation::DuplicateTeardown))
    ));

    handle.finish().unwrap();
    assert!(handle.is_finished());
    assert_eq!(env.pending_teardowns(), 0);
    assert!(matches!(
        handle.finish(),
        Err(Error::Usage(UsageViolation::TeardownFinished))
    ));

    host.teardown();
    assert!(journal.entries().is_empty());
    assert!(host.is_torn_down());
}

#[test]
fn test_teardown_is_idempotent() {
    let (host, env) = common::setup();
    let journal = Rc::new(Journal::default());
    env.add_teardown(flush_cache, Rc::clone(&journal)).unwrap();

    host.teardown();
    host.teardown();
    assert_eq!(journal.entries(), ["flush cache"]);
}
