//! Allocation behavior of message formatting
//!
//! A counting global allocator records allocations, deallocations and live
//! bytes for the current thread while a measurement is active. Tests that
//! measure run serially.

use std::alloc::{GlobalAlloc, Layout, System};
use std::borrow::Cow;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use otter_napi::{Env, format_message};
use otter_napi_host::{HostConfig, MemoryHost};
use serial_test::serial;

struct CountingAllocator;

static ALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static DEALLOCATIONS: AtomicUsize = AtomicUsize::new(0);
static LIVE_BYTES: AtomicIsize = AtomicIsize::new(0);

thread_local! {
    static MEASURING: Cell<bool> = const { Cell::new(false) };
}

fn measuring() -> bool {
    MEASURING.try_with(Cell::get).unwrap_or(false)
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if measuring() {
            ALLOCATIONS.fetch_add(1, Ordering::SeqCst);
            LIVE_BYTES.fetch_add(layout.size() as isize, Ordering::SeqCst);
        }
        // SAFETY: forwarded unchanged to the system allocator.
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if measuring() {
            DEALLOCATIONS.fetch_add(1, Ordering::SeqCst);
            LIVE_BYTES.fetch_sub(layout.size() as isize, Ordering::SeqCst);
        }
        // SAFETY: `ptr` was allocated by `alloc` above with `layout`.
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Usage {
    allocations: usize,
    deallocations: usize,
    live_bytes: isize,
}

fn measure<R>(f: impl FnOnce() -> R) -> (R, Usage) {
    ALLOCATIONS.store(0, Ordering::SeqCst);
    DEALLOCATIONS.store(0, Ordering::SeqCst);
    LIVE_BYTES.store(0, Ordering::SeqCst);
    MEASURING.with(|measuring| measuring.set(true));
    let result = f();
    MEASURING.with(|measuring| measuring.set(false));
    let usage = Usage {
        allocations: ALLOCATIONS.load(Ordering::SeqCst),
        deallocations: DEALLOCATIONS.load(Ordering::SeqCst),
        live_bytes: LIVE_BYTES.load(Ordering::SeqCst),
    };
    (result, usage)
}

/// Host and environment with no log subscriber installed.
fn quiet_env() -> (Rc<MemoryHost>, Env) {
    let host = MemoryHost::new(HostConfig::default());
    let env = Env::new(host.clone(), host.env()).unwrap();
    (host, env)
}

fn throw_and_clear(env: &Env, throw: impl FnOnce(&Env) -> otter_napi::Result<()>) {
    throw(env).unwrap();
    assert!(env.take_pending_exception().unwrap().is_some());
}

#[test]
#[serial]
fn test_static_message_does_not_allocate() {
    let (message, usage) = measure(|| {
        let message = format_message(format_args!("operation not supported"));
        matches!(message, Cow::Borrowed("operation not supported"))
    });
    assert!(message);
    assert_eq!(usage.allocations, 0);
    assert_eq!(usage.deallocations, 0);
}

#[test]
#[serial]
fn test_formatted_message_is_released() {
    let ((), usage) = measure(|| {
        let message = format_message(format_args!("offset {} exceeds {}", 12, 8));
        assert_eq!(message, "offset 12 exceeds 8");
    });
    assert!(usage.allocations >= 1);
    assert_eq!(usage.allocations, usage.deallocations);
    assert_eq!(usage.live_bytes, 0);
}

#[test]
#[serial]
fn test_formatted_throw_leaves_no_buffer_behind() {
    let (_plain_host, plain_env) = quiet_env();
    let (_formatted_host, formatted_env) = quiet_env();
    for env in [&plain_env, &formatted_env] {
        throw_and_clear(env, |env| env.throw_error(Some("ERR_WARMUP"), "warm up"));
    }

    let ((), plain) = measure(|| {
        throw_and_clear(&plain_env, |env| {
            env.throw_error(Some("ERR_OUT_OF_RANGE"), "index 7 exceeds 4")
        });
    });
    let (index, limit) = (7, 4);
    let ((), formatted) = measure(|| {
        throw_and_clear(&formatted_env, |env| {
            otter_napi::throw_errorf!(
                env,
                Some("ERR_OUT_OF_RANGE"),
                "index {} exceeds {}",
                index,
                limit
            )
        });
    });

    let extra_allocations = formatted.allocations - plain.allocations;
    let extra_deallocations = formatted.deallocations - plain.deallocations;
    assert!(extra_allocations >= 1, "{plain:?} {formatted:?}");
    assert_eq!(extra_allocations, extra_deallocations);
    assert_eq!(formatted.live_bytes, plain.live_bytes);
}
