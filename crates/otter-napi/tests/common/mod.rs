//! Shared setup for integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use otter_napi::Env;
use otter_napi_host::{HostConfig, MemoryHost};

/// Route layer logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup() -> (Rc<MemoryHost>, Env) {
    setup_with(HostConfig::default())
}

pub fn setup_with(config: HostConfig) -> (Rc<MemoryHost>, Env) {
    init_tracing();
    let host = MemoryHost::new(config);
    let env = Env::new(host.clone(), host.env()).expect("attach environment");
    (host, env)
}
