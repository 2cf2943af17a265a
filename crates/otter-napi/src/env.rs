//! Engine environment handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::thread::{self, ThreadId};

use otter_napi_sys::{NodeApi, napi_env, napi_value};

use crate::capability::{Capabilities, NAPI_VERSION};
use crate::error::{Result, check};
use crate::handle::Value;
use crate::teardown::TeardownRegistry;

/// Safe view of one engine environment.
///
/// Cheap to clone; all clones share the same host, capabilities and
/// teardown registry. `Env` is bound to the engine thread.
#[derive(Clone)]
pub struct Env {
    pub(crate) inner: Rc<EnvInner>,
}

pub(crate) struct EnvInner {
    host: Rc<dyn NodeApi>,
    raw: napi_env,
    caps: Capabilities,
    engine_thread: ThreadId,
    pub(crate) teardown: RefCell<TeardownRegistry>,
}

impl Env {
    /// Wrap a host environment with default settings.
    pub fn new(host: Rc<dyn NodeApi>, raw: napi_env) -> Result<Self> {
        EnvBuilder::new(host, raw).build()
    }

    pub fn builder(host: Rc<dyn NodeApi>, raw: napi_env) -> EnvBuilder {
        EnvBuilder::new(host, raw)
    }

    pub fn raw(&self) -> napi_env {
        self.inner.raw
    }

    /// Raw host function table.
    pub fn host(&self) -> &dyn NodeApi {
        &*self.inner.host
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.caps
    }

    /// Effective interface version.
    pub fn version(&self) -> u32 {
        self.inner.caps.version()
    }

    pub fn is_engine_thread(&self) -> bool {
        thread::current().id() == self.inner.engine_thread
    }

    pub(crate) fn engine_thread(&self) -> ThreadId {
        self.inner.engine_thread
    }

    pub(crate) fn require(&self, operation: &'static str, version: u32) -> Result<()> {
        self.inner.caps.require(operation, version)
    }

    pub(crate) fn downgrade(&self) -> Weak<EnvInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<EnvInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn value(&self, raw: napi_value) -> Value<'_> {
        Value::from_raw(raw)
    }

    /// Report externally held memory to the engine. Returns the adjusted total.
    pub fn adjust_external_memory(&self, change_in_bytes: i64) -> Result<i64> {
        check(
            self.host()
                .adjust_external_memory(self.raw(), change_in_bytes),
        )
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("raw", &self.inner.raw)
            .field("version", &self.inner.caps.version())
            .finish()
    }
}

/// Builder for [`Env`].
pub struct EnvBuilder {
    host: Rc<dyn NodeApi>,
    raw: napi_env,
    max_version: Option<u32>,
}

impl EnvBuilder {
    pub fn new(host: Rc<dyn NodeApi>, raw: napi_env) -> Self {
        Self {
            host,
            raw,
            max_version: None,
        }
    }

    /// Cap the effective interface version below what the host reports.
    pub fn max_version(mut self, version: u32) -> Self {
        self.max_version = Some(version);
        self
    }

    pub fn build(self) -> Result<Env> {
        let host_version = check(self.host.get_version(self.raw))?;
        let caps = Capabilities::resolve(NAPI_VERSION, host_version, self.max_version);
        tracing::debug!(
            env = self.raw.0,
            host_version,
            compiled = NAPI_VERSION,
            effective = caps.version(),
            "environment attached"
        );
        Ok(Env {
            inner: Rc::new(EnvInner {
                host: self.host,
                raw: self.raw,
                caps,
                engine_thread: thread::current().id(),
                teardown: RefCell::new(TeardownRegistry::default()),
            }),
        })
    }
}
