use otter_napi_sys::napi_deferred;

use crate::env::Env;
use crate::error::{Result, check};
use crate::handle::Value;

/// Resolver half of a promise. Settling consumes it.
#[must_use = "an unsettled deferred keeps its promise pending forever"]
#[derive(Debug)]
pub struct Deferred {
    env: Env,
    raw: napi_deferred,
}

impl Deferred {
    pub fn resolve(self, resolution: Value<'_>) -> Result<()> {
        check(
            self.env
                .host()
                .resolve_deferred(self.env.raw(), self.raw, resolution.raw()),
        )
    }

    pub fn reject(self, rejection: Value<'_>) -> Result<()> {
        check(
            self.env
                .host()
                .reject_deferred(self.env.raw(), self.raw, rejection.raw()),
        )
    }
}

impl Env {
    pub fn create_promise(&self) -> Result<(Deferred, Value<'_>)> {
        let (raw, promise) = check(self.host().create_promise(self.raw()))?;
        let deferred = Deferred {
            env: self.clone(),
            raw,
        };
        Ok((deferred, self.value(promise)))
    }
}
