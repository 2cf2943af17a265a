//! Interface version gating.
//!
//! The effective version is the minimum of what this crate was compiled
//! for, what the host reports and an optional embedder cap. Operations
//! added after the effective version fail with [`Error::Unsupported`]
//! instead of reaching the host; those that can be emulated fall back to
//! the emulation.

use crate::error::{Error, Result};

/// Interface version selected by Cargo features.
pub const NAPI_VERSION: u32 = if cfg!(feature = "napi10") {
    10
} else if cfg!(feature = "napi9") {
    9
} else if cfg!(feature = "napi8") {
    8
} else if cfg!(feature = "napi7") {
    7
} else if cfg!(feature = "napi6") {
    6
} else if cfg!(feature = "napi5") {
    5
} else if cfg!(feature = "napi4") {
    4
} else if cfg!(feature = "napi3") {
    3
} else if cfg!(feature = "napi2") {
    2
} else {
    1
};

/// Versions that introduced the gated operations.
pub mod version {
    pub const CLEANUP_HOOKS: u32 = 3;
    pub const FATAL_EXCEPTION: u32 = 3;
    pub const CALLBACK_CHECKPOINT: u32 = 3;
    pub const THREADSAFE_MODES: u32 = 4;
    pub const FINALIZERS: u32 = 5;
    pub const DATES: u32 = 5;
    pub const BIGINT: u32 = 6;
    /// Threadsafe functions are only exposed from this version on.
    pub const THREADSAFE_FUNCTIONS: u32 = 7;
    pub const DETACH: u32 = 7;
    pub const TYPE_TAGS: u32 = 8;
    pub const DEFERRED_TEARDOWN: u32 = 8;
    pub const SYNTAX_ERRORS: u32 = 9;
    pub const SYMBOL_FOR: u32 = 9;
    pub const PROPERTY_KEYS: u32 = 10;
    pub const EXTERNAL_STRINGS: u32 = 10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    compiled: u32,
    host: u32,
    effective: u32,
}

impl Capabilities {
    pub fn resolve(compiled: u32, host: u32, cap: Option<u32>) -> Self {
        let effective = compiled.min(host).min(cap.unwrap_or(u32::MAX));
        Self {
            compiled,
            host,
            effective,
        }
    }

    pub fn version(&self) -> u32 {
        self.effective
    }

    pub fn host_version(&self) -> u32 {
        self.host
    }

    pub fn compiled_version(&self) -> u32 {
        self.compiled
    }

    pub fn supports(&self, version: u32) -> bool {
        self.effective >= version
    }

    pub(crate) fn require(&self, operation: &'static str, version: u32) -> Result<()> {
        if self.supports(version) {
            Ok(())
        } else {
            tracing::debug!(operation, version, effective = self.effective, "operation gated");
            Err(Error::unsupported(operation, version, self.effective))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_is_minimum() {
        let caps = Capabilities::resolve(9, 10, None);
        assert_eq!(caps.version(), 9);
        let caps = Capabilities::resolve(9, 6, None);
        assert_eq!(caps.version(), 6);
        let caps = Capabilities::resolve(9, 10, Some(4));
        assert_eq!(caps.version(), 4);
        assert_eq!(caps.host_version(), 10);
    }

    #[test]
    fn test_require_reports_versions() {
        let caps = Capabilities::resolve(9, 6, None);
        assert!(caps.require("bigint", version::BIGINT).is_ok());
        match caps.require("detach", version::DETACH) {
            Err(Error::Unsupported {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, 7);
                assert_eq!(available, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_default_features_select_nine() {
        if cfg!(feature = "napi9") && !cfg!(feature = "napi10") {
            assert_eq!(NAPI_VERSION, 9);
        }
    }
}
