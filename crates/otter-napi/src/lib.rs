//! Stable embedding layer over Node-API style hosts.
//!
//! Native modules program against [`Env`] and the types in this crate.
//! Every operation forwards to the host function table
//! ([`otter_napi_sys::NodeApi`]) selected at runtime, folding host status
//! codes into [`Error`] / [`Status`]. Operations newer than the host are
//! either emulated or rejected with [`Error::Unsupported`]; operations
//! newer than the compiled `napiN` feature do not exist.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use otter_napi::Env;
//! use otter_napi_host::{HostConfig, MemoryHost};
//!
//! let host = MemoryHost::new(HostConfig::default());
//! let env = Env::new(host.clone(), host.env()).unwrap();
//! let sum = env
//!     .with_handle_scope(|env| {
//!         let a = env.create_int32(40)?;
//!         let b = env.create_int32(2)?;
//!         Ok(env.get_value_int32(a)? + env.get_value_int32(b)?)
//!     })
//!     .unwrap();
//! assert_eq!(sum, 42);
//! ```
//!
//! # Thread Safety
//!
//! [`Env`], [`Value`] and everything derived from them are `!Send`. The
//! only way to reach the engine from another thread is a
//! [`ThreadsafeFunction`].
//!
//! ```compile_fail
//! use otter_napi::Env;
//! use otter_napi_host::{HostConfig, MemoryHost};
//!
//! let host = MemoryHost::new(HostConfig::default());
//! let env = Env::new(host.clone(), host.env()).unwrap();
//! std::thread::spawn(move || {
//!     let _ = env.get_undefined(); // Error: Env is !Send
//! });
//! ```

mod buffer;
mod capability;
mod env;
mod error;
mod exception;
mod format;
mod function;
mod handle;
mod module;
mod promise;
mod property;
mod status;
mod string;
mod teardown;
#[cfg(feature = "napi7")]
mod threadsafe_function;
mod types;
mod value;
mod wrap;

pub use otter_napi_sys as sys;

pub use buffer::{ArrayBufferInfo, DataViewInfo, StorageFinalizer, TypedArrayInfo};
pub use capability::{Capabilities, NAPI_VERSION, version};
pub use env::{Env, EnvBuilder};
pub use error::{Error, Result, UsageViolation};
pub use format::format_message;
pub use function::{Callback, CallbackInfo};
pub use handle::{EscapableHandleScope, HandleScope, Reference, Value};
pub use module::{MODULE_VERSION, Module, register_module};
pub use promise::Deferred;
pub use property::{PropertyDescriptor, PropertyKind, PropertyName};
pub use status::Status;
pub use string::StringView;
#[cfg(feature = "napi8")]
pub use teardown::DeferredTeardown;
#[cfg(feature = "napi7")]
pub use threadsafe_function::{ThreadsafeFunction, ThreadsafeFunctionBuilder};
pub use types::{
    CallMode, NumericType, PropertyAttributes, ReleaseMode, StringEncoding, TypeTag,
    TypedArrayType, ValueType,
};
