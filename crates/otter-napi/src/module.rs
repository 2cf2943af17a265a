//! Module registration
//!
//! A [`Module`] names a file and an init function. Registering hands the
//! host a record whose entry point builds an [`Env`] for the loading
//! environment and runs `init` with the exports object.

use std::rc::Rc;

use otter_napi_sys::{
    NAPI_MODULE_VERSION, NodeApi, napi_addon_register_func, napi_env, napi_module, napi_value,
};

use crate::env::Env;
use crate::error::{Result, check};
use crate::handle::Value;

/// Version of the [`Module`] record layout the host expects.
pub const MODULE_VERSION: i32 = NAPI_MODULE_VERSION;

/// Populate `exports` and return the module's public surface.
pub type ModuleInit = for<'e> fn(&'e Env, Value<'e>) -> Result<Value<'e>>;

#[derive(Clone, Copy)]
pub struct Module {
    pub version: i32,
    pub filename: &'static str,
    pub init: ModuleInit,
}

impl Module {
    pub const fn new(filename: &'static str, init: ModuleInit) -> Self {
        Self {
            version: MODULE_VERSION,
            filename,
            init,
        }
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("version", &self.version)
            .field("filename", &self.filename)
            .finish()
    }
}

/// Register `module` with `host`. It runs once the host loads `filename`.
///
/// A host rejects a record whose `version` it does not understand.
pub fn register_module(host: &dyn NodeApi, module: &Module) -> Result<()> {
    let init = module.init;
    let filename = module.filename;
    let register: napi_addon_register_func =
        Rc::new(move |host: Rc<dyn NodeApi>, raw_env: napi_env, exports: napi_value| {
            let env = match Env::new(host, raw_env) {
                Ok(env) => env,
                Err(err) => {
                    tracing::error!(%err, filename, "module environment unavailable");
                    return None;
                }
            };
            match init(&env, Value::from_raw(exports)) {
                Ok(exports) => Some(exports.raw()),
                Err(err) => {
                    tracing::debug!(%err, filename, "module init failed");
                    env.raise(&err);
                    None
                }
            }
        });
    tracing::debug!(filename, version = module.version, "registering module");
    check(host.module_register(napi_module {
        nm_version: module.version,
        nm_flags: 0,
        nm_filename: filename,
        nm_register_func: register,
    }))
}

impl Env {
    pub fn register_module(&self, module: &Module) -> Result<()> {
        register_module(self.host(), module)
    }
}

/// Declare a module: exports the C-callable interface version query and a
/// `register` function for the given init.
///
/// ```ignore
/// fn init<'e>(env: &'e Env, exports: Value<'e>) -> otter_napi::Result<Value<'e>> {
///     Ok(exports)
/// }
///
/// otter_napi::module!("addon.node", init);
/// ```
#[macro_export]
macro_rules! module {
    ($filename:expr, $init:path) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn node_api_module_get_api_version_v1() -> i32 {
            $crate::NAPI_VERSION as i32
        }

        pub static MODULE: $crate::Module = $crate::Module::new($filename, $init);

        pub fn register(host: &dyn $crate::sys::NodeApi) -> $crate::Result<()> {
            $crate::register_module(host, &MODULE)
        }
    };
}
