//! Raw host ABI for Node-API style embedding
//!
//! This crate mirrors the surface an embedding host exposes: status codes,
//! enum constants, opaque handle ids and the [`NodeApi`] function table.
//! Nothing here enforces scope or lifetime rules; use `otter-napi` for the
//! safe layer.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use std::any::Any;
use std::os::raw::c_int;
use std::rc::Rc;
use std::sync::Arc;

/// Highest interface version this ABI describes.
pub const NAPI_VERSION_MAX: u32 = 10;

/// Version stamp a host expects in [`napi_module::nm_version`].
pub const NAPI_MODULE_VERSION: c_int = 1;

// Status codes

pub type napi_status = c_int;

pub const napi_ok: napi_status = 0;
pub const napi_invalid_arg: napi_status = 1;
pub const napi_object_expected: napi_status = 2;
pub const napi_string_expected: napi_status = 3;
pub const napi_name_expected: napi_status = 4;
pub const napi_function_expected: napi_status = 5;
pub const napi_number_expected: napi_status = 6;
pub const napi_boolean_expected: napi_status = 7;
pub const napi_array_expected: napi_status = 8;
pub const napi_generic_failure: napi_status = 9;
pub const napi_pending_exception: napi_status = 10;
pub const napi_cancelled: napi_status = 11;
pub const napi_escape_called_twice: napi_status = 12;
pub const napi_handle_scope_mismatch: napi_status = 13;
pub const napi_callback_scope_mismatch: napi_status = 14;
pub const napi_queue_full: napi_status = 15;
pub const napi_closing: napi_status = 16;
pub const napi_bigint_expected: napi_status = 17;
pub const napi_date_expected: napi_status = 18;
pub const napi_arraybuffer_expected: napi_status = 19;
pub const napi_detachable_arraybuffer_expected: napi_status = 20;
pub const napi_would_deadlock: napi_status = 21;
pub const napi_no_external_buffers_allowed: napi_status = 22;
pub const napi_cannot_run_js: napi_status = 23;

/// Result of a host call: the payload on `napi_ok`, the raw status otherwise.
pub type HostResult<T> = Result<T, napi_status>;

// Value types

pub type napi_valuetype = c_int;

pub const napi_undefined: napi_valuetype = 0;
pub const napi_null: napi_valuetype = 1;
pub const napi_boolean: napi_valuetype = 2;
pub const napi_number: napi_valuetype = 3;
pub const napi_string: napi_valuetype = 4;
pub const napi_symbol: napi_valuetype = 5;
pub const napi_object: napi_valuetype = 6;
pub const napi_function: napi_valuetype = 7;
pub const napi_external: napi_valuetype = 8;
pub const napi_bigint: napi_valuetype = 9;

// Typed array kinds

pub type napi_typedarray_type = c_int;

pub const napi_int8_array: napi_typedarray_type = 0;
pub const napi_uint8_array: napi_typedarray_type = 1;
pub const napi_uint8_clamped_array: napi_typedarray_type = 2;
pub const napi_int16_array: napi_typedarray_type = 3;
pub const napi_uint16_array: napi_typedarray_type = 4;
pub const napi_int32_array: napi_typedarray_type = 5;
pub const napi_uint32_array: napi_typedarray_type = 6;
pub const napi_float32_array: napi_typedarray_type = 7;
pub const napi_float64_array: napi_typedarray_type = 8;
pub const napi_bigint64_array: napi_typedarray_type = 9;
pub const napi_biguint64_array: napi_typedarray_type = 10;

// Property attributes

pub type napi_property_attributes = c_int;

pub const napi_default: napi_property_attributes = 0;
pub const napi_writable: napi_property_attributes = 1 << 0;
pub const napi_enumerable: napi_property_attributes = 1 << 1;
pub const napi_configurable: napi_property_attributes = 1 << 2;
pub const napi_static: napi_property_attributes = 1 << 10;

// Threadsafe function modes

pub type napi_threadsafe_function_release_mode = c_int;

pub const napi_tsfn_release: napi_threadsafe_function_release_mode = 0;
pub const napi_tsfn_abort: napi_threadsafe_function_release_mode = 1;

pub type napi_threadsafe_function_call_mode = c_int;

pub const napi_tsfn_nonblocking: napi_threadsafe_function_call_mode = 0;
pub const napi_tsfn_blocking: napi_threadsafe_function_call_mode = 1;

// Opaque handles

macro_rules! opaque_handles {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[repr(transparent)]
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name(pub u64);
        )*
    };
}

opaque_handles! {
    /// Engine environment.
    napi_env,
    /// Scope-bound value handle.
    napi_value,
    /// Counted reference that outlives handle scopes.
    napi_ref,
    napi_handle_scope,
    napi_escapable_handle_scope,
    /// Resolver half of a promise.
    napi_deferred,
    /// Arguments of the native callback currently executing.
    napi_callback_info,
    /// Registered synchronous environment cleanup hook.
    napi_cleanup_hook_id,
}

/// 128-bit object type tag.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct napi_type_tag {
    pub lower: u64,
    pub upper: u64,
}

// Callbacks and native data

/// Native data attached to engine objects.
pub type napi_native_data = Rc<dyn Any>;

/// Native function body. Returning `None` yields `undefined`.
pub type napi_callback = Rc<dyn Fn(napi_env, napi_callback_info) -> Option<napi_value>>;

/// Finalizer run on the engine thread after the owning object is collected.
pub type napi_finalize = Box<dyn FnOnce(napi_env)>;

/// Finalizer that receives ownership of externally supplied storage back.
pub type napi_finalize_storage<T> = Box<dyn FnOnce(napi_env, Box<[T]>)>;

/// Module entry point. Receives the host that loaded it.
pub type napi_addon_register_func =
    Rc<dyn Fn(Rc<dyn NodeApi>, napi_env, napi_value) -> Option<napi_value>>;

/// Synchronous environment cleanup hook.
pub type napi_cleanup_hook = Box<dyn FnOnce()>;

/// Asynchronous environment cleanup hook; teardown waits until `remove` is called on the handle.
pub type napi_async_cleanup_hook = Box<dyn FnOnce(napi_async_cleanup_hook_handle)>;

pub type napi_async_cleanup_hook_handle = Arc<dyn AsyncCleanupHandle>;

/// Engine-thread callback for a loop signal.
pub type napi_signal_callback = Box<dyn FnMut(napi_env)>;

pub type napi_loop_signal = Arc<dyn LoopSignal>;

/// Cross-thread wakeup of the engine loop.
///
/// `send` may be called from any thread; coalesced sends run the
/// callback once. `set_ref` and `close` belong to the engine thread.
pub trait LoopSignal: Send + Sync {
    fn send(&self) -> napi_status;
    fn set_ref(&self, refed: bool);
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// Deregistration handle for an asynchronous cleanup hook.
pub trait AsyncCleanupHandle: Send + Sync {
    fn remove(&self) -> napi_status;
}

/// Property descriptor as the host consumes it.
///
/// Exactly one of `method`, `value` or the getter/setter pair is set, and
/// exactly one of `utf8name` or `name`.
#[derive(Clone, Default)]
pub struct napi_property_descriptor<'a> {
    pub utf8name: Option<&'a str>,
    pub name: Option<napi_value>,
    pub method: Option<napi_callback>,
    pub getter: Option<napi_callback>,
    pub setter: Option<napi_callback>,
    pub value: Option<napi_value>,
    pub attributes: napi_property_attributes,
}

/// Receiver and arguments of a native callback invocation.
#[derive(Debug, Clone)]
pub struct napi_callback_frame {
    pub this: napi_value,
    pub args: Vec<napi_value>,
    pub new_target: Option<napi_value>,
}

#[derive(Debug, Clone, Copy)]
pub struct napi_typedarray_info {
    pub kind: napi_typedarray_type,
    pub length: usize,
    pub data: *mut u8,
    pub arraybuffer: napi_value,
    pub byte_offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct napi_dataview_info {
    pub byte_length: usize,
    pub data: *mut u8,
    pub arraybuffer: napi_value,
    pub byte_offset: usize,
}

/// Module record handed to [`NodeApi::module_register`].
#[derive(Clone)]
pub struct napi_module {
    pub nm_version: c_int,
    pub nm_flags: u32,
    pub nm_filename: &'static str,
    pub nm_register_func: napi_addon_register_func,
}

/// Function table of an embedding host.
///
/// Every call except the signal and cleanup handles must happen on the
/// engine thread. Value handles are valid until the enclosing handle scope
/// closes.
pub trait NodeApi {
    // Environment

    fn get_version(&self, env: napi_env) -> HostResult<u32>;
    fn create_loop_signal(
        &self,
        env: napi_env,
        callback: napi_signal_callback,
    ) -> HostResult<napi_loop_signal>;
    fn adjust_external_memory(&self, env: napi_env, change_in_bytes: i64) -> HostResult<i64>;

    // Handle scopes

    fn open_handle_scope(&self, env: napi_env) -> HostResult<napi_handle_scope>;
    fn close_handle_scope(&self, env: napi_env, scope: napi_handle_scope) -> HostResult<()>;
    fn open_escapable_handle_scope(&self, env: napi_env)
    -> HostResult<napi_escapable_handle_scope>;
    fn close_escapable_handle_scope(
        &self,
        env: napi_env,
        scope: napi_escapable_handle_scope,
    ) -> HostResult<()>;
    fn escape_handle(
        &self,
        env: napi_env,
        scope: napi_escapable_handle_scope,
        escapee: napi_value,
    ) -> HostResult<napi_value>;

    // References

    fn create_reference(
        &self,
        env: napi_env,
        value: napi_value,
        initial_refcount: u32,
    ) -> HostResult<napi_ref>;
    fn delete_reference(&self, env: napi_env, reference: napi_ref) -> HostResult<()>;
    fn reference_ref(&self, env: napi_env, reference: napi_ref) -> HostResult<u32>;
    fn reference_unref(&self, env: napi_env, reference: napi_ref) -> HostResult<u32>;
    fn get_reference_value(
        &self,
        env: napi_env,
        reference: napi_ref,
    ) -> HostResult<Option<napi_value>>;

    // Native data

    fn wrap(
        &self,
        env: napi_env,
        object: napi_value,
        data: napi_native_data,
        finalize: Option<napi_finalize>,
    ) -> HostResult<()>;
    fn unwrap(&self, env: napi_env, object: napi_value) -> HostResult<napi_native_data>;
    fn remove_wrap(&self, env: napi_env, object: napi_value) -> HostResult<napi_native_data>;
    fn add_finalizer(
        &self,
        env: napi_env,
        object: napi_value,
        finalize: napi_finalize,
    ) -> HostResult<()>;
    fn type_tag_object(
        &self,
        env: napi_env,
        object: napi_value,
        tag: &napi_type_tag,
    ) -> HostResult<()>;
    fn check_object_type_tag(
        &self,
        env: napi_env,
        object: napi_value,
        tag: &napi_type_tag,
    ) -> HostResult<bool>;

    // Singletons and primitives

    fn get_undefined(&self, env: napi_env) -> HostResult<napi_value>;
    fn get_null(&self, env: napi_env) -> HostResult<napi_value>;
    fn get_global(&self, env: napi_env) -> HostResult<napi_value>;
    fn get_boolean(&self, env: napi_env, value: bool) -> HostResult<napi_value>;
    fn create_int32(&self, env: napi_env, value: i32) -> HostResult<napi_value>;
    fn create_uint32(&self, env: napi_env, value: u32) -> HostResult<napi_value>;
    fn create_int64(&self, env: napi_env, value: i64) -> HostResult<napi_value>;
    fn create_double(&self, env: napi_env, value: f64) -> HostResult<napi_value>;
    fn create_bigint_int64(&self, env: napi_env, value: i64) -> HostResult<napi_value>;
    fn create_bigint_uint64(&self, env: napi_env, value: u64) -> HostResult<napi_value>;

    // Strings and symbols

    fn create_string_utf8(&self, env: napi_env, value: &str) -> HostResult<napi_value>;
    fn create_string_utf16(&self, env: napi_env, value: &[u16]) -> HostResult<napi_value>;
    fn create_string_latin1(&self, env: napi_env, value: &[u8]) -> HostResult<napi_value>;
    /// Returns the string and whether the host copied the storage.
    fn create_external_string_latin1(
        &self,
        env: napi_env,
        value: Box<[u8]>,
        finalize: Option<napi_finalize_storage<u8>>,
    ) -> HostResult<(napi_value, bool)>;
    fn create_external_string_utf16(
        &self,
        env: napi_env,
        value: Box<[u16]>,
        finalize: Option<napi_finalize_storage<u16>>,
    ) -> HostResult<(napi_value, bool)>;
    fn create_property_key_utf8(&self, env: napi_env, value: &str) -> HostResult<napi_value>;
    fn create_property_key_utf16(&self, env: napi_env, value: &[u16]) -> HostResult<napi_value>;
    fn create_property_key_latin1(&self, env: napi_env, value: &[u8]) -> HostResult<napi_value>;
    fn create_symbol(
        &self,
        env: napi_env,
        description: Option<napi_value>,
    ) -> HostResult<napi_value>;
    fn symbol_for(&self, env: napi_env, description: &str) -> HostResult<napi_value>;

    // Objects

    fn create_object(&self, env: napi_env) -> HostResult<napi_value>;
    fn create_array(&self, env: napi_env) -> HostResult<napi_value>;
    fn create_array_with_length(&self, env: napi_env, length: usize) -> HostResult<napi_value>;
    fn create_external(
        &self,
        env: napi_env,
        data: napi_native_data,
        finalize: Option<napi_finalize>,
    ) -> HostResult<napi_value>;
    fn create_date(&self, env: napi_env, time: f64) -> HostResult<napi_value>;
    fn create_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value>;
    fn create_type_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value>;
    fn create_range_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value>;
    fn create_syntax_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value>;
    fn create_function(
        &self,
        env: napi_env,
        name: &str,
        callback: napi_callback,
    ) -> HostResult<napi_value>;
    fn define_class(
        &self,
        env: napi_env,
        name: &str,
        constructor: napi_callback,
        properties: &[napi_property_descriptor<'_>],
    ) -> HostResult<napi_value>;
    fn define_properties(
        &self,
        env: napi_env,
        object: napi_value,
        properties: &[napi_property_descriptor<'_>],
    ) -> HostResult<()>;

    // Promises

    fn create_promise(&self, env: napi_env) -> HostResult<(napi_deferred, napi_value)>;
    fn resolve_deferred(
        &self,
        env: napi_env,
        deferred: napi_deferred,
        resolution: napi_value,
    ) -> HostResult<()>;
    fn reject_deferred(
        &self,
        env: napi_env,
        deferred: napi_deferred,
        rejection: napi_value,
    ) -> HostResult<()>;

    // Binary data

    fn create_arraybuffer(&self, env: napi_env, byte_length: usize) -> HostResult<napi_value>;
    fn create_external_arraybuffer(
        &self,
        env: napi_env,
        data: Box<[u8]>,
        finalize: Option<napi_finalize_storage<u8>>,
    ) -> HostResult<napi_value>;
    fn detach_arraybuffer(&self, env: napi_env, arraybuffer: napi_value) -> HostResult<()>;
    fn is_detached_arraybuffer(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn get_arraybuffer_info(
        &self,
        env: napi_env,
        arraybuffer: napi_value,
    ) -> HostResult<(*mut u8, usize)>;
    fn create_typedarray(
        &self,
        env: napi_env,
        kind: napi_typedarray_type,
        length: usize,
        arraybuffer: napi_value,
        byte_offset: usize,
    ) -> HostResult<napi_value>;
    fn get_typedarray_info(
        &self,
        env: napi_env,
        typedarray: napi_value,
    ) -> HostResult<napi_typedarray_info>;
    fn create_dataview(
        &self,
        env: napi_env,
        byte_length: usize,
        arraybuffer: napi_value,
        byte_offset: usize,
    ) -> HostResult<napi_value>;
    fn get_dataview_info(
        &self,
        env: napi_env,
        dataview: napi_value,
    ) -> HostResult<napi_dataview_info>;

    // Inspection and coercion

    fn type_of(&self, env: napi_env, value: napi_value) -> HostResult<napi_valuetype>;
    fn instanceof(
        &self,
        env: napi_env,
        object: napi_value,
        constructor: napi_value,
    ) -> HostResult<bool>;
    fn is_array(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn is_arraybuffer(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn is_typedarray(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn is_dataview(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn is_date(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn is_error(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn is_promise(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn strict_equals(&self, env: napi_env, lhs: napi_value, rhs: napi_value) -> HostResult<bool>;
    fn coerce_to_bool(&self, env: napi_env, value: napi_value) -> HostResult<napi_value>;
    fn coerce_to_number(&self, env: napi_env, value: napi_value) -> HostResult<napi_value>;
    fn coerce_to_string(&self, env: napi_env, value: napi_value) -> HostResult<napi_value>;
    fn coerce_to_object(&self, env: napi_env, value: napi_value) -> HostResult<napi_value>;

    // Reading primitives

    fn get_value_bool(&self, env: napi_env, value: napi_value) -> HostResult<bool>;
    fn get_value_int32(&self, env: napi_env, value: napi_value) -> HostResult<i32>;
    fn get_value_uint32(&self, env: napi_env, value: napi_value) -> HostResult<u32>;
    fn get_value_int64(&self, env: napi_env, value: napi_value) -> HostResult<i64>;
    fn get_value_double(&self, env: napi_env, value: napi_value) -> HostResult<f64>;
    /// Returns the value and whether the conversion was lossless.
    fn get_value_bigint_int64(&self, env: napi_env, value: napi_value) -> HostResult<(i64, bool)>;
    fn get_value_bigint_uint64(&self, env: napi_env, value: napi_value)
    -> HostResult<(u64, bool)>;
    fn get_value_string_utf8(&self, env: napi_env, value: napi_value) -> HostResult<String>;
    fn get_value_string_utf16(&self, env: napi_env, value: napi_value) -> HostResult<Vec<u16>>;
    fn get_value_string_latin1(&self, env: napi_env, value: napi_value) -> HostResult<Vec<u8>>;
    fn get_value_external(&self, env: napi_env, value: napi_value)
    -> HostResult<napi_native_data>;
    fn get_date_value(&self, env: napi_env, value: napi_value) -> HostResult<f64>;

    // Properties

    fn get_array_length(&self, env: napi_env, array: napi_value) -> HostResult<u32>;
    fn get_prototype(&self, env: napi_env, object: napi_value) -> HostResult<napi_value>;
    fn get_property_names(&self, env: napi_env, object: napi_value) -> HostResult<napi_value>;
    fn set_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
        value: napi_value,
    ) -> HostResult<()>;
    fn get_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
    ) -> HostResult<napi_value>;
    fn has_property(&self, env: napi_env, object: napi_value, key: napi_value)
    -> HostResult<bool>;
    fn delete_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
    ) -> HostResult<bool>;
    fn set_named_property(
        &self,
        env: napi_env,
        object: napi_value,
        name: &str,
        value: napi_value,
    ) -> HostResult<()>;
    fn get_named_property(
        &self,
        env: napi_env,
        object: napi_value,
        name: &str,
    ) -> HostResult<napi_value>;
    fn has_named_property(&self, env: napi_env, object: napi_value, name: &str)
    -> HostResult<bool>;
    fn set_element(
        &self,
        env: napi_env,
        object: napi_value,
        index: u32,
        value: napi_value,
    ) -> HostResult<()>;
    fn get_element(&self, env: napi_env, object: napi_value, index: u32)
    -> HostResult<napi_value>;
    fn has_element(&self, env: napi_env, object: napi_value, index: u32) -> HostResult<bool>;
    fn delete_element(&self, env: napi_env, object: napi_value, index: u32) -> HostResult<bool>;

    // Calls

    fn get_cb_info(
        &self,
        env: napi_env,
        info: napi_callback_info,
    ) -> HostResult<napi_callback_frame>;
    fn call_function(
        &self,
        env: napi_env,
        recv: napi_value,
        function: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value>;
    /// Calls `function` as a top-level entry, draining engine work afterwards.
    fn make_callback(
        &self,
        env: napi_env,
        recv: napi_value,
        function: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value>;
    fn new_instance(
        &self,
        env: napi_env,
        constructor: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value>;

    // Exceptions

    fn throw(&self, env: napi_env, error: napi_value) -> HostResult<()>;
    fn throw_error(&self, env: napi_env, code: Option<&str>, message: &str) -> HostResult<()>;
    fn throw_type_error(&self, env: napi_env, code: Option<&str>, message: &str)
    -> HostResult<()>;
    fn throw_range_error(
        &self,
        env: napi_env,
        code: Option<&str>,
        message: &str,
    ) -> HostResult<()>;
    fn throw_syntax_error(
        &self,
        env: napi_env,
        code: Option<&str>,
        message: &str,
    ) -> HostResult<()>;
    fn is_exception_pending(&self, env: napi_env) -> HostResult<bool>;
    /// Returns `undefined` when nothing is pending.
    fn get_and_clear_last_exception(&self, env: napi_env) -> HostResult<napi_value>;
    fn fatal_exception(&self, env: napi_env, error: napi_value) -> HostResult<()>;

    // Cleanup hooks

    fn add_env_cleanup_hook(
        &self,
        env: napi_env,
        hook: napi_cleanup_hook,
    ) -> HostResult<napi_cleanup_hook_id>;
    fn remove_env_cleanup_hook(&self, env: napi_env, hook: napi_cleanup_hook_id)
    -> HostResult<()>;
    fn add_async_cleanup_hook(
        &self,
        env: napi_env,
        hook: napi_async_cleanup_hook,
    ) -> HostResult<napi_async_cleanup_hook_handle>;

    // Modules

    fn module_register(&self, module: napi_module) -> HostResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_bits_are_disjoint() {
        let all = [napi_writable, napi_enumerable, napi_configurable, napi_static];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
        assert_eq!(napi_static, 1024);
    }

    #[test]
    fn test_handles_compare_by_id() {
        assert_eq!(napi_value(7), napi_value(7));
        assert_ne!(napi_ref(1), napi_ref(2));
    }
}
