//! [`NodeApi`] implementation of the reference host.

use std::rc::Rc;
use std::sync::Arc;

use otter_napi_sys::*;

use crate::MemoryHost;
use crate::event_loop::CleanupToken;
use crate::handles::FrameKind;
use crate::heap::{
    BufferData, CellId, CellValue, ErrorKind, ObjectKind, PromiseState, PropKey, Property,
    PropertySlot, ViewData, Wrap,
};
use crate::state::{Assign, HostState, Lookup, RefEntry, data, to_uint32, utf16};

fn element_size(kind: napi_typedarray_type) -> Option<usize> {
    match kind {
        napi_int8_array | napi_uint8_array | napi_uint8_clamped_array => Some(1),
        napi_int16_array | napi_uint16_array => Some(2),
        napi_int32_array | napi_uint32_array | napi_float32_array => Some(4),
        napi_float64_array | napi_bigint64_array | napi_biguint64_array => Some(8),
        _ => None,
    }
}

fn typedarray_name(kind: napi_typedarray_type) -> &'static str {
    match kind {
        napi_int8_array => "Int8Array",
        napi_uint8_array => "Uint8Array",
        napi_uint8_clamped_array => "Uint8ClampedArray",
        napi_int16_array => "Int16Array",
        napi_uint16_array => "Uint16Array",
        napi_int32_array => "Int32Array",
        napi_uint32_array => "Uint32Array",
        napi_float32_array => "Float32Array",
        napi_float64_array => "Float64Array",
        napi_bigint64_array => "BigInt64Array",
        _ => "BigUint64Array",
    }
}

fn latin1_units(bytes: &[u8]) -> Rc<[u16]> {
    bytes.iter().map(|byte| u16::from(*byte)).collect()
}

impl MemoryHost {
    fn read(&self, env: napi_env, object: CellId, key: PropKey) -> HostResult<napi_value> {
        let lookup = {
            let state = self.state(env)?;
            state.object(object)?;
            state.lookup(object, &key)
        };
        match lookup {
            Lookup::Getter(getter) => {
                let result = self.invoke(&getter, object, Vec::new(), None)?;
                Ok(self.state(env)?.handle(result))
            }
            Lookup::Value(cell) => Ok(self.state(env)?.handle(cell)),
            Lookup::Length(length) => Ok(self
                .state(env)?
                .new_value(CellValue::Number(length as f64))),
            Lookup::Missing => {
                let mut state = self.state(env)?;
                let undefined = state.undefined;
                Ok(state.handle(undefined))
            }
        }
    }

    fn write(&self, env: napi_env, object: CellId, key: PropKey, value: CellId) -> HostResult<()> {
        let (assign, displaced) = {
            let mut state = self.state(env)?;
            let mut displaced = Vec::new();
            let assign = state.assign(object, key, value, &mut displaced)?;
            (assign, displaced)
        };
        drop(displaced);
        if let Assign::Setter(setter) = assign {
            self.invoke(&setter, object, vec![value], None)?;
        }
        Ok(())
    }

    fn has(&self, env: napi_env, object: CellId, key: PropKey) -> HostResult<bool> {
        let state = self.state(env)?;
        state.object(object)?;
        Ok(!matches!(state.lookup(object, &key), Lookup::Missing))
    }

    fn delete(&self, env: napi_env, object: CellId, key: PropKey) -> HostResult<bool> {
        let (deleted, displaced) = {
            let mut state = self.state(env)?;
            let mut displaced = Vec::new();
            let deleted = state.remove(object, &key, &mut displaced)?;
            (deleted, displaced)
        };
        drop(displaced);
        Ok(deleted)
    }

    fn call(
        &self,
        env: napi_env,
        recv: napi_value,
        function: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value> {
        let (callback, this, args) = {
            let state = self.state(env)?;
            self.enter_script(&state)?;
            let function = state.cell(function)?;
            let callback = state.callback(function)?;
            let this = state.cell(recv)?;
            let args = args
                .iter()
                .map(|arg| state.cell(*arg))
                .collect::<HostResult<Vec<_>>>()?;
            (callback, this, args)
        };
        let result = self.invoke(&callback, this, args, None)?;
        Ok(self.state(env)?.handle(result))
    }

    fn error_value(
        &self,
        env: napi_env,
        kind: ErrorKind,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let code = code.map(|code| state.cell(code)).transpose()?;
        let message = state.cell(message)?;
        let error = state.new_error(kind, code, message)?;
        Ok(state.handle(error))
    }

    fn is_kind(
        &self,
        env: napi_env,
        value: napi_value,
        test: impl Fn(&ObjectKind) -> bool,
    ) -> HostResult<bool> {
        let state = self.state(env)?;
        let cell = state.cell(value)?;
        Ok(state.heap.object(cell).is_some_and(|object| test(&object.kind)))
    }

    fn new_function(state: &mut HostState, name: &str, callback: napi_callback) -> CellId {
        let function = state.new_object(ObjectKind::Function {
            name: name.to_owned(),
            callback,
        });
        let prototype = state.new_object(ObjectKind::Ordinary);
        if let Some(object) = state.heap.object_mut(prototype) {
            object.props.insert(
                PropKey::named("constructor"),
                data(function, napi_writable | napi_configurable),
            );
        }
        if let Some(object) = state.heap.object_mut(function) {
            object
                .props
                .insert(PropKey::named("prototype"), data(prototype, napi_writable));
        }
        function
    }

    fn define(
        state: &mut HostState,
        target: CellId,
        descriptor: &napi_property_descriptor<'_>,
        displaced: &mut Vec<Property>,
    ) -> HostResult<()> {
        let key = match (descriptor.utf8name, descriptor.name) {
            (Some(name), _) => PropKey::named(name),
            (None, Some(name)) => {
                let cell = state.cell(name)?;
                state.prop_key(cell)?
            }
            (None, None) => return Err(napi_name_expected),
        };
        let attributes = descriptor.attributes & !napi_static;
        let slot = if let Some(method) = &descriptor.method {
            let name = match &key {
                PropKey::String(units) => String::from_utf16_lossy(units),
                PropKey::Symbol(_) => String::new(),
            };
            PropertySlot::Data(Self::new_function(state, &name, Rc::clone(method)))
        } else if descriptor.getter.is_some() || descriptor.setter.is_some() {
            PropertySlot::Accessor {
                getter: descriptor.getter.clone(),
                setter: descriptor.setter.clone(),
            }
        } else if let Some(value) = descriptor.value {
            PropertySlot::Data(state.cell(value)?)
        } else {
            return Err(napi_invalid_arg);
        };
        let object = state.object_mut(target)?;
        displaced.extend(object.props.insert(key, Property { slot, attributes }));
        Ok(())
    }
}

impl NodeApi for MemoryHost {
    // Environment

    fn get_version(&self, env: napi_env) -> HostResult<u32> {
        self.state(env)?;
        Ok(self.config.version)
    }

    fn create_loop_signal(
        &self,
        env: napi_env,
        callback: napi_signal_callback,
    ) -> HostResult<napi_loop_signal> {
        self.state(env)?;
        Ok(self.event_loop.create_signal(callback))
    }

    fn adjust_external_memory(&self, env: napi_env, change_in_bytes: i64) -> HostResult<i64> {
        let mut state = self.state(env)?;
        state.external_memory = state.external_memory.saturating_add(change_in_bytes);
        Ok(state.external_memory)
    }

    // Handle scopes

    fn open_handle_scope(&self, env: napi_env) -> HostResult<napi_handle_scope> {
        let mut state = self.state(env)?;
        let undefined = state.undefined;
        Ok(napi_handle_scope(
            state.handles.open(FrameKind::Plain, undefined),
        ))
    }

    fn close_handle_scope(&self, env: napi_env, scope: napi_handle_scope) -> HostResult<()> {
        let live = {
            let mut state = self.state(env)?;
            state.handles.close(scope.0, FrameKind::Plain)?;
            state.heap.live()
        };
        if self.config.gc_threshold.is_some_and(|threshold| live > threshold) {
            self.collect_garbage();
        }
        Ok(())
    }

    fn open_escapable_handle_scope(
        &self,
        env: napi_env,
    ) -> HostResult<napi_escapable_handle_scope> {
        let mut state = self.state(env)?;
        let undefined = state.undefined;
        Ok(napi_escapable_handle_scope(
            state.handles.open(FrameKind::Escapable, undefined),
        ))
    }

    fn close_escapable_handle_scope(
        &self,
        env: napi_env,
        scope: napi_escapable_handle_scope,
    ) -> HostResult<()> {
        self.state(env)?.handles.close(scope.0, FrameKind::Escapable)
    }

    fn escape_handle(
        &self,
        env: napi_env,
        scope: napi_escapable_handle_scope,
        escapee: napi_value,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(escapee)?;
        state.handles.escape(scope.0, cell)
    }

    // References

    fn create_reference(
        &self,
        env: napi_env,
        value: napi_value,
        initial_refcount: u32,
    ) -> HostResult<napi_ref> {
        let mut state = self.state(env)?;
        let cell = state.cell(value)?;
        let id = state.next_id();
        state.refs.insert(
            id,
            RefEntry {
                cell: Some(cell),
                count: initial_refcount,
            },
        );
        Ok(napi_ref(id))
    }

    fn delete_reference(&self, env: napi_env, reference: napi_ref) -> HostResult<()> {
        let mut state = self.state(env)?;
        state
            .refs
            .remove(&reference.0)
            .map(drop)
            .ok_or(napi_invalid_arg)
    }

    fn reference_ref(&self, env: napi_env, reference: napi_ref) -> HostResult<u32> {
        let mut state = self.state(env)?;
        let entry = state.refs.get_mut(&reference.0).ok_or(napi_invalid_arg)?;
        entry.count += 1;
        Ok(entry.count)
    }

    fn reference_unref(&self, env: napi_env, reference: napi_ref) -> HostResult<u32> {
        let mut state = self.state(env)?;
        let entry = state.refs.get_mut(&reference.0).ok_or(napi_invalid_arg)?;
        if entry.count == 0 {
            return Err(napi_generic_failure);
        }
        entry.count -= 1;
        Ok(entry.count)
    }

    fn get_reference_value(
        &self,
        env: napi_env,
        reference: napi_ref,
    ) -> HostResult<Option<napi_value>> {
        let mut state = self.state(env)?;
        let cell = state
            .refs
            .get(&reference.0)
            .ok_or(napi_invalid_arg)?
            .cell;
        Ok(cell.map(|cell| state.handle(cell)))
    }

    // Native data

    fn wrap(
        &self,
        env: napi_env,
        object: napi_value,
        data: napi_native_data,
        finalize: Option<napi_finalize>,
    ) -> HostResult<()> {
        let mut state = self.state(env)?;
        let cell = state.cell(object)?;
        let object = state.object_mut(cell)?;
        if object.wrap.is_some() {
            return Err(napi_invalid_arg);
        }
        object.wrap = Some(Wrap { data, finalize });
        Ok(())
    }

    fn unwrap(&self, env: napi_env, object: napi_value) -> HostResult<napi_native_data> {
        let state = self.state(env)?;
        let cell = state.cell(object)?;
        state
            .object(cell)?
            .wrap
            .as_ref()
            .map(|wrap| Rc::clone(&wrap.data))
            .ok_or(napi_invalid_arg)
    }

    fn remove_wrap(&self, env: napi_env, object: napi_value) -> HostResult<napi_native_data> {
        let wrap = {
            let mut state = self.state(env)?;
            let cell = state.cell(object)?;
            state.object_mut(cell)?.wrap.take().ok_or(napi_invalid_arg)?
        };
        let Wrap { data, finalize } = wrap;
        drop(finalize);
        Ok(data)
    }

    fn add_finalizer(
        &self,
        env: napi_env,
        object: napi_value,
        finalize: napi_finalize,
    ) -> HostResult<()> {
        let mut state = self.state(env)?;
        let cell = state.cell(object)?;
        state.object(cell)?;
        state.finalizers.entry(cell).or_default().push(finalize);
        Ok(())
    }

    fn type_tag_object(
        &self,
        env: napi_env,
        object: napi_value,
        tag: &napi_type_tag,
    ) -> HostResult<()> {
        let mut state = self.state(env)?;
        let cell = state.cell(object)?;
        let object = state.object_mut(cell)?;
        if object.type_tag.is_some() {
            return Err(napi_invalid_arg);
        }
        object.type_tag = Some(*tag);
        Ok(())
    }

    fn check_object_type_tag(
        &self,
        env: napi_env,
        object: napi_value,
        tag: &napi_type_tag,
    ) -> HostResult<bool> {
        let state = self.state(env)?;
        let cell = state.cell(object)?;
        Ok(state.object(cell)?.type_tag.as_ref() == Some(tag))
    }

    // Singletons and primitives

    fn get_undefined(&self, env: napi_env) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.undefined;
        Ok(state.handle(cell))
    }

    fn get_null(&self, env: napi_env) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.null;
        Ok(state.handle(cell))
    }

    fn get_global(&self, env: napi_env) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.global;
        Ok(state.handle(cell))
    }

    fn get_boolean(&self, env: napi_env, value: bool) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.boolean(value);
        Ok(state.handle(cell))
    }

    fn create_int32(&self, env: napi_env, value: i32) -> HostResult<napi_value> {
        self.create_double(env, f64::from(value))
    }

    fn create_uint32(&self, env: napi_env, value: u32) -> HostResult<napi_value> {
        self.create_double(env, f64::from(value))
    }

    fn create_int64(&self, env: napi_env, value: i64) -> HostResult<napi_value> {
        self.create_double(env, value as f64)
    }

    fn create_double(&self, env: napi_env, value: f64) -> HostResult<napi_value> {
        Ok(self.state(env)?.new_value(CellValue::Number(value)))
    }

    fn create_bigint_int64(&self, env: napi_env, value: i64) -> HostResult<napi_value> {
        Ok(self
            .state(env)?
            .new_value(CellValue::BigInt(i128::from(value))))
    }

    fn create_bigint_uint64(&self, env: napi_env, value: u64) -> HostResult<napi_value> {
        Ok(self
            .state(env)?
            .new_value(CellValue::BigInt(i128::from(value))))
    }

    // Strings and symbols

    fn create_string_utf8(&self, env: napi_env, value: &str) -> HostResult<napi_value> {
        Ok(self.state(env)?.new_value(CellValue::String(utf16(value))))
    }

    fn create_string_utf16(&self, env: napi_env, value: &[u16]) -> HostResult<napi_value> {
        Ok(self.state(env)?.new_value(CellValue::String(value.into())))
    }

    fn create_string_latin1(&self, env: napi_env, value: &[u8]) -> HostResult<napi_value> {
        Ok(self
            .state(env)?
            .new_value(CellValue::String(latin1_units(value))))
    }

    fn create_external_string_latin1(
        &self,
        env: napi_env,
        value: Box<[u8]>,
        finalize: Option<napi_finalize_storage<u8>>,
    ) -> HostResult<(napi_value, bool)> {
        let mut state = self.state(env)?;
        let cell = state.alloc(CellValue::String(latin1_units(&value)));
        if let Some(finalize) = finalize {
            state
                .finalizers
                .entry(cell)
                .or_default()
                .push(Box::new(move |env| finalize(env, value)));
        }
        Ok((state.handle(cell), false))
    }

    fn create_external_string_utf16(
        &self,
        env: napi_env,
        value: Box<[u16]>,
        finalize: Option<napi_finalize_storage<u16>>,
    ) -> HostResult<(napi_value, bool)> {
        let mut state = self.state(env)?;
        let cell = state.alloc(CellValue::String(Rc::from(&*value)));
        if let Some(finalize) = finalize {
            state
                .finalizers
                .entry(cell)
                .or_default()
                .push(Box::new(move |env| finalize(env, value)));
        }
        Ok((state.handle(cell), false))
    }

    fn create_property_key_utf8(&self, env: napi_env, value: &str) -> HostResult<napi_value> {
        self.create_string_utf8(env, value)
    }

    fn create_property_key_utf16(&self, env: napi_env, value: &[u16]) -> HostResult<napi_value> {
        self.create_string_utf16(env, value)
    }

    fn create_property_key_latin1(&self, env: napi_env, value: &[u8]) -> HostResult<napi_value> {
        self.create_string_latin1(env, value)
    }

    fn create_symbol(
        &self,
        env: napi_env,
        description: Option<napi_value>,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let description = match description {
            Some(description) => {
                let cell = state.cell(description)?;
                Some(state.string(cell)?)
            }
            None => None,
        };
        Ok(state.new_value(CellValue::Symbol(description)))
    }

    fn symbol_for(&self, env: napi_env, description: &str) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = match state.symbols.get(description) {
            Some(cell) => *cell,
            None => {
                let cell = state.alloc(CellValue::Symbol(Some(utf16(description))));
                state.symbols.insert(description.to_owned(), cell);
                cell
            }
        };
        Ok(state.handle(cell))
    }

    // Objects

    fn create_object(&self, env: napi_env) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.new_object(ObjectKind::Ordinary);
        Ok(state.handle(cell))
    }

    fn create_array(&self, env: napi_env) -> HostResult<napi_value> {
        self.create_array_with_length(env, 0)
    }

    fn create_array_with_length(&self, env: napi_env, length: usize) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let undefined = state.undefined;
        let cell = state.new_object(ObjectKind::Array(vec![undefined; length]));
        Ok(state.handle(cell))
    }

    fn create_external(
        &self,
        env: napi_env,
        data: napi_native_data,
        finalize: Option<napi_finalize>,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.new_object(ObjectKind::External(data));
        if let Some(finalize) = finalize {
            state.finalizers.entry(cell).or_default().push(finalize);
        }
        Ok(state.handle(cell))
    }

    fn create_date(&self, env: napi_env, time: f64) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.new_object(ObjectKind::Date(time));
        Ok(state.handle(cell))
    }

    fn create_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value> {
        self.error_value(env, ErrorKind::Error, code, message)
    }

    fn create_type_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value> {
        self.error_value(env, ErrorKind::TypeError, code, message)
    }

    fn create_range_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value> {
        self.error_value(env, ErrorKind::RangeError, code, message)
    }

    fn create_syntax_error(
        &self,
        env: napi_env,
        code: Option<napi_value>,
        message: napi_value,
    ) -> HostResult<napi_value> {
        self.error_value(env, ErrorKind::SyntaxError, code, message)
    }

    fn create_function(
        &self,
        env: napi_env,
        name: &str,
        callback: napi_callback,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = Self::new_function(&mut state, name, callback);
        Ok(state.handle(cell))
    }

    fn define_class(
        &self,
        env: napi_env,
        name: &str,
        constructor: napi_callback,
        properties: &[napi_property_descriptor<'_>],
    ) -> HostResult<napi_value> {
        let mut displaced = Vec::new();
        let result = {
            let mut state = self.state(env)?;
            let class = Self::new_function(&mut state, name, constructor);
            let prototype = match state.lookup(class, &PropKey::named("prototype")) {
                Lookup::Value(prototype) => prototype,
                _ => return Err(napi_generic_failure),
            };
            for descriptor in properties {
                let target = if descriptor.attributes & napi_static != 0 {
                    class
                } else {
                    prototype
                };
                Self::define(&mut state, target, descriptor, &mut displaced)?;
            }
            state.handle(class)
        };
        drop(displaced);
        Ok(result)
    }

    fn define_properties(
        &self,
        env: napi_env,
        object: napi_value,
        properties: &[napi_property_descriptor<'_>],
    ) -> HostResult<()> {
        let mut displaced = Vec::new();
        {
            let mut state = self.state(env)?;
            let target = state.cell(object)?;
            state.object(target)?;
            for descriptor in properties {
                Self::define(&mut state, target, descriptor, &mut displaced)?;
            }
        }
        drop(displaced);
        Ok(())
    }

    // Promises

    fn create_promise(&self, env: napi_env) -> HostResult<(napi_deferred, napi_value)> {
        let mut state = self.state(env)?;
        let promise = state.new_object(ObjectKind::Promise(PromiseState::Pending));
        let id = state.next_id();
        state.deferreds.insert(id, promise);
        Ok((napi_deferred(id), state.handle(promise)))
    }

    fn resolve_deferred(
        &self,
        env: napi_env,
        deferred: napi_deferred,
        resolution: napi_value,
    ) -> HostResult<()> {
        let mut state = self.state(env)?;
        let value = state.cell(resolution)?;
        state.settle(deferred.0, Ok(value))
    }

    fn reject_deferred(
        &self,
        env: napi_env,
        deferred: napi_deferred,
        rejection: napi_value,
    ) -> HostResult<()> {
        let mut state = self.state(env)?;
        let reason = state.cell(rejection)?;
        state.settle(deferred.0, Err(reason))
    }

    // Binary data

    fn create_arraybuffer(&self, env: napi_env, byte_length: usize) -> HostResult<napi_value> {
        self.create_external_arraybuffer(env, vec![0; byte_length].into_boxed_slice(), None)
    }

    fn create_external_arraybuffer(
        &self,
        env: napi_env,
        data: Box<[u8]>,
        finalize: Option<napi_finalize_storage<u8>>,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.new_object(ObjectKind::ArrayBuffer(BufferData {
            bytes: data,
            detached: false,
            finalize,
        }));
        Ok(state.handle(cell))
    }

    fn detach_arraybuffer(&self, env: napi_env, arraybuffer: napi_value) -> HostResult<()> {
        let released = {
            let mut state = self.state(env)?;
            let cell = state.cell(arraybuffer)?;
            let Ok(object) = state.object_mut(cell) else {
                return Err(napi_arraybuffer_expected);
            };
            let ObjectKind::ArrayBuffer(buffer) = &mut object.kind else {
                return Err(napi_detachable_arraybuffer_expected);
            };
            buffer.detached = true;
            let bytes = std::mem::take(&mut buffer.bytes);
            buffer.finalize.take().map(|finalize| (finalize, bytes))
        };
        if let Some((release, bytes)) = released {
            let finalize: napi_finalize = Box::new(move |env| release(env, bytes));
            self.run_finalizers(vec![finalize]);
        }
        Ok(())
    }

    fn is_detached_arraybuffer(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| {
            matches!(kind, ObjectKind::ArrayBuffer(buffer) if buffer.detached)
        })
    }

    fn get_arraybuffer_info(
        &self,
        env: napi_env,
        arraybuffer: napi_value,
    ) -> HostResult<(*mut u8, usize)> {
        let mut state = self.state(env)?;
        let cell = state.cell(arraybuffer)?;
        match state.heap.object_mut(cell).map(|object| &mut object.kind) {
            Some(ObjectKind::ArrayBuffer(buffer)) => {
                Ok((buffer.bytes.as_mut_ptr(), buffer.bytes.len()))
            }
            _ => Err(napi_arraybuffer_expected),
        }
    }

    fn create_typedarray(
        &self,
        env: napi_env,
        kind: napi_typedarray_type,
        length: usize,
        arraybuffer: napi_value,
        byte_offset: usize,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let buffer = state.cell(arraybuffer)?;
        let byte_length = match state.heap.object(buffer).map(|object| &object.kind) {
            Some(ObjectKind::ArrayBuffer(data)) => data.bytes.len(),
            _ => return Err(napi_invalid_arg),
        };
        let size = element_size(kind).ok_or(napi_invalid_arg)?;
        if byte_offset % size != 0 {
            let message = format!(
                "start offset of {} should be a multiple of {}",
                typedarray_name(kind),
                size
            );
            return Err(state.raise(ErrorKind::RangeError, &message));
        }
        let end = length
            .checked_mul(size)
            .and_then(|bytes| bytes.checked_add(byte_offset));
        if end.is_none_or(|end| end > byte_length) {
            return Err(state.raise(ErrorKind::RangeError, "Invalid typed array length"));
        }
        let cell = state.new_object(ObjectKind::TypedArray {
            kind,
            view: ViewData {
                buffer,
                byte_offset,
                length,
            },
        });
        Ok(state.handle(cell))
    }

    fn get_typedarray_info(
        &self,
        env: napi_env,
        typedarray: napi_value,
    ) -> HostResult<napi_typedarray_info> {
        let mut state = self.state(env)?;
        let cell = state.cell(typedarray)?;
        let (kind, buffer, byte_offset, length) =
            match state.heap.object(cell).map(|object| &object.kind) {
                Some(ObjectKind::TypedArray { kind, view }) => {
                    (*kind, view.buffer, view.byte_offset, view.length)
                }
                _ => return Err(napi_invalid_arg),
            };
        let (data, length) = match state.heap.object_mut(buffer).map(|object| &mut object.kind) {
            Some(ObjectKind::ArrayBuffer(data)) if !data.detached => {
                // SAFETY: byte_offset was bounds-checked against the buffer at creation
                // and buffers never shrink unless detached.
                (unsafe { data.bytes.as_mut_ptr().add(byte_offset) }, length)
            }
            _ => (std::ptr::null_mut(), 0),
        };
        Ok(napi_typedarray_info {
            kind,
            length,
            data,
            arraybuffer: state.handle(buffer),
            byte_offset,
        })
    }

    fn create_dataview(
        &self,
        env: napi_env,
        byte_length: usize,
        arraybuffer: napi_value,
        byte_offset: usize,
    ) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let buffer = state.cell(arraybuffer)?;
        let available = match state.heap.object(buffer).map(|object| &object.kind) {
            Some(ObjectKind::ArrayBuffer(data)) => data.bytes.len(),
            _ => return Err(napi_invalid_arg),
        };
        if byte_offset
            .checked_add(byte_length)
            .is_none_or(|end| end > available)
        {
            return Err(state.raise(
                ErrorKind::RangeError,
                "byte_offset + byte_length should be less than or equal to the size in bytes of the array passed in",
            ));
        }
        let cell = state.new_object(ObjectKind::DataView(ViewData {
            buffer,
            byte_offset,
            length: byte_length,
        }));
        Ok(state.handle(cell))
    }

    fn get_dataview_info(
        &self,
        env: napi_env,
        dataview: napi_value,
    ) -> HostResult<napi_dataview_info> {
        let mut state = self.state(env)?;
        let cell = state.cell(dataview)?;
        let (buffer, byte_offset, byte_length) =
            match state.heap.object(cell).map(|object| &object.kind) {
                Some(ObjectKind::DataView(view)) => (view.buffer, view.byte_offset, view.length),
                _ => return Err(napi_invalid_arg),
            };
        let (data, byte_length) =
            match state.heap.object_mut(buffer).map(|object| &mut object.kind) {
                Some(ObjectKind::ArrayBuffer(data)) if !data.detached => {
                    // SAFETY: the view was bounds-checked against the buffer at creation.
                    (unsafe { data.bytes.as_mut_ptr().add(byte_offset) }, byte_length)
                }
                _ => (std::ptr::null_mut(), 0),
            };
        Ok(napi_dataview_info {
            byte_length,
            data,
            arraybuffer: state.handle(buffer),
            byte_offset,
        })
    }

    // Inspection and coercion

    fn type_of(&self, env: napi_env, value: napi_value) -> HostResult<napi_valuetype> {
        let state = self.state(env)?;
        let cell = state.cell(value)?;
        Ok(match state.heap.get(cell) {
            Some(CellValue::Undefined) | None => napi_undefined,
            Some(CellValue::Null) => napi_null,
            Some(CellValue::Boolean(_)) => napi_boolean,
            Some(CellValue::Number(_)) => napi_number,
            Some(CellValue::BigInt(_)) => napi_bigint,
            Some(CellValue::String(_)) => napi_string,
            Some(CellValue::Symbol(_)) => napi_symbol,
            Some(CellValue::Object(object)) => match object.kind {
                ObjectKind::Function { .. } => napi_function,
                ObjectKind::External(_) => napi_external,
                _ => napi_object,
            },
        })
    }

    fn instanceof(
        &self,
        env: napi_env,
        object: napi_value,
        constructor: napi_value,
    ) -> HostResult<bool> {
        let state = self.state(env)?;
        let object = state.cell(object)?;
        let constructor = state.cell(constructor)?;
        state.instance_of(object, constructor)
    }

    fn is_array(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| matches!(kind, ObjectKind::Array(_)))
    }

    fn is_arraybuffer(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| matches!(kind, ObjectKind::ArrayBuffer(_)))
    }

    fn is_typedarray(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| {
            matches!(kind, ObjectKind::TypedArray { .. })
        })
    }

    fn is_dataview(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| matches!(kind, ObjectKind::DataView(_)))
    }

    fn is_date(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| matches!(kind, ObjectKind::Date(_)))
    }

    fn is_error(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| matches!(kind, ObjectKind::Error(_)))
    }

    fn is_promise(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        self.is_kind(env, value, |kind| matches!(kind, ObjectKind::Promise(_)))
    }

    fn strict_equals(&self, env: napi_env, lhs: napi_value, rhs: napi_value) -> HostResult<bool> {
        let state = self.state(env)?;
        let lhs = state.cell(lhs)?;
        let rhs = state.cell(rhs)?;
        Ok(state.strict_equals(lhs, rhs))
    }

    fn coerce_to_bool(&self, env: napi_env, value: napi_value) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(value)?;
        let result = state.boolean(state.truthy(cell));
        Ok(state.handle(result))
    }

    fn coerce_to_number(&self, env: napi_env, value: napi_value) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(value)?;
        let number = state.to_number(cell)?;
        Ok(state.new_value(CellValue::Number(number)))
    }

    fn coerce_to_string(&self, env: napi_env, value: napi_value) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(value)?;
        match state.heap.get(cell) {
            Some(CellValue::String(_)) => Ok(state.handle(cell)),
            Some(CellValue::Symbol(_)) => Err(state.raise(
                ErrorKind::TypeError,
                "Cannot convert a Symbol value to a string",
            )),
            _ => {
                let text = state.display(cell);
                Ok(state.new_value(CellValue::String(utf16(&text))))
            }
        }
    }

    fn coerce_to_object(&self, env: napi_env, value: napi_value) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(value)?;
        match state.heap.get(cell) {
            Some(CellValue::Object(_)) => Ok(state.handle(cell)),
            Some(CellValue::Undefined) | Some(CellValue::Null) | None => Err(state.raise(
                ErrorKind::TypeError,
                "Cannot convert undefined or null to object",
            )),
            _ => {
                let wrapper = state.new_object(ObjectKind::Ordinary);
                Ok(state.handle(wrapper))
            }
        }
    }

    // Reading primitives

    fn get_value_bool(&self, env: napi_env, value: napi_value) -> HostResult<bool> {
        let state = self.state(env)?;
        match state.heap.get(state.cell(value)?) {
            Some(CellValue::Boolean(value)) => Ok(*value),
            _ => Err(napi_boolean_expected),
        }
    }

    fn get_value_int32(&self, env: napi_env, value: napi_value) -> HostResult<i32> {
        Ok(self.get_value_uint32(env, value)? as i32)
    }

    fn get_value_uint32(&self, env: napi_env, value: napi_value) -> HostResult<u32> {
        let state = self.state(env)?;
        Ok(to_uint32(state.number(state.cell(value)?)?))
    }

    fn get_value_int64(&self, env: napi_env, value: napi_value) -> HostResult<i64> {
        let state = self.state(env)?;
        let number = state.number(state.cell(value)?)?;
        Ok(if number.is_finite() { number as i64 } else { 0 })
    }

    fn get_value_double(&self, env: napi_env, value: napi_value) -> HostResult<f64> {
        let state = self.state(env)?;
        state.number(state.cell(value)?)
    }

    fn get_value_bigint_int64(&self, env: napi_env, value: napi_value) -> HostResult<(i64, bool)> {
        let state = self.state(env)?;
        match state.heap.get(state.cell(value)?) {
            Some(CellValue::BigInt(value)) => {
                Ok((*value as i64, i64::try_from(*value).is_ok()))
            }
            _ => Err(napi_bigint_expected),
        }
    }

    fn get_value_bigint_uint64(
        &self,
        env: napi_env,
        value: napi_value,
    ) -> HostResult<(u64, bool)> {
        let state = self.state(env)?;
        match state.heap.get(state.cell(value)?) {
            Some(CellValue::BigInt(value)) => {
                Ok((*value as u64, u64::try_from(*value).is_ok()))
            }
            _ => Err(napi_bigint_expected),
        }
    }

    fn get_value_string_utf8(&self, env: napi_env, value: napi_value) -> HostResult<String> {
        let state = self.state(env)?;
        let units = state.string(state.cell(value)?)?;
        Ok(String::from_utf16_lossy(&units))
    }

    fn get_value_string_utf16(&self, env: napi_env, value: napi_value) -> HostResult<Vec<u16>> {
        let state = self.state(env)?;
        Ok(state.string(state.cell(value)?)?.to_vec())
    }

    fn get_value_string_latin1(&self, env: napi_env, value: napi_value) -> HostResult<Vec<u8>> {
        let state = self.state(env)?;
        let units = state.string(state.cell(value)?)?;
        Ok(units.iter().map(|unit| *unit as u8).collect())
    }

    fn get_value_external(
        &self,
        env: napi_env,
        value: napi_value,
    ) -> HostResult<napi_native_data> {
        let state = self.state(env)?;
        match state.heap.object(state.cell(value)?).map(|object| &object.kind) {
            Some(ObjectKind::External(data)) => Ok(Rc::clone(data)),
            _ => Err(napi_invalid_arg),
        }
    }

    fn get_date_value(&self, env: napi_env, value: napi_value) -> HostResult<f64> {
        let state = self.state(env)?;
        match state.heap.object(state.cell(value)?).map(|object| &object.kind) {
            Some(ObjectKind::Date(time)) => Ok(*time),
            _ => Err(napi_date_expected),
        }
    }

    // Properties

    fn get_array_length(&self, env: napi_env, array: napi_value) -> HostResult<u32> {
        let state = self.state(env)?;
        match state.heap.object(state.cell(array)?).map(|object| &object.kind) {
            Some(ObjectKind::Array(elements)) => Ok(elements.len() as u32),
            _ => Err(napi_array_expected),
        }
    }

    fn get_prototype(&self, env: napi_env, object: napi_value) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(object)?;
        let prototype = state.object(cell)?.proto;
        let result = prototype.unwrap_or(state.null);
        Ok(state.handle(result))
    }

    fn get_property_names(&self, env: napi_env, object: napi_value) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.cell(object)?;
        let names = state.enumerable_names(cell)?;
        let elements = names
            .into_iter()
            .map(|name| state.alloc(CellValue::String(name)))
            .collect();
        let array = state.new_object(ObjectKind::Array(elements));
        Ok(state.handle(array))
    }

    fn set_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
        value: napi_value,
    ) -> HostResult<()> {
        let (object, key, value) = {
            let state = self.state(env)?;
            let key = state.cell(key)?;
            (state.cell(object)?, state.prop_key(key)?, state.cell(value)?)
        };
        self.write(env, object, key, value)
    }

    fn get_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
    ) -> HostResult<napi_value> {
        let (object, key) = {
            let state = self.state(env)?;
            let key = state.cell(key)?;
            (state.cell(object)?, state.prop_key(key)?)
        };
        self.read(env, object, key)
    }

    fn has_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
    ) -> HostResult<bool> {
        let (object, key) = {
            let state = self.state(env)?;
            let key = state.cell(key)?;
            (state.cell(object)?, state.prop_key(key)?)
        };
        self.has(env, object, key)
    }

    fn delete_property(
        &self,
        env: napi_env,
        object: napi_value,
        key: napi_value,
    ) -> HostResult<bool> {
        let (object, key) = {
            let state = self.state(env)?;
            let key = state.cell(key)?;
            (state.cell(object)?, state.prop_key(key)?)
        };
        self.delete(env, object, key)
    }

    fn set_named_property(
        &self,
        env: napi_env,
        object: napi_value,
        name: &str,
        value: napi_value,
    ) -> HostResult<()> {
        let (object, value) = {
            let state = self.state(env)?;
            (state.cell(object)?, state.cell(value)?)
        };
        self.write(env, object, PropKey::named(name), value)
    }

    fn get_named_property(
        &self,
        env: napi_env,
        object: napi_value,
        name: &str,
    ) -> HostResult<napi_value> {
        let object = self.state(env)?.cell(object)?;
        self.read(env, object, PropKey::named(name))
    }

    fn has_named_property(
        &self,
        env: napi_env,
        object: napi_value,
        name: &str,
    ) -> HostResult<bool> {
        let object = self.state(env)?.cell(object)?;
        self.has(env, object, PropKey::named(name))
    }

    fn set_element(
        &self,
        env: napi_env,
        object: napi_value,
        index: u32,
        value: napi_value,
    ) -> HostResult<()> {
        let (object, value) = {
            let state = self.state(env)?;
            (state.cell(object)?, state.cell(value)?)
        };
        self.write(env, object, PropKey::index(index), value)
    }

    fn get_element(
        &self,
        env: napi_env,
        object: napi_value,
        index: u32,
    ) -> HostResult<napi_value> {
        let object = self.state(env)?.cell(object)?;
        self.read(env, object, PropKey::index(index))
    }

    fn has_element(&self, env: napi_env, object: napi_value, index: u32) -> HostResult<bool> {
        let object = self.state(env)?.cell(object)?;
        self.has(env, object, PropKey::index(index))
    }

    fn delete_element(&self, env: napi_env, object: napi_value, index: u32) -> HostResult<bool> {
        let object = self.state(env)?.cell(object)?;
        self.delete(env, object, PropKey::index(index))
    }

    // Calls

    fn get_cb_info(
        &self,
        env: napi_env,
        info: napi_callback_info,
    ) -> HostResult<napi_callback_frame> {
        let mut state = self.state(env)?;
        let frame = state.frames.get(&info.0).ok_or(napi_invalid_arg)?;
        let (this, args, new_target) = (frame.this, frame.args.clone(), frame.new_target);
        Ok(napi_callback_frame {
            this: state.handle(this),
            args: args.into_iter().map(|arg| state.handle(arg)).collect(),
            new_target: new_target.map(|target| state.handle(target)),
        })
    }

    fn call_function(
        &self,
        env: napi_env,
        recv: napi_value,
        function: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value> {
        self.call(env, recv, function, args)
    }

    fn make_callback(
        &self,
        env: napi_env,
        recv: napi_value,
        function: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value> {
        let result = self.call(env, recv, function, args);
        tracing::trace!(ok = result.is_ok(), "callback checkpoint");
        result
    }

    fn new_instance(
        &self,
        env: napi_env,
        constructor: napi_value,
        args: &[napi_value],
    ) -> HostResult<napi_value> {
        let (callback, constructor, instance, args) = {
            let mut state = self.state(env)?;
            self.enter_script(&state)?;
            let constructor = state.cell(constructor)?;
            let callback = state.callback(constructor)?;
            let prototype = match state.lookup(constructor, &PropKey::named("prototype")) {
                Lookup::Value(prototype) if state.heap.object(prototype).is_some() => {
                    Some(prototype)
                }
                _ => None,
            };
            let args = args
                .iter()
                .map(|arg| state.cell(*arg))
                .collect::<HostResult<Vec<_>>>()?;
            let instance = state.new_object(ObjectKind::Ordinary);
            state.object_mut(instance)?.proto = prototype;
            (callback, constructor, instance, args)
        };
        let returned = self.invoke(&callback, instance, args, Some(constructor))?;
        let mut state = self.state(env)?;
        let result = if state.heap.object(returned).is_some() {
            returned
        } else {
            instance
        };
        Ok(state.handle(result))
    }

    // Exceptions

    fn throw(&self, env: napi_env, error: napi_value) -> HostResult<()> {
        let mut state = self.state(env)?;
        if state.pending_exception.is_some() {
            return Err(napi_pending_exception);
        }
        let cell = state.cell(error)?;
        state.pending_exception = Some(cell);
        Ok(())
    }

    fn throw_error(&self, env: napi_env, code: Option<&str>, message: &str) -> HostResult<()> {
        self.state(env)?.throw_new(ErrorKind::Error, code, message)
    }

    fn throw_type_error(
        &self,
        env: napi_env,
        code: Option<&str>,
        message: &str,
    ) -> HostResult<()> {
        self.state(env)?
            .throw_new(ErrorKind::TypeError, code, message)
    }

    fn throw_range_error(
        &self,
        env: napi_env,
        code: Option<&str>,
        message: &str,
    ) -> HostResult<()> {
        self.state(env)?
            .throw_new(ErrorKind::RangeError, code, message)
    }

    fn throw_syntax_error(
        &self,
        env: napi_env,
        code: Option<&str>,
        message: &str,
    ) -> HostResult<()> {
        self.state(env)?
            .throw_new(ErrorKind::SyntaxError, code, message)
    }

    fn is_exception_pending(&self, env: napi_env) -> HostResult<bool> {
        Ok(self.state(env)?.pending_exception.is_some())
    }

    fn get_and_clear_last_exception(&self, env: napi_env) -> HostResult<napi_value> {
        let mut state = self.state(env)?;
        let cell = state.pending_exception.take().unwrap_or(state.undefined);
        Ok(state.handle(cell))
    }

    fn fatal_exception(&self, env: napi_env, error: napi_value) -> HostResult<()> {
        let mut state = self.state(env)?;
        let cell = state.cell(error)?;
        let description = state.describe(cell);
        tracing::error!(exception = %description, "uncaught exception");
        state.uncaught.push(description);
        Ok(())
    }

    // Cleanup hooks

    fn add_env_cleanup_hook(
        &self,
        env: napi_env,
        hook: napi_cleanup_hook,
    ) -> HostResult<napi_cleanup_hook_id> {
        let mut state = self.state(env)?;
        let id = state.next_id();
        state.cleanup_hooks.push((id, hook));
        Ok(napi_cleanup_hook_id(id))
    }

    fn remove_env_cleanup_hook(
        &self,
        env: napi_env,
        hook: napi_cleanup_hook_id,
    ) -> HostResult<()> {
        let removed = {
            let mut state = self.state(env)?;
            let position = state
                .cleanup_hooks
                .iter()
                .position(|(id, _)| *id == hook.0)
                .ok_or(napi_invalid_arg)?;
            state.cleanup_hooks.remove(position)
        };
        drop(removed);
        Ok(())
    }

    fn add_async_cleanup_hook(
        &self,
        env: napi_env,
        hook: napi_async_cleanup_hook,
    ) -> HostResult<napi_async_cleanup_hook_handle> {
        let mut state = self.state(env)?;
        let token = Arc::new(CleanupToken::new(self.event_loop.sender()));
        state.async_hooks.push((Arc::clone(&token), hook));
        Ok(token)
    }

    // Modules

    fn module_register(&self, module: napi_module) -> HostResult<()> {
        if module.nm_version != NAPI_MODULE_VERSION {
            tracing::warn!(
                filename = module.nm_filename,
                version = module.nm_version,
                "module record version not supported"
            );
            return Err(napi_invalid_arg);
        }
        tracing::debug!(filename = module.nm_filename, "module registered");
        self.state.borrow_mut().modules.push(module);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostConfig;

    fn host() -> (Rc<MemoryHost>, napi_env) {
        let host = MemoryHost::new(HostConfig::default());
        let env = host.env();
        (host, env)
    }

    #[test]
    fn test_accessors_run_callbacks() {
        let (host, env) = host();
        let object = host.create_object(env).unwrap();
        let getter: napi_callback = Rc::new(|_, _| None);
        let descriptor = napi_property_descriptor {
            utf8name: Some("value"),
            getter: Some(getter),
            attributes: napi_enumerable,
            ..Default::default()
        };
        host.define_properties(env, object, &[descriptor]).unwrap();
        let value = host.get_named_property(env, object, "value").unwrap();
        assert_eq!(host.type_of(env, value).unwrap(), napi_undefined);
    }

    #[test]
    fn test_read_only_property_ignores_writes() {
        let (host, env) = host();
        let object = host.create_object(env).unwrap();
        let one = host.create_int32(env, 1).unwrap();
        let two = host.create_int32(env, 2).unwrap();
        let descriptor = napi_property_descriptor {
            utf8name: Some("fixed"),
            value: Some(one),
            ..Default::default()
        };
        host.define_properties(env, object, &[descriptor]).unwrap();
        host.set_named_property(env, object, "fixed", two).unwrap();
        let read = host.get_named_property(env, object, "fixed").unwrap();
        assert_eq!(host.get_value_int32(env, read).unwrap(), 1);
        assert!(!host.delete_property(env, object, host.create_string_utf8(env, "fixed").unwrap()).unwrap());
    }

    #[test]
    fn test_misaligned_typedarray_throws_range_error() {
        let (host, env) = host();
        let buffer = host.create_arraybuffer(env, 16).unwrap();
        assert_eq!(
            host.create_typedarray(env, napi_int32_array, 2, buffer, 2),
            Err(napi_pending_exception)
        );
        let error = host.get_and_clear_last_exception(env).unwrap();
        assert!(host.is_error(env, error).unwrap());
    }

    #[test]
    fn test_array_elements_and_length() {
        let (host, env) = host();
        let array = host.create_array(env).unwrap();
        let value = host.create_string_utf8(env, "x").unwrap();
        host.set_element(env, array, 2, value).unwrap();
        assert_eq!(host.get_array_length(env, array).unwrap(), 3);
        let length = host.get_named_property(env, array, "length").unwrap();
        assert_eq!(host.get_value_uint32(env, length).unwrap(), 3);
        let hole = host.get_element(env, array, 0).unwrap();
        assert_eq!(host.type_of(env, hole).unwrap(), napi_undefined);
    }

    #[test]
    fn test_new_instance_links_prototype() {
        let (host, env) = host();
        let constructor: napi_callback = Rc::new(|_, _| None);
        let class = host.define_class(env, "Point", constructor, &[]).unwrap();
        let instance = host.new_instance(env, class, &[]).unwrap();
        assert!(host.instanceof(env, instance, class).unwrap());
        let plain = host.create_object(env).unwrap();
        assert!(!host.instanceof(env, plain, class).unwrap());
    }

    #[test]
    fn test_weak_reference_cleared_after_collection() {
        let (host, env) = host();
        let scope = host.open_handle_scope(env).unwrap();
        let object = host.create_object(env).unwrap();
        let reference = host.create_reference(env, object, 0).unwrap();
        host.close_handle_scope(env, scope).unwrap();
        host.collect_garbage();
        assert_eq!(host.get_reference_value(env, reference).unwrap(), None);
        assert_eq!(host.reference_unref(env, reference), Err(napi_generic_failure));
    }
}
