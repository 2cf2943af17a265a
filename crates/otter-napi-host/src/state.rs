//! Engine-thread state of the reference host and the value semantics built on it.

use std::rc::Rc;
use std::sync::Arc;

use otter_napi_sys::{
    napi_async_cleanup_hook, napi_callback, napi_cleanup_hook, napi_configurable,
    napi_enumerable, napi_finalize, napi_function_expected, napi_invalid_arg, napi_module,
    napi_name_expected, napi_number_expected, napi_object_expected, napi_pending_exception,
    napi_property_attributes, napi_status, napi_string_expected, napi_value, napi_writable,
    HostResult,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::event_loop::CleanupToken;
use crate::handles::HandleStack;
use crate::heap::{
    CellId, CellValue, ErrorKind, Heap, ObjectData, ObjectKind, PromiseState, PropKey, Property,
    PropertySlot,
};

pub(crate) const DATA_DEFAULTS: napi_property_attributes =
    napi_writable | napi_enumerable | napi_configurable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Running,
    TearingDown,
    Terminated,
}

pub(crate) struct RefEntry {
    pub cell: Option<CellId>,
    pub count: u32,
}

pub(crate) struct CallbackFrame {
    pub this: CellId,
    pub args: Vec<CellId>,
    pub new_target: Option<CellId>,
}

pub(crate) enum Lookup {
    Value(CellId),
    Length(usize),
    Getter(napi_callback),
    Missing,
}

pub(crate) enum Assign {
    Done,
    Setter(napi_callback),
}

pub(crate) struct HostState {
    pub heap: Heap,
    pub handles: HandleStack,
    pub undefined: CellId,
    pub null: CellId,
    pub true_: CellId,
    pub false_: CellId,
    pub global: CellId,
    pub refs: FxHashMap<u64, RefEntry>,
    pub deferreds: FxHashMap<u64, CellId>,
    pub frames: FxHashMap<u64, CallbackFrame>,
    pub symbols: FxHashMap<String, CellId>,
    /// Finalizers attached to a cell, run after it is collected.
    pub finalizers: FxHashMap<CellId, Vec<napi_finalize>>,
    pub cleanup_hooks: Vec<(u64, napi_cleanup_hook)>,
    pub async_hooks: Vec<(Arc<CleanupToken>, napi_async_cleanup_hook)>,
    pub modules: Vec<napi_module>,
    pub pending_exception: Option<CellId>,
    pub uncaught: Vec<String>,
    pub external_memory: i64,
    pub phase: Phase,
    next_id: u64,
}

impl HostState {
    pub(crate) fn new() -> Self {
        let mut heap = Heap::default();
        let undefined = heap.alloc(CellValue::Undefined);
        let null = heap.alloc(CellValue::Null);
        let true_ = heap.alloc(CellValue::Boolean(true));
        let false_ = heap.alloc(CellValue::Boolean(false));
        let global = heap.alloc(CellValue::Object(Box::new(ObjectData::new(
            ObjectKind::Ordinary,
        ))));
        Self {
            heap,
            handles: HandleStack::new(),
            undefined,
            null,
            true_,
            false_,
            global,
            refs: FxHashMap::default(),
            deferreds: FxHashMap::default(),
            frames: FxHashMap::default(),
            symbols: FxHashMap::default(),
            finalizers: FxHashMap::default(),
            cleanup_hooks: Vec::new(),
            async_hooks: Vec::new(),
            modules: Vec::new(),
            pending_exception: None,
            uncaught: Vec::new(),
            external_memory: 0,
            phase: Phase::Running,
            next_id: 1,
        }
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // Handles

    pub(crate) fn cell(&self, value: napi_value) -> HostResult<CellId> {
        let cell = self.handles.resolve(value)?;
        match self.heap.get(cell) {
            Some(_) => Ok(cell),
            None => Err(napi_invalid_arg),
        }
    }

    pub(crate) fn handle(&mut self, cell: CellId) -> napi_value {
        self.handles.push(cell)
    }

    pub(crate) fn alloc(&mut self, value: CellValue) -> CellId {
        self.heap.alloc(value)
    }

    pub(crate) fn new_value(&mut self, value: CellValue) -> napi_value {
        let cell = self.heap.alloc(value);
        self.handles.push(cell)
    }

    pub(crate) fn new_object(&mut self, kind: ObjectKind) -> CellId {
        self.heap
            .alloc(CellValue::Object(Box::new(ObjectData::new(kind))))
    }

    pub(crate) fn boolean(&self, value: bool) -> CellId {
        if value { self.true_ } else { self.false_ }
    }

    // Typed access

    pub(crate) fn object(&self, cell: CellId) -> HostResult<&ObjectData> {
        self.heap.object(cell).ok_or(napi_object_expected)
    }

    pub(crate) fn object_mut(&mut self, cell: CellId) -> HostResult<&mut ObjectData> {
        self.heap.object_mut(cell).ok_or(napi_object_expected)
    }

    pub(crate) fn string(&self, cell: CellId) -> HostResult<Rc<[u16]>> {
        match self.heap.get(cell) {
            Some(CellValue::String(units)) => Ok(Rc::clone(units)),
            _ => Err(napi_string_expected),
        }
    }

    pub(crate) fn number(&self, cell: CellId) -> HostResult<f64> {
        match self.heap.get(cell) {
            Some(CellValue::Number(number)) => Ok(*number),
            _ => Err(napi_number_expected),
        }
    }

    pub(crate) fn callback(&self, cell: CellId) -> HostResult<napi_callback> {
        match self.heap.object(cell).map(|object| &object.kind) {
            Some(ObjectKind::Function { callback, .. }) => Ok(Rc::clone(callback)),
            _ => Err(napi_function_expected),
        }
    }

    pub(crate) fn prop_key(&self, cell: CellId) -> HostResult<PropKey> {
        match self.heap.get(cell) {
            Some(CellValue::String(units)) => Ok(PropKey::String(Rc::clone(units))),
            Some(CellValue::Symbol(_)) => Ok(PropKey::Symbol(cell)),
            Some(CellValue::Number(number)) => Ok(PropKey::named(&number_to_string(*number))),
            _ => Err(napi_name_expected),
        }
    }

    // Exceptions

    pub(crate) fn new_error(
        &mut self,
        kind: ErrorKind,
        code: Option<CellId>,
        message: CellId,
    ) -> HostResult<CellId> {
        self.string(message)?;
        if let Some(code) = code {
            self.string(code)?;
        }
        let name = self.alloc(CellValue::String(utf16(kind.name())));
        let error = self.new_object(ObjectKind::Error(kind));
        let object = self.object_mut(error)?;
        let hidden = napi_writable | napi_configurable;
        object.props.insert(PropKey::named("name"), data(name, hidden));
        object.props.insert(PropKey::named("message"), data(message, hidden));
        if let Some(code) = code {
            object.props.insert(PropKey::named("code"), data(code, DATA_DEFAULTS));
        }
        Ok(error)
    }

    /// Raise a host-originated error and report the pending exception.
    pub(crate) fn raise(&mut self, kind: ErrorKind, message: &str) -> napi_status {
        let message = self.alloc(CellValue::String(utf16(message)));
        if let Ok(error) = self.new_error(kind, None, message) {
            self.pending_exception = Some(error);
        }
        napi_pending_exception
    }

    pub(crate) fn throw_new(
        &mut self,
        kind: ErrorKind,
        code: Option<&str>,
        message: &str,
    ) -> HostResult<()> {
        if self.pending_exception.is_some() {
            return Err(napi_pending_exception);
        }
        let code = code.map(|code| self.alloc(CellValue::String(utf16(code))));
        let message = self.alloc(CellValue::String(utf16(message)));
        let error = self.new_error(kind, code, message)?;
        self.pending_exception = Some(error);
        Ok(())
    }

    /// Human-readable form used for uncaught exception records.
    pub(crate) fn describe(&self, cell: CellId) -> String {
        if let Some(ObjectData {
            kind: ObjectKind::Error(kind),
            props,
            ..
        }) = self.heap.object(cell)
        {
            let message = match props.get(&PropKey::named("message")) {
                Some(Property {
                    slot: PropertySlot::Data(message),
                    ..
                }) => self.display(*message),
                _ => String::new(),
            };
            return format!("{}: {}", kind.name(), message);
        }
        self.display(cell)
    }

    /// String conversion without invoking user code.
    pub(crate) fn display(&self, cell: CellId) -> String {
        match self.heap.get(cell) {
            Some(CellValue::Undefined) | None => "undefined".to_owned(),
            Some(CellValue::Null) => "null".to_owned(),
            Some(CellValue::Boolean(value)) => value.to_string(),
            Some(CellValue::Number(number)) => number_to_string(*number),
            Some(CellValue::BigInt(value)) => value.to_string(),
            Some(CellValue::String(units)) => String::from_utf16_lossy(units),
            Some(CellValue::Symbol(description)) => format!(
                "Symbol({})",
                description
                    .as_deref()
                    .map(String::from_utf16_lossy)
                    .unwrap_or_default()
            ),
            Some(CellValue::Object(object)) => match &object.kind {
                ObjectKind::Array(elements) => elements
                    .iter()
                    .map(|element| match self.heap.get(*element) {
                        Some(CellValue::Undefined) | Some(CellValue::Null) => String::new(),
                        _ => self.display(*element),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                ObjectKind::Function { name, .. } => {
                    format!("function {name}() {{ [native code] }}")
                }
                ObjectKind::Error(_) => self.describe(cell),
                ObjectKind::Date(time) => number_to_string(*time),
                _ => "[object Object]".to_owned(),
            },
        }
    }

    pub(crate) fn to_number(&mut self, cell: CellId) -> HostResult<f64> {
        match self.heap.get(cell) {
            Some(CellValue::Undefined) => Ok(f64::NAN),
            Some(CellValue::Null) => Ok(0.0),
            Some(CellValue::Boolean(value)) => Ok(if *value { 1.0 } else { 0.0 }),
            Some(CellValue::Number(number)) => Ok(*number),
            Some(CellValue::String(units)) => {
                Ok(string_to_number(&String::from_utf16_lossy(units)))
            }
            Some(CellValue::Object(object)) => match object.kind {
                ObjectKind::Date(time) => Ok(time),
                _ => Ok(f64::NAN),
            },
            Some(CellValue::Symbol(_)) => Err(self.raise(
                ErrorKind::TypeError,
                "Cannot convert a Symbol value to a number",
            )),
            Some(CellValue::BigInt(_)) => Err(self.raise(
                ErrorKind::TypeError,
                "Cannot convert a BigInt value to a number",
            )),
            None => Err(napi_invalid_arg),
        }
    }

    pub(crate) fn truthy(&self, cell: CellId) -> bool {
        match self.heap.get(cell) {
            Some(CellValue::Undefined) | Some(CellValue::Null) | None => false,
            Some(CellValue::Boolean(value)) => *value,
            Some(CellValue::Number(number)) => *number != 0.0 && !number.is_nan(),
            Some(CellValue::BigInt(value)) => *value != 0,
            Some(CellValue::String(units)) => !units.is_empty(),
            Some(CellValue::Symbol(_)) | Some(CellValue::Object(_)) => true,
        }
    }

    pub(crate) fn strict_equals(&self, lhs: CellId, rhs: CellId) -> bool {
        if lhs == rhs {
            return !matches!(self.heap.get(lhs), Some(CellValue::Number(n)) if n.is_nan());
        }
        match (self.heap.get(lhs), self.heap.get(rhs)) {
            (Some(CellValue::Number(a)), Some(CellValue::Number(b))) => a == b,
            (Some(CellValue::BigInt(a)), Some(CellValue::BigInt(b))) => a == b,
            (Some(CellValue::String(a)), Some(CellValue::String(b))) => a == b,
            (Some(CellValue::Boolean(a)), Some(CellValue::Boolean(b))) => a == b,
            (Some(CellValue::Undefined), Some(CellValue::Undefined))
            | (Some(CellValue::Null), Some(CellValue::Null)) => true,
            _ => false,
        }
    }

    // Properties

    pub(crate) fn lookup(&self, object: CellId, key: &PropKey) -> Lookup {
        let mut current = Some(object);
        while let Some(cell) = current {
            let Some(object) = self.heap.object(cell) else {
                return Lookup::Missing;
            };
            if let ObjectKind::Array(elements) = &object.kind {
                if let Some(index) = key.as_index() {
                    if let Some(element) = elements.get(index as usize) {
                        return Lookup::Value(*element);
                    }
                } else if *key == PropKey::named("length") {
                    return Lookup::Length(elements.len());
                }
            }
            if let Some(property) = object.props.get(key) {
                return match &property.slot {
                    PropertySlot::Data(value) => Lookup::Value(*value),
                    PropertySlot::Accessor {
                        getter: Some(getter),
                        ..
                    } => Lookup::Getter(Rc::clone(getter)),
                    PropertySlot::Accessor { getter: None, .. } => Lookup::Value(self.undefined),
                };
            }
            current = object.proto;
        }
        Lookup::Missing
    }

    /// Ordinary [[Set]]. Displaced properties are returned so callers can
    /// drop them after releasing the state borrow.
    pub(crate) fn assign(
        &mut self,
        object: CellId,
        key: PropKey,
        value: CellId,
        displaced: &mut Vec<Property>,
    ) -> HostResult<Assign> {
        let undefined = self.undefined;
        let target = self.object_mut(object)?;
        if let ObjectKind::Array(elements) = &mut target.kind {
            if let Some(index) = key.as_index() {
                let index = index as usize;
                if index >= elements.len() {
                    elements.resize(index + 1, undefined);
                }
                elements[index] = value;
                return Ok(Assign::Done);
            }
        }

        let mut current = Some(object);
        while let Some(cell) = current {
            let holder = self.object(cell)?;
            if let Some(property) = holder.props.get(&key) {
                match &property.slot {
                    PropertySlot::Accessor { setter, .. } => {
                        return Ok(setter.clone().map_or(Assign::Done, Assign::Setter));
                    }
                    PropertySlot::Data(_) if property.attributes & napi_writable == 0 => {
                        return Ok(Assign::Done);
                    }
                    PropertySlot::Data(_) if cell == object => {
                        let attributes = property.attributes;
                        let replaced = self
                            .object_mut(object)?
                            .props
                            .insert(key, data(value, attributes));
                        displaced.extend(replaced);
                        return Ok(Assign::Done);
                    }
                    PropertySlot::Data(_) => break,
                }
            }
            current = holder.proto;
        }
        self.object_mut(object)?
            .props
            .insert(key, data(value, DATA_DEFAULTS));
        Ok(Assign::Done)
    }

    pub(crate) fn remove(
        &mut self,
        object: CellId,
        key: &PropKey,
        displaced: &mut Vec<Property>,
    ) -> HostResult<bool> {
        let undefined = self.undefined;
        let target = self.object_mut(object)?;
        if let ObjectKind::Array(elements) = &mut target.kind {
            if let Some(index) = key.as_index() {
                if let Some(element) = elements.get_mut(index as usize) {
                    *element = undefined;
                }
                return Ok(true);
            }
        }
        match target.props.get(key) {
            None => Ok(true),
            Some(property) if property.attributes & napi_configurable == 0 => Ok(false),
            Some(_) => {
                displaced.extend(target.props.shift_remove(key));
                Ok(true)
            }
        }
    }

    /// Own and inherited enumerable string keys, in definition order.
    pub(crate) fn enumerable_names(&self, object: CellId) -> HostResult<Vec<Rc<[u16]>>> {
        let mut seen = FxHashSet::default();
        let mut names = Vec::new();
        let mut current = Some(object);
        let mut first = true;
        while let Some(cell) = current {
            let holder = if first {
                self.object(cell)?
            } else {
                match self.heap.object(cell) {
                    Some(holder) => holder,
                    None => break,
                }
            };
            first = false;
            if let ObjectKind::Array(elements) = &holder.kind {
                for index in 0..elements.len() {
                    let key = PropKey::index(index as u32);
                    if let PropKey::String(units) = &key {
                        if seen.insert(key.clone()) {
                            names.push(Rc::clone(units));
                        }
                    }
                }
            }
            for (key, property) in &holder.props {
                let PropKey::String(units) = key else {
                    continue;
                };
                if seen.insert(key.clone()) && property.attributes & napi_enumerable != 0 {
                    names.push(Rc::clone(units));
                }
            }
            current = holder.proto;
        }
        Ok(names)
    }

    pub(crate) fn instance_of(&self, object: CellId, constructor: CellId) -> HostResult<bool> {
        self.callback(constructor)?;
        let prototype = match self.lookup(constructor, &PropKey::named("prototype")) {
            Lookup::Value(prototype) => prototype,
            _ => return Ok(false),
        };
        let mut current = self.heap.object(object).and_then(|object| object.proto);
        while let Some(cell) = current {
            if cell == prototype {
                return Ok(true);
            }
            current = self.heap.object(cell).and_then(|object| object.proto);
        }
        Ok(false)
    }

    pub(crate) fn settle(&mut self, deferred: u64, outcome: Result<CellId, CellId>) -> HostResult<()> {
        let promise = self.deferreds.remove(&deferred).ok_or(napi_invalid_arg)?;
        let object = self.object_mut(promise)?;
        object.kind = ObjectKind::Promise(match outcome {
            Ok(value) => PromiseState::Fulfilled(value),
            Err(reason) => PromiseState::Rejected(reason),
        });
        Ok(())
    }

    // Collection

    pub(crate) fn roots(&self) -> Vec<CellId> {
        let mut roots = vec![
            self.undefined,
            self.null,
            self.true_,
            self.false_,
            self.global,
        ];
        roots.extend(self.handles.roots());
        roots.extend(
            self.refs
                .values()
                .filter(|entry| entry.count > 0)
                .filter_map(|entry| entry.cell),
        );
        roots.extend(self.deferreds.values().copied());
        roots.extend(self.symbols.values().copied());
        roots.extend(self.pending_exception);
        for frame in self.frames.values() {
            roots.push(frame.this);
            roots.extend(frame.args.iter().copied());
            roots.extend(frame.new_target);
        }
        roots
    }

    /// Detach swept cells from weak references and collect their finalizers.
    pub(crate) fn release(&mut self, swept: &mut [(CellId, CellValue)]) -> Vec<napi_finalize> {
        let dead: FxHashSet<CellId> = swept.iter().map(|(cell, _)| *cell).collect();
        for entry in self.refs.values_mut() {
            if entry.cell.is_some_and(|cell| dead.contains(&cell)) {
                entry.cell = None;
            }
        }

        let mut finalizers = Vec::new();
        for (cell, value) in swept.iter_mut() {
            if let CellValue::Object(object) = value {
                if let Some(finalize) = object.wrap.take().and_then(|wrap| wrap.finalize) {
                    finalizers.push(finalize);
                }
                if let ObjectKind::ArrayBuffer(buffer) = &mut object.kind {
                    if let Some(finalize) = buffer.finalize.take() {
                        let bytes = std::mem::take(&mut buffer.bytes);
                        finalizers.push(Box::new(move |env| finalize(env, bytes)));
                    }
                }
            }
            finalizers.extend(self.finalizers.remove(cell).into_iter().flatten());
        }
        finalizers
    }
}

pub(crate) fn data(value: CellId, attributes: napi_property_attributes) -> Property {
    Property {
        slot: PropertySlot::Data(value),
        attributes,
    }
}

pub(crate) fn utf16(text: &str) -> Rc<[u16]> {
    text.encode_utf16().collect()
}

pub(crate) fn number_to_string(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_owned()
    } else if number.is_infinite() {
        (if number > 0.0 { "Infinity" } else { "-Infinity" }).to_owned()
    } else if number == 0.0 {
        "0".to_owned()
    } else if number.fract() == 0.0 && number.abs() < 1e21 {
        format!("{}", number as i128)
    } else {
        format!("{number}")
    }
}

pub(crate) fn string_to_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |value| value as f64);
    }
    if text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        text.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// ECMAScript ToInt32 / ToUint32 modular conversion.
pub(crate) fn to_uint32(number: f64) -> u32 {
    if !number.is_finite() {
        return 0;
    }
    number.trunc().rem_euclid(4_294_967_296.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_string_parsing() {
        assert_eq!(string_to_number("  12 "), 12.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn test_modular_int_conversion() {
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_uint32(4_294_967_297.0), 1);
        assert_eq!(to_uint32(f64::NAN), 0);
        assert_eq!(to_uint32(3.9) as i32, 3);
    }

    #[test]
    fn test_inherited_lookup() {
        let mut state = HostState::new();
        let proto = state.new_object(ObjectKind::Ordinary);
        let child = state.new_object(ObjectKind::Ordinary);
        let value = state.alloc(CellValue::Number(1.0));
        state.object_mut(child).unwrap().proto = Some(proto);
        let mut displaced = Vec::new();
        state
            .assign(proto, PropKey::named("x"), value, &mut displaced)
            .unwrap();
        assert!(matches!(state.lookup(child, &PropKey::named("x")), Lookup::Value(v) if v == value));
        assert!(matches!(state.lookup(child, &PropKey::named("y")), Lookup::Missing));
    }
}
