//! Cell heap with mark-sweep collection.
//!
//! Cells are addressed by index. Collection is explicit: the host computes
//! the root set (handle slots, strong references, pending state) and the
//! heap returns every unreachable cell so the host can schedule finalizers.

use std::rc::Rc;

use indexmap::IndexMap;
use otter_napi_sys::{
    napi_callback, napi_finalize, napi_finalize_storage, napi_native_data,
    napi_property_attributes, napi_type_tag, napi_typedarray_type,
};

pub(crate) type CellId = u32;

pub(crate) enum CellValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(i128),
    String(Rc<[u16]>),
    Symbol(Option<Rc<[u16]>>),
    Object(Box<ObjectData>),
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) enum PropKey {
    String(Rc<[u16]>),
    Symbol(CellId),
}

impl PropKey {
    pub(crate) fn named(name: &str) -> Self {
        Self::String(name.encode_utf16().collect())
    }

    pub(crate) fn index(index: u32) -> Self {
        Self::named(&index.to_string())
    }

    /// Array index this key denotes, if any.
    pub(crate) fn as_index(&self) -> Option<u32> {
        let Self::String(units) = self else {
            return None;
        };
        let text = String::from_utf16(units).ok()?;
        let index: u32 = text.parse().ok()?;
        (index.to_string() == text).then_some(index)
    }
}

pub(crate) enum PropertySlot {
    Data(CellId),
    Accessor {
        getter: Option<napi_callback>,
        setter: Option<napi_callback>,
    },
}

pub(crate) struct Property {
    pub slot: PropertySlot,
    pub attributes: napi_property_attributes,
}

pub(crate) struct Wrap {
    pub data: napi_native_data,
    pub finalize: Option<napi_finalize>,
}

pub(crate) struct ObjectData {
    pub kind: ObjectKind,
    pub proto: Option<CellId>,
    pub props: IndexMap<PropKey, Property>,
    pub wrap: Option<Wrap>,
    pub type_tag: Option<napi_type_tag>,
}

impl ObjectData {
    pub(crate) fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            proto: None,
            props: IndexMap::new(),
            wrap: None,
            type_tag: None,
        }
    }
}

pub(crate) enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    SyntaxError,
}

impl ErrorKind {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::SyntaxError => "SyntaxError",
        }
    }
}

pub(crate) enum PromiseState {
    Pending,
    Fulfilled(CellId),
    Rejected(CellId),
}

pub(crate) struct BufferData {
    pub bytes: Box<[u8]>,
    pub detached: bool,
    pub finalize: Option<napi_finalize_storage<u8>>,
}

pub(crate) struct ViewData {
    pub buffer: CellId,
    pub byte_offset: usize,
    /// Element count for typed arrays, byte count for data views.
    pub length: usize,
}

pub(crate) enum ObjectKind {
    Ordinary,
    Array(Vec<CellId>),
    Function {
        name: String,
        callback: napi_callback,
    },
    Error(ErrorKind),
    Date(f64),
    Promise(PromiseState),
    ArrayBuffer(BufferData),
    TypedArray {
        kind: napi_typedarray_type,
        view: ViewData,
    },
    DataView(ViewData),
    External(napi_native_data),
}

#[derive(Default)]
pub(crate) struct Heap {
    cells: Vec<Option<CellValue>>,
    free: Vec<CellId>,
    marks: Vec<bool>,
}

impl Heap {
    pub(crate) fn alloc(&mut self, value: CellValue) -> CellId {
        if let Some(id) = self.free.pop() {
            self.cells[id as usize] = Some(value);
            return id;
        }
        self.cells.push(Some(value));
        (self.cells.len() - 1) as CellId
    }

    pub(crate) fn get(&self, id: CellId) -> Option<&CellValue> {
        self.cells.get(id as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: CellId) -> Option<&mut CellValue> {
        self.cells.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub(crate) fn object(&self, id: CellId) -> Option<&ObjectData> {
        match self.get(id)? {
            CellValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub(crate) fn object_mut(&mut self, id: CellId) -> Option<&mut ObjectData> {
        match self.get_mut(id)? {
            CellValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.cells.len() - self.free.len()
    }

    /// Mark from `roots` and remove every unreachable cell.
    pub(crate) fn collect(
        &mut self,
        roots: impl IntoIterator<Item = CellId>,
    ) -> Vec<(CellId, CellValue)> {
        self.marks.clear();
        self.marks.resize(self.cells.len(), false);

        let mut worklist: Vec<CellId> = roots.into_iter().collect();
        while let Some(id) = worklist.pop() {
            let Some(mark) = self.marks.get_mut(id as usize) else {
                continue;
            };
            if *mark {
                continue;
            }
            *mark = true;
            if let Some(CellValue::Object(object)) = self.get(id) {
                trace_object(object, &mut worklist);
            }
        }

        let mut swept = Vec::new();
        for (index, slot) in self.cells.iter_mut().enumerate() {
            if slot.is_some() && !self.marks[index] {
                if let Some(value) = slot.take() {
                    swept.push((index as CellId, value));
                }
                self.free.push(index as CellId);
            }
        }
        swept
    }

    /// Remove every cell regardless of reachability.
    pub(crate) fn drain(&mut self) -> Vec<(CellId, CellValue)> {
        self.collect(std::iter::empty())
    }
}

fn trace_object(object: &ObjectData, worklist: &mut Vec<CellId>) {
    worklist.extend(object.proto);
    for (key, property) in &object.props {
        if let PropKey::Symbol(symbol) = key {
            worklist.push(*symbol);
        }
        if let PropertySlot::Data(value) = property.slot {
            worklist.push(value);
        }
    }
    match &object.kind {
        ObjectKind::Array(elements) => worklist.extend(elements.iter().copied()),
        ObjectKind::Promise(PromiseState::Fulfilled(value))
        | ObjectKind::Promise(PromiseState::Rejected(value)) => worklist.push(*value),
        ObjectKind::TypedArray { view, .. } | ObjectKind::DataView(view) => {
            worklist.push(view.buffer)
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(heap: &mut Heap) -> CellId {
        heap.alloc(CellValue::Object(Box::new(ObjectData::new(ObjectKind::Ordinary))))
    }

    #[test]
    fn test_unreachable_cells_are_swept() {
        let mut heap = Heap::default();
        let root = object(&mut heap);
        let child = heap.alloc(CellValue::Number(1.0));
        let orphan = heap.alloc(CellValue::Number(2.0));
        heap.object_mut(root).unwrap().props.insert(
            PropKey::named("child"),
            Property {
                slot: PropertySlot::Data(child),
                attributes: 0,
            },
        );

        let swept = heap.collect([root]);
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].0, orphan);
        assert_eq!(heap.live(), 2);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut heap = Heap::default();
        let first = heap.alloc(CellValue::Null);
        heap.collect([]);
        let second = heap.alloc(CellValue::Undefined);
        assert_eq!(first, second);
    }

    #[test]
    fn test_index_keys() {
        assert_eq!(PropKey::named("12").as_index(), Some(12));
        assert_eq!(PropKey::named("012").as_index(), None);
        assert_eq!(PropKey::named("x").as_index(), None);
    }
}
