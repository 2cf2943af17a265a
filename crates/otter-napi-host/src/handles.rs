//! Handle stack.
//!
//! A `napi_value` encodes a slot index and the epoch of the frame that
//! owned the slot when it was issued. Closing a frame truncates the stack,
//! so any later lookup of one of its handles finds either no slot or a slot
//! from a newer epoch and is rejected as a scope mismatch.

use otter_napi_sys::{napi_handle_scope_mismatch, napi_invalid_arg, napi_status, napi_value};

use crate::heap::CellId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Root,
    Plain,
    Escapable,
    Callback,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    cell: CellId,
    epoch: u32,
}

#[derive(Debug)]
struct Frame {
    id: u64,
    kind: FrameKind,
    start: usize,
    epoch: u32,
    /// Slot reserved in the parent frame for an escaping handle.
    escape_slot: Option<usize>,
    escaped: bool,
}

#[derive(Debug)]
pub(crate) struct HandleStack {
    slots: Vec<Slot>,
    frames: Vec<Frame>,
    next_epoch: u32,
    next_id: u64,
}

impl HandleStack {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            frames: vec![Frame {
                id: 0,
                kind: FrameKind::Root,
                start: 0,
                epoch: 1,
                escape_slot: None,
                escaped: false,
            }],
            next_epoch: 2,
            next_id: 1,
        }
    }

    /// Open a frame. Escapable frames reserve a slot in the current frame first.
    pub(crate) fn open(&mut self, kind: FrameKind, placeholder: CellId) -> u64 {
        let escape_slot = (kind == FrameKind::Escapable).then(|| {
            let epoch = self.current_epoch();
            self.slots.push(Slot {
                cell: placeholder,
                epoch,
            });
            self.slots.len() - 1
        });
        let id = self.next_id;
        self.next_id += 1;
        self.frames.push(Frame {
            id,
            kind,
            start: self.slots.len(),
            epoch: self.next_epoch,
            escape_slot,
            escaped: false,
        });
        self.next_epoch = self.next_epoch.wrapping_add(1).max(2);
        id
    }

    /// Close the innermost frame, which must be `id` of the given kind.
    pub(crate) fn close(&mut self, id: u64, kind: FrameKind) -> Result<(), napi_status> {
        match self.frames.last() {
            Some(frame) if frame.id == id && frame.kind == kind && kind != FrameKind::Root => {}
            _ => return Err(napi_handle_scope_mismatch),
        }
        if let Some(frame) = self.frames.pop() {
            self.slots.truncate(frame.start);
        }
        Ok(())
    }

    /// Pop frames until `id` is closed. Returns how many inner frames were left open.
    pub(crate) fn unwind_to(&mut self, id: u64) -> usize {
        let Some(position) = self.frames.iter().rposition(|frame| frame.id == id) else {
            return 0;
        };
        if position == 0 {
            return 0;
        }
        let leaked = self.frames.len() - position - 1;
        let start = self.frames[position].start;
        self.frames.truncate(position);
        self.slots.truncate(start);
        leaked
    }

    pub(crate) fn push(&mut self, cell: CellId) -> napi_value {
        let epoch = self.current_epoch();
        self.slots.push(Slot { cell, epoch });
        encode(self.slots.len() - 1, epoch)
    }

    pub(crate) fn resolve(&self, value: napi_value) -> Result<CellId, napi_status> {
        let (index, epoch) = decode(value).ok_or(napi_invalid_arg)?;
        match self.slots.get(index) {
            Some(slot) if slot.epoch == epoch => Ok(slot.cell),
            _ => Err(napi_handle_scope_mismatch),
        }
    }

    pub(crate) fn escape(&mut self, id: u64, cell: CellId) -> Result<napi_value, napi_status> {
        let frame = self
            .frames
            .iter_mut()
            .rev()
            .find(|frame| frame.id == id && frame.kind == FrameKind::Escapable)
            .ok_or(napi_handle_scope_mismatch)?;
        if frame.escaped {
            return Err(otter_napi_sys::napi_escape_called_twice);
        }
        frame.escaped = true;
        let index = frame.escape_slot.ok_or(napi_invalid_arg)?;
        let slot = &mut self.slots[index];
        slot.cell = cell;
        Ok(encode(index, slot.epoch))
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = CellId> + '_ {
        self.slots.iter().map(|slot| slot.cell)
    }

    fn current_epoch(&self) -> u32 {
        self.frames.last().map_or(1, |frame| frame.epoch)
    }
}

fn encode(index: usize, epoch: u32) -> napi_value {
    napi_value(((epoch as u64) << 32) | (index as u64 + 1))
}

fn decode(value: napi_value) -> Option<(usize, u32)> {
    let index = (value.0 & 0xffff_ffff) as usize;
    let epoch = (value.0 >> 32) as u32;
    (index != 0 && epoch != 0).then(|| (index - 1, epoch))
}
