//! Array buffers, typed arrays and data views.

use std::slice;

#[cfg(feature = "napi7")]
use crate::capability::version;
use crate::env::Env;
use crate::error::{Error, Result, check};
use crate::handle::Value;
use crate::types::TypedArrayType;

/// Finalizer that receives externally supplied storage back.
pub type StorageFinalizer<T> = Box<dyn FnOnce(&Env, Box<[T]>)>;

/// Backing store of an array buffer.
///
/// The pointer stays valid until the buffer is detached or collected.
#[derive(Debug, Clone, Copy)]
pub struct ArrayBufferInfo {
    data: *mut u8,
    byte_length: usize,
}

impl ArrayBufferInfo {
    pub fn as_ptr(&self) -> *mut u8 {
        self.data
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// # Safety
    ///
    /// The buffer must not be detached or collected while the slice is
    /// alive, and no other slice over the same memory may be written.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        if self.byte_length == 0 {
            return &mut [];
        }
        // SAFETY: guaranteed by the caller; the host keeps `byte_length`
        // bytes at `data` for the buffer's lifetime.
        unsafe { slice::from_raw_parts_mut(self.data, self.byte_length) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypedArrayInfo<'env> {
    pub kind: TypedArrayType,
    /// Length in elements.
    pub length: usize,
    pub data: *mut u8,
    pub arraybuffer: Value<'env>,
    pub byte_offset: usize,
}

impl TypedArrayInfo<'_> {
    pub fn byte_length(&self) -> usize {
        self.length * self.kind.element_size()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DataViewInfo<'env> {
    pub byte_length: usize,
    pub data: *mut u8,
    pub arraybuffer: Value<'env>,
    pub byte_offset: usize,
}

impl Env {
    /// Zero-filled buffer of `byte_length` bytes.
    pub fn create_arraybuffer(&self, byte_length: usize) -> Result<Value<'_>> {
        let raw = check(self.host().create_arraybuffer(self.raw(), byte_length))?;
        Ok(self.value(raw))
    }

    /// Buffer over `data` without copying. `finalize` gets the storage back
    /// once the buffer is collected or detached.
    pub fn create_external_arraybuffer(
        &self,
        data: Vec<u8>,
        finalize: Option<StorageFinalizer<u8>>,
    ) -> Result<Value<'_>> {
        let finalize = finalize.map(|finalize| self.storage_finalizer(finalize));
        let raw = check(self.host().create_external_arraybuffer(
            self.raw(),
            data.into_boxed_slice(),
            finalize,
        ))?;
        Ok(self.value(raw))
    }

    pub fn get_arraybuffer_info(&self, arraybuffer: Value<'_>) -> Result<ArrayBufferInfo> {
        let (data, byte_length) =
            check(self.host().get_arraybuffer_info(self.raw(), arraybuffer.raw()))?;
        Ok(ArrayBufferInfo { data, byte_length })
    }

    /// Copy the contents of an array buffer.
    pub fn read_arraybuffer(&self, arraybuffer: Value<'_>) -> Result<Vec<u8>> {
        let info = self.get_arraybuffer_info(arraybuffer)?;
        // SAFETY: the slice does not outlive this call and nothing runs
        // script in between.
        Ok(unsafe { info.as_mut_slice() }.to_vec())
    }

    /// Copy `bytes` into an array buffer at `offset`.
    pub fn write_arraybuffer(&self, arraybuffer: Value<'_>, offset: usize, bytes: &[u8]) -> Result<()> {
        let info = self.get_arraybuffer_info(arraybuffer)?;
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= info.byte_length)
            .ok_or(Error::InvalidArgument("write past the end of the array buffer"))?;
        // SAFETY: bounds checked above; the slice does not outlive this call.
        let slice = unsafe { info.as_mut_slice() };
        slice[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    #[cfg(feature = "napi7")]
    pub fn detach_arraybuffer(&self, arraybuffer: Value<'_>) -> Result<()> {
        self.require("detach_arraybuffer", version::DETACH)?;
        check(self.host().detach_arraybuffer(self.raw(), arraybuffer.raw()))
    }

    #[cfg(feature = "napi7")]
    pub fn is_detached_arraybuffer(&self, value: Value<'_>) -> Result<bool> {
        self.require("is_detached_arraybuffer", version::DETACH)?;
        check(self.host().is_detached_arraybuffer(self.raw(), value.raw()))
    }

    /// View `length` elements of `arraybuffer` from `byte_offset`, which
    /// must be a multiple of the element size.
    pub fn create_typedarray<'a>(
        &'a self,
        kind: TypedArrayType,
        length: usize,
        arraybuffer: Value<'_>,
        byte_offset: usize,
    ) -> Result<Value<'a>> {
        let raw = check(self.host().create_typedarray(
            self.raw(),
            kind.to_host(),
            length,
            arraybuffer.raw(),
            byte_offset,
        ))?;
        Ok(self.value(raw))
    }

    pub fn get_typedarray_info(&self, typedarray: Value<'_>) -> Result<TypedArrayInfo<'_>> {
        let info = check(self.host().get_typedarray_info(self.raw(), typedarray.raw()))?;
        Ok(TypedArrayInfo {
            kind: TypedArrayType::from_host(info.kind),
            length: info.length,
            data: info.data,
            arraybuffer: self.value(info.arraybuffer),
            byte_offset: info.byte_offset,
        })
    }

    pub fn create_dataview<'a>(
        &'a self,
        byte_length: usize,
        arraybuffer: Value<'_>,
        byte_offset: usize,
    ) -> Result<Value<'a>> {
        let raw = check(self.host().create_dataview(
            self.raw(),
            byte_length,
            arraybuffer.raw(),
            byte_offset,
        ))?;
        Ok(self.value(raw))
    }

    pub fn get_dataview_info(&self, dataview: Value<'_>) -> Result<DataViewInfo<'_>> {
        let info = check(self.host().get_dataview_info(self.raw(), dataview.raw()))?;
        Ok(DataViewInfo {
            byte_length: info.byte_length,
            data: info.data,
            arraybuffer: self.value(info.arraybuffer),
            byte_offset: info.byte_offset,
        })
    }
}
