//! Strings, property keys and symbols
//!
//! External strings hand storage to the engine. Hosts below version 10
//! (and every UTF-8 request) get a copy instead: the string is created from
//! the data and the finalizer runs immediately, with `copied` reported as
//! `true`. Property keys fall back to plain strings the same way.

use std::fmt;
use std::ops::Deref;

use otter_napi_sys::napi_finalize_storage;

use crate::buffer::StorageFinalizer;
use crate::capability::version;
use crate::env::Env;
use crate::error::{Error, Result, check};
use crate::handle::Value;

impl Env {
    pub fn create_string_utf8(&self, value: &str) -> Result<Value<'_>> {
        let raw = check(self.host().create_string_utf8(self.raw(), value))?;
        Ok(self.value(raw))
    }

    pub fn create_string_utf16le(&self, value: &[u16]) -> Result<Value<'_>> {
        let raw = check(self.host().create_string_utf16(self.raw(), value))?;
        Ok(self.value(raw))
    }

    pub fn create_string_latin1(&self, value: &[u8]) -> Result<Value<'_>> {
        let raw = check(self.host().create_string_latin1(self.raw(), value))?;
        Ok(self.value(raw))
    }

    /// Always copies. Returns the string and `true`.
    pub fn create_external_string_utf8(
        &self,
        value: Box<[u8]>,
        finalize: Option<StorageFinalizer<u8>>,
    ) -> Result<(Value<'_>, bool)> {
        let text = std::str::from_utf8(&value)
            .map_err(|_| Error::InvalidArgument("external string is not valid UTF-8"))?;
        let raw = check(self.host().create_string_utf8(self.raw(), text))?;
        if let Some(finalize) = finalize {
            finalize(self, value);
        }
        Ok((self.value(raw), true))
    }

    /// Returns the string and whether the storage was copied.
    pub fn create_external_string_latin1(
        &self,
        value: Box<[u8]>,
        finalize: Option<StorageFinalizer<u8>>,
    ) -> Result<(Value<'_>, bool)> {
        if !self.capabilities().supports(version::EXTERNAL_STRINGS) {
            let raw = check(self.host().create_string_latin1(self.raw(), &value))?;
            if let Some(finalize) = finalize {
                finalize(self, value);
            }
            return Ok((self.value(raw), true));
        }
        let finalize = finalize.map(|finalize| self.storage_finalizer(finalize));
        let (raw, copied) = check(
            self.host()
                .create_external_string_latin1(self.raw(), value, finalize),
        )?;
        Ok((self.value(raw), copied))
    }

    pub fn create_external_string_utf16le(
        &self,
        value: Box<[u16]>,
        finalize: Option<StorageFinalizer<u16>>,
    ) -> Result<(Value<'_>, bool)> {
        if !self.capabilities().supports(version::EXTERNAL_STRINGS) {
            let raw = check(self.host().create_string_utf16(self.raw(), &value))?;
            if let Some(finalize) = finalize {
                finalize(self, value);
            }
            return Ok((self.value(raw), true));
        }
        let finalize = finalize.map(|finalize| self.storage_finalizer(finalize));
        let (raw, copied) = check(
            self.host()
                .create_external_string_utf16(self.raw(), value, finalize),
        )?;
        Ok((self.value(raw), copied))
    }

    /// Create a string intended as a property key.
    pub fn create_property_key_utf8(&self, value: &str) -> Result<Value<'_>> {
        let raw = if self.capabilities().supports(version::PROPERTY_KEYS) {
            check(self.host().create_property_key_utf8(self.raw(), value))?
        } else {
            check(self.host().create_string_utf8(self.raw(), value))?
        };
        Ok(self.value(raw))
    }

    pub fn create_property_key_utf16le(&self, value: &[u16]) -> Result<Value<'_>> {
        let raw = if self.capabilities().supports(version::PROPERTY_KEYS) {
            check(self.host().create_property_key_utf16(self.raw(), value))?
        } else {
            check(self.host().create_string_utf16(self.raw(), value))?
        };
        Ok(self.value(raw))
    }

    pub fn create_property_key_latin1(&self, value: &[u8]) -> Result<Value<'_>> {
        let raw = if self.capabilities().supports(version::PROPERTY_KEYS) {
            check(self.host().create_property_key_latin1(self.raw(), value))?
        } else {
            check(self.host().create_string_latin1(self.raw(), value))?
        };
        Ok(self.value(raw))
    }

    pub fn create_symbol(&self, description: Option<Value<'_>>) -> Result<Value<'_>> {
        let raw = check(
            self.host()
                .create_symbol(self.raw(), description.map(Value::raw)),
        )?;
        Ok(self.value(raw))
    }

    /// Symbol from the global registry; equal descriptions give equal symbols.
    #[cfg(feature = "napi9")]
    pub fn symbol_for(&self, description: &str) -> Result<Value<'_>> {
        self.require("symbol_for", version::SYMBOL_FOR)?;
        let raw = check(self.host().symbol_for(self.raw(), description))?;
        Ok(self.value(raw))
    }

    pub fn get_value_string_utf8(&self, value: Value<'_>) -> Result<String> {
        check(self.host().get_value_string_utf8(self.raw(), value.raw()))
    }

    pub fn get_value_string_utf16le(&self, value: Value<'_>) -> Result<Vec<u16>> {
        check(self.host().get_value_string_utf16(self.raw(), value.raw()))
    }

    pub fn get_value_string_latin1(&self, value: Value<'_>) -> Result<Vec<u8>> {
        check(self.host().get_value_string_latin1(self.raw(), value.raw()))
    }

    pub fn get_string_view(&self, value: Value<'_>) -> Result<StringView> {
        Ok(StringView {
            text: self.get_value_string_utf8(value)?,
        })
    }

    pub(crate) fn storage_finalizer<T: 'static>(
        &self,
        finalize: StorageFinalizer<T>,
    ) -> napi_finalize_storage<T> {
        let env = self.clone();
        Box::new(move |_, storage| finalize(&env, storage))
    }
}

/// Read-only UTF-8 view of a string value, released on drop.
pub struct StringView {
    text: String,
}

impl StringView {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Deref for StringView {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for StringView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.text, f)
    }
}

impl fmt::Display for StringView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
