//! Property access and bulk definition
//!
//! [`PropertyDescriptor`] is the layer's declarative descriptor. Bulk
//! definitions stage the host records in a scoped buffer that lives only
//! for the duration of the host call.

use otter_napi_sys::{napi_callback, napi_property_descriptor};
use smallvec::SmallVec;

use crate::env::Env;
use crate::error::{Error, Result, UsageViolation, check};
use crate::function::{Callback, CallbackInfo};
use crate::handle::Value;
use crate::types::PropertyAttributes;

#[derive(Debug, Clone, Copy)]
pub enum PropertyName<'a> {
    Utf8(&'a str),
    /// String or symbol key.
    Value(Value<'a>),
}

#[derive(Debug, Clone)]
pub enum PropertyKind<'a> {
    Value(Value<'a>),
    Method(Callback),
    Accessor {
        getter: Option<Callback>,
        setter: Option<Callback>,
    },
}

/// One property for [`Env::define_properties`] or [`Env::define_class`].
#[derive(Debug, Clone)]
pub struct PropertyDescriptor<'a> {
    pub name: PropertyName<'a>,
    pub attributes: PropertyAttributes,
    pub kind: PropertyKind<'a>,
}

impl<'a> PropertyDescriptor<'a> {
    /// Data property. Read-only, non-enumerable and non-configurable
    /// unless attributes are added.
    pub fn value(name: &'a str, value: Value<'a>) -> Self {
        Self {
            name: PropertyName::Utf8(name),
            attributes: PropertyAttributes::NONE,
            kind: PropertyKind::Value(value),
        }
    }

    pub fn method<F>(name: &'a str, f: F) -> Self
    where
        F: for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>> + 'static,
    {
        Self {
            name: PropertyName::Utf8(name),
            attributes: PropertyAttributes::NONE,
            kind: PropertyKind::Method(Callback::new(f)),
        }
    }

    /// Accessor with neither half set. Add at least one with
    /// [`getter`](Self::getter) or [`setter`](Self::setter).
    pub fn accessor(name: &'a str) -> Self {
        Self {
            name: PropertyName::Utf8(name),
            attributes: PropertyAttributes::NONE,
            kind: PropertyKind::Accessor {
                getter: None,
                setter: None,
            },
        }
    }

    pub fn keyed(mut self, key: Value<'a>) -> Self {
        self.name = PropertyName::Value(key);
        self
    }

    /// Turns the descriptor into an accessor if it was not one.
    pub fn getter<F>(mut self, f: F) -> Self
    where
        F: for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>> + 'static,
    {
        let callback = Callback::new(f);
        match &mut self.kind {
            PropertyKind::Accessor { getter, .. } => *getter = Some(callback),
            kind => {
                *kind = PropertyKind::Accessor {
                    getter: Some(callback),
                    setter: None,
                }
            }
        }
        self
    }

    pub fn setter<F>(mut self, f: F) -> Self
    where
        F: for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>> + 'static,
    {
        let callback = Callback::new(f);
        match &mut self.kind {
            PropertyKind::Accessor { setter, .. } => *setter = Some(callback),
            kind => {
                *kind = PropertyKind::Accessor {
                    getter: None,
                    setter: Some(callback),
                }
            }
        }
        self
    }

    pub fn attributes(mut self, attributes: PropertyAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    fn stage(&self, env: &Env) -> Result<napi_property_descriptor<'a>> {
        let (utf8name, name) = match self.name {
            PropertyName::Utf8(name) => (Some(name), None),
            PropertyName::Value(key) => (None, Some(key.raw())),
        };
        let bind = |callback: &Option<Callback>| -> Option<napi_callback> {
            callback.as_ref().map(|callback| env.bind_callback(callback))
        };
        let mut staged = napi_property_descriptor {
            utf8name,
            name,
            attributes: self.attributes.to_host(),
            ..Default::default()
        };
        match &self.kind {
            PropertyKind::Value(value) => staged.value = Some(value.raw()),
            PropertyKind::Method(callback) => staged.method = Some(env.bind_callback(callback)),
            PropertyKind::Accessor { getter, setter } => {
                if getter.is_none() && setter.is_none() {
                    return Err(Error::usage(UsageViolation::EmptyAccessor));
                }
                staged.getter = bind(getter);
                staged.setter = bind(setter);
            }
        }
        Ok(staged)
    }
}

type Staging<'a> = SmallVec<[napi_property_descriptor<'a>; 8]>;

fn stage_all<'a>(env: &Env, properties: &[PropertyDescriptor<'a>]) -> Result<Staging<'a>> {
    properties
        .iter()
        .map(|descriptor| descriptor.stage(env))
        .collect()
}

impl Env {
    pub fn define_properties(
        &self,
        object: Value<'_>,
        properties: &[PropertyDescriptor<'_>],
    ) -> Result<()> {
        let staged = stage_all(self, properties)?;
        check(
            self.host()
                .define_properties(self.raw(), object.raw(), &staged),
        )
    }

    /// Define a constructor. Descriptors with [`PropertyAttributes::STATIC`]
    /// land on the constructor, the rest on its prototype.
    pub fn define_class<F>(
        &self,
        name: &str,
        constructor: F,
        properties: &[PropertyDescriptor<'_>],
    ) -> Result<Value<'_>>
    where
        F: for<'e> Fn(&'e Env, &CallbackInfo<'e>) -> Result<Value<'e>> + 'static,
    {
        let staged = stage_all(self, properties)?;
        let constructor = self.bind_callback(&Callback::new(constructor));
        let raw = check(
            self.host()
                .define_class(self.raw(), name, constructor, &staged),
        )?;
        Ok(self.value(raw))
    }

    // Keyed access

    pub fn set_property(&self, object: Value<'_>, key: Value<'_>, value: Value<'_>) -> Result<()> {
        check(
            self.host()
                .set_property(self.raw(), object.raw(), key.raw(), value.raw()),
        )
    }

    pub fn get_property(&self, object: Value<'_>, key: Value<'_>) -> Result<Value<'_>> {
        let raw = check(
            self.host()
                .get_property(self.raw(), object.raw(), key.raw()),
        )?;
        Ok(self.value(raw))
    }

    pub fn has_property(&self, object: Value<'_>, key: Value<'_>) -> Result<bool> {
        check(
            self.host()
                .has_property(self.raw(), object.raw(), key.raw()),
        )
    }

    /// Returns whether the property is gone afterwards.
    pub fn delete_property(&self, object: Value<'_>, key: Value<'_>) -> Result<bool> {
        check(
            self.host()
                .delete_property(self.raw(), object.raw(), key.raw()),
        )
    }

    // Named access

    pub fn set_named_property(&self, object: Value<'_>, name: &str, value: Value<'_>) -> Result<()> {
        check(
            self.host()
                .set_named_property(self.raw(), object.raw(), name, value.raw()),
        )
    }

    pub fn get_named_property(&self, object: Value<'_>, name: &str) -> Result<Value<'_>> {
        let raw = check(
            self.host()
                .get_named_property(self.raw(), object.raw(), name),
        )?;
        Ok(self.value(raw))
    }

    pub fn has_named_property(&self, object: Value<'_>, name: &str) -> Result<bool> {
        check(
            self.host()
                .has_named_property(self.raw(), object.raw(), name),
        )
    }

    /// Delete by name through a string key. Returns whether the property is
    /// gone afterwards.
    pub fn delete_named_property(&self, object: Value<'_>, name: &str) -> Result<bool> {
        let key = self.create_string_utf8(name)?;
        self.delete_property(object, key)
    }

    // Indexed access

    pub fn set_element(&self, object: Value<'_>, index: u32, value: Value<'_>) -> Result<()> {
        check(
            self.host()
                .set_element(self.raw(), object.raw(), index, value.raw()),
        )
    }

    pub fn get_element(&self, object: Value<'_>, index: u32) -> Result<Value<'_>> {
        let raw = check(self.host().get_element(self.raw(), object.raw(), index))?;
        Ok(self.value(raw))
    }

    pub fn has_element(&self, object: Value<'_>, index: u32) -> Result<bool> {
        check(self.host().has_element(self.raw(), object.raw(), index))
    }

    pub fn delete_element(&self, object: Value<'_>, index: u32) -> Result<bool> {
        check(self.host().delete_element(self.raw(), object.raw(), index))
    }

    /// Store `values` at indices `offset..`.
    pub fn set_array_elements(
        &self,
        array: Value<'_>,
        values: &[Value<'_>],
        offset: u32,
    ) -> Result<()> {
        for (index, value) in (offset..).zip(values) {
            self.set_element(array, index, *value)?;
        }
        Ok(())
    }

    /// Read up to `count` elements starting at `offset`, stopping at the array length.
    pub fn get_array_elements(
        &self,
        array: Value<'_>,
        offset: u32,
        count: u32,
    ) -> Result<Vec<Value<'_>>> {
        let length = self.get_array_length(array)?;
        let end = offset.saturating_add(count).min(length);
        (offset..end)
            .map(|index| self.get_element(array, index))
            .collect()
    }

    pub fn get_array_length(&self, array: Value<'_>) -> Result<u32> {
        check(self.host().get_array_length(self.raw(), array.raw()))
    }

    pub fn get_prototype(&self, object: Value<'_>) -> Result<Value<'_>> {
        let raw = check(self.host().get_prototype(self.raw(), object.raw()))?;
        Ok(self.value(raw))
    }

    /// Enumerable string keys as an array.
    pub fn get_property_names(&self, object: Value<'_>) -> Result<Value<'_>> {
        let raw = check(self.host().get_property_names(self.raw(), object.raw()))?;
        Ok(self.value(raw))
    }
}
