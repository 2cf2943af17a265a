//! Primitive construction, inspection and coercion.

use std::any::{self, Any};
use std::rc::Rc;

#[cfg(feature = "napi5")]
use crate::capability::version;
use crate::env::Env;
use crate::error::{Error, Result, check};
use crate::handle::Value;
use crate::types::ValueType;

macro_rules! forward_value {
    ($($(#[$meta:meta])* $name:ident($($arg:ident: $ty:ty),*);)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self, $($arg: $ty),*) -> Result<Value<'_>> {
                let raw = check(self.host().$name(self.raw(), $($arg),*))?;
                Ok(self.value(raw))
            }
        )*
    };
}

macro_rules! forward_predicate {
    ($($(#[$meta:meta])* $name:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $name(&self, value: Value<'_>) -> Result<bool> {
                check(self.host().$name(self.raw(), value.raw()))
            }
        )*
    };
}

macro_rules! typeof_predicate {
    ($($name:ident => $ty:ident,)*) => {
        $(
            pub fn $name(&self, value: Value<'_>) -> Result<bool> {
                Ok(self.type_of(value)? == ValueType::$ty)
            }
        )*
    };
}

impl Env {
    forward_value! {
        get_undefined();
        get_null();
        get_global();
        get_boolean(value: bool);
        create_int32(value: i32);
        create_uint32(value: u32);
        create_int64(value: i64);
        create_double(value: f64);
        create_object();
        create_array();
        create_array_with_length(length: usize);
    }

    #[cfg(feature = "napi6")]
    pub fn create_bigint_int64(&self, value: i64) -> Result<Value<'_>> {
        self.require("create_bigint_int64", version::BIGINT)?;
        let raw = check(self.host().create_bigint_int64(self.raw(), value))?;
        Ok(self.value(raw))
    }

    #[cfg(feature = "napi6")]
    pub fn create_bigint_uint64(&self, value: u64) -> Result<Value<'_>> {
        self.require("create_bigint_uint64", version::BIGINT)?;
        let raw = check(self.host().create_bigint_uint64(self.raw(), value))?;
        Ok(self.value(raw))
    }

    /// Date from milliseconds since the Unix epoch.
    #[cfg(feature = "napi5")]
    pub fn create_date(&self, time: f64) -> Result<Value<'_>> {
        self.require("create_date", version::DATES)?;
        let raw = check(self.host().create_date(self.raw(), time))?;
        Ok(self.value(raw))
    }

    /// Opaque value carrying native data.
    pub fn create_external<T: 'static>(&self, data: T) -> Result<Value<'_>> {
        let raw = check(self.host().create_external(self.raw(), Rc::new(data), None))?;
        Ok(self.value(raw))
    }

    /// Like [`Env::create_external`], running `finalize` once the value is collected.
    pub fn create_external_with_finalizer<T, F>(&self, data: T, finalize: F) -> Result<Value<'_>>
    where
        T: 'static,
        F: FnOnce(&Env, Rc<T>) + 'static,
    {
        let data = Rc::new(data);
        let finalize = self.finalizer_with(Rc::clone(&data), finalize);
        let raw = check(
            self.host()
                .create_external(self.raw(), data, Some(finalize)),
        )?;
        Ok(self.value(raw))
    }

    pub fn get_value_external<T: 'static>(&self, value: Value<'_>) -> Result<Rc<T>> {
        let data = check(self.host().get_value_external(self.raw(), value.raw()))?;
        downcast(data)
    }

    // Inspection

    pub fn type_of(&self, value: Value<'_>) -> Result<ValueType> {
        let raw = check(self.host().type_of(self.raw(), value.raw()))?;
        Ok(ValueType::from_host(raw))
    }

    typeof_predicate! {
        is_undefined => Undefined,
        is_null => Null,
        is_boolean => Boolean,
        is_number => Number,
        is_string => String,
        is_symbol => Symbol,
        is_object => Object,
        is_function => Function,
        is_external => External,
    }

    #[cfg(feature = "napi6")]
    pub fn is_bigint(&self, value: Value<'_>) -> Result<bool> {
        self.require("is_bigint", version::BIGINT)?;
        Ok(self.type_of(value)? == ValueType::BigInt)
    }

    forward_predicate! {
        is_array;
        is_arraybuffer;
        is_typedarray;
        is_dataview;
        is_error;
        is_promise;
    }

    #[cfg(feature = "napi5")]
    pub fn is_date(&self, value: Value<'_>) -> Result<bool> {
        self.require("is_date", version::DATES)?;
        check(self.host().is_date(self.raw(), value.raw()))
    }

    pub fn strict_equals(&self, lhs: Value<'_>, rhs: Value<'_>) -> Result<bool> {
        check(self.host().strict_equals(self.raw(), lhs.raw(), rhs.raw()))
    }

    pub fn instanceof(&self, object: Value<'_>, constructor: Value<'_>) -> Result<bool> {
        check(
            self.host()
                .instanceof(self.raw(), object.raw(), constructor.raw()),
        )
    }

    // Coercion

    pub fn coerce_to_boolean(&self, value: Value<'_>) -> Result<Value<'_>> {
        let raw = check(self.host().coerce_to_bool(self.raw(), value.raw()))?;
        Ok(self.value(raw))
    }

    pub fn coerce_to_number(&self, value: Value<'_>) -> Result<Value<'_>> {
        let raw = check(self.host().coerce_to_number(self.raw(), value.raw()))?;
        Ok(self.value(raw))
    }

    pub fn coerce_to_string(&self, value: Value<'_>) -> Result<Value<'_>> {
        let raw = check(self.host().coerce_to_string(self.raw(), value.raw()))?;
        Ok(self.value(raw))
    }

    pub fn coerce_to_object(&self, value: Value<'_>) -> Result<Value<'_>> {
        let raw = check(self.host().coerce_to_object(self.raw(), value.raw()))?;
        Ok(self.value(raw))
    }

    // Reading primitives

    pub fn get_value_bool(&self, value: Value<'_>) -> Result<bool> {
        check(self.host().get_value_bool(self.raw(), value.raw()))
    }

    pub fn get_value_int32(&self, value: Value<'_>) -> Result<i32> {
        check(self.host().get_value_int32(self.raw(), value.raw()))
    }

    pub fn get_value_uint32(&self, value: Value<'_>) -> Result<u32> {
        check(self.host().get_value_uint32(self.raw(), value.raw()))
    }

    pub fn get_value_int64(&self, value: Value<'_>) -> Result<i64> {
        check(self.host().get_value_int64(self.raw(), value.raw()))
    }

    pub fn get_value_double(&self, value: Value<'_>) -> Result<f64> {
        check(self.host().get_value_double(self.raw(), value.raw()))
    }

    /// Returns the value and whether it fit without truncation.
    #[cfg(feature = "napi6")]
    pub fn get_value_bigint_int64(&self, value: Value<'_>) -> Result<(i64, bool)> {
        self.require("get_value_bigint_int64", version::BIGINT)?;
        check(self.host().get_value_bigint_int64(self.raw(), value.raw()))
    }

    #[cfg(feature = "napi6")]
    pub fn get_value_bigint_uint64(&self, value: Value<'_>) -> Result<(u64, bool)> {
        self.require("get_value_bigint_uint64", version::BIGINT)?;
        check(self.host().get_value_bigint_uint64(self.raw(), value.raw()))
    }

    #[cfg(feature = "napi5")]
    pub fn get_value_date(&self, value: Value<'_>) -> Result<f64> {
        self.require("get_value_date", version::DATES)?;
        check(self.host().get_date_value(self.raw(), value.raw()))
    }
}

pub(crate) fn downcast<T: 'static>(data: Rc<dyn Any>) -> Result<Rc<T>> {
    data.downcast::<T>()
        .map_err(|_| Error::type_mismatch(any::type_name::<T>(), "other native data"))
}
