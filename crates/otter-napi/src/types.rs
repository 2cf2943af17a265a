//! Layer enumerations and their host conversions.
//!
//! Conversions from host codes are total. A code the layer does not know
//! maps to a fixed default (`Null` for value types, `Uint8Array` for typed
//! array kinds) instead of failing.

use std::ops::{BitOr, BitOrAssign};

use otter_napi_sys::*;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Undefined = 0,
    Null = 1,
    Boolean = 2,
    Number = 3,
    String = 4,
    Symbol = 5,
    Object = 6,
    Function = 7,
    External = 8,
    BigInt = 9,
}

impl ValueType {
    pub fn from_host(raw: napi_valuetype) -> Self {
        match raw {
            napi_undefined => Self::Undefined,
            napi_null => Self::Null,
            napi_boolean => Self::Boolean,
            napi_number => Self::Number,
            napi_string => Self::String,
            napi_symbol => Self::Symbol,
            napi_object => Self::Object,
            napi_function => Self::Function,
            napi_external => Self::External,
            napi_bigint => Self::BigInt,
            _ => Self::Null,
        }
    }

    pub fn to_host(self) -> napi_valuetype {
        match self {
            Self::Undefined => napi_undefined,
            Self::Null => napi_null,
            Self::Boolean => napi_boolean,
            Self::Number => napi_number,
            Self::String => napi_string,
            Self::Symbol => napi_symbol,
            Self::Object => napi_object,
            Self::Function => napi_function,
            Self::External => napi_external,
            Self::BigInt => napi_bigint,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Object => "object",
            Self::Function => "function",
            Self::External => "external",
            Self::BigInt => "bigint",
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayType {
    Int8Array = 0,
    Uint8Array = 1,
    Uint8ClampedArray = 2,
    Int16Array = 3,
    Uint16Array = 4,
    Int32Array = 5,
    Uint32Array = 6,
    Float32Array = 7,
    Float64Array = 8,
    BigInt64Array = 9,
    BigUint64Array = 10,
}

#[allow(non_upper_case_globals)]
impl TypedArrayType {
    #[deprecated(note = "use `TypedArrayType::Int8Array`")]
    pub const Int8: Self = Self::Int8Array;
    #[deprecated(note = "use `TypedArrayType::Uint8Array`")]
    pub const Uint8: Self = Self::Uint8Array;
    #[deprecated(note = "use `TypedArrayType::Uint8ClampedArray`")]
    pub const Uint8Clamped: Self = Self::Uint8ClampedArray;
    #[deprecated(note = "use `TypedArrayType::Int16Array`")]
    pub const Int16: Self = Self::Int16Array;
    #[deprecated(note = "use `TypedArrayType::Uint16Array`")]
    pub const Uint16: Self = Self::Uint16Array;
    #[deprecated(note = "use `TypedArrayType::Int32Array`")]
    pub const Int32: Self = Self::Int32Array;
    #[deprecated(note = "use `TypedArrayType::Uint32Array`")]
    pub const Uint32: Self = Self::Uint32Array;
    #[deprecated(note = "use `TypedArrayType::Float32Array`")]
    pub const Float32: Self = Self::Float32Array;
    #[deprecated(note = "use `TypedArrayType::Float64Array`")]
    pub const Float64: Self = Self::Float64Array;
    #[deprecated(note = "use `TypedArrayType::BigInt64Array`")]
    pub const BigInt64: Self = Self::BigInt64Array;
    #[deprecated(note = "use `TypedArrayType::BigUint64Array`")]
    pub const BigUint64: Self = Self::BigUint64Array;
}

impl TypedArrayType {
    pub fn from_host(raw: napi_typedarray_type) -> Self {
        match raw {
            napi_int8_array => Self::Int8Array,
            napi_uint8_array => Self::Uint8Array,
            napi_uint8_clamped_array => Self::Uint8ClampedArray,
            napi_int16_array => Self::Int16Array,
            napi_uint16_array => Self::Uint16Array,
            napi_int32_array => Self::Int32Array,
            napi_uint32_array => Self::Uint32Array,
            napi_float32_array => Self::Float32Array,
            napi_float64_array => Self::Float64Array,
            napi_bigint64_array => Self::BigInt64Array,
            napi_biguint64_array => Self::BigUint64Array,
            _ => Self::Uint8Array,
        }
    }

    pub fn to_host(self) -> napi_typedarray_type {
        match self {
            Self::Int8Array => napi_int8_array,
            Self::Uint8Array => napi_uint8_array,
            Self::Uint8ClampedArray => napi_uint8_clamped_array,
            Self::Int16Array => napi_int16_array,
            Self::Uint16Array => napi_uint16_array,
            Self::Int32Array => napi_int32_array,
            Self::Uint32Array => napi_uint32_array,
            Self::Float32Array => napi_float32_array,
            Self::Float64Array => napi_float64_array,
            Self::BigInt64Array => napi_bigint64_array,
            Self::BigUint64Array => napi_biguint64_array,
        }
    }

    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            Self::Int8Array | Self::Uint8Array | Self::Uint8ClampedArray => 1,
            Self::Int16Array | Self::Uint16Array => 2,
            Self::Int32Array | Self::Uint32Array | Self::Float32Array => 4,
            Self::Float64Array | Self::BigInt64Array | Self::BigUint64Array => 8,
        }
    }
}

/// Precise numeric type tag: an index in the upper byte, combined with
/// [`ValueType::Number`] in the low byte.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    Int8 = 1 << 8 | ValueType::Number as i32,
    Uint8 = 2 << 8 | ValueType::Number as i32,
    Int16 = 3 << 8 | ValueType::Number as i32,
    Uint16 = 4 << 8 | ValueType::Number as i32,
    Int32 = 5 << 8 | ValueType::Number as i32,
    Uint32 = 6 << 8 | ValueType::Number as i32,
    Int64 = 7 << 8 | ValueType::Number as i32,
    Uint64 = 8 << 8 | ValueType::Number as i32,
    Float32 = 9 << 8 | ValueType::Number as i32,
    Float64 = 10 << 8 | ValueType::Number as i32,
    BigInt64 = 11 << 8 | ValueType::Number as i32,
    BigUint64 = 12 << 8 | ValueType::Number as i32,
}

impl NumericType {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// The base value type, recovered by masking off the index.
    pub fn value_type(self) -> ValueType {
        ValueType::from_host(self.code() & 0xff)
    }

    pub fn index(self) -> u8 {
        (self.code() >> 8) as u8
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringEncoding {
    Utf8 = 1,
    Utf16Le = 2,
    Latin1 = 3,
}

/// Property attribute bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyAttributes(napi_property_attributes);

impl PropertyAttributes {
    /// Read-only, non-enumerable, non-configurable.
    pub const NONE: Self = Self(napi_default);
    pub const WRITABLE: Self = Self(napi_writable);
    pub const ENUMERABLE: Self = Self(napi_enumerable);
    pub const CONFIGURABLE: Self = Self(napi_configurable);
    /// Class-level member when passed to `define_class`.
    pub const STATIC: Self = Self(napi_static);
    /// Attributes of an ordinary script assignment.
    pub const DEFAULT_DATA: Self = Self(napi_writable | napi_enumerable | napi_configurable);

    pub fn bits(self) -> napi_property_attributes {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn to_host(self) -> napi_property_attributes {
        self.0
    }
}

impl BitOr for PropertyAttributes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PropertyAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// How a holder gives up its claim on a threadsafe function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseMode {
    Release,
    /// Close immediately and drop queued data.
    Abort,
}

impl ReleaseMode {
    pub fn from_host(raw: napi_threadsafe_function_release_mode) -> Self {
        match raw {
            napi_tsfn_abort => Self::Abort,
            _ => Self::Release,
        }
    }

    pub fn to_host(self) -> napi_threadsafe_function_release_mode {
        match self {
            Self::Release => napi_tsfn_release,
            Self::Abort => napi_tsfn_abort,
        }
    }
}

/// Behavior of a threadsafe call when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallMode {
    NonBlocking,
    Blocking,
}

impl CallMode {
    pub fn from_host(raw: napi_threadsafe_function_call_mode) -> Self {
        match raw {
            napi_tsfn_blocking => Self::Blocking,
            _ => Self::NonBlocking,
        }
    }

    pub fn to_host(self) -> napi_threadsafe_function_call_mode {
        match self {
            Self::NonBlocking => napi_tsfn_nonblocking,
            Self::Blocking => napi_tsfn_blocking,
        }
    }
}

/// 128-bit object type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeTag {
    pub lower: u64,
    pub upper: u64,
}

impl TypeTag {
    pub const fn new(lower: u64, upper: u64) -> Self {
        Self { lower, upper }
    }

    pub(crate) fn to_host(self) -> napi_type_tag {
        napi_type_tag {
            lower: self.lower,
            upper: self.upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUE_TYPES: [ValueType; 10] = [
        ValueType::Undefined,
        ValueType::Null,
        ValueType::Boolean,
        ValueType::Number,
        ValueType::String,
        ValueType::Symbol,
        ValueType::Object,
        ValueType::Function,
        ValueType::External,
        ValueType::BigInt,
    ];

    #[test]
    fn test_value_type_round_trip() {
        for ty in VALUE_TYPES {
            assert_eq!(ValueType::from_host(ty.to_host()), ty);
        }
    }

    #[test]
    fn test_unknown_codes_use_defaults() {
        assert_eq!(ValueType::from_host(77), ValueType::Null);
        assert_eq!(TypedArrayType::from_host(-1), TypedArrayType::Uint8Array);
    }

    const TYPED_ARRAY_TYPES: [TypedArrayType; 11] = [
        TypedArrayType::Int8Array,
        TypedArrayType::Uint8Array,
        TypedArrayType::Uint8ClampedArray,
        TypedArrayType::Int16Array,
        TypedArrayType::Uint16Array,
        TypedArrayType::Int32Array,
        TypedArrayType::Uint32Array,
        TypedArrayType::Float32Array,
        TypedArrayType::Float64Array,
        TypedArrayType::BigInt64Array,
        TypedArrayType::BigUint64Array,
    ];

    #[allow(deprecated)]
    const LEGACY_TYPED_ARRAY_TYPES: [TypedArrayType; 11] = [
        TypedArrayType::Int8,
        TypedArrayType::Uint8,
        TypedArrayType::Uint8Clamped,
        TypedArrayType::Int16,
        TypedArrayType::Uint16,
        TypedArrayType::Int32,
        TypedArrayType::Uint32,
        TypedArrayType::Float32,
        TypedArrayType::Float64,
        TypedArrayType::BigInt64,
        TypedArrayType::BigUint64,
    ];

    #[test]
    fn test_typed_array_type_round_trip() {
        for (code, ty) in TYPED_ARRAY_TYPES.into_iter().enumerate() {
            assert_eq!(ty.to_host(), code as napi_typedarray_type);
            assert_eq!(TypedArrayType::from_host(ty.to_host()), ty);
        }
    }

    #[test]
    fn test_legacy_typed_array_names_alias() {
        for (legacy, current) in LEGACY_TYPED_ARRAY_TYPES.into_iter().zip(TYPED_ARRAY_TYPES) {
            assert_eq!(legacy, current);
            assert_eq!(legacy.to_host(), current.to_host());
            assert_eq!(TypedArrayType::from_host(legacy.to_host()), current);
        }
    }

    #[test]
    fn test_numeric_type_encoding() {
        let number = ValueType::Number as i32;
        assert_eq!(NumericType::Int8.code(), 1 << 8 | number);
        assert_eq!(NumericType::Uint64.code(), 8 << 8 | number);
        assert_eq!(NumericType::Float32.code(), 9 << 8 | number);
        assert_eq!(NumericType::Float64.code(), 10 << 8 | number);
        assert_eq!(NumericType::BigInt64.code(), 11 << 8 | number);
        assert_eq!(NumericType::BigUint64.code(), 12 << 8 | number);
        assert_eq!(NumericType::Float64.index(), 10);
        for ty in [NumericType::Uint16, NumericType::Int64, NumericType::BigUint64] {
            assert_eq!(ty.value_type(), ValueType::Number);
        }
    }

    #[test]
    fn test_attribute_values() {
        assert_eq!(PropertyAttributes::WRITABLE.bits(), 1);
        assert_eq!(PropertyAttributes::ENUMERABLE.bits(), 2);
        assert_eq!(PropertyAttributes::CONFIGURABLE.bits(), 4);
        assert_eq!(PropertyAttributes::STATIC.bits(), 1 << 10);
        let attrs = PropertyAttributes::WRITABLE | PropertyAttributes::STATIC;
        assert!(attrs.contains(PropertyAttributes::STATIC));
        assert!(!attrs.contains(PropertyAttributes::ENUMERABLE));
    }

    #[test]
    fn test_modes_and_encodings() {
        assert_eq!(ReleaseMode::Release.to_host(), 0);
        assert_eq!(ReleaseMode::Abort.to_host(), 1);
        assert_eq!(CallMode::NonBlocking.to_host(), 0);
        assert_eq!(CallMode::Blocking.to_host(), 1);
        assert_eq!(ReleaseMode::from_host(9), ReleaseMode::Release);
        assert_eq!(CallMode::from_host(napi_tsfn_blocking), CallMode::Blocking);
        assert_eq!(StringEncoding::Utf8 as i32, 1);
        assert_eq!(StringEncoding::Utf16Le as i32, 2);
        assert_eq!(StringEncoding::Latin1 as i32, 3);
    }
}
