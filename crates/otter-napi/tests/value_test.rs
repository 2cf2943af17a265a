//! Value construction, inspection, coercion and binary data

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use otter_napi::{Error, StorageFinalizer, TypedArrayType, ValueType};

#[test]
fn test_primitives_round_trip() {
    let (_host, env) = common::setup();

    let value = env.create_int32(-7).unwrap();
    assert_eq!(env.type_of(value).unwrap(), ValueType::Number);
    assert_eq!(env.get_value_int32(value).unwrap(), -7);

    let value = env.create_uint32(u32::MAX).unwrap();
    assert_eq!(env.get_value_uint32(value).unwrap(), u32::MAX);

    let value = env.create_int64(1 << 40).unwrap();
    assert_eq!(env.get_value_int64(value).unwrap(), 1 << 40);

    let value = env.create_double(0.25).unwrap();
    assert_eq!(env.get_value_double(value).unwrap(), 0.25);

    let value = env.get_boolean(true).unwrap();
    assert!(env.is_boolean(value).unwrap());
    assert!(env.get_value_bool(value).unwrap());

    assert!(env.is_undefined(env.get_undefined().unwrap()).unwrap());
    assert!(env.is_null(env.get_null().unwrap()).unwrap());
    assert!(env.is_object(env.get_global().unwrap()).unwrap());
}

#[test]
fn test_reading_wrong_kind_fails() {
    let (_host, env) = common::setup();
    let text = env.create_string_utf8("7").unwrap();
    assert!(matches!(env.get_value_int32(text), Err(Error::Failed)));
    let number = env.create_int32(7).unwrap();
    assert!(matches!(env.get_value_bool(number), Err(Error::Failed)));
}

#[test]
fn test_bigint_reports_lossless_conversion() {
    let (_host, env) = common::setup();
    let value = env.create_bigint_int64(-5).unwrap();
    assert!(env.is_bigint(value).unwrap());
    assert_eq!(env.type_of(value).unwrap(), ValueType::BigInt);
    assert_eq!(env.get_value_bigint_int64(value).unwrap(), (-5, true));
    let (_, lossless) = env.get_value_bigint_uint64(value).unwrap();
    assert!(!lossless);

    let value = env.create_bigint_uint64(u64::MAX).unwrap();
    assert_eq!(env.get_value_bigint_uint64(value).unwrap(), (u64::MAX, true));
    let (_, lossless) = env.get_value_bigint_int64(value).unwrap();
    assert!(!lossless);
}

#[test]
fn test_dates() {
    let (_host, env) = common::setup();
    let date = env.create_date(1_700_000_000_000.0).unwrap();
    assert!(env.is_date(date).unwrap());
    assert_eq!(env.get_value_date(date).unwrap(), 1_700_000_000_000.0);
    let plain = env.create_object().unwrap();
    assert!(!env.is_date(plain).unwrap());
}

#[test]
fn test_coercion() {
    let (_host, env) = common::setup();

    let number = env.create_int32(42).unwrap();
    let text = env.coerce_to_string(number).unwrap();
    assert_eq!(env.get_value_string_utf8(text).unwrap(), "42");

    let text = env.create_string_utf8(" 12 ").unwrap();
    let number = env.coerce_to_number(text).unwrap();
    assert_eq!(env.get_value_double(number).unwrap(), 12.0);

    let empty = env.create_string_utf8("").unwrap();
    let truthy = env.coerce_to_boolean(empty).unwrap();
    assert!(!env.get_value_bool(truthy).unwrap());

    let null = env.get_null().unwrap();
    assert!(matches!(env.coerce_to_object(null), Err(Error::PendingException)));
    let exception = env.take_pending_exception().unwrap().expect("type error pending");
    assert!(env.is_error(exception).unwrap());
}

#[test]
fn test_strict_equality() {
    let (_host, env) = common::setup();
    let a = env.create_object().unwrap();
    let b = env.create_object().unwrap();
    assert!(env.strict_equals(a, a).unwrap());
    assert!(!env.strict_equals(a, b).unwrap());

    let one = env.create_int32(1).unwrap();
    let also_one = env.create_double(1.0).unwrap();
    assert!(env.strict_equals(one, also_one).unwrap());
}

#[test]
fn test_string_encodings() {
    let (_host, env) = common::setup();

    let utf16: Vec<u16> = "héllo wörld".encode_utf16().collect();
    let value = env.create_string_utf16le(&utf16).unwrap();
    assert_eq!(env.get_value_string_utf8(value).unwrap(), "héllo wörld");
    assert_eq!(env.get_value_string_utf16le(value).unwrap(), utf16);

    let value = env.create_string_latin1(b"caf\xe9").unwrap();
    assert_eq!(env.get_value_string_utf8(value).unwrap(), "café");
    assert_eq!(env.get_value_string_latin1(value).unwrap(), b"caf\xe9");

    let view = env.get_string_view(value).unwrap();
    assert_eq!(view.as_str(), "café");
    assert_eq!(view.len(), "café".len());
    assert_eq!(view.to_string(), "café");
}

#[test]
fn test_external_string_storage_is_returned() {
    let (_host, env) = common::setup();
    let returned = Rc::new(RefCell::new(Vec::new()));

    let finalize: StorageFinalizer<u8> = {
        let returned = Rc::clone(&returned);
        Box::new(move |_, storage| returned.borrow_mut().extend_from_slice(&storage))
    };
    let (value, copied) = env
        .create_external_string_utf8(b"borrowed".to_vec().into_boxed_slice(), Some(finalize))
        .unwrap();
    assert!(copied);
    assert_eq!(env.get_value_string_utf8(value).unwrap(), "borrowed");
    assert_eq!(*returned.borrow(), b"borrowed");
}

#[test]
fn test_external_utf8_string_must_be_valid() {
    let (_host, env) = common::setup();
    let err = env
        .create_external_string_utf8(vec![0xff, 0xfe].into_boxed_slice(), None)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_symbols() {
    let (_host, env) = common::setup();
    let description = env.create_string_utf8("token").unwrap();
    let a = env.create_symbol(Some(description)).unwrap();
    let b = env.create_symbol(Some(description)).unwrap();
    assert!(env.is_symbol(a).unwrap());
    assert!(!env.strict_equals(a, b).unwrap());

    let registered = env.symbol_for("shared").unwrap();
    let again = env.symbol_for("shared").unwrap();
    assert!(env.strict_equals(registered, again).unwrap());

    assert!(matches!(env.coerce_to_string(a), Err(Error::PendingException)));
    env.take_pending_exception().unwrap();
}

#[test]
fn test_arraybuffer_read_write() {
    let (_host, env) = common::setup();
    let buffer = env.create_arraybuffer(8).unwrap();
    assert!(env.is_arraybuffer(buffer).unwrap());
    assert_eq!(env.read_arraybuffer(buffer).unwrap(), vec![0; 8]);

    env.write_arraybuffer(buffer, 2, &[1, 2, 3]).unwrap();
    assert_eq!(env.read_arraybuffer(buffer).unwrap(), [0, 0, 1, 2, 3, 0, 0, 0]);

    let err = env.write_arraybuffer(buffer, 6, &[9, 9, 9]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    let err = env.write_arraybuffer(buffer, usize::MAX, &[1]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_external_arraybuffer_returns_storage_on_detach() {
    let (_host, env) = common::setup();
    let returned = Rc::new(RefCell::new(None));

    let finalize: StorageFinalizer<u8> = {
        let returned = Rc::clone(&returned);
        Box::new(move |_, storage| *returned.borrow_mut() = Some(storage.into_vec()))
    };
    let buffer = env
        .create_external_arraybuffer(vec![4, 5, 6], Some(finalize))
        .unwrap();
    assert_eq!(env.read_arraybuffer(buffer).unwrap(), [4, 5, 6]);
    assert!(!env.is_detached_arraybuffer(buffer).unwrap());

    env.detach_arraybuffer(buffer).unwrap();
    assert!(env.is_detached_arraybuffer(buffer).unwrap());
    assert_eq!(env.get_arraybuffer_info(buffer).unwrap().byte_length(), 0);
    assert_eq!(returned.borrow().as_deref(), Some(&[4u8, 5, 6][..]));
}

#[test]
fn test_typed_array_views() {
    let (_host, env) = common::setup();
    let buffer = env.create_arraybuffer(16).unwrap();
    env.write_arraybuffer(buffer, 4, &7i32.to_le_bytes()).unwrap();

    let view = env
        .create_typedarray(TypedArrayType::Int32Array, 3, buffer, 4)
        .unwrap();
    assert!(env.is_typedarray(view).unwrap());
    let info = env.get_typedarray_info(view).unwrap();
    assert_eq!(info.kind, TypedArrayType::Int32Array);
    assert_eq!(info.length, 3);
    assert_eq!(info.byte_offset, 4);
    assert_eq!(info.byte_length(), 12);
    assert!(env.strict_equals(info.arraybuffer, buffer).unwrap());
    // SAFETY: the buffer is alive and at least 4 bytes follow the view start.
    let first = unsafe { std::ptr::read_unaligned(info.data as *const i32) };
    assert_eq!(first, 7);
}

#[test]
fn test_misaligned_typed_array_throws_range_error() {
    let (host, env) = common::setup();
    let buffer = env.create_arraybuffer(16).unwrap();
    let err = env
        .create_typedarray(TypedArrayType::Float64Array, 1, buffer, 3)
        .unwrap_err();
    assert!(err.is_pending_exception());

    let exception = env.take_pending_exception().unwrap().expect("range error");
    assert!(env.is_error(exception).unwrap());
    let message = env.get_named_property(exception, "message").unwrap();
    let message = env.get_value_string_utf8(message).unwrap();
    assert!(message.contains("multiple of 8"), "{message}");
    assert!(host.uncaught_exceptions().is_empty());
}

#[test]
fn test_data_views() {
    let (_host, env) = common::setup();
    let buffer = env.create_arraybuffer(10).unwrap();
    let view = env.create_dataview(4, buffer, 6).unwrap();
    assert!(env.is_dataview(view).unwrap());
    let info = env.get_dataview_info(view).unwrap();
    assert_eq!(info.byte_length, 4);
    assert_eq!(info.byte_offset, 6);

    assert!(env.create_dataview(5, buffer, 6).unwrap_err().is_pending_exception());
    env.take_pending_exception().unwrap();
}

#[test]
fn test_promises_settle_once() {
    let (_host, env) = common::setup();
    let (deferred, promise) = env.create_promise().unwrap();
    assert!(env.is_promise(promise).unwrap());
    deferred.resolve(env.create_int32(1).unwrap()).unwrap();

    let (deferred, promise) = env.create_promise().unwrap();
    let reason = env.create_error(None, "nope").unwrap();
    deferred.reject(reason).unwrap();
    assert!(env.is_promise(promise).unwrap());
}

#[test]
fn test_external_memory_accounting() {
    let (host, env) = common::setup();
    assert!(env.is_engine_thread());
    assert_eq!(env.adjust_external_memory(4096).unwrap(), 4096);
    assert_eq!(env.adjust_external_memory(-1024).unwrap(), 3072);
    assert_eq!(host.external_memory(), 3072);
}
