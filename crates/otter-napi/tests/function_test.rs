//! Native functions, property definition and classes

mod common;

use std::cell::Cell;
use std::rc::Rc;

use otter_napi::{Env, Error, PropertyAttributes, PropertyDescriptor, UsageViolation, Value};

fn error_code(env: &Env, exception: Value<'_>) -> String {
    let code = env.get_named_property(exception, "code").unwrap();
    env.get_value_string_utf8(code).unwrap()
}

fn error_message(env: &Env, exception: Value<'_>) -> String {
    let message = env.get_named_property(exception, "message").unwrap();
    env.get_value_string_utf8(message).unwrap()
}

#[test]
fn test_native_function_receives_arguments() {
    let (_host, env) = common::setup();
    let add = env
        .create_function("add", |env, info| {
            let mut sum = 0;
            for arg in info.args() {
                sum += env.get_value_int32(*arg)?;
            }
            env.create_int32(sum)
        })
        .unwrap();
    assert!(env.is_function(add).unwrap());

    let recv = env.get_undefined().unwrap();
    let args = [
        env.create_int32(1).unwrap(),
        env.create_int32(2).unwrap(),
        env.create_int32(39).unwrap(),
    ];
    let result = env.call_function(recv, add, &args).unwrap();
    assert_eq!(env.get_value_int32(result).unwrap(), 42);
}

#[test]
fn test_native_function_sees_receiver() {
    let (_host, env) = common::setup();
    let this_name = env
        .create_function("thisName", |env, info| {
            assert!(!info.is_construct_call());
            env.get_named_property(info.this(), "name")
        })
        .unwrap();

    let receiver = env.create_object().unwrap();
    env.set_named_property(receiver, "name", env.create_string_utf8("receiver").unwrap())
        .unwrap();
    let result = env.call_function(receiver, this_name, &[]).unwrap();
    assert_eq!(env.get_value_string_utf8(result).unwrap(), "receiver");
}

#[test]
fn test_callback_error_becomes_exception_with_code() {
    let (host, env) = common::setup();
    let strict = env
        .create_function("strict", |env, info| {
            let value = info.arg(0).ok_or(Error::InvalidArgument("value is required"))?;
            if !env.is_number(value)? {
                return Err(Error::type_mismatch("number", "other value"));
            }
            Ok(value)
        })
        .unwrap();
    let recv = env.get_undefined().unwrap();

    let err = env.call_function(recv, strict, &[]).unwrap_err();
    assert!(err.is_pending_exception());
    let exception = env.take_pending_exception().unwrap().expect("exception");
    assert_eq!(error_code(&env, exception), "ERR_INVALID_ARG_VALUE");
    assert!(error_message(&env, exception).contains("value is required"));

    let text = env.create_string_utf8("seven").unwrap();
    let err = env.call_function(recv, strict, &[text]).unwrap_err();
    assert!(err.is_pending_exception());
    let exception = env.take_pending_exception().unwrap().expect("exception");
    assert_eq!(error_code(&env, exception), "ERR_INVALID_ARG_TYPE");

    assert!(!env.is_exception_pending().unwrap());
    assert!(host.uncaught_exceptions().is_empty());
}

#[test]
fn test_thrown_exception_is_not_replaced() {
    let (_host, env) = common::setup();
    let thrower = env
        .create_function("thrower", |env, _| {
            env.throw_range_error(Some("ERR_OUT_OF_RANGE"), "too far")?;
            Err(Error::PendingException)
        })
        .unwrap();
    let outer = {
        let thrower = env.create_reference(thrower, 1).unwrap();
        env.create_function("outer", move |env, _| {
            let inner = thrower.get()?.ok_or(Error::Failed)?;
            let recv = env.get_undefined()?;
            env.call_function(recv, inner, &[])
        })
        .unwrap()
    };

    let recv = env.get_undefined().unwrap();
    assert!(env.call_function(recv, outer, &[]).unwrap_err().is_pending_exception());
    let exception = env.take_pending_exception().unwrap().expect("exception");
    assert_eq!(error_code(&env, exception), "ERR_OUT_OF_RANGE");
    assert_eq!(error_message(&env, exception), "too far");
}

#[test]
fn test_checkpoint_escalates_uncaught_exception() {
    let (host, env) = common::setup();
    let failing = env
        .create_function("failing", |env, _| {
            env.throw_error(None, "boom")?;
            Err(Error::PendingException)
        })
        .unwrap();
    let recv = env.get_undefined().unwrap();

    let err = env
        .call_function_with_checkpoint(recv, failing, &[])
        .unwrap_err();
    assert!(matches!(err, Error::UncaughtException));
    assert!(!env.is_exception_pending().unwrap());
    assert_eq!(host.uncaught_exceptions(), ["Error: boom"]);

    let fine = env
        .create_function("fine", |env, _| env.create_int32(1))
        .unwrap();
    let result = env.call_function_with_checkpoint(recv, fine, &[]).unwrap();
    assert_eq!(env.get_value_int32(result).unwrap(), 1);
}

#[test]
fn test_define_properties() {
    let (_host, env) = common::setup();
    let level = Rc::new(Cell::new(0));
    let object = env.create_object().unwrap();
    let fixed = env.create_int32(1).unwrap();
    let key = env.symbol_for("secret").unwrap();
    let secret = env.create_string_utf8("hidden").unwrap();

    let read = Rc::clone(&level);
    let write = Rc::clone(&level);
    env.define_properties(
        object,
        &[
            PropertyDescriptor::value("fixed", fixed),
            PropertyDescriptor::value("secret", secret).keyed(key),
            PropertyDescriptor::method("double", |env, info| {
                let value = info.arg(0).ok_or(Error::InvalidArgument("missing"))?;
                env.create_int32(env.get_value_int32(value)? * 2)
            })
            .attributes(PropertyAttributes::ENUMERABLE),
            PropertyDescriptor::accessor("level")
                .getter(move |env, _| env.create_int32(read.get()))
                .setter(move |env, info| {
                    let value = info.arg(0).ok_or(Error::InvalidArgument("missing"))?;
                    write.set(env.get_value_int32(value)?);
                    env.get_undefined()
                })
                .attributes(PropertyAttributes::ENUMERABLE),
        ],
    )
    .unwrap();

    env.set_named_property(object, "fixed", env.create_int32(2).unwrap())
        .unwrap();
    let value = env.get_named_property(object, "fixed").unwrap();
    assert_eq!(env.get_value_int32(value).unwrap(), 1);

    let value = env.get_property(object, key).unwrap();
    assert_eq!(env.get_value_string_utf8(value).unwrap(), "hidden");
    assert!(!env.has_named_property(object, "secret").unwrap());

    let double = env.get_named_property(object, "double").unwrap();
    let result = env
        .call_function(object, double, &[env.create_int32(21).unwrap()])
        .unwrap();
    assert_eq!(env.get_value_int32(result).unwrap(), 42);

    env.set_named_property(object, "level", env.create_int32(5).unwrap())
        .unwrap();
    assert_eq!(level.get(), 5);
    let value = env.get_named_property(object, "level").unwrap();
    assert_eq!(env.get_value_int32(value).unwrap(), 5);

    let names = env.get_property_names(object).unwrap();
    let mut names: Vec<String> = env
        .get_array_elements(names, 0, 16)
        .unwrap()
        .into_iter()
        .map(|name| env.get_value_string_utf8(name).unwrap())
        .collect();
    names.sort();
    assert_eq!(names, ["double", "level"]);
}

#[test]
fn test_empty_accessor_is_rejected() {
    let (_host, env) = common::setup();
    let object = env.create_object().unwrap();
    let err = env
        .define_properties(object, &[PropertyDescriptor::accessor("nothing")])
        .unwrap_err();
    assert!(matches!(err, Error::Usage(UsageViolation::EmptyAccessor)));
    assert!(!env.has_named_property(object, "nothing").unwrap());
}

struct Point {
    x: f64,
    y: f64,
}

#[test]
fn test_define_class() {
    let (_host, env) = common::setup();
    let origin = env.create_int32(0).unwrap();
    let class = env
        .define_class(
            "Point",
            |env, info| {
                assert!(info.is_construct_call());
                let x = env.get_value_double(info.arg(0).ok_or(Error::InvalidArgument("x"))?)?;
                let y = env.get_value_double(info.arg(1).ok_or(Error::InvalidArgument("y"))?)?;
                env.wrap(info.this(), Point { x, y })?;
                Ok(info.this())
            },
            &[
                PropertyDescriptor::method("norm", |env, info| {
                    let point = env.unwrap::<Point>(info.this())?;
                    env.create_double(point.x.hypot(point.y))
                }),
                PropertyDescriptor::value("ORIGIN", origin).attributes(PropertyAttributes::STATIC),
            ],
        )
        .unwrap();

    let args = [env.create_double(3.0).unwrap(), env.create_double(4.0).unwrap()];
    let point = env.new_instance(class, &args).unwrap();
    assert!(env.instanceof(point, class).unwrap());

    let norm = env.get_named_property(point, "norm").unwrap();
    let result = env.call_function(point, norm, &[]).unwrap();
    assert_eq!(env.get_value_double(result).unwrap(), 5.0);

    assert!(env.has_named_property(class, "ORIGIN").unwrap());
    assert!(!env.has_named_property(point, "ORIGIN").unwrap());
}

#[test]
fn test_keyed_and_indexed_access() {
    let (_host, env) = common::setup();
    let object = env.create_object().unwrap();
    let key = env.create_string_utf8("answer").unwrap();
    env.set_property(object, key, env.create_int32(42).unwrap())
        .unwrap();
    assert!(env.has_property(object, key).unwrap());
    assert!(env.delete_property(object, key).unwrap());
    assert!(!env.has_property(object, key).unwrap());

    env.set_named_property(object, "label", env.create_string_utf8("x").unwrap())
        .unwrap();
    assert!(env.has_named_property(object, "label").unwrap());
    assert!(env.delete_named_property(object, "label").unwrap());
    assert!(!env.has_named_property(object, "label").unwrap());
    assert!(env.delete_named_property(object, "label").unwrap());

    let array = env.create_array_with_length(2).unwrap();
    assert!(env.is_array(array).unwrap());
    let values = [
        env.create_int32(10).unwrap(),
        env.create_int32(11).unwrap(),
        env.create_int32(12).unwrap(),
    ];
    env.set_array_elements(array, &values, 1).unwrap();
    assert_eq!(env.get_array_length(array).unwrap(), 4);
    assert!(env.has_element(array, 3).unwrap());

    let tail = env.get_array_elements(array, 2, 10).unwrap();
    let tail: Vec<i32> = tail
        .into_iter()
        .map(|value| env.get_value_int32(value).unwrap())
        .collect();
    assert_eq!(tail, [11, 12]);

    assert!(env.delete_element(array, 3).unwrap());
    let hole = env.get_element(array, 3).unwrap();
    assert!(env.is_undefined(hole).unwrap());
}
