//! Error construction, throwing and pending exceptions

mod common;

use otter_napi::{
    Env, Error, Value, throw_errorf, throw_range_errorf, throw_syntax_errorf, throw_type_errorf,
};

fn read_string(env: &Env, object: Value<'_>, name: &str) -> String {
    let value = env.get_named_property(object, name).unwrap();
    env.get_value_string_utf8(value).unwrap()
}

#[test]
fn test_created_errors_are_not_thrown() {
    let (_host, env) = common::setup();
    let error = env.create_error(Some("ERR_PLAIN"), "plain").unwrap();
    let type_error = env.create_type_error(None, "typed").unwrap();
    let range_error = env.create_range_error(Some("ERR_RANGE"), "ranged").unwrap();
    let syntax_error = env.create_syntax_error(None, "parsed").unwrap();

    for value in [error, type_error, range_error, syntax_error] {
        assert!(env.is_error(value).unwrap());
    }
    assert!(!env.is_exception_pending().unwrap());
    assert_eq!(read_string(&env, error, "code"), "ERR_PLAIN");
    assert_eq!(read_string(&env, range_error, "message"), "ranged");
    assert!(!env.has_named_property(type_error, "code").unwrap());
}

#[test]
fn test_throw_leaves_one_pending_exception() {
    let (_host, env) = common::setup();
    env.throw_type_error(Some("ERR_FIRST"), "first").unwrap();
    assert!(env.is_exception_pending().unwrap());

    let err = env.throw_error(None, "second").unwrap_err();
    assert!(err.is_pending_exception());

    let exception = env.take_pending_exception().unwrap().expect("pending");
    assert_eq!(read_string(&env, exception, "code"), "ERR_FIRST");
    assert!(env.take_pending_exception().unwrap().is_none());
}

#[test]
fn test_throw_any_value() {
    let (_host, env) = common::setup();
    let value = env.create_string_utf8("just a string").unwrap();
    env.throw(value).unwrap();
    let thrown = env.take_pending_exception().unwrap().expect("pending");
    assert!(env.strict_equals(thrown, value).unwrap());
}

#[test]
fn test_formatted_throws() {
    let (_host, env) = common::setup();
    let (index, length) = (7, 4);

    throw_errorf!(env, Some("ERR_INDEX"), "index {} exceeds {}", index, length).unwrap();
    let exception = env.take_pending_exception().unwrap().expect("pending");
    assert_eq!(read_string(&env, exception, "message"), "index 7 exceeds 4");
    assert_eq!(read_string(&env, exception, "code"), "ERR_INDEX");

    throw_type_errorf!(env, None, "expected {expected}", expected = "object").unwrap();
    let exception = env.take_pending_exception().unwrap().expect("pending");
    assert_eq!(read_string(&env, exception, "message"), "expected object");

    throw_range_errorf!(env, None, "no arguments").unwrap();
    let exception = env.take_pending_exception().unwrap().expect("pending");
    assert_eq!(read_string(&env, exception, "message"), "no arguments");

    throw_syntax_errorf!(env, Some("ERR_PARSE"), "unexpected {:?}", '}').unwrap();
    let exception = env.take_pending_exception().unwrap().expect("pending");
    assert_eq!(read_string(&env, exception, "message"), "unexpected '}'");
}

#[test]
fn test_fatal_exception_reaches_host() {
    let (host, env) = common::setup();
    let error = env.create_range_error(None, "unrecoverable").unwrap();
    env.fatal_exception(error).unwrap();
    assert_eq!(host.uncaught_exceptions(), ["RangeError: unrecoverable"]);
    assert!(!env.is_exception_pending().unwrap());
}

#[test]
fn test_error_codes_are_stable() {
    assert_eq!(Error::QueueFull.code(), "ERR_NAPI_QUEUE_FULL");
    assert_eq!(Error::Closing.code(), "ERR_NAPI_CLOSING");
    assert_eq!(Error::InvalidArgument("x").code(), "ERR_INVALID_ARG_VALUE");
    assert_eq!(Error::type_mismatch("a", "b").code(), "ERR_INVALID_ARG_TYPE");
}
