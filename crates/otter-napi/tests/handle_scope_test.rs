//! Handle scope and reference lifecycle tests

mod common;

use std::cell::Cell;
use std::rc::Rc;

use otter_napi::{Error, UsageViolation};
use otter_napi_host::HostConfig;

#[test]
fn test_nested_scopes_release_every_handle() {
    let (host, env) = common::setup();
    let baseline = host.live_handles();

    let mut scopes = Vec::new();
    for i in 0..16 {
        let scope = env.open_handle_scope().unwrap();
        env.create_int32(i).unwrap();
        env.create_string_utf8("temporary").unwrap();
        scopes.push(scope);
    }
    assert_eq!(host.scope_depth(), 16);
    assert!(host.live_handles() >= baseline + 32);

    while let Some(scope) = scopes.pop() {
        scope.close().unwrap();
    }
    assert_eq!(host.scope_depth(), 0);
    assert_eq!(host.live_handles(), baseline);
}

#[test]
fn test_dropped_scope_closes() {
    let (host, env) = common::setup();
    {
        let _scope = env.open_handle_scope().unwrap();
        env.create_object().unwrap();
        assert_eq!(host.scope_depth(), 1);
    }
    assert_eq!(host.scope_depth(), 0);
}

#[test]
fn test_out_of_order_close_is_rejected() {
    let (host, env) = common::setup();
    let outer = env.open_handle_scope().unwrap();
    let inner = env.open_handle_scope().unwrap();

    let err = outer.close().unwrap_err();
    assert!(matches!(err, Error::Usage(UsageViolation::HandleScope)));
    inner.close().unwrap();
    assert_eq!(host.scope_depth(), 1);
}

#[test]
fn test_handle_used_after_scope_close() {
    let (_host, env) = common::setup();
    let stale = {
        let scope = env.open_handle_scope().unwrap();
        let object = env.create_object().unwrap();
        scope.close().unwrap();
        object
    };
    let err = env.type_of(stale).unwrap_err();
    assert!(matches!(err, Error::Usage(UsageViolation::HandleScope)));
}

#[test]
fn test_escape_promotes_one_value() {
    let (host, env) = common::setup();
    let baseline = host.live_handles();

    let escaped = {
        let scope = env.open_escapable_handle_scope().unwrap();
        let kept = env.create_string_utf8("kept").unwrap();
        env.create_string_utf8("dropped").unwrap();
        let escaped = scope.escape(kept).unwrap();
        let err = scope.escape(kept).unwrap_err();
        assert!(matches!(err, Error::Usage(UsageViolation::EscapeCalledTwice)));
        scope.close().unwrap();
        escaped
    };

    assert_eq!(host.live_handles(), baseline + 1);
    assert_eq!(env.get_value_string_utf8(escaped).unwrap(), "kept");
}

#[test]
fn test_with_handle_scope_returns_plain_data() {
    let (host, env) = common::setup();
    let baseline = host.live_handles();
    let sum = env
        .with_handle_scope(|env| {
            let a = env.create_int32(40)?;
            let b = env.create_int32(2)?;
            Ok(env.get_value_int32(a)? + env.get_value_int32(b)?)
        })
        .unwrap();
    assert_eq!(sum, 42);
    assert_eq!(host.live_handles(), baseline);
}

#[test]
fn test_reference_counting() {
    let (_host, env) = common::setup();
    let object = env.create_object().unwrap();
    let reference = env.create_reference(object, 1).unwrap();

    assert_eq!(reference.count(), 1);
    assert_eq!(reference.increment().unwrap(), 2);
    assert_eq!(reference.decrement().unwrap(), 1);
    assert_eq!(reference.decrement().unwrap(), 0);

    let err = reference.decrement().unwrap_err();
    assert!(matches!(err, Error::Usage(UsageViolation::UnrefBelowZero)));
    assert_eq!(reference.count(), 0);
}

#[test]
fn test_strong_reference_survives_collection_until_weakened() {
    let (host, env) = common::setup();
    let reference = env
        .with_handle_scope(|env| {
            let object = env.create_object()?;
            env.set_named_property(object, "tag", env.create_int32(7)?)?;
            env.create_reference(object, 1)
        })
        .unwrap();

    host.collect_garbage();
    let tag = env
        .with_handle_scope(|env| {
            let target = reference.get()?.expect("strong target survives");
            let tag = env.get_named_property(target, "tag")?;
            env.get_value_int32(tag)
        })
        .unwrap();
    assert_eq!(tag, 7);

    reference.decrement().unwrap();
    host.collect_garbage();
    assert!(reference.get().unwrap().is_none());
}

#[test]
fn test_dropping_reference_releases_target() {
    let (host, env) = common::setup();
    let finalized = Rc::new(Cell::new(false));

    let reference = {
        let finalized = Rc::clone(&finalized);
        env.with_handle_scope(move |env| {
            let object = env.create_object()?;
            env.wrap_with_finalizer(object, 5u8, move |_, _| finalized.set(true))?;
            env.create_reference(object, 1)
        })
        .unwrap()
    };

    host.collect_garbage();
    assert!(!finalized.get());

    drop(reference);
    host.collect_garbage();
    assert!(finalized.get());
}

#[test]
fn test_explicit_delete() {
    let (_host, env) = common::setup();
    let object = env.create_object().unwrap();
    let reference = env.create_reference(object, 0).unwrap();
    assert!(reference.get().unwrap().is_some());
    reference.delete().unwrap();
}

#[test]
fn test_gc_threshold_collects_on_scope_close() {
    let (host, env) = common::setup_with(HostConfig::default().with_gc_threshold(0));
    let baseline = host.live_cells();
    env.with_handle_scope(|env| {
        for i in 0..32 {
            env.create_int32(i)?;
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(host.live_cells(), baseline);
}
