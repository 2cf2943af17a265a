//! Native data attached to engine objects: wrapping, finalizers and type tags.
//!
//! Wrapped data is stored as `Rc<T>` and recovered by downcasting, so
//! unwrapping as the wrong type fails with [`Error::TypeMismatch`]
//! instead of reinterpreting memory. Type tags give the same guarantee
//! against objects built by other modules.
//!
//! Finalizers run on the engine thread some time after the object
//! becomes unreachable, or during teardown at the latest. Their order is
//! unspecified.

use std::rc::Rc;

use otter_napi_sys::napi_finalize;

#[cfg(feature = "napi5")]
use crate::capability::version;
use crate::env::Env;
#[cfg(feature = "napi8")]
use crate::error::Error;
use crate::error::{Result, check};
use crate::handle::Value;
#[cfg(feature = "napi8")]
use crate::types::TypeTag;
use crate::value::downcast;

impl Env {
    /// Attach `data` to `object`. An object carries at most one wrap.
    pub fn wrap<T: 'static>(&self, object: Value<'_>, data: T) -> Result<()> {
        check(self.host().wrap(self.raw(), object.raw(), Rc::new(data), None))
    }

    /// Like [`Env::wrap`], running `finalize` once `object` is collected.
    pub fn wrap_with_finalizer<T, F>(&self, object: Value<'_>, data: T, finalize: F) -> Result<()>
    where
        T: 'static,
        F: FnOnce(&Env, Rc<T>) + 'static,
    {
        let data = Rc::new(data);
        let finalize = self.finalizer_with(Rc::clone(&data), finalize);
        check(
            self.host()
                .wrap(self.raw(), object.raw(), data, Some(finalize)),
        )
    }

    pub fn unwrap<T: 'static>(&self, object: Value<'_>) -> Result<Rc<T>> {
        let data = check(self.host().unwrap(self.raw(), object.raw()))?;
        downcast(data)
    }

    /// Detach the wrapped data. Its finalizer is dropped without running.
    pub fn remove_wrap<T: 'static>(&self, object: Value<'_>) -> Result<Rc<T>> {
        let data = check(self.host().remove_wrap(self.raw(), object.raw()))?;
        downcast(data)
    }

    /// Register an additional finalizer on `object`, independent of any wrap.
    #[cfg(feature = "napi5")]
    pub fn add_finalizer<T, F>(&self, object: Value<'_>, data: T, finalize: F) -> Result<()>
    where
        T: 'static,
        F: FnOnce(&Env, T) + 'static,
    {
        self.require("add_finalizer", version::FINALIZERS)?;
        let env = self.clone();
        let finalize: napi_finalize = Box::new(move |_| finalize(&env, data));
        check(self.host().add_finalizer(self.raw(), object.raw(), finalize))
    }

    #[cfg(feature = "napi8")]
    pub fn type_tag_object(&self, object: Value<'_>, tag: &TypeTag) -> Result<()> {
        self.require("type_tag_object", version::TYPE_TAGS)?;
        check(
            self.host()
                .type_tag_object(self.raw(), object.raw(), &tag.to_host()),
        )
    }

    /// True only if `object` was tagged with exactly `tag`.
    #[cfg(feature = "napi8")]
    pub fn check_object_type_tag(&self, object: Value<'_>, tag: &TypeTag) -> Result<bool> {
        self.require("check_object_type_tag", version::TYPE_TAGS)?;
        check(
            self.host()
                .check_object_type_tag(self.raw(), object.raw(), &tag.to_host()),
        )
    }

    /// Unwrap `object` after verifying its type tag.
    #[cfg(feature = "napi8")]
    pub fn unwrap_tagged<T: 'static>(&self, object: Value<'_>, tag: &TypeTag) -> Result<Rc<T>> {
        if !self.check_object_type_tag(object, tag)? {
            return Err(Error::type_mismatch(
                std::any::type_name::<T>(),
                "object with a different type tag",
            ));
        }
        self.unwrap(object)
    }

    pub(crate) fn finalizer_with<T, F>(&self, data: Rc<T>, finalize: F) -> napi_finalize
    where
        T: 'static,
        F: FnOnce(&Env, Rc<T>) + 'static,
    {
        let env = self.clone();
        Box::new(move |_| finalize(&env, data))
    }
}
