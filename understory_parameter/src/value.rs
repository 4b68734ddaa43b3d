// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased parameter values.
//!
//! This module provides [`ParameterValue`], the unit every parameter source
//! (render frames, cascading suppliers, persisted state) hands to the binder.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

/// A type-erased, reference-counted parameter value.
///
/// Cloning a `ParameterValue` clones the handle, not the value, so two clones
/// are reference-equal (see [`ParameterValue::ptr_eq`]). A value may also be
/// *null*, which stands for "no value": binding null into a property assigns
/// the property type's [`Default`].
///
/// # Example
///
/// ```rust
/// use understory_parameter::ParameterValue;
///
/// let value = ParameterValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
///
/// let shared = value.clone();
/// assert!(shared.ptr_eq(&value));
///
/// assert!(ParameterValue::null().is_null());
/// ```
#[derive(Clone)]
pub struct ParameterValue {
    inner: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl ParameterValue {
    /// Wraps a concrete value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Wraps an already shared value without copying it.
    ///
    /// Values created from the same `Arc` are reference-equal.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: Some(value),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// The null value.
    #[must_use]
    #[inline]
    pub const fn null() -> Self {
        Self {
            inner: None,
            type_name: "null",
        }
    }

    /// Returns `true` if this is the null value.
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Returns the [`TypeId`] of the contained value, or `None` for null.
    #[must_use]
    pub fn value_type(&self) -> Option<TypeId> {
        self.inner.as_deref().map(Any::type_id)
    }

    /// Returns the type name of the contained value (`"null"` for null).
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is of type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value_type() == Some(TypeId::of::<T>())
    }

    /// Attempts to downcast to a reference of type `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_deref()?.downcast_ref()
    }

    /// Attempts to downcast to a shared handle of type `T`.
    #[must_use]
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone()?.downcast().ok()
    }

    /// Returns `true` if both values are null or both point at the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for ParameterValue {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("ParameterValue(null)");
        }
        f.debug_struct("ParameterValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
