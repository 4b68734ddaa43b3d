// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cascading value supplier abstraction.

use core::any::TypeId;
use std::sync::Arc;

use understory_parameter::{CascadingParameterRequest, ParameterValue, names_equal_ignore_case};

use crate::subscription::CascadingSubscriber;
use crate::tree::ComponentIdentity;

/// A source of values for cascading parameters.
///
/// Suppliers come in three flavours:
///
/// - **Fixed**: the value never changes, so subscription is never needed.
///   Calling [`subscribe`](Self::subscribe) or
///   [`unsubscribe`](Self::unsubscribe) on a fixed supplier is a programming
///   error and panics.
/// - **Dynamic**: holds a value and notifies subscribers when it changes.
/// - **Derived**: computes values on demand from an external source (the
///   query string, persisted state) selected by the request's source tag.
pub trait CascadingValueSupplier: Send + Sync + 'static {
    /// Returns `true` if the supplied value can never change.
    fn is_fixed(&self) -> bool;

    /// Returns `true` if this supplier can answer `request`.
    fn can_supply(&self, request: &CascadingParameterRequest) -> bool;

    /// Reads the value for `request` on behalf of `component`.
    ///
    /// `None` means there is nothing to supply right now and the consuming
    /// property should keep its current value.
    fn current_value(
        &self,
        request: &CascadingParameterRequest,
        component: &ComponentIdentity,
    ) -> Option<ParameterValue>;

    /// Registers `subscriber` for change notifications.
    ///
    /// Must be called from inside the subscriber's dispatcher.
    fn subscribe(
        &self,
        subscriber: Arc<dyn CascadingSubscriber>,
        request: &CascadingParameterRequest,
    );

    /// Removes `subscriber`; a no-op if it is not subscribed.
    fn unsubscribe(
        &self,
        subscriber: &dyn CascadingSubscriber,
        request: &CascadingParameterRequest,
    );
}

/// The matching rule of plain (untagged) cascading values.
///
/// `request` matches when it carries no source tag, asks for exactly
/// `value_type`, and either neither side is named or both names are equal
/// ignoring case.
///
/// ```rust
/// use core::any::TypeId;
/// use understory_cascade::matches_plain_request;
/// use understory_parameter::{CascadingAttribute, CascadingParameterRequest};
///
/// let theme = CascadingParameterRequest::new::<String>("Theme", CascadingAttribute::named("theme"));
/// assert!(matches_plain_request(&theme, TypeId::of::<String>(), Some("Theme")));
/// assert!(!matches_plain_request(&theme, TypeId::of::<String>(), Some("Locale")));
/// assert!(!matches_plain_request(&theme, TypeId::of::<String>(), None));
/// ```
#[must_use]
pub fn matches_plain_request(
    request: &CascadingParameterRequest,
    value_type: TypeId,
    name: Option<&str>,
) -> bool {
    if request.source().is_some() || request.value_type() != value_type {
        return false;
    }
    match (request.lookup_name(), name) {
        (None, None) => true,
        (Some(requested), Some(supplied)) => names_equal_ignore_case(requested, supplied),
        _ => false,
    }
}
