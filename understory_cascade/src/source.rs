// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value-holding suppliers: free-standing sources and tree providers.

use core::any::TypeId;
use core::fmt;
use core::marker::PhantomData;
use std::borrow::Cow;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;
use understory_parameter::{CascadingParameterRequest, ParameterValue, may_have_changed};

use crate::error::{CascadeError, NotifyError, RenderError};
use crate::subscription::{CascadingSubscriber, SubscriptionRegistry};
use crate::supplier::{CascadingValueSupplier, matches_plain_request};
use crate::tree::ComponentIdentity;

/// A cascading value owned by a service rather than a component.
///
/// Typically registered as a root supplier of a scope. A fixed source never
/// notifies; a non-fixed one notifies its subscribers through
/// [`notify_changed`](Self::notify_changed) or
/// [`notify_changed_to`](Self::notify_changed_to).
///
/// # Example
///
/// ```rust
/// use understory_cascade::{CascadingValueSource, CascadingValueSupplier};
/// use understory_parameter::{CascadingAttribute, CascadingParameterRequest};
///
/// let theme = CascadingValueSource::named("Theme", String::from("dark"), false);
///
/// let by_name = CascadingParameterRequest::new::<String>("Current", CascadingAttribute::named("theme"));
/// let other = CascadingParameterRequest::new::<String>("Locale", CascadingAttribute::named("Locale"));
/// let unnamed = CascadingParameterRequest::new::<String>("Theme", CascadingAttribute::cascading());
///
/// assert!(theme.can_supply(&by_name));
/// assert!(!theme.can_supply(&other));
/// assert!(!theme.can_supply(&unnamed));
/// ```
pub struct CascadingValueSource<T> {
    name: Option<Cow<'static, str>>,
    is_fixed: bool,
    value: RwLock<ParameterValue>,
    subscribers: SubscriptionRegistry,
    marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> CascadingValueSource<T> {
    /// An unnamed source, matched by type alone.
    #[must_use]
    pub fn new(value: T, is_fixed: bool) -> Self {
        Self::with_name(None, value, is_fixed)
    }

    /// A named source, matched by type and name.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>, value: T, is_fixed: bool) -> Self {
        Self::with_name(Some(name.into()), value, is_fixed)
    }

    fn with_name(name: Option<Cow<'static, str>>, value: T, is_fixed: bool) -> Self {
        Self {
            name,
            is_fixed,
            value: RwLock::new(ParameterValue::new(value)),
            subscribers: SubscriptionRegistry::new(),
            marker: PhantomData,
        }
    }

    /// The source's name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The current value.
    #[must_use]
    pub fn value(&self) -> ParameterValue {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current value, typed.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.value().downcast_ref::<T>().cloned()
    }

    /// Subscribers of this source.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriptionRegistry {
        &self.subscribers
    }

    /// Notifies subscribers that the current value has changed in place.
    pub async fn notify_changed(&self) -> Result<(), NotifyError> {
        if self.is_fixed {
            return Err(NotifyError::Fixed);
        }
        self.subscribers.notify().await
    }

    /// Replaces the value, then notifies subscribers.
    pub async fn notify_changed_to(&self, value: T) -> Result<(), NotifyError> {
        if self.is_fixed {
            return Err(NotifyError::Fixed);
        }
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = ParameterValue::new(value);
        self.subscribers.notify().await
    }
}

impl<T: Clone + Send + Sync + 'static> CascadingValueSupplier for CascadingValueSource<T> {
    fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    fn can_supply(&self, request: &CascadingParameterRequest) -> bool {
        matches_plain_request(request, TypeId::of::<T>(), self.name())
    }

    fn current_value(
        &self,
        _request: &CascadingParameterRequest,
        _component: &ComponentIdentity,
    ) -> Option<ParameterValue> {
        Some(self.value())
    }

    fn subscribe(
        &self,
        subscriber: Arc<dyn CascadingSubscriber>,
        _request: &CascadingParameterRequest,
    ) {
        assert!(
            !self.is_fixed,
            "cannot subscribe to a fixed cascading value source"
        );
        self.subscribers.subscribe(subscriber);
    }

    fn unsubscribe(
        &self,
        subscriber: &dyn CascadingSubscriber,
        _request: &CascadingParameterRequest,
    ) {
        assert!(
            !self.is_fixed,
            "cannot unsubscribe from a fixed cascading value source"
        );
        let identity = subscriber.identity();
        self.subscribers.unsubscribe(identity.dispatcher, identity.id);
    }
}

impl<T> fmt::Debug for CascadingValueSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadingValueSource")
            .field("type", &core::any::type_name::<T>())
            .field("name", &self.name)
            .field("is_fixed", &self.is_fixed)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

/// Parameters of a [`CascadingValue`] provider.
#[derive(Clone, Debug)]
pub struct CascadingValueParameters<T> {
    /// The value to supply.
    pub value: T,
    /// The name consumers match on, if any.
    pub name: Option<Cow<'static, str>>,
    /// Whether the value is promised never to change.
    pub is_fixed: bool,
}

impl<T> CascadingValueParameters<T> {
    /// An unnamed, non-fixed value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value,
            name: None,
            is_fixed: false,
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the value fixed.
    #[must_use]
    pub fn fixed(mut self, is_fixed: bool) -> Self {
        self.is_fixed = is_fixed;
        self
    }
}

struct ProviderState {
    value: ParameterValue,
    name: Option<Cow<'static, str>>,
    is_fixed: bool,
    initialized: bool,
}

/// A provider component that supplies a value to its descendants.
///
/// Its name and fixedness are taken from the first
/// [`set_parameters`](Self::set_parameters) call and may not change later.
/// A fixed provider keeps its first value.
pub struct CascadingValue<T> {
    state: Mutex<ProviderState>,
    subscribers: SubscriptionRegistry,
    marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> CascadingValue<T> {
    /// A provider that has not received parameters yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProviderState {
                value: ParameterValue::null(),
                name: None,
                is_fixed: false,
                initialized: false,
            }),
            subscribers: SubscriptionRegistry::new(),
            marker: PhantomData,
        }
    }

    /// The current value.
    #[must_use]
    pub fn value(&self) -> ParameterValue {
        self.lock().value.clone()
    }

    /// Subscribers of this provider.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriptionRegistry {
        &self.subscribers
    }

    /// Applies new parameters, renders the provider, then notifies
    /// subscribers if the value may have changed.
    ///
    /// `render_self` always runs before any subscriber re-renders.
    pub async fn set_parameters<R>(
        &self,
        parameters: CascadingValueParameters<T>,
        render_self: R,
    ) -> Result<(), CascadeError>
    where
        R: FnOnce() -> Result<(), RenderError>,
    {
        let changed = {
            let mut state = self.lock();
            if state.initialized {
                if parameters.is_fixed != state.is_fixed {
                    return Err(CascadeError::FixednessChanged);
                }
                if parameters.name != state.name {
                    return Err(CascadeError::NameChanged);
                }
                if state.is_fixed {
                    false
                } else {
                    let value = ParameterValue::new(parameters.value);
                    let changed = may_have_changed(&state.value, &value);
                    state.value = value;
                    changed
                }
            } else {
                state.value = ParameterValue::new(parameters.value);
                state.name = parameters.name;
                state.is_fixed = parameters.is_fixed;
                state.initialized = true;
                false
            }
        };

        render_self()?;

        if changed {
            debug!(
                type_name = core::any::type_name::<T>(),
                subscribers = self.subscribers.len(),
                "cascading value changed"
            );
            self.subscribers.notify().await?;
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Default for CascadingValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> CascadingValueSupplier for CascadingValue<T> {
    fn is_fixed(&self) -> bool {
        self.lock().is_fixed
    }

    fn can_supply(&self, request: &CascadingParameterRequest) -> bool {
        matches_plain_request(request, TypeId::of::<T>(), self.lock().name.as_deref())
    }

    fn current_value(
        &self,
        _request: &CascadingParameterRequest,
        _component: &ComponentIdentity,
    ) -> Option<ParameterValue> {
        Some(self.value())
    }

    fn subscribe(
        &self,
        subscriber: Arc<dyn CascadingSubscriber>,
        _request: &CascadingParameterRequest,
    ) {
        assert!(
            !self.is_fixed(),
            "cannot subscribe to a fixed cascading value"
        );
        self.subscribers.subscribe(subscriber);
    }

    fn unsubscribe(
        &self,
        subscriber: &dyn CascadingSubscriber,
        _request: &CascadingParameterRequest,
    ) {
        assert!(
            !self.is_fixed(),
            "cannot unsubscribe from a fixed cascading value"
        );
        let identity = subscriber.identity();
        self.subscribers.unsubscribe(identity.dispatcher, identity.id);
    }
}

impl<T> fmt::Debug for CascadingValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CascadingValue")
            .field("type", &core::any::type_name::<T>())
            .field("name", &state.name)
            .field("is_fixed", &state.is_fixed)
            .field("initialized", &state.initialized)
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use understory_parameter::CascadingAttribute;

    use super::*;

    fn request(name: Option<&'static str>) -> CascadingParameterRequest {
        let attribute = match name {
            Some(name) => CascadingAttribute::named(name),
            None => CascadingAttribute::cascading(),
        };
        CascadingParameterRequest::new::<String>("Prop", attribute)
    }

    #[test]
    fn named_source_matches_name_ignoring_case() {
        let theme = CascadingValueSource::named("Theme", String::from("dark"), false);
        assert!(theme.can_supply(&request(Some("theme"))));
        assert!(theme.can_supply(&request(Some("THEME"))));
        assert!(!theme.can_supply(&request(Some("Locale"))));
        assert!(!theme.can_supply(&request(None)));
    }

    #[test]
    fn unnamed_source_matches_unnamed_requests_of_its_type() {
        let source = CascadingValueSource::new(String::from("dark"), false);
        assert!(source.can_supply(&request(None)));
        assert!(!source.can_supply(&request(Some("Theme"))));

        let number = CascadingValueSource::new(3_i32, false);
        assert!(!number.can_supply(&request(None)));
    }

    #[test]
    fn tagged_requests_are_not_plain_matches() {
        let source = CascadingValueSource::new(String::from("x"), true);
        let query =
            CascadingParameterRequest::new::<String>("Prop", CascadingAttribute::from_query());
        assert!(!source.can_supply(&query));
    }

    #[tokio::test]
    async fn fixed_source_refuses_to_notify() {
        let source = CascadingValueSource::new(1_i32, true);
        assert_eq!(source.notify_changed().await, Err(NotifyError::Fixed));
        assert_eq!(source.notify_changed_to(2).await, Err(NotifyError::Fixed));
        assert_eq!(source.get(), Some(1));
    }

    #[tokio::test]
    async fn notify_without_subscribers_updates_value() {
        let source = CascadingValueSource::new(1_i32, false);
        source.notify_changed_to(2).await.unwrap();
        assert_eq!(source.get(), Some(2));
    }

    #[tokio::test]
    async fn provider_rejects_fixedness_and_name_changes() {
        let provider = CascadingValue::<i32>::new();
        provider
            .set_parameters(CascadingValueParameters::new(1).named("Count"), || Ok(()))
            .await
            .unwrap();

        let err = provider
            .set_parameters(
                CascadingValueParameters::new(1).named("Count").fixed(true),
                || Ok(()),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CascadeError::FixednessChanged);

        let err = provider
            .set_parameters(CascadingValueParameters::new(1).named("Total"), || Ok(()))
            .await
            .unwrap_err();
        assert_eq!(err, CascadeError::NameChanged);
    }

    #[tokio::test]
    async fn fixed_provider_keeps_its_first_value() {
        let provider = CascadingValue::<i32>::new();
        provider
            .set_parameters(CascadingValueParameters::new(1).fixed(true), || Ok(()))
            .await
            .unwrap();
        provider
            .set_parameters(CascadingValueParameters::new(2).fixed(true), || Ok(()))
            .await
            .unwrap();
        assert_eq!(provider.value().downcast_ref::<i32>(), Some(&1));
        assert!(provider.is_fixed());
    }

    #[tokio::test]
    async fn render_failure_is_reported() {
        let provider = CascadingValue::<i32>::new();
        let err = provider
            .set_parameters(CascadingValueParameters::new(1), || {
                Err(RenderError::failed("boom"))
            })
            .await
            .unwrap_err();
        assert_eq!(err, CascadeError::Render(RenderError::failed("boom")));
    }

    #[test]
    #[should_panic(expected = "cannot unsubscribe from a fixed cascading value source")]
    fn unsubscribing_from_fixed_source_panics() {
        struct Nobody(ComponentIdentity);
        impl CascadingSubscriber for Nobody {
            fn identity(&self) -> &ComponentIdentity {
                &self.0
            }
            fn dispatcher(&self) -> &crate::Dispatcher {
                unreachable!("never asked")
            }
            fn cascading_value_changed(
                self: Arc<Self>,
            ) -> futures::future::BoxFuture<'static, Result<(), RenderError>> {
                Box::pin(async { Ok(()) })
            }
        }

        let mut tree = crate::ComponentTree::new(crate::dispatcher::DispatcherId::next());
        let id = tree.insert(None, "Consumer", crate::ComponentOptions::default());
        let nobody = Nobody(tree.identity(id).cloned().unwrap());
        let source = CascadingValueSource::new(1_i32, true);
        source.unsubscribe(&nobody, &request(None));
    }
}
