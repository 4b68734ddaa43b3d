// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component state: parameter binding, cascading subscriptions and re-render.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::BoxFuture;
use tracing::{debug, trace};
use understory_parameter::{
    CascadingParameter, OwnedParameters, ParameterSchema, ParameterTarget, ParameterValue,
    ParameterView,
};

use crate::dispatcher::Dispatcher;
use crate::error::{CascadeError, RenderError};
use crate::resolve::BoundSupplier;
use crate::scope::CascadeScope;
use crate::subscription::CascadingSubscriber;
use crate::tree::{ComponentHandle, ComponentId, ComponentIdentity};

/// A component whose parameters are bound through its [`ParameterSchema`].
pub trait Component: ParameterTarget {
    /// Produces output from the current property values.
    fn render(&mut self) -> Result<(), RenderError>;
}

struct Resolved {
    bound: Vec<BoundSupplier>,
    parameters: Vec<CascadingParameter>,
    subscribed: Vec<BoundSupplier>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live component instance in a [`CascadeScope`].
///
/// Cascading parameters are resolved on the first
/// [`set_parameters`](Self::set_parameters) call, and the component subscribes
/// to every non-fixed supplier it was matched with. When one of them
/// notifies, the last direct parameters are re-bound together with the
/// current cascading values and the component renders again. Removing the
/// component from its scope unsubscribes it.
pub struct ComponentState<C> {
    this: Weak<Self>,
    scope: Weak<CascadeScope>,
    identity: ComponentIdentity,
    dispatcher: Dispatcher,
    schema: Arc<ParameterSchema<C>>,
    component: Mutex<C>,
    last_direct: Mutex<OwnedParameters>,
    resolved: Mutex<Option<Arc<Resolved>>>,
}

impl<C: Component> ComponentState<C> {
    pub(crate) fn new(
        scope: Weak<CascadeScope>,
        identity: ComponentIdentity,
        dispatcher: Dispatcher,
        schema: Arc<ParameterSchema<C>>,
        component: C,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            scope,
            identity,
            dispatcher,
            schema,
            component: Mutex::new(component),
            last_direct: Mutex::new(OwnedParameters::new()),
            resolved: Mutex::new(None),
        })
    }

    /// The component's id.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.identity.id
    }

    /// Runs `f` with the component.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&lock(&self.component))
    }

    /// Names of the properties matched with a supplier, in resolution order.
    ///
    /// Empty until the first [`set_parameters`](Self::set_parameters) call.
    #[must_use]
    pub fn cascading_properties(&self) -> Vec<&'static str> {
        lock(&self.resolved).as_ref().map_or_else(Vec::new, |resolved| {
            resolved
                .bound
                .iter()
                .map(|bound| bound.request().property_name())
                .collect()
        })
    }

    /// Binds `direct` plus the current cascading values, then renders.
    ///
    /// Must be called from inside the component's dispatcher.
    pub fn set_parameters(&self, direct: ParameterView<'_>) -> Result<(), CascadeError> {
        let resolved = self.resolve()?;
        *lock(&self.last_direct) = direct.to_owned_parameters();
        self.bind_and_render(direct, &resolved)?;
        Ok(())
    }

    /// Queues a parameter pass on the component's dispatcher and waits for it.
    pub async fn update(self: &Arc<Self>, direct: OwnedParameters) -> Result<(), CascadeError> {
        let this = Arc::clone(self);
        self.dispatcher
            .invoke(move || async move { this.set_parameters(direct.view()) })
            .await
            .map_err(RenderError::from)?
    }

    fn resolve(&self) -> Result<Arc<Resolved>, CascadeError> {
        let mut slot = lock(&self.resolved);
        if let Some(resolved) = slot.as_ref() {
            return Ok(Arc::clone(resolved));
        }

        let scope = self.scope.upgrade().ok_or(CascadeError::ScopeDropped)?;
        let bound = scope.resolve(&self.identity, self.schema.cascading_requests());
        let parameters = bound
            .iter()
            .map(|bound| bound.to_parameter(&self.identity))
            .collect();

        let mut subscribed = Vec::new();
        if let Some(this) = self.this.upgrade() {
            for binding in bound.iter().filter(|binding| !binding.supplier().is_fixed()) {
                let subscriber: Arc<dyn CascadingSubscriber> = this.clone();
                binding.supplier().subscribe(subscriber, binding.request());
                subscribed.push(binding.clone());
            }
        }
        debug!(
            component = ?self.identity.id,
            type_name = self.identity.type_name,
            resolved = bound.len(),
            subscribed = subscribed.len(),
            "resolved cascading parameters"
        );

        let resolved = Arc::new(Resolved {
            bound,
            parameters,
            subscribed,
        });
        *slot = Some(Arc::clone(&resolved));
        Ok(resolved)
    }

    fn bind_and_render(
        &self,
        direct: ParameterView<'_>,
        resolved: &Resolved,
    ) -> Result<(), RenderError> {
        let view = direct.with_cascading(&resolved.parameters);
        let mut component = lock(&self.component);
        self.schema.apply(view, &mut component)?;
        component.render()
    }

    fn rerender(&self) -> Result<(), RenderError> {
        let Some(resolved) = lock(&self.resolved).clone() else {
            // Disposed.
            return Ok(());
        };
        trace!(component = ?self.identity.id, "cascading value changed");
        let direct = lock(&self.last_direct).clone();
        self.bind_and_render(direct.view(), &resolved)
    }
}

impl<C: Component> CascadingSubscriber for ComponentState<C> {
    fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn cascading_value_changed(self: Arc<Self>) -> BoxFuture<'static, Result<(), RenderError>> {
        Box::pin(async move { self.rerender() })
    }

    fn read_property(&self, name: &str) -> Option<ParameterValue> {
        self.schema.read(&lock(&self.component), name)
    }
}

impl<C: Component> ComponentHandle for ComponentState<C> {
    fn dispose(&self) {
        let Some(resolved) = lock(&self.resolved).take() else {
            return;
        };
        for binding in &resolved.subscribed {
            binding.supplier().unsubscribe(self, binding.request());
        }
        debug!(component = ?self.identity.id, "component disposed");
    }
}

impl<C> fmt::Debug for ComponentState<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentState")
            .field("identity", &self.identity)
            .field("dispatcher", &self.dispatcher)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
