// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cascading supplier for properties restored from persisted state.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};
use understory_cascade::{
    CascadingSubscriber, CascadingValueSupplier, ComponentId, ComponentIdentity,
};
use understory_parameter::{
    CascadingParameterRequest, PERSISTENT_STATE_SOURCE, ParameterValue, ValueCodec,
};

use crate::error::PersistError;
use crate::key::PersistentKeyDeriver;
use crate::state::{PersistentComponentState, PersistingSubscription};

type PropertyKey = (ComponentId, &'static str);

struct Subscription {
    key: String,
    _registration: PersistingSubscription,
}

/// Supplies properties tagged with [`PERSISTENT_STATE_SOURCE`].
///
/// The first read of a property takes its value from the restored state under
/// the derived key and decodes it with the request's codec. Every later read,
/// and a first read with nothing restored, leaves the property as it is, so
/// the component owns the value from then on. Subscribing registers a
/// persisting callback that reads the property inside the component's
/// dispatcher and writes it back under the same key.
pub struct PersistentStateSupplier {
    state: Arc<PersistentComponentState>,
    keys: Arc<PersistentKeyDeriver>,
    subscriptions: Mutex<HashMap<PropertyKey, Subscription>>,
    delivered: Mutex<HashSet<PropertyKey>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PersistentStateSupplier {
    /// A supplier over `state`, deriving keys with `keys`.
    #[must_use]
    pub fn new(state: Arc<PersistentComponentState>, keys: Arc<PersistentKeyDeriver>) -> Self {
        Self {
            state,
            keys,
            subscriptions: Mutex::new(HashMap::new()),
            delivered: Mutex::new(HashSet::new()),
        }
    }

    /// The underlying state.
    #[must_use]
    pub fn state(&self) -> &Arc<PersistentComponentState> {
        &self.state
    }

    /// Number of subscribed properties.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    fn key_for(
        &self,
        request: &CascadingParameterRequest,
        component: &ComponentIdentity,
    ) -> String {
        self.keys.derive_for(component, request.property_name())
    }
}

fn persist_property(
    state: &PersistentComponentState,
    codec: &dyn ValueCodec,
    key: &str,
    value: Option<ParameterValue>,
) -> Result<(), PersistError> {
    match value {
        Some(value) if !value.is_null() => {
            state.persist_as_bytes(key, codec.encode(&value)?)
        }
        _ => Ok(()),
    }
}

impl CascadingValueSupplier for PersistentStateSupplier {
    fn is_fixed(&self) -> bool {
        false
    }

    fn can_supply(&self, request: &CascadingParameterRequest) -> bool {
        request.source() == Some(PERSISTENT_STATE_SOURCE) && request.codec().is_some()
    }

    fn current_value(
        &self,
        request: &CascadingParameterRequest,
        component: &ComponentIdentity,
    ) -> Option<ParameterValue> {
        let property = (component.id, request.property_name());
        if !lock(&self.delivered).insert(property) {
            return None;
        }

        let codec = request.codec()?;
        let key = self.key_for(request, component);
        let bytes = self.state.try_take_bytes(&key)?;
        match codec.decode(&bytes) {
            Ok(value) => {
                debug!(
                    component = ?component.id,
                    property = request.property_name(),
                    "restored persisted property"
                );
                Some(value)
            }
            Err(err) => {
                warn!(
                    component = ?component.id,
                    property = request.property_name(),
                    error = %err,
                    "cannot decode persisted property"
                );
                None
            }
        }
    }

    fn subscribe(
        &self,
        subscriber: Arc<dyn CascadingSubscriber>,
        request: &CascadingParameterRequest,
    ) {
        let Some(codec) = request.codec().cloned() else {
            return;
        };
        let identity = subscriber.identity().clone();
        let property = request.property_name();
        let key = self.key_for(request, &identity);

        let mut subscriptions = lock(&self.subscriptions);
        if subscriptions.contains_key(&(identity.id, property)) {
            return;
        }
        if subscriptions.values().any(|existing| existing.key == key) {
            warn!(
                component = ?identity.id,
                type_name = identity.type_name,
                property,
                "persistent state key is already in use; give sibling components distinct keys"
            );
        }

        let state = Arc::clone(&self.state);
        let weak = Arc::downgrade(&subscriber);
        let callback_key = key.clone();
        let registration = self.state.register_on_persisting(
            move || {
                let state = Arc::clone(&state);
                let codec = Arc::clone(&codec);
                let key = callback_key.clone();
                let subscriber = weak.upgrade();
                Box::pin(async move {
                    let Some(subscriber) = subscriber else {
                        return Ok(());
                    };
                    let reader = Arc::clone(&subscriber);
                    let value = subscriber
                        .dispatcher()
                        .invoke(move || async move { reader.read_property(property) })
                        .await?;
                    persist_property(&state, codec.as_ref(), &key, value)
                })
            },
            identity.render_mode,
        );

        subscriptions.insert(
            (identity.id, property),
            Subscription {
                key,
                _registration: registration,
            },
        );
    }

    fn unsubscribe(
        &self,
        subscriber: &dyn CascadingSubscriber,
        request: &CascadingParameterRequest,
    ) {
        let property = (subscriber.identity().id, request.property_name());
        lock(&self.subscriptions).remove(&property);
        lock(&self.delivered).remove(&property);
    }
}

impl fmt::Debug for PersistentStateSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentStateSupplier")
            .field("state", &self.state)
            .field("subscriptions", &self.subscription_count())
            .field("delivered", &lock(&self.delivered).len())
            .finish_non_exhaustive()
    }
}
