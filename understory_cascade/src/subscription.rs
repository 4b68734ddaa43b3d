// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-dispatcher subscriber sets and change notification.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, join_all};
use hashbrown::HashMap;
use tracing::debug;
use understory_parameter::ParameterValue;

use crate::dispatcher::{Dispatcher, DispatcherId};
use crate::error::{NotifyError, RenderError};
use crate::tree::{ComponentId, ComponentIdentity};

/// A component that re-renders when a cascading value it consumes changes.
pub trait CascadingSubscriber: Send + Sync + 'static {
    /// The subscribing component.
    fn identity(&self) -> &ComponentIdentity;

    /// The dispatcher the component lives on.
    fn dispatcher(&self) -> &Dispatcher;

    /// Re-reads cascading parameters and re-renders.
    ///
    /// Always invoked from inside [`CascadingSubscriber::dispatcher`].
    fn cascading_value_changed(self: Arc<Self>) -> BoxFuture<'static, Result<(), RenderError>>;

    /// Reads the current value of one of the component's properties.
    ///
    /// Used by suppliers that save property values, such as persisted state.
    fn read_property(&self, name: &str) -> Option<ParameterValue> {
        let _ = name;
        None
    }
}

struct DispatcherSubscribers {
    dispatcher: Dispatcher,
    subscribers: HashMap<ComponentId, Arc<dyn CascadingSubscriber>>,
}

type Subscribers = Arc<Mutex<HashMap<DispatcherId, DispatcherSubscribers>>>;

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, HashMap<DispatcherId, DispatcherSubscribers>> {
    subscribers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The subscribers of one dynamic supplier, grouped by dispatcher.
///
/// A component is subscribed at most once per dispatcher; subscribing again
/// is a no-op, as is unsubscribing a component that is not subscribed.
/// Dispatchers whose last subscriber leaves are forgotten.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: Subscribers,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` to its dispatcher's set.
    ///
    /// Returns `false` if it was already subscribed.
    ///
    /// Must be called from inside the subscriber's dispatcher; debug builds
    /// assert this.
    pub fn subscribe(&self, subscriber: Arc<dyn CascadingSubscriber>) -> bool {
        let dispatcher = subscriber.dispatcher().clone();
        debug_assert!(
            dispatcher.is_current(),
            "cascading subscriptions must be made from inside the subscriber's dispatcher `{}`",
            dispatcher.name()
        );
        let component = subscriber.identity().id;
        let mut subscribers = lock(&self.subscribers);
        let entry = subscribers
            .entry(dispatcher.id())
            .or_insert_with(|| DispatcherSubscribers {
                dispatcher: dispatcher.clone(),
                subscribers: HashMap::new(),
            });
        if entry.subscribers.contains_key(&component) {
            return false;
        }
        entry.subscribers.insert(component, subscriber);
        debug!(component = ?component, dispatcher = %dispatcher.name(), "subscribed");
        true
    }

    /// Removes `component` from `dispatcher`'s set.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, dispatcher: DispatcherId, component: ComponentId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let Some(entry) = subscribers.get_mut(&dispatcher) else {
            return false;
        };
        let removed = entry.subscribers.remove(&component).is_some();
        if entry.subscribers.is_empty() {
            subscribers.remove(&dispatcher);
        }
        if removed {
            debug!(component = ?component, "unsubscribed");
        }
        removed
    }

    /// Returns `true` if `component` is subscribed on any dispatcher.
    #[must_use]
    pub fn is_subscribed(&self, component: ComponentId) -> bool {
        lock(&self.subscribers)
            .values()
            .any(|entry| entry.subscribers.contains_key(&component))
    }

    /// Total number of subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.subscribers)
            .values()
            .map(|entry| entry.subscribers.len())
            .sum()
    }

    /// Returns `true` if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.subscribers).is_empty()
    }

    /// Number of dispatchers with at least one subscriber.
    #[must_use]
    pub fn dispatcher_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Tells every subscriber that the value changed and waits for all of
    /// them to re-render.
    ///
    /// One batch is posted to each dispatcher with subscribers. Batches run
    /// concurrently with each other; within a batch, subscribers re-render one
    /// at a time, rootmost first. The subscriber set is read inside the
    /// dispatcher, so subscriptions made or dropped before the batch starts
    /// are honoured.
    ///
    /// A failing subscriber does not stop the others. Once every batch has
    /// finished, the first failure is returned, taking batches in order of
    /// [`DispatcherId`] (dispatcher creation order).
    pub async fn notify(&self) -> Result<(), NotifyError> {
        let mut dispatchers: Vec<Dispatcher> = lock(&self.subscribers)
            .values()
            .map(|entry| entry.dispatcher.clone())
            .collect();
        if dispatchers.is_empty() {
            return Ok(());
        }
        dispatchers.sort_by_key(Dispatcher::id);
        debug!(dispatchers = dispatchers.len(), "notifying cascading subscribers");

        let batches = dispatchers
            .into_iter()
            .map(|dispatcher| notify_dispatcher(Arc::clone(&self.subscribers), dispatcher));
        join_all(batches).await.into_iter().collect()
    }
}

async fn notify_dispatcher(
    subscribers: Subscribers,
    dispatcher: Dispatcher,
) -> Result<(), NotifyError> {
    let id = dispatcher.id();
    dispatcher
        .invoke(move || async move {
            let mut batch: Vec<Arc<dyn CascadingSubscriber>> = lock(&subscribers)
                .get(&id)
                .map(|entry| entry.subscribers.values().cloned().collect())
                .unwrap_or_default();
            batch.sort_by_key(|subscriber| {
                let identity = subscriber.identity();
                (identity.depth, identity.id)
            });

            let mut first_error = None;
            for subscriber in batch {
                let component = subscriber.identity().id;
                if let Err(source) = subscriber.cascading_value_changed().await {
                    first_error.get_or_insert(NotifyError::Subscriber { component, source });
                }
            }
            first_error.map_or(Ok(()), Err)
        })
        .await?
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("dispatchers", &self.dispatcher_count())
            .field("subscriptions", &self.len())
            .finish()
    }
}
