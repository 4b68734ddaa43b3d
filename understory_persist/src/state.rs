// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Consume-once restored state and persisting callbacks.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::future::BoxFuture;
use hashbrown::HashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use understory_cascade::RenderMode;

use crate::error::PersistError;

/// Persisted state: string keys to opaque bytes.
pub type PersistedState = HashMap<String, Vec<u8>>;

/// A callback run during a persist pass.
pub type PersistingCallback =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), PersistError>> + Send + Sync>;

struct Registration {
    id: u64,
    render_mode: Option<RenderMode>,
    callback: PersistingCallback,
}

#[derive(Default)]
struct Registrations {
    next_id: u64,
    entries: Vec<Registration>,
}

type SharedRegistrations = Arc<Mutex<Registrations>>;

#[derive(Default)]
struct StateInner {
    existing: Option<PersistedState>,
    persisting: bool,
    current: PersistedState,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Component state carried across a render-mode transition.
///
/// Restored entries are consumed at most once: after
/// [`try_take_bytes`](Self::try_take_bytes) returns an entry, later lookups
/// of the same key find nothing. Writes are only accepted while a persist
/// pass is running, and each key may be written once per pass.
///
/// ```rust
/// use understory_persist::{PersistedState, PersistentComponentState};
///
/// let state = PersistentComponentState::new();
/// let mut restored = PersistedState::new();
/// restored.insert(String::from("count"), b"3".to_vec());
/// state.initialize_existing_state(restored).unwrap();
///
/// assert_eq!(state.try_take_from_json::<u32>("count").unwrap(), Some(3));
/// assert_eq!(state.try_take_from_json::<u32>("count").unwrap(), None);
/// ```
#[derive(Default)]
pub struct PersistentComponentState {
    inner: Mutex<StateInner>,
    registrations: SharedRegistrations,
}

impl PersistentComponentState {
    /// Creates state with nothing restored.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the restored entries. May be called once.
    pub fn initialize_existing_state(&self, state: PersistedState) -> Result<(), PersistError> {
        let mut inner = lock(&self.inner);
        if inner.existing.is_some() {
            return Err(PersistError::AlreadyInitialized);
        }
        debug!(entries = state.len(), "restored persisted component state");
        inner.existing = Some(state);
        Ok(())
    }

    /// Removes and returns the restored bytes under `key`.
    #[must_use]
    pub fn try_take_bytes(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.inner).existing.as_mut()?.remove(key)
    }

    /// Removes the restored entry under `key` and decodes it as JSON.
    pub fn try_take_from_json<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, PersistError> {
        self.try_take_bytes(key)
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(PersistError::from)
    }

    /// Writes `bytes` under `key` in the running persist pass.
    pub fn persist_as_bytes(
        &self,
        key: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<(), PersistError> {
        let key = key.into();
        let mut inner = lock(&self.inner);
        if !inner.persisting {
            return Err(PersistError::NotPersisting);
        }
        if inner.current.contains_key(&key) {
            return Err(PersistError::DuplicateKey { key });
        }
        inner.current.insert(key, bytes);
        Ok(())
    }

    /// Encodes `value` as JSON and writes it under `key`.
    pub fn persist_as_json<T: Serialize + ?Sized>(
        &self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), PersistError> {
        self.persist_as_bytes(key, serde_json::to_vec(value)?)
    }

    /// Registers `callback` to run on every persist pass.
    ///
    /// With a render mode, the callback only runs when the store accepts
    /// that mode. Dropping the returned subscription unregisters it.
    pub fn register_on_persisting<F>(
        &self,
        callback: F,
        render_mode: Option<RenderMode>,
    ) -> PersistingSubscription
    where
        F: Fn() -> BoxFuture<'static, Result<(), PersistError>> + Send + Sync + 'static,
    {
        let mut registrations = lock(&self.registrations);
        let id = registrations.next_id;
        registrations.next_id += 1;
        registrations.entries.push(Registration {
            id,
            render_mode,
            callback: Arc::new(callback),
        });
        PersistingSubscription {
            id,
            registrations: Arc::downgrade(&self.registrations),
        }
    }

    /// Number of registered persisting callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        lock(&self.registrations).entries.len()
    }

    /// Returns `true` while a persist pass is running.
    #[must_use]
    pub fn is_persisting(&self) -> bool {
        lock(&self.inner).persisting
    }

    pub(crate) fn begin_persisting(&self) -> Result<(), PersistError> {
        let mut inner = lock(&self.inner);
        if inner.persisting {
            return Err(PersistError::AlreadyPersisting);
        }
        inner.persisting = true;
        inner.current.clear();
        Ok(())
    }

    pub(crate) fn end_persisting(&self) -> PersistedState {
        let mut inner = lock(&self.inner);
        inner.persisting = false;
        core::mem::take(&mut inner.current)
    }

    /// The callbacks to run for a store, in registration order.
    pub(crate) fn callbacks(
        &self,
        accepts: impl Fn(RenderMode) -> bool,
    ) -> Vec<PersistingCallback> {
        lock(&self.registrations)
            .entries
            .iter()
            .filter(|entry| entry.render_mode.is_none_or(&accepts))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }
}

impl fmt::Debug for PersistentComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("PersistentComponentState")
            .field(
                "restored",
                &inner.existing.as_ref().map(HashMap::len),
            )
            .field("persisting", &inner.persisting)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

/// Keeps a persisting callback registered until dropped.
pub struct PersistingSubscription {
    id: u64,
    registrations: Weak<Mutex<Registrations>>,
}

impl Drop for PersistingSubscription {
    fn drop(&mut self) {
        if let Some(registrations) = self.registrations.upgrade() {
            lock(&registrations).entries.retain(|entry| entry.id != self.id);
        }
    }
}

impl fmt::Debug for PersistingSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistingSubscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
