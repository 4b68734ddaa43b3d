// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Restoring and persisting state against a backing store.

use core::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, error};
use understory_cascade::RenderMode;

use crate::error::PersistError;
use crate::state::{PersistedState, PersistentComponentState};

/// Where persisted component state lives between render-mode transitions.
#[async_trait]
pub trait PersistentStateStore: Send + Sync {
    /// Loads every persisted entry.
    async fn get_persisted_state(&self) -> Result<PersistedState, PersistError>;

    /// Saves the entries written by a persist pass.
    async fn persist_state(&self, state: PersistedState) -> Result<(), PersistError>;

    /// Whether callbacks registered for `render_mode` should run for this store.
    fn supports_render_mode(&self, render_mode: RenderMode) -> bool {
        let _ = render_mode;
        true
    }
}

/// A store that keeps state in memory.
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<PersistedState>,
    render_mode: Option<RenderMode>,
}

impl MemoryStateStore {
    /// An empty store accepting every render mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `state`.
    #[must_use]
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
            render_mode: None,
        }
    }

    /// Restricts the store to callbacks registered without a render mode or
    /// for `render_mode`.
    #[must_use]
    pub fn for_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = Some(render_mode);
        self
    }

    /// A copy of the stored entries.
    #[must_use]
    pub fn snapshot(&self) -> PersistedState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PersistentStateStore for MemoryStateStore {
    async fn get_persisted_state(&self) -> Result<PersistedState, PersistError> {
        Ok(self.snapshot())
    }

    async fn persist_state(&self, state: PersistedState) -> Result<(), PersistError> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        Ok(())
    }

    fn supports_render_mode(&self, render_mode: RenderMode) -> bool {
        self.render_mode.is_none_or(|accepted| accepted == render_mode)
    }
}

impl fmt::Debug for MemoryStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStateStore")
            .field("entries", &self.snapshot().len())
            .field("render_mode", &self.render_mode)
            .finish()
    }
}

/// Drives [`PersistentComponentState`] through restore and persist passes.
#[derive(Clone, Debug, Default)]
pub struct ComponentStatePersistenceManager {
    state: Arc<PersistentComponentState>,
}

impl ComponentStatePersistenceManager {
    /// A manager with fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The managed state.
    #[must_use]
    pub fn state(&self) -> &Arc<PersistentComponentState> {
        &self.state
    }

    /// Loads the store's entries as restored state.
    pub async fn restore_state(
        &self,
        store: &dyn PersistentStateStore,
    ) -> Result<(), PersistError> {
        let restored = store.get_persisted_state().await?;
        self.state.initialize_existing_state(restored)
    }

    /// Runs every eligible persisting callback, then saves what they wrote.
    ///
    /// Callbacks run one at a time in registration order. A failing callback
    /// is logged and skipped.
    pub async fn persist_state(
        &self,
        store: &dyn PersistentStateStore,
    ) -> Result<(), PersistError> {
        self.state.begin_persisting()?;
        let callbacks = self
            .state
            .callbacks(|render_mode| store.supports_render_mode(render_mode));
        debug!(callbacks = callbacks.len(), "persisting component state");

        for callback in callbacks {
            if let Err(err) = callback().await {
                error!(error = %err, "persisting callback failed");
            }
        }

        let written = self.state.end_persisting();
        debug!(entries = written.len(), "saving persisted component state");
        store.persist_state(written).await
    }
}
