// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Persist: component state that survives a render-mode transition.
//!
//! Before a transition, a persist pass asks every registered callback to
//! write its state as bytes under a string key. After it, the restored entries
//! are handed out at most once each.
//!
//! - [`PersistentKeyDeriver`] computes the keys: a SHA-256 over the parent
//!   type, component type and property name, optionally combined with the
//!   component's `@key`.
//! - [`PersistentComponentState`] holds the restored entries and the entries
//!   written by the running pass.
//! - [`ComponentStatePersistenceManager`] runs restore and persist passes
//!   against a [`PersistentStateStore`].
//! - [`PersistentStateSupplier`] is the cascading supplier that connects
//!   properties declared with
//!   [`ParameterSchemaBuilder::persistent_state`](understory_parameter::ParameterSchemaBuilder::persistent_state)
//!   to all of the above.

mod error;
mod key;
mod manager;
mod state;
mod supplier;

pub use error::PersistError;
pub use key::{PersistentKeyDeriver, serializable_identity};
pub use manager::{ComponentStatePersistenceManager, MemoryStateStore, PersistentStateStore};
pub use state::{
    PersistedState, PersistentComponentState, PersistingCallback, PersistingSubscription,
};
pub use supplier::PersistentStateSupplier;
