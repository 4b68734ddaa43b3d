// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for cascading values and their subscribers.

use std::sync::Arc;

use thiserror::Error;
use understory_parameter::{BindError, SchemaError};

use crate::tree::ComponentId;

/// A dispatcher that can no longer run work.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The dispatcher's task has stopped.
    #[error("dispatcher `{dispatcher}` has shut down")]
    Closed {
        /// Name of the dispatcher.
        dispatcher: Arc<str>,
    },
}

/// A component failed to render.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The component reported a failure.
    #[error("{0}")]
    Failed(String),
    /// The component's parameters could not be bound.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// The component's dispatcher is gone.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl RenderError {
    /// A failure described by `message`.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure to deliver a change notification.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Fixed values never change, so they cannot notify.
    #[error("the value of a fixed cascading source cannot change")]
    Fixed,
    /// A subscriber's dispatcher is gone.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// A subscriber failed while re-rendering.
    #[error("subscriber {component:?} failed to re-render")]
    Subscriber {
        /// The failing component.
        component: ComponentId,
        /// What it reported.
        #[source]
        source: RenderError,
    },
}

/// Errors from cascading value providers and component state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// A provider's `is_fixed` parameter changed after it was first set.
    #[error("the `is_fixed` parameter of a cascading value cannot be changed after it is first set")]
    FixednessChanged,
    /// A provider's `name` parameter changed after it was first set.
    #[error("the `name` parameter of a cascading value cannot be changed after it is first set")]
    NameChanged,
    /// The component's scope has been dropped.
    #[error("the cascade scope owning this component has been dropped")]
    ScopeDropped,
    /// The component type's parameter schema is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Parameters could not be bound.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Subscribers could not be notified.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}
