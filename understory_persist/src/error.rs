// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for persisted component state.

use thiserror::Error;
use understory_cascade::DispatchError;
use understory_parameter::CodecError;

/// Errors from persisting or restoring component state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Restored state was supplied twice.
    #[error("persisted component state has already been initialized")]
    AlreadyInitialized,
    /// State can only be written while a persist pass is running.
    #[error("persisting state is only allowed during a persist pass")]
    NotPersisting,
    /// A persist pass was started while another was running.
    #[error("a persist pass is already running")]
    AlreadyPersisting,
    /// Two writers used the same key in one pass.
    #[error("there is already persisted state under the key `{key}`")]
    DuplicateKey {
        /// The contested key.
        key: String,
    },
    /// JSON encoding or decoding failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A property value could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The component's dispatcher is gone.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// The backing store failed.
    #[error("state store failure: {0}")]
    Store(String),
}
