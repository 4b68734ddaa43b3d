// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-type schema cache.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use hashbrown::HashMap;
use tracing::debug;

use crate::error::SchemaError;
use crate::schema::{ParameterSchema, ParameterSchemaBuilder, ParameterTarget};

type Entry<T> = Result<Arc<ParameterSchema<T>>, SchemaError>;

/// Thread-safe cache of [`ParameterSchema`]s, keyed by target type.
///
/// A schema is built at most once per type between invalidations, except that
/// two threads racing on the first lookup may both build it; the last insert
/// wins and both results are equivalent. Invalid schemas are cached too, so a
/// broken description is reported on every bind without being rebuilt.
///
/// Most hosts share a single cache; [`SchemaCache::global`] provides one.
/// Tests and hot-reload hosts can create their own and call
/// [`SchemaCache::invalidate_all`] when type metadata changes.
pub struct SchemaCache {
    schemas: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide cache.
    #[must_use]
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SchemaCache> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Returns the schema of `T`, building it on first use.
    pub fn schema<T: ParameterTarget>(&self) -> Result<Arc<ParameterSchema<T>>, SchemaError> {
        let key = TypeId::of::<T>();
        if let Some(entry) = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<Entry<T>>())
        {
            return entry.clone();
        }

        // Built outside the lock; `describe` is user code.
        let entry: Entry<T> = T::describe(ParameterSchemaBuilder::new())
            .build()
            .map(Arc::new);
        match &entry {
            Ok(schema) => debug!(
                target_type = schema.type_name(),
                properties = schema.len(),
                cascading = schema.cascading_requests().len(),
                "built parameter schema"
            ),
            Err(err) => debug!(error = %err, "parameter schema is invalid"),
        }
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(entry.clone()));
        entry
    }

    /// Drops every cached schema.
    pub fn invalidate_all(&self) {
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of cached types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("len", &self.len())
            .finish()
    }
}
