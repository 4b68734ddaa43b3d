// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-type cascading parameter requests.

use std::sync::Arc;

use tracing::debug;
use understory_parameter::{
    CascadingParameterRequest, ParameterSchema, ParameterTarget, SchemaCache, SchemaError,
};

/// The cascading requests declared by each component type.
///
/// Requests come from the type's [`ParameterSchema`], one per cascading
/// attribute, in declaration order. They are computed once per type and the
/// same shared slice is returned until [`invalidate_all`](Self::invalidate_all).
#[derive(Clone, Debug)]
pub struct CascadingParameterCatalog {
    schemas: Arc<SchemaCache>,
}

impl CascadingParameterCatalog {
    /// A catalog backed by `schemas`.
    #[must_use]
    pub fn new(schemas: Arc<SchemaCache>) -> Self {
        Self { schemas }
    }

    /// The cascading requests of `T`.
    pub fn requests<T: ParameterTarget>(
        &self,
    ) -> Result<Arc<[CascadingParameterRequest]>, SchemaError> {
        Ok(Arc::clone(self.schema::<T>()?.cascading_requests()))
    }

    /// The full parameter schema of `T`.
    pub fn schema<T: ParameterTarget>(&self) -> Result<Arc<ParameterSchema<T>>, SchemaError> {
        self.schemas.schema::<T>()
    }

    /// The schema cache shared with the binder.
    #[must_use]
    pub fn schemas(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    /// Forgets every type, for example after a code update.
    pub fn invalidate_all(&self) {
        debug!(types = self.schemas.len(), "invalidating parameter catalog");
        self.schemas.invalidate_all();
    }
}

impl Default for CascadingParameterCatalog {
    fn default() -> Self {
        Self::new(Arc::new(SchemaCache::new()))
    }
}

#[cfg(test)]
mod tests {
    use understory_parameter::{CascadingAttribute, ParameterSchemaBuilder};

    use super::*;

    struct Consumer;

    impl ParameterTarget for Consumer {
        fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
            schema
                .parameter("Direct", |_, _: i32| {})
                .cascading(
                    "Theme",
                    [
                        CascadingAttribute::named("Theme"),
                        CascadingAttribute::named("FallbackTheme"),
                    ],
                    |_, _: String| {},
                )
                .cascading("Count", [CascadingAttribute::cascading()], |_, _: u32| {})
        }
    }

    #[test]
    fn one_request_per_attribute_in_declaration_order() {
        let catalog = CascadingParameterCatalog::default();
        let requests = catalog.requests::<Consumer>().unwrap();
        let described: Vec<_> = requests
            .iter()
            .map(|r| (r.property_name(), r.lookup_name()))
            .collect();
        assert_eq!(
            described,
            [
                ("Theme", Some("Theme")),
                ("Theme", Some("FallbackTheme")),
                ("Count", None),
            ]
        );
    }

    #[test]
    fn repeated_calls_share_the_result_until_invalidated() {
        let catalog = CascadingParameterCatalog::default();
        let first = catalog.requests::<Consumer>().unwrap();
        let second = catalog.requests::<Consumer>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        catalog.invalidate_all();
        let third = catalog.requests::<Consumer>().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first.len(), third.len());
    }
}
