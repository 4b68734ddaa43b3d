// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A component tree together with its dispatcher and root suppliers.

use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use understory_parameter::CascadingParameterRequest;

use crate::catalog::CascadingParameterCatalog;
use crate::component::{Component, ComponentState};
use crate::dispatcher::Dispatcher;
use crate::error::CascadeError;
use crate::resolve::{BoundSupplier, RootSuppliers, SupplierResolver};
use crate::supplier::CascadingValueSupplier;
use crate::tree::{ComponentId, ComponentIdentity, ComponentOptions, ComponentTree};

/// One component tree, the dispatcher that owns it, the root suppliers
/// consulted when no ancestor matches, and the catalog of parameter schemas.
///
/// Several scopes may share one catalog.
pub struct CascadeScope {
    dispatcher: Dispatcher,
    tree: Mutex<ComponentTree>,
    resolver: SupplierResolver,
    catalog: Arc<CascadingParameterCatalog>,
}

impl CascadeScope {
    /// A scope with its own catalog and no root suppliers.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Arc<Self> {
        Self::with_catalog(
            dispatcher,
            Arc::new(CascadingParameterCatalog::default()),
            Arc::new(RootSuppliers::new()),
        )
    }

    /// A scope sharing `catalog` and `roots`.
    #[must_use]
    pub fn with_catalog(
        dispatcher: Dispatcher,
        catalog: Arc<CascadingParameterCatalog>,
        roots: Arc<RootSuppliers>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tree: Mutex::new(ComponentTree::new(dispatcher.id())),
            dispatcher,
            resolver: SupplierResolver::new(roots),
            catalog,
        })
    }

    /// The dispatcher owning the tree.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The schema catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<CascadingParameterCatalog> {
        &self.catalog
    }

    /// The root suppliers.
    #[must_use]
    pub fn roots(&self) -> &Arc<RootSuppliers> {
        self.resolver.roots()
    }

    /// Inserts a provider node exposing `supplier` to its descendants.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not alive.
    pub fn add_supplier<S: CascadingValueSupplier>(
        &self,
        parent: Option<ComponentId>,
        options: ComponentOptions,
        supplier: Arc<S>,
    ) -> ComponentId {
        let mut tree = self.tree();
        let id = tree.insert(parent, core::any::type_name::<S>(), options);
        tree.set_supplier(id, supplier);
        id
    }

    /// Inserts `component` under `parent`.
    ///
    /// Nothing is resolved or bound until its first parameter pass.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not alive.
    pub fn add_component<C: Component>(
        self: &Arc<Self>,
        parent: Option<ComponentId>,
        options: ComponentOptions,
        component: C,
    ) -> Result<Arc<ComponentState<C>>, CascadeError> {
        let schema = self.catalog.schema::<C>()?;
        let mut tree = self.tree();
        let id = tree.insert(parent, schema.type_name(), options);
        let identity = tree
            .identity(id)
            .cloned()
            .ok_or(CascadeError::ScopeDropped)?;
        let state = ComponentState::new(
            Arc::downgrade(self),
            identity,
            self.dispatcher.clone(),
            schema,
            component,
        );
        tree.set_handle(id, state.clone());
        Ok(state)
    }

    /// Removes `id` and its subtree, disposing every removed component.
    ///
    /// Returns the number of disposed components.
    pub fn remove(&self, id: ComponentId) -> usize {
        let handles = self.tree().remove(id);
        for handle in &handles {
            handle.dispose();
        }
        debug!(component = ?id, disposed = handles.len(), "removed subtree");
        handles.len()
    }

    /// The identity of `id`, if alive.
    #[must_use]
    pub fn identity(&self, id: ComponentId) -> Option<ComponentIdentity> {
        self.tree().identity(id).cloned()
    }

    /// Runs `f` with the tree locked.
    pub fn with_tree<R>(&self, f: impl FnOnce(&ComponentTree) -> R) -> R {
        f(&self.tree())
    }

    pub(crate) fn resolve(
        &self,
        component: &ComponentIdentity,
        requests: &[CascadingParameterRequest],
    ) -> Vec<BoundSupplier> {
        let tree = self.tree();
        let ancestors: &ComponentTree = &tree;
        self.resolver.resolve(component, requests, &ancestors)
    }

    fn tree(&self) -> MutexGuard<'_, ComponentTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CascadeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeScope")
            .field("dispatcher", &self.dispatcher)
            .field("tree", &*self.tree())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
