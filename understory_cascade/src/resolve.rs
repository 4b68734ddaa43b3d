// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Supplier resolution: matching cascading requests to ancestor suppliers.

use core::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;
use understory_parameter::{
    CascadingParameter, CascadingParameterRequest, CurrentValue, ParameterValue,
};

use crate::supplier::CascadingValueSupplier;
use crate::tree::{ComponentId, ComponentIdentity, ComponentTree};

/// Parent-chain access for supplier resolution.
///
/// Given a component id, returns the supplier that component exposes (if any)
/// and its parent. Implemented for `&ComponentTree` and for closures.
pub trait AncestorLookup<'a> {
    /// Looks up the supplier and parent of `id`.
    fn lookup(
        &self,
        id: ComponentId,
    ) -> Option<(Option<&'a Arc<dyn CascadingValueSupplier>>, Option<ComponentId>)>;
}

impl<'a, F> AncestorLookup<'a> for F
where
    F: Fn(
        ComponentId,
    ) -> Option<(
        Option<&'a Arc<dyn CascadingValueSupplier>>,
        Option<ComponentId>,
    )>,
{
    #[inline]
    fn lookup(
        &self,
        id: ComponentId,
    ) -> Option<(Option<&'a Arc<dyn CascadingValueSupplier>>, Option<ComponentId>)> {
        self(id)
    }
}

impl<'a> AncestorLookup<'a> for &'a ComponentTree {
    fn lookup(
        &self,
        id: ComponentId,
    ) -> Option<(Option<&'a Arc<dyn CascadingValueSupplier>>, Option<ComponentId>)> {
        let tree: &'a ComponentTree = *self;
        let identity = tree.identity(id)?;
        Some((tree.supplier(id), identity.parent))
    }
}

/// Walks upward from `start` and returns the first supplier that can answer
/// `request`.
///
/// `start` is normally the consuming component's parent; the walk never looks
/// at descendants or siblings, and the nearest match wins.
pub fn find_supplier<'a, L>(
    request: &CascadingParameterRequest,
    start: Option<ComponentId>,
    ancestors: &L,
) -> Option<Arc<dyn CascadingValueSupplier>>
where
    L: AncestorLookup<'a> + ?Sized,
{
    let mut current = start;
    while let Some(id) = current {
        let (supplier, parent) = ancestors.lookup(id)?;
        if let Some(supplier) = supplier
            && supplier.can_supply(request)
        {
            return Some(Arc::clone(supplier));
        }
        current = parent;
    }
    None
}

/// Scope-level suppliers consulted when no ancestor matches.
///
/// The registration-based counterpart of tree providers: services that
/// publish a value to every component in a scope.
#[derive(Default)]
pub struct RootSuppliers {
    suppliers: RwLock<Vec<Arc<dyn CascadingValueSupplier>>>,
}

impl RootSuppliers {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a supplier. Earlier registrations are consulted first.
    pub fn add(&self, supplier: Arc<dyn CascadingValueSupplier>) {
        self.suppliers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(supplier);
    }

    /// The first registered supplier that can answer `request`.
    #[must_use]
    pub fn find(
        &self,
        request: &CascadingParameterRequest,
    ) -> Option<Arc<dyn CascadingValueSupplier>> {
        self.suppliers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|supplier| supplier.can_supply(request))
            .cloned()
    }

    /// Number of registered suppliers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.suppliers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RootSuppliers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSuppliers")
            .field("len", &self.len())
            .finish()
    }
}

/// A request paired with the supplier that answers it.
#[derive(Clone)]
pub struct BoundSupplier {
    request: CascadingParameterRequest,
    supplier: Arc<dyn CascadingValueSupplier>,
}

impl BoundSupplier {
    /// The request.
    #[must_use]
    pub fn request(&self) -> &CascadingParameterRequest {
        &self.request
    }

    /// The matched supplier.
    #[must_use]
    pub fn supplier(&self) -> &Arc<dyn CascadingValueSupplier> {
        &self.supplier
    }

    /// A cascading parameter that reads this supplier on behalf of `component`.
    #[must_use]
    pub fn to_parameter(&self, component: &ComponentIdentity) -> CascadingParameter {
        CascadingParameter::new(
            self.request.property_name(),
            Arc::new(SupplierValue {
                binding: self.clone(),
                component: component.clone(),
            }),
        )
    }
}

impl fmt::Debug for BoundSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSupplier")
            .field("request", &self.request)
            .field("is_fixed", &self.supplier.is_fixed())
            .finish_non_exhaustive()
    }
}

struct SupplierValue {
    binding: BoundSupplier,
    component: ComponentIdentity,
}

impl CurrentValue for SupplierValue {
    fn current_value(&self) -> Option<ParameterValue> {
        self.binding
            .supplier
            .current_value(&self.binding.request, &self.component)
    }
}

/// Resolves the cascading requests of a component to suppliers.
#[derive(Clone, Debug)]
pub struct SupplierResolver {
    roots: Arc<RootSuppliers>,
}

impl SupplierResolver {
    /// A resolver falling back to `roots`.
    #[must_use]
    pub fn new(roots: Arc<RootSuppliers>) -> Self {
        Self { roots }
    }

    /// The root suppliers.
    #[must_use]
    pub fn roots(&self) -> &Arc<RootSuppliers> {
        &self.roots
    }

    /// Matches each request against the ancestors of `component`, then the
    /// root suppliers. Requests nothing can answer are dropped.
    pub fn resolve<'a, L>(
        &self,
        component: &ComponentIdentity,
        requests: &[CascadingParameterRequest],
        ancestors: &L,
    ) -> Vec<BoundSupplier>
    where
        L: AncestorLookup<'a> + ?Sized,
    {
        requests
            .iter()
            .filter_map(|request| {
                let supplier = find_supplier(request, component.parent, ancestors)
                    .or_else(|| self.roots.find(request));
                if supplier.is_none() {
                    trace!(
                        component = ?component.id,
                        property = request.property_name(),
                        "no supplier for cascading parameter"
                    );
                }
                supplier.map(|supplier| BoundSupplier {
                    request: request.clone(),
                    supplier,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use understory_parameter::CascadingAttribute;

    use super::*;
    use crate::dispatcher::DispatcherId;
    use crate::source::CascadingValueSource;
    use crate::tree::ComponentOptions;

    fn theme_request() -> CascadingParameterRequest {
        CascadingParameterRequest::new::<String>("Theme", CascadingAttribute::cascading())
    }

    #[test]
    fn nearest_ancestor_wins() {
        let mut tree = ComponentTree::new(DispatcherId::next());
        let outer = tree.insert(None, "Outer", ComponentOptions::default());
        let inner = tree.insert(Some(outer), "Inner", ComponentOptions::default());
        let leaf = tree.insert(Some(inner), "Leaf", ComponentOptions::default());
        let a: Arc<dyn CascadingValueSupplier> =
            Arc::new(CascadingValueSource::new(String::from("a"), true));
        let b: Arc<dyn CascadingValueSupplier> =
            Arc::new(CascadingValueSource::new(String::from("b"), true));
        tree.set_supplier(outer, Arc::clone(&a));
        tree.set_supplier(inner, Arc::clone(&b));

        let resolver = SupplierResolver::new(Arc::new(RootSuppliers::new()));
        let identity = tree.identity(leaf).cloned().unwrap();
        let bound = resolver.resolve(&identity, &[theme_request()], &&tree);
        assert_eq!(bound.len(), 1);
        assert!(Arc::ptr_eq(bound[0].supplier(), &b));

        let value = bound[0].to_parameter(&identity).current_value().unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("b"));
    }

    #[test]
    fn own_supplier_and_descendants_are_ignored() {
        let mut tree = ComponentTree::new(DispatcherId::next());
        let root = tree.insert(None, "Root", ComponentOptions::default());
        let child = tree.insert(Some(root), "Child", ComponentOptions::default());
        tree.set_supplier(root, Arc::new(CascadingValueSource::new(String::from("own"), true)));
        tree.set_supplier(child, Arc::new(CascadingValueSource::new(String::from("below"), true)));

        let resolver = SupplierResolver::new(Arc::new(RootSuppliers::new()));
        let identity = tree.identity(root).cloned().unwrap();
        assert!(resolver.resolve(&identity, &[theme_request()], &&tree).is_empty());
    }

    #[test]
    fn roots_are_the_fallback() {
        let mut tree = ComponentTree::new(DispatcherId::next());
        let root = tree.insert(None, "Root", ComponentOptions::default());
        let roots = Arc::new(RootSuppliers::new());
        roots.add(Arc::new(CascadingValueSource::new(3_i32, true)));
        roots.add(Arc::new(CascadingValueSource::new(String::from("root"), true)));

        let resolver = SupplierResolver::new(roots);
        let identity = tree.identity(root).cloned().unwrap();
        let requests = [
            theme_request(),
            CascadingParameterRequest::new::<bool>("Missing", CascadingAttribute::cascading()),
        ];
        let bound = resolver.resolve(&identity, &requests, &&tree);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].request().property_name(), "Theme");
    }

    #[test]
    fn closures_provide_ancestors() {
        let source: Arc<dyn CascadingValueSupplier> =
            Arc::new(CascadingValueSource::new(String::from("x"), true));
        let mut tree = ComponentTree::new(DispatcherId::next());
        let root = tree.insert(None, "Root", ComponentOptions::default());
        let leaf = tree.insert(Some(root), "Leaf", ComponentOptions::default());

        let lookup = |id: ComponentId| {
            (id == root).then_some((Some(&source), None::<ComponentId>))
        };
        let found = find_supplier(&theme_request(), Some(root), &lookup);
        assert!(found.is_some_and(|found| Arc::ptr_eq(&found, &source)));
        assert!(find_supplier(&theme_request(), Some(leaf), &lookup).is_none());
    }
}
