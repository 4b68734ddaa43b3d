// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Component tree arena and component identity.

use std::sync::Arc;

use understory_parameter::ParameterValue;

use crate::dispatcher::DispatcherId;
use crate::supplier::CascadingValueSupplier;

/// Identifier for a component in a [`ComponentTree`].
///
/// A generational handle: `(slot index, generation)`.
///
/// - On insert, a free slot is reused or a new slot is allocated.
/// - On remove, the slot's generation is incremented, so every existing
///   `ComponentId` for that slot becomes stale.
///
/// Stale ids never alias a later component because the generation must
/// match. Use [`ComponentTree::is_alive`] to check liveness.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32, u32);

impl ComponentId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }

    /// The slot generation of this id.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.1
    }
}

/// How a component is rendered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderMode {
    /// Rendered once, without interactivity.
    Static,
    /// Interactive, rendered on the server.
    Server,
    /// Interactive, rendered in the browser.
    WebAssembly,
    /// Server first, then WebAssembly once available.
    Auto,
}

/// Optional per-component settings supplied at insertion.
#[derive(Clone, Debug, Default)]
pub struct ComponentOptions {
    /// The component's `@key`, if its parent declared one.
    pub key: Option<ParameterValue>,
    /// The component's render mode, if any.
    pub render_mode: Option<RenderMode>,
}

impl ComponentOptions {
    /// Sets the key.
    #[must_use]
    pub fn with_key(mut self, key: ParameterValue) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets the render mode.
    #[must_use]
    pub fn with_render_mode(mut self, render_mode: RenderMode) -> Self {
        self.render_mode = Some(render_mode);
        self
    }
}

/// A live component instance and its position in the tree.
///
/// This is the unit subscriptions and persistence keys are tracked by.
#[derive(Clone, Debug)]
pub struct ComponentIdentity {
    /// The component's id.
    pub id: ComponentId,
    /// The component's type name.
    pub type_name: &'static str,
    /// The parent's id, if any.
    pub parent: Option<ComponentId>,
    /// The parent's type name, if any.
    pub parent_type_name: Option<&'static str>,
    /// Distance from the root (roots have depth 0).
    pub depth: u32,
    /// The component's `@key`, if any.
    pub key: Option<ParameterValue>,
    /// The component's render mode, if any.
    pub render_mode: Option<RenderMode>,
    /// The dispatcher that owns the component's tree.
    pub dispatcher: DispatcherId,
}

struct ComponentRecord {
    identity: ComponentIdentity,
    supplier: Option<Arc<dyn CascadingValueSupplier>>,
    handle: Option<Arc<dyn ComponentHandle>>,
    children: Vec<ComponentId>,
}

/// Disposal hook for component state attached to a tree node.
pub trait ComponentHandle: Send + Sync {
    /// Releases subscriptions; called once when the node is removed.
    fn dispose(&self);
}

#[derive(Default)]
struct Slot {
    generation: u32,
    record: Option<ComponentRecord>,
}

/// Arena of components owned by one dispatcher.
///
/// Parent links are ids into the arena, so ancestor walks are bounds-checked
/// index traversals and removing a component only invalidates its ids.
pub struct ComponentTree {
    dispatcher: DispatcherId,
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl ComponentTree {
    /// Creates an empty tree owned by `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: DispatcherId) -> Self {
        Self {
            dispatcher,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// The owning dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> DispatcherId {
        self.dispatcher
    }

    /// Number of live components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree has no live components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a component of type `type_name` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not alive.
    pub fn insert(
        &mut self,
        parent: Option<ComponentId>,
        type_name: &'static str,
        options: ComponentOptions,
    ) -> ComponentId {
        let (parent_type_name, depth) = match parent {
            Some(parent) => {
                let record = self
                    .record(parent)
                    .unwrap_or_else(|| panic!("parent {parent:?} is not alive"));
                (
                    Some(record.identity.type_name),
                    record.identity.depth + 1,
                )
            }
            None => (None, 0),
        };

        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "component counts stay far below u32::MAX"
                )]
                let idx = self.slots.len() as u32;
                self.slots.push(Slot::default());
                idx
            }
        };
        let id = ComponentId::new(idx, self.slots[idx as usize].generation);
        self.slots[idx as usize].record = Some(ComponentRecord {
            identity: ComponentIdentity {
                id,
                type_name,
                parent,
                parent_type_name,
                depth,
                key: options.key,
                render_mode: options.render_mode,
                dispatcher: self.dispatcher,
            },
            supplier: None,
            handle: None,
            children: Vec::new(),
        });
        if let Some(parent) = parent.and_then(|parent| self.record_mut(parent)) {
            parent.children.push(id);
        }
        self.len += 1;
        id
    }

    /// Exposes `supplier` from the component `id`.
    ///
    /// Returns `false` if `id` is stale.
    pub fn set_supplier(
        &mut self,
        id: ComponentId,
        supplier: Arc<dyn CascadingValueSupplier>,
    ) -> bool {
        match self.record_mut(id) {
            Some(record) => {
                record.supplier = Some(supplier);
                true
            }
            None => false,
        }
    }

    /// Attaches a disposal hook to the component `id`.
    ///
    /// Returns `false` if `id` is stale.
    pub fn set_handle(&mut self, id: ComponentId, handle: Arc<dyn ComponentHandle>) -> bool {
        match self.record_mut(id) {
            Some(record) => {
                record.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// The supplier exposed by `id`, if any.
    #[must_use]
    pub fn supplier(&self, id: ComponentId) -> Option<&Arc<dyn CascadingValueSupplier>> {
        self.record(id)?.supplier.as_ref()
    }

    /// Removes `id` and its whole subtree.
    ///
    /// Returns the disposal hooks of the removed components, rootmost first.
    /// They are not invoked here so the caller can release any lock on the
    /// tree first.
    pub fn remove(&mut self, id: ComponentId) -> Vec<Arc<dyn ComponentHandle>> {
        let mut handles = Vec::new();
        let Some(parent) = self.record(id).map(|record| record.identity.parent) else {
            return handles;
        };
        if let Some(parent) = parent.and_then(|parent| self.record_mut(parent)) {
            parent.children.retain(|child| *child != id);
        }

        let mut pending = vec![id];
        let mut next = 0;
        while let Some(&current) = pending.get(next) {
            next += 1;
            let slot = &mut self.slots[current.idx()];
            let Some(record) = slot.record.take() else {
                continue;
            };
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.0);
            self.len -= 1;
            handles.extend(record.handle);
            pending.extend(record.children);
        }
        handles
    }

    /// Returns `true` if `id` refers to a live component.
    #[must_use]
    pub fn is_alive(&self, id: ComponentId) -> bool {
        self.record(id).is_some()
    }

    /// The identity of `id`, if alive.
    #[must_use]
    pub fn identity(&self, id: ComponentId) -> Option<&ComponentIdentity> {
        self.record(id).map(|record| &record.identity)
    }

    /// The parent of `id`, if alive and not a root.
    #[must_use]
    pub fn parent(&self, id: ComponentId) -> Option<ComponentId> {
        self.record(id)?.identity.parent
    }

    /// The children of `id`, in insertion order.
    #[must_use]
    pub fn children(&self, id: ComponentId) -> &[ComponentId] {
        self.record(id).map_or(&[], |record| &record.children)
    }

    /// Iterates the ancestors of `id`, nearest first. Excludes `id` itself.
    pub fn ancestors(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        core::iter::successors(self.parent(id), |current| self.parent(*current))
    }

    fn record(&self, id: ComponentId) -> Option<&ComponentRecord> {
        let slot = self.slots.get(id.idx())?;
        if slot.generation != id.1 {
            return None;
        }
        slot.record.as_ref()
    }

    fn record_mut(&mut self, id: ComponentId) -> Option<&mut ComponentRecord> {
        let slot = self.slots.get_mut(id.idx())?;
        if slot.generation != id.1 {
            return None;
        }
        slot.record.as_mut()
    }
}

impl core::fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ComponentTree")
            .field("dispatcher", &self.dispatcher)
            .field("len", &self.len)
            .field("free", &self.free.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> ComponentTree {
        ComponentTree::new(DispatcherId::next())
    }

    #[test]
    fn identity_records_position() {
        let mut tree = tree();
        let root = tree.insert(None, "App", ComponentOptions::default());
        let child = tree.insert(
            Some(root),
            "Row",
            ComponentOptions::default()
                .with_key(ParameterValue::new(7_i32))
                .with_render_mode(RenderMode::Server),
        );

        let identity = tree.identity(child).unwrap();
        assert_eq!(identity.parent, Some(root));
        assert_eq!(identity.parent_type_name, Some("App"));
        assert_eq!(identity.depth, 1);
        assert_eq!(identity.render_mode, Some(RenderMode::Server));
        assert_eq!(
            identity.key.as_ref().and_then(|k| k.downcast_ref::<i32>()),
            Some(&7)
        );
        assert_eq!(tree.children(root), [child]);
    }

    #[test]
    fn ancestors_walk_upward_nearest_first() {
        let mut tree = tree();
        let a = tree.insert(None, "A", ComponentOptions::default());
        let b = tree.insert(Some(a), "B", ComponentOptions::default());
        let c = tree.insert(Some(b), "C", ComponentOptions::default());
        let sibling = tree.insert(Some(a), "S", ComponentOptions::default());

        assert_eq!(tree.ancestors(c).collect::<Vec<_>>(), [b, a]);
        assert_eq!(tree.ancestors(sibling).collect::<Vec<_>>(), [a]);
        assert_eq!(tree.ancestors(a).count(), 0);
    }

    #[test]
    fn removal_invalidates_the_subtree() {
        let mut tree = tree();
        let a = tree.insert(None, "A", ComponentOptions::default());
        let b = tree.insert(Some(a), "B", ComponentOptions::default());
        let c = tree.insert(Some(b), "C", ComponentOptions::default());
        assert_eq!(tree.len(), 3);

        tree.remove(b);
        assert!(tree.is_alive(a));
        assert!(!tree.is_alive(b));
        assert!(!tree.is_alive(c));
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn reused_slots_get_new_generations() {
        let mut tree = tree();
        let a = tree.insert(None, "A", ComponentOptions::default());
        tree.remove(a);
        let b = tree.insert(None, "B", ComponentOptions::default());
        assert_eq!(a.idx(), b.idx());
        assert_ne!(a, b);
        assert!(tree.identity(a).is_none());
        assert_eq!(tree.identity(b).map(|i| i.type_name), Some("B"));
    }

    #[test]
    fn removal_returns_handles_rootmost_first() {
        use std::sync::Mutex;

        struct Recorder(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl ComponentHandle for Recorder {
            fn dispose(&self) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut tree = tree();
        let a = tree.insert(None, "A", ComponentOptions::default());
        let b = tree.insert(Some(a), "B", ComponentOptions::default());
        tree.set_handle(a, Arc::new(Recorder("a", log.clone())));
        tree.set_handle(b, Arc::new(Recorder("b", log.clone())));

        for handle in tree.remove(a) {
            handle.dispose();
        }
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
        assert!(tree.remove(a).is_empty());
    }
}
