// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Cascade: values supplied by ancestors to their descendants.
//!
//! A component declares cascading properties in its
//! [`ParameterSchema`](understory_parameter::ParameterSchema). When it first
//! receives parameters, each request is matched with the nearest ancestor
//! [`CascadingValueSupplier`] that can answer it, falling back to the scope's
//! [`RootSuppliers`]. Non-fixed suppliers remember their subscribers and tell
//! them when the value changes.
//!
//! ## Core Concepts
//!
//! ### Dispatchers
//!
//! A [`Dispatcher`] is a serializing execution context: one tokio task that
//! runs work items one at a time. Every component belongs to exactly one, and
//! all of its rendering happens there. [`SubscriptionRegistry::notify`] posts
//! one batch per dispatcher and waits for all of them.
//!
//! ### Trees and scopes
//!
//! A [`ComponentTree`] is a generational arena of [`ComponentIdentity`]
//! records. A [`CascadeScope`] pairs one tree with its dispatcher, root
//! suppliers and the shared [`CascadingParameterCatalog`], and hands out
//! [`ComponentState`]s that bind, subscribe and re-render.
//!
//! ### Suppliers
//!
//! - [`CascadingValueSource`]: a value owned by a service.
//! - [`CascadingValue`]: a provider component placed in the tree.
//! - [`QueryParameterSupplier`]: values read from the navigation query string.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use understory_cascade::{
//!     CascadeScope, CascadingValueSource, Component, ComponentOptions, Dispatcher, RenderError,
//! };
//! use understory_parameter::{
//!     CascadingAttribute, OwnedParameters, ParameterSchemaBuilder, ParameterTarget,
//! };
//!
//! #[derive(Default)]
//! struct Label {
//!     theme: String,
//! }
//!
//! impl ParameterTarget for Label {
//!     fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
//!         schema.cascading("Theme", [CascadingAttribute::named("Theme")], |l, v: String| l.theme = v)
//!     }
//! }
//!
//! impl Component for Label {
//!     fn render(&mut self) -> Result<(), RenderError> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let scope = CascadeScope::new(Dispatcher::spawn("main"));
//! let theme = Arc::new(CascadingValueSource::named("Theme", String::from("dark"), false));
//! let provider = scope.add_supplier(None, ComponentOptions::default(), Arc::clone(&theme));
//! let label = scope
//!     .add_component(Some(provider), ComponentOptions::default(), Label::default())
//!     .unwrap();
//!
//! label.update(OwnedParameters::new()).await.unwrap();
//! assert_eq!(label.with(|l| l.theme.clone()), "dark");
//!
//! theme.notify_changed_to(String::from("light")).await.unwrap();
//! assert_eq!(label.with(|l| l.theme.clone()), "light");
//! # });
//! ```

mod catalog;
mod component;
mod dispatcher;
mod error;
mod query;
mod resolve;
mod scope;
mod source;
mod subscription;
mod supplier;
mod tree;

pub use catalog::CascadingParameterCatalog;
pub use component::{Component, ComponentState};
pub use dispatcher::{Dispatcher, DispatcherId};
pub use error::{CascadeError, DispatchError, NotifyError, RenderError};
pub use query::{FromQueryValue, QueryParameterSupplier, supports_query_type};
pub use resolve::{AncestorLookup, BoundSupplier, RootSuppliers, SupplierResolver, find_supplier};
pub use scope::CascadeScope;
pub use source::{CascadingValue, CascadingValueParameters, CascadingValueSource};
pub use subscription::{CascadingSubscriber, SubscriptionRegistry};
pub use supplier::{CascadingValueSupplier, matches_plain_request};
pub use tree::{
    ComponentHandle, ComponentId, ComponentIdentity, ComponentOptions, ComponentTree, RenderMode,
};
