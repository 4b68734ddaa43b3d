// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Parameter: component parameter views and binding.
//!
//! A component's inputs come from two places:
//!
//! - **Direct parameters**, encoded by its parent as the attribute run that
//!   follows the component's frame in the parent's render output.
//! - **Cascading parameters**, supplied by ancestors anywhere above it and
//!   resolved by `understory_cascade`.
//!
//! This crate merges both into a [`ParameterView`] and applies it to a target
//! through a declarative [`ParameterSchema`].
//!
//! ## Core Concepts
//!
//! ### Frames and views
//!
//! [`RenderFrame`] models the slice of render output a parameter reader needs;
//! [`attribute_run`] reads the attributes of one owner frame. A
//! [`ParameterView`] enumerates those attributes followed by the resolved
//! [`CascadingParameter`]s, yielding [`ParameterEntry`] values in that order
//! every time.
//!
//! ### Schemas
//!
//! A type implements [`ParameterTarget`] to list its properties once. The
//! resulting [`ParameterSchema`] holds:
//!
//! - a case-insensitive name → setter table,
//! - at most one capture property for unmatched parameters,
//! - the [`CascadingParameterRequest`]s its cascading properties produce.
//!
//! Schemas are built lazily and cached per type in a [`SchemaCache`].
//!
//! ### Change detection
//!
//! [`may_have_changed`] and [`ParameterView::definitely_equals`] answer
//! "can this render be skipped?" conservatively: any doubt means changed.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_parameter::{
//!     CapturedAttributes, OwnedParameters, ParameterSchemaBuilder, ParameterTarget,
//!     ParameterValue, SchemaCache,
//! };
//!
//! #[derive(Default)]
//! struct Button {
//!     label: String,
//!     extra: CapturedAttributes,
//! }
//!
//! impl ParameterTarget for Button {
//!     fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
//!         schema
//!             .parameter("Label", |b, v: String| b.label = v)
//!             .capture_unmatched("Extra", |b, extra| b.extra = extra)
//!     }
//! }
//!
//! let cache = SchemaCache::new();
//! let params = OwnedParameters::from_pairs([
//!     ("label", ParameterValue::new(String::from("OK"))),
//!     ("class", ParameterValue::new(String::from("primary"))),
//! ]);
//!
//! let mut button = Button::default();
//! params.view().bind(&cache, &mut button).unwrap();
//! assert_eq!(button.label, "OK");
//! assert!(button.extra.contains_key("class"));
//! ```

mod binder;
mod cache;
mod change;
mod codec;
mod error;
mod frame;
mod schema;
mod value;
mod view;

pub use cache::SchemaCache;
pub use change::may_have_changed;
pub use codec::{JsonCodec, ValueCodec};
pub use error::{BindError, CodecError, SchemaError};
pub use frame::{AttributeFrames, RenderFrame, attribute_run};
pub use schema::{
    CapturedAttributes, CascadingAttribute, CascadingParameterRequest, PERSISTENT_STATE_SOURCE,
    ParameterSchema, ParameterSchemaBuilder, ParameterTarget, QUERY_SOURCE,
    names_equal_ignore_case,
};
pub use value::ParameterValue;
pub use view::{
    CascadingParameter, CurrentValue, OwnedParameters, ParameterEntry, ParameterEnumerator,
    ParameterView,
};
