// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative parameter schemas.
//!
//! A type that accepts parameters implements [`ParameterTarget`] and lists its
//! properties once, on a [`ParameterSchemaBuilder`]. The resulting
//! [`ParameterSchema`] is the single source of truth for both direct binding
//! and cascading-parameter discovery, and is cached per type by
//! [`SchemaCache`](crate::SchemaCache).

use core::any::TypeId;
use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use hashbrown::HashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{JsonCodec, ValueCodec};
use crate::error::SchemaError;
use crate::value::ParameterValue;

/// Source tag of cascading parameters supplied from the navigation query string.
pub const QUERY_SOURCE: &str = "query";

/// Source tag of cascading parameters restored from persisted component state.
pub const PERSISTENT_STATE_SOURCE: &str = "persistent-state";

/// Parameters that matched no property, keyed by the name the parent used.
pub type CapturedAttributes = HashMap<String, ParameterValue>;

/// A type whose properties can be set from a [`ParameterView`](crate::ParameterView).
///
/// # Example
///
/// ```rust
/// use understory_parameter::{ParameterSchemaBuilder, ParameterTarget};
///
/// #[derive(Default)]
/// struct Counter {
///     start: i32,
///     label: String,
/// }
///
/// impl ParameterTarget for Counter {
///     fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
///         schema
///             .parameter("Start", |c, v: i32| c.start = v)
///             .parameter("Label", |c, v: String| c.label = v)
///     }
/// }
///
/// let schema = Counter::describe(ParameterSchemaBuilder::new()).build().unwrap();
/// assert!(schema.has_property("start"));
/// ```
pub trait ParameterTarget: Sized + Send + Sync + 'static {
    /// Adds this type's properties to `schema`.
    fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self>;
}

/// Compares two parameter names ignoring case.
#[must_use]
pub fn names_equal_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

pub(crate) fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Where a cascading property takes its value from.
///
/// A property may carry several attributes; each one produces its own
/// [`CascadingParameterRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadingAttribute {
    name: Option<Cow<'static, str>>,
    source: Option<&'static str>,
}

impl CascadingAttribute {
    /// Matches the nearest ancestor value of the property's type.
    #[must_use]
    pub const fn cascading() -> Self {
        Self {
            name: None,
            source: None,
        }
    }

    /// Matches the nearest ancestor value published under `name`.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            source: None,
        }
    }

    /// Matches suppliers of the given source tag, looked up by property name.
    #[must_use]
    pub const fn from_source(source: &'static str) -> Self {
        Self {
            name: None,
            source: Some(source),
        }
    }

    /// Matches suppliers of the given source tag, looked up by `name`.
    #[must_use]
    pub fn from_source_named(source: &'static str, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            source: Some(source),
        }
    }

    /// Reads the query-string key equal to the property name.
    #[must_use]
    pub const fn from_query() -> Self {
        Self::from_source(QUERY_SOURCE)
    }

    /// Reads the query-string key `name`.
    #[must_use]
    pub fn from_query_named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::from_source_named(QUERY_SOURCE, name)
    }

    /// Restores the property from persisted component state.
    #[must_use]
    pub const fn persistent_state() -> Self {
        Self::from_source(PERSISTENT_STATE_SOURCE)
    }

    /// The explicit lookup name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The source tag, if any.
    #[must_use]
    pub fn source(&self) -> Option<&'static str> {
        self.source
    }
}

/// A request, derived from one property and one attribute, for a value from
/// an ancestor supplier.
#[derive(Clone)]
pub struct CascadingParameterRequest {
    property_name: &'static str,
    value_type: TypeId,
    value_type_name: &'static str,
    lookup_name: Option<Cow<'static, str>>,
    source: Option<&'static str>,
    codec: Option<Arc<dyn ValueCodec>>,
}

impl CascadingParameterRequest {
    /// Creates a request for a property of type `V`.
    #[must_use]
    pub fn new<V: 'static>(property_name: &'static str, attribute: CascadingAttribute) -> Self {
        Self {
            property_name,
            value_type: TypeId::of::<V>(),
            value_type_name: core::any::type_name::<V>(),
            lookup_name: attribute.name,
            source: attribute.source,
            codec: None,
        }
    }

    /// Attaches a codec for suppliers that store values as bytes.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// The declaring property's name.
    #[must_use]
    pub fn property_name(&self) -> &'static str {
        self.property_name
    }

    /// The property's value type.
    #[must_use]
    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// The property's value type name.
    #[must_use]
    pub fn value_type_name(&self) -> &'static str {
        self.value_type_name
    }

    /// The explicit lookup name from the attribute, if any.
    #[must_use]
    pub fn lookup_name(&self) -> Option<&str> {
        self.lookup_name.as_deref()
    }

    /// The lookup name, falling back to the property name.
    #[must_use]
    pub fn effective_name(&self) -> &str {
        self.lookup_name().unwrap_or(self.property_name)
    }

    /// The attribute's source tag, if any.
    #[must_use]
    pub fn source(&self) -> Option<&'static str> {
        self.source
    }

    /// The value codec, if the property declared one.
    #[must_use]
    pub fn codec(&self) -> Option<&Arc<dyn ValueCodec>> {
        self.codec.as_ref()
    }
}

impl fmt::Debug for CascadingParameterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadingParameterRequest")
            .field("property_name", &self.property_name)
            .field("value_type", &self.value_type_name)
            .field("lookup_name", &self.lookup_name)
            .field("source", &self.source)
            .field(
                "codec",
                &self.codec.as_ref().map(|codec| codec.value_type_name()),
            )
            .finish()
    }
}

/// Assigns an erased value; on a type mismatch returns the received type name.
pub(crate) type Setter<T> =
    Box<dyn Fn(&mut T, &ParameterValue) -> Result<(), &'static str> + Send + Sync>;
pub(crate) type Getter<T> = Box<dyn Fn(&T) -> ParameterValue + Send + Sync>;
pub(crate) type CaptureSetter<T> = Box<dyn Fn(&mut T, CapturedAttributes) + Send + Sync>;

pub(crate) struct PropertySetter<T> {
    pub(crate) name: &'static str,
    pub(crate) value_type_name: &'static str,
    pub(crate) direct: bool,
    pub(crate) cascading: bool,
    pub(crate) set: Setter<T>,
    pub(crate) get: Option<Getter<T>>,
}

pub(crate) struct CaptureSink<T> {
    pub(crate) name: &'static str,
    pub(crate) set: CaptureSetter<T>,
}

fn typed_setter<T, V, F>(set: F) -> Setter<T>
where
    V: Clone + Default + Send + Sync + 'static,
    F: Fn(&mut T, V) + Send + Sync + 'static,
{
    Box::new(move |target, value| {
        if value.is_null() {
            set(target, V::default());
            return Ok(());
        }
        match value.downcast_ref::<V>() {
            Some(typed) => {
                set(target, typed.clone());
                Ok(())
            }
            None => Err(value.type_name()),
        }
    })
}

/// Collects the properties of a [`ParameterTarget`].
///
/// Errors are deferred to [`ParameterSchemaBuilder::build`].
pub struct ParameterSchemaBuilder<T> {
    properties: Vec<PropertySetter<T>>,
    captures: Vec<CaptureSink<T>>,
    requests: Vec<CascadingParameterRequest>,
    missing_attributes: Vec<&'static str>,
}

impl<T: ParameterTarget> ParameterSchemaBuilder<T> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            captures: Vec::new(),
            requests: Vec::new(),
            missing_attributes: Vec::new(),
        }
    }

    /// Declares a property set directly by the parent.
    #[must_use]
    pub fn parameter<V, F>(self, name: &'static str, set: F) -> Self
    where
        V: Clone + Default + Send + Sync + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.property::<V>(name, true, false, typed_setter(set), None)
    }

    /// Declares a property set only from ancestor suppliers.
    #[must_use]
    pub fn cascading<V, F>(
        self,
        name: &'static str,
        attributes: impl IntoIterator<Item = CascadingAttribute>,
        set: F,
    ) -> Self
    where
        V: Clone + Default + Send + Sync + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.with_requests::<V>(name, attributes, None)
            .property::<V>(name, false, true, typed_setter(set), None)
    }

    /// Declares a property accepting both direct and cascading values.
    #[must_use]
    pub fn parameter_or_cascading<V, F>(
        self,
        name: &'static str,
        attributes: impl IntoIterator<Item = CascadingAttribute>,
        set: F,
    ) -> Self
    where
        V: Clone + Default + Send + Sync + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.with_requests::<V>(name, attributes, None)
            .property::<V>(name, true, true, typed_setter(set), None)
    }

    /// Declares a property restored from, and saved to, persisted component state.
    ///
    /// `get` reads the property's current value when state is persisted.
    #[must_use]
    pub fn persistent_state<V, F, G>(self, name: &'static str, set: F, get: G) -> Self
    where
        V: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let codec: Arc<dyn ValueCodec> = Arc::new(JsonCodec::<V>::new());
        let getter: Getter<T> = Box::new(move |target| ParameterValue::new(get(target)));
        self.with_requests::<V>(name, [CascadingAttribute::persistent_state()], Some(codec))
            .property::<V>(name, false, true, typed_setter(set), Some(getter))
    }

    /// Declares the property that receives every parameter with no matching property.
    #[must_use]
    pub fn capture_unmatched<F>(mut self, name: &'static str, set: F) -> Self
    where
        F: Fn(&mut T, CapturedAttributes) + Send + Sync + 'static,
    {
        self.captures.push(CaptureSink {
            name,
            set: Box::new(set),
        });
        self
    }

    /// Validates the declarations and produces the schema.
    pub fn build(self) -> Result<ParameterSchema<T>, SchemaError> {
        let type_name = core::any::type_name::<T>();

        if let Some(&property) = self.missing_attributes.first() {
            return Err(SchemaError::MissingCascadingAttribute {
                type_name,
                property,
            });
        }

        let mut captures = self.captures.into_iter();
        let capture = captures.next();
        if let (Some(first), Some(second)) = (&capture, captures.next()) {
            return Err(SchemaError::MultipleCaptureSinks {
                type_name,
                first: first.name,
                second: second.name,
            });
        }

        let mut by_name: HashMap<String, usize> = HashMap::with_capacity(self.properties.len());
        for (index, property) in self.properties.iter().enumerate() {
            if let Some(&existing) = by_name.get(&fold_name(property.name)) {
                return Err(SchemaError::DuplicateName {
                    type_name,
                    first: self.properties[existing].name,
                    second: property.name,
                });
            }
            by_name.insert(fold_name(property.name), index);
        }
        if let Some(sink) = &capture
            && let Some(&existing) = by_name.get(&fold_name(sink.name))
        {
            return Err(SchemaError::DuplicateName {
                type_name,
                first: self.properties[existing].name,
                second: sink.name,
            });
        }

        Ok(ParameterSchema {
            type_name,
            properties: self.properties,
            by_name,
            capture,
            requests: self.requests.into(),
        })
    }

    fn property<V: 'static>(
        mut self,
        name: &'static str,
        direct: bool,
        cascading: bool,
        set: Setter<T>,
        get: Option<Getter<T>>,
    ) -> Self {
        self.properties.push(PropertySetter {
            name,
            value_type_name: core::any::type_name::<V>(),
            direct,
            cascading,
            set,
            get,
        });
        self
    }

    fn with_requests<V: 'static>(
        mut self,
        name: &'static str,
        attributes: impl IntoIterator<Item = CascadingAttribute>,
        codec: Option<Arc<dyn ValueCodec>>,
    ) -> Self {
        let before = self.requests.len();
        for attribute in attributes {
            let mut request = CascadingParameterRequest::new::<V>(name, attribute);
            request.codec = codec.clone();
            self.requests.push(request);
        }
        if self.requests.len() == before {
            self.missing_attributes.push(name);
        }
        self
    }
}

impl<T: ParameterTarget> Default for ParameterSchemaBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ParameterSchemaBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSchemaBuilder")
            .field("type", &core::any::type_name::<T>())
            .field("properties", &self.properties.len())
            .field("captures", &self.captures.len())
            .field("requests", &self.requests)
            .finish()
    }
}

/// The validated property table of a [`ParameterTarget`].
pub struct ParameterSchema<T> {
    pub(crate) type_name: &'static str,
    pub(crate) properties: Vec<PropertySetter<T>>,
    pub(crate) by_name: HashMap<String, usize>,
    pub(crate) capture: Option<CaptureSink<T>>,
    requests: Arc<[CascadingParameterRequest]>,
}

impl<T> ParameterSchema<T> {
    /// The described type's name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Number of declared properties, excluding the capture property.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if no properties are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Property names in declaration order.
    pub fn property_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties.iter().map(|property| property.name)
    }

    /// Returns `true` if a property named `name`, ignoring case, is declared.
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.by_name.contains_key(&fold_name(name))
    }

    /// The name of the capture property, if any.
    #[must_use]
    pub fn capture_name(&self) -> Option<&'static str> {
        self.capture.as_ref().map(|sink| sink.name)
    }

    /// The cascading requests of every cascading property, in declaration order.
    #[must_use]
    pub fn cascading_requests(&self) -> &Arc<[CascadingParameterRequest]> {
        &self.requests
    }

    /// Reads a property that declared a getter.
    ///
    /// Returns `None` for unknown properties and properties without a getter.
    #[must_use]
    pub fn read(&self, target: &T, name: &str) -> Option<ParameterValue> {
        let property = &self.properties[*self.by_name.get(&fold_name(name))?];
        property.get.as_ref().map(|get| get(target))
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&PropertySetter<T>> {
        self.by_name
            .get(&fold_name(name))
            .map(|&index| &self.properties[index])
    }
}

impl<T> fmt::Debug for ParameterSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSchema")
            .field("type_name", &self.type_name)
            .field(
                "properties",
                &self
                    .properties
                    .iter()
                    .map(|p| (p.name, p.value_type_name))
                    .collect::<Vec<_>>(),
            )
            .field("capture", &self.capture_name())
            .field("requests", &self.requests)
            .finish()
    }
}
