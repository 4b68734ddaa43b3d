// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parameter views: the merged direct and cascading inputs of one component.

use core::any::Any;
use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::cache::SchemaCache;
use crate::change::may_have_changed;
use crate::error::BindError;
use crate::frame::{AttributeFrames, RenderFrame, attribute_run};
use crate::schema::ParameterTarget;
use crate::value::ParameterValue;

/// A live source of a cascading parameter's value.
///
/// Returning `None` means the source has nothing to offer right now; the
/// parameter is then left out of enumeration and the property keeps its
/// current value.
///
/// Implemented for closures so tests and simple hosts can pass one inline.
pub trait CurrentValue: Send + Sync {
    /// Reads the current value.
    fn current_value(&self) -> Option<ParameterValue>;
}

impl<F> CurrentValue for F
where
    F: Fn() -> Option<ParameterValue> + Send + Sync,
{
    fn current_value(&self) -> Option<ParameterValue> {
        self()
    }
}

/// A resolved cascading parameter: a property name bound to a value source.
#[derive(Clone)]
pub struct CascadingParameter {
    name: &'static str,
    source: Arc<dyn CurrentValue>,
}

impl CascadingParameter {
    /// Binds `name` to `source`.
    #[must_use]
    pub fn new(name: &'static str, source: Arc<dyn CurrentValue>) -> Self {
        Self { name, source }
    }

    /// Binds `name` to a value that never changes.
    #[must_use]
    pub fn fixed(name: &'static str, value: ParameterValue) -> Self {
        Self::new(name, Arc::new(move || Some(value.clone())))
    }

    /// The consuming property's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reads the source's current value.
    #[must_use]
    pub fn current_value(&self) -> Option<ParameterValue> {
        self.source.current_value()
    }
}

impl fmt::Debug for CascadingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadingParameter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One enumerated parameter.
#[derive(Clone, Debug)]
pub struct ParameterEntry<'a> {
    /// Parameter name as supplied.
    pub name: &'a str,
    /// Parameter value.
    pub value: ParameterValue,
    /// `true` if the value came from an ancestor supplier.
    pub cascading: bool,
}

/// The inputs of one component: the attribute run of its frame followed by
/// its resolved cascading parameters.
///
/// A view is a cheap, copyable borrow; enumerating it has no side effects and
/// can be repeated.
///
/// # Example
///
/// ```rust
/// use understory_parameter::{CascadingParameter, ParameterValue, ParameterView, RenderFrame};
///
/// struct Child;
/// let frames = [
///     RenderFrame::component::<Child>(3),
///     RenderFrame::attribute("Foo", ParameterValue::new(1_i32)),
///     RenderFrame::attribute("Bar", ParameterValue::new("x")),
/// ];
/// let cascading = [CascadingParameter::fixed("Baz", ParameterValue::new(true))];
/// let view = ParameterView::new(&frames, 0).with_cascading(&cascading);
///
/// let entries: Vec<_> = view.iter().map(|e| (e.name, e.cascading)).collect();
/// assert_eq!(entries, [("Foo", false), ("Bar", false), ("Baz", true)]);
/// assert_eq!(view.try_get::<i32>("Foo"), Some(1));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ParameterView<'a> {
    frames: &'a [RenderFrame],
    owner: usize,
    cascading: &'a [CascadingParameter],
}

impl<'a> ParameterView<'a> {
    /// A view with no parameters.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            frames: &[],
            owner: 0,
            cascading: &[],
        }
    }

    /// A view over the attributes of the frame at `owner`.
    #[must_use]
    pub const fn new(frames: &'a [RenderFrame], owner: usize) -> Self {
        Self {
            frames,
            owner,
            cascading: &[],
        }
    }

    /// Appends resolved cascading parameters after the direct ones.
    #[must_use]
    pub const fn with_cascading(self, cascading: &'a [CascadingParameter]) -> Self {
        Self { cascading, ..self }
    }

    /// Enumerates direct parameters, then cascading ones.
    #[must_use]
    pub fn iter(&self) -> ParameterEnumerator<'a> {
        ParameterEnumerator {
            direct: self.direct(),
            cascading: self.cascading.iter(),
        }
    }

    /// Enumerates only the direct parameters.
    #[must_use]
    pub fn direct(&self) -> AttributeFrames<'a> {
        attribute_run(self.frames, self.owner)
    }

    /// Number of direct parameters.
    #[must_use]
    pub fn direct_len(&self) -> usize {
        self.direct().count()
    }

    /// The resolved cascading parameters.
    #[must_use]
    pub fn cascading(&self) -> &'a [CascadingParameter] {
        self.cascading
    }

    /// Returns the value of the first parameter named exactly `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        self.iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value)
    }

    /// Returns the first parameter named exactly `name`, if it holds a `T`.
    ///
    /// A null value, a value of another type, and a missing parameter all
    /// yield `None`.
    #[must_use]
    pub fn try_get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        self.get(name)?.downcast_ref::<T>().cloned()
    }

    /// Like [`ParameterView::try_get`], falling back to `T::default()`.
    #[must_use]
    pub fn get_value_or_default<T: Any + Clone + Default>(&self, name: &str) -> T {
        self.try_get(name).unwrap_or_default()
    }

    /// Collects every parameter into a map; later entries replace earlier ones.
    #[must_use]
    pub fn to_dictionary(&self) -> HashMap<String, ParameterValue> {
        self.iter()
            .map(|entry| (entry.name.to_owned(), entry.value))
            .collect()
    }

    /// Copies the direct parameters into an owned buffer.
    ///
    /// Cascading parameters are live bindings and are not copied.
    #[must_use]
    pub fn to_owned_parameters(&self) -> OwnedParameters {
        self.direct()
            .map(|(name, value)| (Cow::Owned(name.to_owned()), value.clone()))
            .collect()
    }

    /// Returns `true` only if the direct parameters of `self` and `old` are
    /// provably the same.
    ///
    /// Parameters are compared by position: both runs must have the same
    /// length, the same name at every position, and values that
    /// [`may_have_changed`] cannot tell apart. Anything else counts as
    /// changed.
    #[must_use]
    pub fn definitely_equals(&self, old: &ParameterView<'_>) -> bool {
        let mut old = old.direct();
        let mut new = self.direct();
        loop {
            match (old.next(), new.next()) {
                (None, None) => return true,
                (Some((old_name, old_value)), Some((new_name, new_value))) => {
                    if old_name != new_name || may_have_changed(old_value, new_value) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    /// Assigns every parameter to `target` using its cached schema.
    pub fn bind<T: ParameterTarget>(
        &self,
        cache: &SchemaCache,
        target: &mut T,
    ) -> Result<(), BindError> {
        cache.schema::<T>()?.apply(*self, target)
    }
}

impl Default for ParameterView<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for ParameterView<'a> {
    type Item = ParameterEntry<'a>;
    type IntoIter = ParameterEnumerator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &ParameterView<'a> {
    type Item = ParameterEntry<'a>;
    type IntoIter = ParameterEnumerator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward-only enumeration of a [`ParameterView`].
///
/// Created by [`ParameterView::iter`].
#[derive(Clone, Debug)]
pub struct ParameterEnumerator<'a> {
    direct: AttributeFrames<'a>,
    cascading: core::slice::Iter<'a, CascadingParameter>,
}

impl<'a> Iterator for ParameterEnumerator<'a> {
    type Item = ParameterEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((name, value)) = self.direct.next() {
            return Some(ParameterEntry {
                name,
                value: value.clone(),
                cascading: false,
            });
        }
        for parameter in self.cascading.by_ref() {
            if let Some(value) = parameter.current_value() {
                return Some(ParameterEntry {
                    name: parameter.name(),
                    value,
                    cascading: true,
                });
            }
        }
        None
    }
}

const INLINE_FRAMES: usize = 8;

/// An owned set of direct parameters.
///
/// Stored as a single owner frame followed by its attribute run, so a
/// [`ParameterView`] over it behaves exactly like one over a parent's render
/// output. Useful for retaining a component's last parameters across renders
/// and for building parameters by hand.
///
/// ```rust
/// use understory_parameter::{OwnedParameters, ParameterValue};
///
/// let params = OwnedParameters::from_pairs([
///     ("Foo", ParameterValue::new(1_i32)),
///     ("Bar", ParameterValue::new(String::from("x"))),
/// ]);
/// assert_eq!(params.len(), 2);
/// assert_eq!(params.view().try_get::<String>("Bar").as_deref(), Some("x"));
/// ```
#[derive(Clone, Debug)]
pub struct OwnedParameters {
    frames: SmallVec<[RenderFrame; INLINE_FRAMES]>,
}

impl OwnedParameters {
    /// An empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        let mut frames = SmallVec::new();
        frames.push(RenderFrame::Region { subtree_length: 1 });
        Self { frames }
    }

    /// Builds a parameter set from name/value pairs, in order.
    #[must_use]
    pub fn from_pairs<N>(pairs: impl IntoIterator<Item = (N, ParameterValue)>) -> Self
    where
        N: Into<Cow<'static, str>>,
    {
        pairs.into_iter().collect()
    }

    /// Appends a parameter.
    pub fn push(&mut self, name: impl Into<Cow<'static, str>>, value: ParameterValue) {
        self.frames.push(RenderFrame::attribute(name, value));
        let len = self.frames.len();
        if let Some(RenderFrame::Region { subtree_length }) = self.frames.first_mut() {
            *subtree_length = len;
        }
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len() - 1
    }

    /// Returns `true` if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A view over these parameters with no cascading parameters.
    #[must_use]
    pub fn view(&self) -> ParameterView<'_> {
        ParameterView::new(&self.frames, 0)
    }
}

impl Default for OwnedParameters {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Into<Cow<'static, str>>> FromIterator<(N, ParameterValue)> for OwnedParameters {
    fn from_iter<I: IntoIterator<Item = (N, ParameterValue)>>(iter: I) -> Self {
        let mut parameters = Self::new();
        for (name, value) in iter {
            parameters.push(name, value);
        }
        parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Child;

    fn frames() -> Vec<RenderFrame> {
        vec![
            RenderFrame::component::<Child>(4),
            RenderFrame::attribute("Foo", ParameterValue::new(1_i32)),
            RenderFrame::attribute("Bar", ParameterValue::new("x")),
            RenderFrame::text("body"),
        ]
    }

    fn summarize(view: &ParameterView<'_>) -> Vec<(String, String, bool)> {
        view.iter()
            .map(|entry| {
                let shown = if let Some(v) = entry.value.downcast_ref::<i32>() {
                    v.to_string()
                } else if let Some(v) = entry.value.downcast_ref::<&str>() {
                    (*v).to_owned()
                } else if let Some(v) = entry.value.downcast_ref::<bool>() {
                    v.to_string()
                } else {
                    String::from("?")
                };
                (entry.name.to_owned(), shown, entry.cascading)
            })
            .collect()
    }

    #[test]
    fn direct_then_cascading_in_order_and_repeatable() {
        let frames = frames();
        let cascading = [CascadingParameter::fixed(
            "Baz",
            ParameterValue::new(true),
        )];
        let view = ParameterView::new(&frames, 0).with_cascading(&cascading);

        let expected = vec![
            (String::from("Foo"), String::from("1"), false),
            (String::from("Bar"), String::from("x"), false),
            (String::from("Baz"), String::from("true"), true),
        ];
        assert_eq!(summarize(&view), expected);
        assert_eq!(summarize(&view), expected);
    }

    #[test]
    fn absent_cascading_values_are_skipped() {
        let frames = frames();
        let cascading = [
            CascadingParameter::new("Missing", Arc::new(|| None::<ParameterValue>)),
            CascadingParameter::fixed("Present", ParameterValue::new(2_i32)),
        ];
        let view = ParameterView::new(&frames, 0).with_cascading(&cascading);
        let names: Vec<_> = view.iter().map(|entry| entry.name).collect();
        assert_eq!(names, ["Foo", "Bar", "Present"]);
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let frames = frames();
        let view = ParameterView::new(&frames, 0);
        assert_eq!(view.try_get::<i32>("Foo"), Some(1));
        assert_eq!(view.try_get::<i32>("foo"), None);
        assert_eq!(view.try_get::<String>("Foo"), None);
        assert_eq!(view.get_value_or_default::<i32>("Nope"), 0);
        assert_eq!(view.direct_len(), 2);
    }

    #[test]
    fn dictionary_keeps_last_value() {
        let frames = frames();
        let cascading = [CascadingParameter::fixed("Foo", ParameterValue::new(9_i32))];
        let view = ParameterView::new(&frames, 0).with_cascading(&cascading);
        let dict = view.to_dictionary();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict["Foo"].downcast_ref::<i32>(), Some(&9));
        // First match wins for single lookups.
        assert_eq!(view.try_get::<i32>("Foo"), Some(1));
    }

    #[test]
    fn empty_view_has_nothing() {
        let view = ParameterView::empty();
        assert_eq!(view.iter().count(), 0);
        assert!(view.to_dictionary().is_empty());
        assert!(view.definitely_equals(&ParameterView::default()));
    }

    #[test]
    fn equal_primitives_are_definitely_equal() {
        let old = OwnedParameters::from_pairs([
            ("A", ParameterValue::new(1_i32)),
            ("B", ParameterValue::new(String::from("s"))),
        ]);
        let new = OwnedParameters::from_pairs([
            ("A", ParameterValue::new(1_i32)),
            ("B", ParameterValue::new(String::from("s"))),
        ]);
        assert!(new.view().definitely_equals(&old.view()));
    }

    #[test]
    fn any_doubt_means_changed() {
        let base = OwnedParameters::from_pairs([("A", ParameterValue::new(1_i32))]);

        let renamed = OwnedParameters::from_pairs([("a", ParameterValue::new(1_i32))]);
        assert!(!renamed.view().definitely_equals(&base.view()));

        let longer = OwnedParameters::from_pairs([
            ("A", ParameterValue::new(1_i32)),
            ("B", ParameterValue::new(2_i32)),
        ]);
        assert!(!longer.view().definitely_equals(&base.view()));
        assert!(!base.view().definitely_equals(&longer.view()));

        let list = ParameterValue::new(vec![1_u8]);
        let old = OwnedParameters::from_pairs([("L", list.clone())]);
        let new = OwnedParameters::from_pairs([("L", list)]);
        assert!(!new.view().definitely_equals(&old.view()));
    }

    #[test]
    fn owned_copy_drops_cascading() {
        let frames = frames();
        let cascading = [CascadingParameter::fixed("Baz", ParameterValue::new(true))];
        let view = ParameterView::new(&frames, 0).with_cascading(&cascading);
        let owned = view.to_owned_parameters();
        assert_eq!(owned.len(), 2);
        assert!(owned.view().definitely_equals(&view));
        assert!(owned.view().get("Baz").is_none());
    }
}
