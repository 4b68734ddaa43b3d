// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render frames and the attribute-run reader.
//!
//! A parent's render output is a flat sequence of [`RenderFrame`]s. An element
//! or component frame owns the frames of its subtree (its `subtree_length`
//! counts itself). The attributes of an owner immediately follow it; the run
//! ends at the first non-attribute frame or at the end of the owner's subtree,
//! whichever comes first. [`attribute_run`] reads exactly that run and is the
//! lowest-level source of direct parameters.

use std::borrow::Cow;

use crate::value::ParameterValue;

/// A single frame of render output.
///
/// Only the shape needed for parameter reading is modelled; the frame
/// buffer's builder and diffing live elsewhere.
#[derive(Clone, Debug)]
pub enum RenderFrame {
    /// An element with the given tag name.
    Element {
        /// Tag name.
        name: Cow<'static, str>,
        /// Number of frames in this element's subtree, including itself.
        subtree_length: usize,
    },
    /// A child component of the given type.
    Component {
        /// Type name of the component.
        type_name: &'static str,
        /// Number of frames in this component's subtree, including itself.
        subtree_length: usize,
    },
    /// A named attribute of the preceding owner frame.
    Attribute {
        /// Attribute (parameter) name.
        name: Cow<'static, str>,
        /// Attribute value.
        value: ParameterValue,
    },
    /// Text content.
    Text(Cow<'static, str>),
    /// A grouping region.
    Region {
        /// Number of frames in this region, including itself.
        subtree_length: usize,
    },
}

impl RenderFrame {
    /// Creates an element frame.
    #[must_use]
    pub fn element(name: impl Into<Cow<'static, str>>, subtree_length: usize) -> Self {
        Self::Element {
            name: name.into(),
            subtree_length,
        }
    }

    /// Creates a component frame for `T`.
    #[must_use]
    pub fn component<T: ?Sized>(subtree_length: usize) -> Self {
        Self::Component {
            type_name: core::any::type_name::<T>(),
            subtree_length,
        }
    }

    /// Creates an attribute frame.
    #[must_use]
    pub fn attribute(name: impl Into<Cow<'static, str>>, value: ParameterValue) -> Self {
        Self::Attribute {
            name: name.into(),
            value,
        }
    }

    /// Creates a text frame.
    #[must_use]
    pub fn text(content: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(content.into())
    }

    /// Returns the number of frames covered by this frame's subtree.
    ///
    /// Leaf frames (attributes, text) cover only themselves.
    #[must_use]
    pub fn subtree_length(&self) -> usize {
        match self {
            Self::Element { subtree_length, .. }
            | Self::Component { subtree_length, .. }
            | Self::Region { subtree_length } => *subtree_length,
            Self::Attribute { .. } | Self::Text(_) => 1,
        }
    }

    /// Returns `true` for attribute frames.
    #[must_use]
    #[inline]
    pub fn is_attribute(&self) -> bool {
        matches!(self, Self::Attribute { .. })
    }

    /// Returns the name and value of an attribute frame.
    #[must_use]
    pub fn as_attribute(&self) -> Option<(&str, &ParameterValue)> {
        match self {
            Self::Attribute { name, value } => Some((&**name, value)),
            _ => None,
        }
    }
}

/// Iterator over the attribute run that follows an owner frame.
///
/// Created by [`attribute_run`].
#[derive(Clone, Debug)]
pub struct AttributeFrames<'a> {
    frames: &'a [RenderFrame],
    next: usize,
    end: usize,
}

impl AttributeFrames<'_> {
    /// An empty run.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            frames: &[],
            next: 0,
            end: 0,
        }
    }
}

impl<'a> Iterator for AttributeFrames<'a> {
    type Item = (&'a str, &'a ParameterValue);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let frames = self.frames;
        match frames[self.next].as_attribute() {
            Some(attribute) => {
                self.next += 1;
                Some(attribute)
            }
            None => {
                // The run is over; never look past the first non-attribute frame.
                self.next = self.end;
                None
            }
        }
    }
}

/// Reads the attributes of the frame at `owner`.
///
/// The run stops at the first non-attribute frame after `owner`, at the end
/// of the owner's subtree, or at the end of `frames`, whichever comes first.
/// An out-of-range `owner` yields an empty run.
///
/// # Example
///
/// ```rust
/// use understory_parameter::{ParameterValue, RenderFrame, attribute_run};
///
/// struct Child;
/// let frames = [
///     RenderFrame::component::<Child>(4),
///     RenderFrame::attribute("Foo", ParameterValue::new(1_i32)),
///     RenderFrame::attribute("Bar", ParameterValue::new("x")),
///     RenderFrame::text("child content"),
/// ];
///
/// let names: Vec<_> = attribute_run(&frames, 0).map(|(name, _)| name).collect();
/// assert_eq!(names, ["Foo", "Bar"]);
/// ```
#[must_use]
pub fn attribute_run(frames: &[RenderFrame], owner: usize) -> AttributeFrames<'_> {
    let Some(owner_frame) = frames.get(owner) else {
        return AttributeFrames::empty();
    };
    let end = owner
        .saturating_add(owner_frame.subtree_length())
        .min(frames.len());
    AttributeFrames {
        frames,
        next: owner + 1,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Child;

    fn names(run: AttributeFrames<'_>) -> Vec<&str> {
        run.map(|(name, _)| name).collect()
    }

    #[test]
    fn run_stops_at_first_non_attribute() {
        let frames = [
            RenderFrame::element("div", 5),
            RenderFrame::attribute("class", ParameterValue::new("a")),
            RenderFrame::text("hello"),
            RenderFrame::attribute("late", ParameterValue::new("b")),
            RenderFrame::text("tail"),
        ];
        assert_eq!(names(attribute_run(&frames, 0)), ["class"]);
    }

    #[test]
    fn run_stops_at_subtree_end() {
        // The owner's subtree covers only itself and one attribute; the next
        // attribute belongs to a sibling owner in a malformed buffer and must
        // not be read.
        let frames = [
            RenderFrame::component::<Child>(2),
            RenderFrame::attribute("A", ParameterValue::new(1_i32)),
            RenderFrame::attribute("B", ParameterValue::new(2_i32)),
        ];
        assert_eq!(names(attribute_run(&frames, 0)), ["A"]);
    }

    #[test]
    fn run_is_clamped_to_buffer() {
        let frames = [
            RenderFrame::component::<Child>(10),
            RenderFrame::attribute("A", ParameterValue::new(1_i32)),
        ];
        assert_eq!(names(attribute_run(&frames, 0)), ["A"]);
    }

    #[test]
    fn owner_without_attributes() {
        let frames = [RenderFrame::component::<Child>(1)];
        assert_eq!(attribute_run(&frames, 0).count(), 0);
        assert_eq!(attribute_run(&frames, 7).count(), 0);
    }

    #[test]
    fn nested_owner_reads_its_own_run() {
        let frames = [
            RenderFrame::element("div", 4),
            RenderFrame::attribute("id", ParameterValue::new("outer")),
            RenderFrame::component::<Child>(2),
            RenderFrame::attribute("Value", ParameterValue::new(3_i32)),
        ];
        assert_eq!(names(attribute_run(&frames, 0)), ["id"]);
        assert_eq!(names(attribute_run(&frames, 2)), ["Value"]);
    }

    #[test]
    fn leaf_frames_cover_themselves() {
        assert_eq!(RenderFrame::text("x").subtree_length(), 1);
        assert_eq!(
            RenderFrame::attribute("a", ParameterValue::null()).subtree_length(),
            1
        );
        assert_eq!(RenderFrame::Region { subtree_length: 3 }.subtree_length(), 3);
    }
}
