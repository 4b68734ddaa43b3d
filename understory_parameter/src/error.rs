// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for schema construction and parameter binding.

use thiserror::Error;

/// A parameter schema that cannot be used.
///
/// These are programming errors in a [`ParameterTarget`](crate::ParameterTarget)
/// description. They are detected once, when the schema is built, and the
/// result is cached alongside successful schemas.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two properties whose names are equal ignoring case.
    #[error(
        "type `{type_name}` declares parameters `{first}` and `{second}`, whose names differ only by case"
    )]
    DuplicateName {
        /// The described type.
        type_name: &'static str,
        /// The property declared first.
        first: &'static str,
        /// The property declared second.
        second: &'static str,
    },
    /// More than one property captures unmatched values.
    #[error(
        "type `{type_name}` declares more than one unmatched-value capture property: `{first}` and `{second}`"
    )]
    MultipleCaptureSinks {
        /// The described type.
        type_name: &'static str,
        /// The capture property declared first.
        first: &'static str,
        /// The capture property declared second.
        second: &'static str,
    },
    /// A cascading property with no attribute saying where its value comes from.
    #[error("cascading parameter `{property}` on type `{type_name}` declares no cascading attribute")]
    MissingCascadingAttribute {
        /// The described type.
        type_name: &'static str,
        /// The offending property.
        property: &'static str,
    },
}

/// A parameter view that cannot be applied to a target.
///
/// Unlike [`SchemaError`], these depend on what a parent actually passed and
/// are only detected while binding.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindError {
    /// A parameter with no matching property and no capture property to absorb it.
    #[error("object of type `{type_name}` does not have a property matching the name `{name}`")]
    UnknownParameter {
        /// The target type.
        type_name: &'static str,
        /// The unmatched parameter name.
        name: String,
    },
    /// An explicit value for the property that captures unmatched values.
    #[error(
        "object of type `{type_name}` received an explicit value for `{name}`, which captures unmatched values"
    )]
    CaptureConflict {
        /// The target type.
        type_name: &'static str,
        /// The capture property name as passed.
        name: String,
    },
    /// A value whose type differs from the property type.
    #[error("property `{name}` on type `{type_name}` expects `{expected}` but received `{actual}`")]
    TypeMismatch {
        /// The target type.
        type_name: &'static str,
        /// The property name.
        name: &'static str,
        /// The property value type.
        expected: &'static str,
        /// The type of the received value.
        actual: &'static str,
    },
    /// A direct value for a property that only accepts cascading values.
    #[error(
        "property `{name}` on type `{type_name}` is a cascading parameter and cannot be set directly"
    )]
    NotDirect {
        /// The target type.
        type_name: &'static str,
        /// The property name.
        name: &'static str,
    },
    /// A cascading value for a property that only accepts direct values.
    #[error(
        "property `{name}` on type `{type_name}` is not a cascading parameter and cannot receive a cascading value"
    )]
    NotCascading {
        /// The target type.
        type_name: &'static str,
        /// The property name.
        name: &'static str,
    },
    /// The target's schema is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Failure to encode or decode a value with a [`ValueCodec`](crate::ValueCodec).
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value handed to the codec is not of the codec's type.
    #[error("codec for `{expected}` cannot encode a value of type `{actual}`")]
    TypeMismatch {
        /// The codec's value type.
        expected: &'static str,
        /// The type of the value passed in.
        actual: &'static str,
    },
    /// JSON encoding or decoding failed.
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
}
