// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Byte codecs for parameter values.
//!
//! Cascading parameters restored from persisted state carry a [`ValueCodec`]
//! so the supplier can turn bytes back into a typed [`ParameterValue`]
//! without knowing the property type itself.

use core::fmt;
use core::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;
use crate::value::ParameterValue;

/// Encodes and decodes values of one property type.
pub trait ValueCodec: Send + Sync + 'static {
    /// The name of the type this codec handles.
    fn value_type_name(&self) -> &'static str;

    /// Encodes `value`, which must be of this codec's type.
    fn encode(&self, value: &ParameterValue) -> Result<Vec<u8>, CodecError>;

    /// Decodes bytes produced by [`ValueCodec::encode`].
    fn decode(&self, bytes: &[u8]) -> Result<ParameterValue, CodecError>;
}

/// A [`ValueCodec`] that stores values as JSON.
///
/// # Example
///
/// ```rust
/// use understory_parameter::{JsonCodec, ParameterValue, ValueCodec};
///
/// let codec = JsonCodec::<Vec<u32>>::new();
/// let bytes = codec.encode(&ParameterValue::new(vec![1_u32, 2])).unwrap();
/// let back = codec.decode(&bytes).unwrap();
/// assert_eq!(back.downcast_ref::<Vec<u32>>(), Some(&vec![1, 2]));
/// ```
pub struct JsonCodec<V>(PhantomData<fn() -> V>);

impl<V> JsonCodec<V> {
    /// Creates a codec for `V`.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JsonCodec")
            .field(&core::any::type_name::<V>())
            .finish()
    }
}

impl<V> ValueCodec for JsonCodec<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn value_type_name(&self) -> &'static str {
        core::any::type_name::<V>()
    }

    fn encode(&self, value: &ParameterValue) -> Result<Vec<u8>, CodecError> {
        let typed = value
            .downcast_ref::<V>()
            .ok_or(CodecError::TypeMismatch {
                expected: core::any::type_name::<V>(),
                actual: value.type_name(),
            })?;
        Ok(serde_json::to_vec(typed)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<ParameterValue, CodecError> {
        let typed: V = serde_json::from_slice(bytes)?;
        Ok(ParameterValue::new(typed))
    }
}
