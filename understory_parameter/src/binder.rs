// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Applying a [`ParameterView`] to a target.

use tracing::trace;

use crate::error::BindError;
use crate::schema::{CapturedAttributes, ParameterSchema, names_equal_ignore_case};
use crate::view::ParameterView;

impl<T> ParameterSchema<T> {
    /// Assigns every parameter in `view` to `target`, in enumeration order.
    ///
    /// Direct parameters are applied before cascading ones, so a cascading
    /// value replaces a direct value of the same name. Names are matched
    /// ignoring case. Parameters that match no property go to the capture
    /// property, which is only assigned if at least one arrives.
    ///
    /// Binding stops at the first error; properties assigned before it keep
    /// their new values.
    pub fn apply(&self, view: ParameterView<'_>, target: &mut T) -> Result<(), BindError> {
        let mut captured: Option<CapturedAttributes> = None;

        for entry in view {
            if let Some(property) = self.lookup(entry.name) {
                if entry.cascading && !property.cascading {
                    return Err(BindError::NotCascading {
                        type_name: self.type_name,
                        name: property.name,
                    });
                }
                if !entry.cascading && !property.direct {
                    return Err(BindError::NotDirect {
                        type_name: self.type_name,
                        name: property.name,
                    });
                }
                (property.set)(target, &entry.value).map_err(|actual| {
                    BindError::TypeMismatch {
                        type_name: self.type_name,
                        name: property.name,
                        expected: property.value_type_name,
                        actual,
                    }
                })?;
                continue;
            }

            match &self.capture {
                Some(sink) if names_equal_ignore_case(sink.name, entry.name) => {
                    return Err(BindError::CaptureConflict {
                        type_name: self.type_name,
                        name: entry.name.to_owned(),
                    });
                }
                Some(_) if !entry.cascading => {
                    trace!(
                        target_type = self.type_name,
                        name = entry.name,
                        "captured unmatched parameter"
                    );
                    captured
                        .get_or_insert_default()
                        .insert(entry.name.to_owned(), entry.value);
                }
                _ => {
                    return Err(BindError::UnknownParameter {
                        type_name: self.type_name,
                        name: entry.name.to_owned(),
                    });
                }
            }
        }

        if let (Some(sink), Some(captured)) = (&self.capture, captured) {
            (sink.set)(target, captured);
        }
        Ok(())
    }
}
