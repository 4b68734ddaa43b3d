// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conservative change detection for parameter values.
//!
//! Skipping a render whose inputs did change is a correctness bug, while an
//! extra render is only wasted work. [`may_have_changed`] therefore only
//! reports "unchanged" for values whose equality it can prove: values of a
//! closed set of immutable types that compare equal.

use std::sync::Arc;

use crate::value::ParameterValue;

macro_rules! compare_known_immutable {
    ($old:expr, $new:expr; $($ty:ty),* $(,)?) => {
        $(
            if let (Some(old), Some(new)) =
                ($old.downcast_ref::<$ty>(), $new.downcast_ref::<$ty>())
            {
                return old != new;
            }
        )*
    };
}

/// Returns `true` unless `old` and `new` are provably equal.
///
/// - null vs. null: unchanged.
/// - null vs. a value, or values of different types: changed.
/// - values of a known immutable type (primitives, strings, `Uuid`, `chrono`
///   date/time values, `Duration`): compared by value.
/// - anything else: changed, even if both handles point at the same
///   allocation, since interior mutation cannot be ruled out.
///
/// # Example
///
/// ```rust
/// use understory_parameter::{ParameterValue, may_have_changed};
///
/// assert!(!may_have_changed(&ParameterValue::new(1_i32), &ParameterValue::new(1_i32)));
/// assert!(may_have_changed(&ParameterValue::new(1_i32), &ParameterValue::new(2_i32)));
///
/// // Unknown types are always reported as changed.
/// let list = ParameterValue::new(vec![1, 2, 3]);
/// assert!(may_have_changed(&list, &list.clone()));
/// ```
#[must_use]
pub fn may_have_changed(old: &ParameterValue, new: &ParameterValue) -> bool {
    match (old.is_null(), new.is_null()) {
        (true, true) => return false,
        (true, false) | (false, true) => return true,
        (false, false) => {}
    }
    if old.value_type() != new.value_type() {
        return true;
    }
    compare_known_immutable!(old, new;
        bool, char,
        i8, i16, i32, i64, i128, isize,
        u8, u16, u32, u64, u128, usize,
        f32, f64,
        String, &'static str, Arc<str>,
        core::time::Duration,
        uuid::Uuid,
        chrono::NaiveDate, chrono::NaiveTime, chrono::NaiveDateTime,
        chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::FixedOffset>,
    );
    true
}
