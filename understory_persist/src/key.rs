// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stable keys for persisted component properties.

use core::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use hashbrown::HashMap;
use sha2::{Digest, Sha256};
use tracing::debug;
use understory_cascade::ComponentIdentity;
use understory_parameter::ParameterValue;
use uuid::Uuid;

type PreKey = [u8; 32];

macro_rules! display_identity {
    ($value:expr; $($ty:ty),* $(,)?) => {
        $(
            if let Some(value) = $value.downcast_ref::<$ty>() {
                return Some(value.to_string());
            }
        )*
    };
}

/// Canonical text of a component identity, if its type is one that can
/// appear in a key.
///
/// Strings, `bool`, `char`, integer and float primitives, [`Uuid`] and the
/// `chrono` date/time types are accepted. Anything else, including null,
/// returns `None`.
///
/// ```rust
/// use understory_parameter::ParameterValue;
/// use understory_persist::serializable_identity;
///
/// assert_eq!(serializable_identity(&ParameterValue::new(42_u64)).as_deref(), Some("42"));
/// assert_eq!(serializable_identity(&ParameterValue::new(vec![1, 2])), None);
/// ```
#[must_use]
pub fn serializable_identity(value: &ParameterValue) -> Option<String> {
    if value.is_null() {
        return None;
    }
    display_identity!(value;
        String, &'static str, Arc<str>,
        bool, char,
        i8, i16, i32, i64, i128, isize,
        u8, u16, u32, u64, u128, usize,
        f32, f64,
        Uuid,
        NaiveDate, NaiveTime, NaiveDateTime,
    );
    if let Some(value) = value.downcast_ref::<DateTime<Utc>>() {
        return Some(value.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    if let Some(value) = value.downcast_ref::<DateTime<FixedOffset>>() {
        return Some(value.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    None
}

fn write_name(hasher: &mut Sha256, name: &str) {
    hasher.update((name.len() as u64).to_le_bytes());
    hasher.update(name.as_bytes());
}

/// Derives the key a component property is persisted under.
///
/// The key depends only on the parent type, the component type, the property
/// name and, when it has a supported type, the component's `@key`. It is
/// stable across processes, so state saved before a render-mode transition
/// is found again after it.
///
/// The type/name part is hashed once per triple and cached.
///
/// # Example
///
/// ```rust
/// use understory_parameter::ParameterValue;
/// use understory_persist::PersistentKeyDeriver;
///
/// let keys = PersistentKeyDeriver::new();
/// let row = ParameterValue::new(7_i32);
///
/// let a = keys.derive_key(Some("List"), "Row", "Expanded", Some(&row));
/// let b = keys.derive_key(Some("List"), "Row", "Expanded", Some(&row));
/// assert_eq!(a, b);
/// assert_ne!(a, keys.derive_key(Some("List"), "Row", "Selected", Some(&row)));
///
/// // Identities of other types are ignored.
/// let custom = ParameterValue::new(vec![7_i32]);
/// assert_eq!(
///     keys.derive_key(Some("List"), "Row", "Expanded", Some(&custom)),
///     keys.derive_key(Some("List"), "Row", "Expanded", None),
/// );
/// ```
#[derive(Default)]
pub struct PersistentKeyDeriver {
    pre_keys: RwLock<HashMap<(String, String, String), PreKey>>,
}

impl PersistentKeyDeriver {
    /// Creates a deriver with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A process-wide deriver.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<PersistentKeyDeriver> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Derives the key for `property` of a `component_type` under
    /// `parent_type`, optionally qualified by `identity`.
    #[must_use]
    pub fn derive_key(
        &self,
        parent_type: Option<&str>,
        component_type: &str,
        property: &str,
        identity: Option<&ParameterValue>,
    ) -> String {
        let pre_key = self.pre_key(parent_type.unwrap_or_default(), component_type, property);
        match identity.and_then(serializable_identity) {
            Some(identity) => {
                let mut hasher = Sha256::new();
                hasher.update(pre_key);
                hasher.update(identity.as_bytes());
                BASE64.encode(hasher.finalize())
            }
            None => BASE64.encode(pre_key),
        }
    }

    /// Derives the key for `property` of the component `identity`.
    #[must_use]
    pub fn derive_for(&self, identity: &ComponentIdentity, property: &str) -> String {
        self.derive_key(
            identity.parent_type_name,
            identity.type_name,
            property,
            identity.key.as_ref(),
        )
    }

    /// Number of cached type/name triples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pre_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached pre-key.
    pub fn invalidate_all(&self) {
        let mut pre_keys = self.pre_keys.write().unwrap_or_else(PoisonError::into_inner);
        debug!(cached = pre_keys.len(), "invalidating persistent key cache");
        pre_keys.clear();
    }

    fn pre_key(&self, parent_type: &str, component_type: &str, property: &str) -> PreKey {
        let triple = (
            parent_type.to_owned(),
            component_type.to_owned(),
            property.to_owned(),
        );
        if let Some(pre_key) = self
            .pre_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&triple)
        {
            return *pre_key;
        }

        let mut hasher = Sha256::new();
        write_name(&mut hasher, parent_type);
        write_name(&mut hasher, component_type);
        write_name(&mut hasher, property);
        let pre_key: PreKey = hasher.finalize().into();

        self.pre_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(triple, pre_key);
        pre_key
    }
}

impl fmt::Debug for PersistentKeyDeriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentKeyDeriver")
            .field("cached", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_length_prefixed() {
        let keys = PersistentKeyDeriver::new();
        assert_ne!(
            keys.derive_key(Some("ab"), "c", "d", None),
            keys.derive_key(Some("a"), "bc", "d", None)
        );
    }

    #[test]
    fn identity_changes_the_key() {
        let keys = PersistentKeyDeriver::new();
        let one = ParameterValue::new(1_u32);
        let two = ParameterValue::new(2_u32);
        assert_ne!(
            keys.derive_key(None, "Row", "Open", Some(&one)),
            keys.derive_key(None, "Row", "Open", Some(&two))
        );
        assert_ne!(
            keys.derive_key(None, "Row", "Open", Some(&one)),
            keys.derive_key(None, "Row", "Open", None)
        );
    }

    #[test]
    fn null_identity_is_no_identity() {
        let keys = PersistentKeyDeriver::new();
        assert_eq!(
            keys.derive_key(None, "Row", "Open", Some(&ParameterValue::null())),
            keys.derive_key(None, "Row", "Open", None)
        );
    }

    #[test]
    fn keys_are_base64_sha256() {
        let keys = PersistentKeyDeriver::new();
        let key = keys.derive_key(None, "Counter", "Count", None);
        assert_eq!(BASE64.decode(&key).unwrap().len(), 32);
        assert_eq!(keys.len(), 1);

        keys.invalidate_all();
        assert!(keys.is_empty());
        assert_eq!(keys.derive_key(None, "Counter", "Count", None), key);
    }

    #[test]
    fn temporal_identities_are_canonical() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(
            serializable_identity(&ParameterValue::new(at)).as_deref(),
            Some("2024-05-01T12:00:00+02:00")
        );
        let utc = at.with_timezone(&Utc);
        assert_eq!(
            serializable_identity(&ParameterValue::new(utc)).as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        let id = Uuid::from_u128(1);
        assert_eq!(
            serializable_identity(&ParameterValue::new(id)),
            Some(id.to_string())
        );
    }
}
