// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cascading parameters read from the navigation query string.

use core::any::TypeId;
use core::fmt;
use core::str::FromStr;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use hashbrown::HashMap;
use tracing::{debug, warn};
use understory_parameter::{CascadingParameterRequest, ParameterValue, QUERY_SOURCE};
use uuid::Uuid;

use crate::error::NotifyError;
use crate::subscription::{CascadingSubscriber, SubscriptionRegistry};
use crate::supplier::CascadingValueSupplier;
use crate::tree::ComponentIdentity;

/// A type that can be parsed from one query-string value.
pub trait FromQueryValue: Sized + Send + Sync + 'static {
    /// Parses a decoded query value.
    fn from_query_value(raw: &str) -> Option<Self>;
}

macro_rules! from_str_query_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromQueryValue for $ty {
                fn from_query_value(raw: &str) -> Option<Self> {
                    <$ty>::from_str(raw).ok()
                }
            }
        )*
    };
}

from_str_query_value!(
    i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64, NaiveDate, NaiveTime,
    NaiveDateTime,
);

impl FromQueryValue for String {
    fn from_query_value(raw: &str) -> Option<Self> {
        Some(raw.to_owned())
    }
}

impl FromQueryValue for bool {
    fn from_query_value(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

impl FromQueryValue for Uuid {
    fn from_query_value(raw: &str) -> Option<Self> {
        Self::parse_str(raw).ok()
    }
}

impl FromQueryValue for DateTime<FixedOffset> {
    fn from_query_value(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw).ok()
    }
}

impl FromQueryValue for DateTime<Utc> {
    fn from_query_value(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc))
    }
}

/// Parses every value of one key; `None` when any value is malformed.
type QueryParser = fn(&[String]) -> Option<ParameterValue>;

fn parse_scalar<T: FromQueryValue>(values: &[String]) -> Option<ParameterValue> {
    // The last occurrence of a repeated key wins.
    T::from_query_value(values.last()?).map(ParameterValue::new)
}

fn parse_optional<T: FromQueryValue>(values: &[String]) -> Option<ParameterValue> {
    T::from_query_value(values.last()?).map(|value| ParameterValue::new(Some(value)))
}

fn parse_list<T: FromQueryValue>(values: &[String]) -> Option<ParameterValue> {
    values
        .iter()
        .map(|raw| T::from_query_value(raw))
        .collect::<Option<Vec<T>>>()
        .map(ParameterValue::new)
}

macro_rules! register_parsers {
    ($parsers:ident; $($ty:ty),* $(,)?) => {
        $(
            $parsers.insert(TypeId::of::<$ty>(), parse_scalar::<$ty> as QueryParser);
            $parsers.insert(TypeId::of::<Option<$ty>>(), parse_optional::<$ty> as QueryParser);
            $parsers.insert(TypeId::of::<Vec<$ty>>(), parse_list::<$ty> as QueryParser);
        )*
    };
}

static PARSERS: LazyLock<HashMap<TypeId, QueryParser>> = LazyLock::new(|| {
    let mut parsers = HashMap::new();
    register_parsers!(parsers;
        String, bool,
        i8, i16, i32, i64, isize, u8, u16, u32, u64, usize,
        f32, f64,
        Uuid,
        NaiveDate, NaiveTime, NaiveDateTime,
        DateTime<Utc>, DateTime<FixedOffset>,
    );
    parsers
});

/// Returns `true` if query values can be parsed into the type `value_type`.
#[must_use]
pub fn supports_query_type(value_type: TypeId) -> bool {
    PARSERS.contains_key(&value_type)
}

/// Splits the query out of `uri` and decodes it.
///
/// Keys are lowercased; `+` decodes to a space; repeated keys keep every
/// value in order. Pairs without `=` have an empty value.
fn parse_query(query: &str) -> HashMap<String, Vec<String>> {
    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        if key.is_empty() {
            continue;
        }
        values
            .entry(key.to_lowercase())
            .or_default()
            .push(decode(value));
    }
    values
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn query_of(uri: &str) -> &str {
    let without_fragment = uri.split_once('#').map_or(uri, |(before, _)| before);
    without_fragment
        .split_once('?')
        .map_or("", |(_, query)| query)
}

struct QueryState {
    uri: String,
    query: String,
    values: HashMap<String, Vec<String>>,
}

impl QueryState {
    fn new(uri: String) -> Self {
        let query = query_of(&uri).to_owned();
        let values = parse_query(&query);
        Self { uri, query, values }
    }
}

/// Supplies cascading parameters tagged with [`QUERY_SOURCE`] from the
/// current URI's query string.
///
/// The lookup key is the request's name, falling back to the property name,
/// and is matched ignoring case. A missing key supplies null, which resets the
/// property to its default; a value that does not parse is logged and also
/// supplies null.
///
/// # Example
///
/// ```rust
/// use understory_cascade::{CascadingValueSupplier, QueryParameterSupplier};
/// use understory_parameter::{CascadingAttribute, CascadingParameterRequest};
///
/// let query = QueryParameterSupplier::new("https://example.com/items?Page=3&tag=a&tag=b");
/// let page = CascadingParameterRequest::new::<u32>("Page", CascadingAttribute::from_query());
/// let tags = CascadingParameterRequest::new::<Vec<String>>("Tags", CascadingAttribute::from_query_named("tag"));
/// assert!(query.can_supply(&page));
/// assert_eq!(query.read(&page).downcast_ref::<u32>(), Some(&3));
/// assert_eq!(query.read(&tags).downcast_ref::<Vec<String>>().map(Vec::len), Some(2));
/// ```
pub struct QueryParameterSupplier {
    state: RwLock<QueryState>,
    subscribers: SubscriptionRegistry,
}

impl QueryParameterSupplier {
    /// A supplier reading the query of `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(QueryState::new(uri.into())),
            subscribers: SubscriptionRegistry::new(),
        }
    }

    /// The current URI.
    #[must_use]
    pub fn uri(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .uri
            .clone()
    }

    /// Subscribers of this supplier.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriptionRegistry {
        &self.subscribers
    }

    /// Reads the value for `request` from the current query.
    #[must_use]
    pub fn read(&self, request: &CascadingParameterRequest) -> ParameterValue {
        let Some(parser) = PARSERS.get(&request.value_type()) else {
            return ParameterValue::null();
        };
        let key = request.effective_name().to_lowercase();
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(values) = state.values.get(&key).filter(|values| !values.is_empty()) else {
            return ParameterValue::null();
        };
        parser(values).unwrap_or_else(|| {
            warn!(
                key = %key,
                value_type = request.value_type_name(),
                "cannot parse query value"
            );
            ParameterValue::null()
        })
    }

    /// Moves to `uri`, notifying subscribers if the query string changed.
    pub async fn navigate_to(&self, uri: impl Into<String>) -> Result<(), NotifyError> {
        let changed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let next = QueryState::new(uri.into());
            let changed = next.query != state.query;
            *state = next;
            changed
        };
        if !changed {
            return Ok(());
        }
        debug!(subscribers = self.subscribers.len(), "query string changed");
        self.subscribers.notify().await
    }
}

impl CascadingValueSupplier for QueryParameterSupplier {
    fn is_fixed(&self) -> bool {
        false
    }

    fn can_supply(&self, request: &CascadingParameterRequest) -> bool {
        request.source() == Some(QUERY_SOURCE) && supports_query_type(request.value_type())
    }

    fn current_value(
        &self,
        request: &CascadingParameterRequest,
        _component: &ComponentIdentity,
    ) -> Option<ParameterValue> {
        Some(self.read(request))
    }

    fn subscribe(
        &self,
        subscriber: Arc<dyn CascadingSubscriber>,
        _request: &CascadingParameterRequest,
    ) {
        self.subscribers.subscribe(subscriber);
    }

    fn unsubscribe(
        &self,
        subscriber: &dyn CascadingSubscriber,
        _request: &CascadingParameterRequest,
    ) {
        let identity = subscriber.identity();
        self.subscribers.unsubscribe(identity.dispatcher, identity.id);
    }
}

impl fmt::Debug for QueryParameterSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryParameterSupplier")
            .field("uri", &self.uri())
            .field("subscribers", &self.subscribers)
            .finish()
    }
}
