// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persisted state flowing from one scope to the next.

use std::sync::Arc;

use proptest::prelude::*;
use understory_cascade::{
    CascadeScope, CascadingParameterCatalog, CascadingValueSource, Component, ComponentOptions,
    Dispatcher, RenderError, RenderMode, RootSuppliers,
};
use understory_parameter::{
    CascadingAttribute, OwnedParameters, ParameterSchemaBuilder, ParameterTarget, ParameterValue,
};
use understory_persist::{
    ComponentStatePersistenceManager, MemoryStateStore, PersistedState, PersistentComponentState,
    PersistentKeyDeriver, PersistentStateSupplier,
};

#[derive(Default)]
struct Counter {
    count: u32,
}

impl ParameterTarget for Counter {
    fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
        schema
            .parameter("Seed", |c, v: u32| c.count = v)
            .persistent_state("Count", |c, v: u32| c.count = v, |c| c.count)
    }
}

impl Component for Counter {
    fn render(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Counts its own renders on top of the restored count.
#[derive(Default)]
struct Ticker {
    count: u32,
    theme: String,
}

impl ParameterTarget for Ticker {
    fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
        schema
            .cascading("Theme", [CascadingAttribute::cascading()], |t, v: String| {
                t.theme = v;
            })
            .persistent_state("Count", |t, v: u32| t.count = v, |t| t.count)
    }
}

impl Component for Ticker {
    fn render(&mut self) -> Result<(), RenderError> {
        self.count += 1;
        Ok(())
    }
}

struct Session {
    manager: ComponentStatePersistenceManager,
    supplier: Arc<PersistentStateSupplier>,
    scope: Arc<CascadeScope>,
}

fn session(keys: &Arc<PersistentKeyDeriver>) -> Session {
    let manager = ComponentStatePersistenceManager::new();
    let supplier = Arc::new(PersistentStateSupplier::new(
        Arc::clone(manager.state()),
        Arc::clone(keys),
    ));
    let roots = Arc::new(RootSuppliers::new());
    roots.add(supplier.clone());
    let scope = CascadeScope::with_catalog(
        Dispatcher::spawn("session"),
        Arc::new(CascadingParameterCatalog::default()),
        roots,
    );
    Session {
        manager,
        supplier,
        scope,
    }
}

fn seed(value: u32) -> OwnedParameters {
    OwnedParameters::from_pairs([("Seed", ParameterValue::new(value))])
}

#[tokio::test]
async fn state_survives_a_transition() {
    let keys = Arc::new(PersistentKeyDeriver::new());
    let store = MemoryStateStore::new();

    let before = session(&keys);
    let counter = before
        .scope
        .add_component(None, ComponentOptions::default(), Counter::default())
        .unwrap();
    counter.update(seed(5)).await.unwrap();
    assert_eq!(before.supplier.subscription_count(), 1);
    before.manager.persist_state(&store).await.unwrap();
    assert_eq!(store.snapshot().len(), 1);

    let after = session(&keys);
    after.manager.restore_state(&store).await.unwrap();
    let restored = after
        .scope
        .add_component(None, ComponentOptions::default(), Counter::default())
        .unwrap();
    restored.update(seed(0)).await.unwrap();
    assert_eq!(restored.with(|c| c.count), 5);

    // The restored value is handed out once; later passes keep the direct value.
    restored.update(seed(1)).await.unwrap();
    assert_eq!(restored.with(|c| c.count), 1);

    // The entry was consumed by the first component.
    let sibling = after
        .scope
        .add_component(None, ComponentOptions::default(), Counter::default())
        .unwrap();
    sibling.update(seed(2)).await.unwrap();
    assert_eq!(sibling.with(|c| c.count), 2);
}

#[tokio::test]
async fn own_changes_survive_cascading_rerenders() {
    let keys = Arc::new(PersistentKeyDeriver::new());
    let live = session(&keys);
    let theme = Arc::new(CascadingValueSource::new(String::from("dark"), false));
    let provider = live
        .scope
        .add_supplier(None, ComponentOptions::default(), Arc::clone(&theme));
    let ticker = live
        .scope
        .add_component(Some(provider), ComponentOptions::default(), Ticker::default())
        .unwrap();

    let identity = live.scope.identity(ticker.id()).unwrap();
    let mut entries = PersistedState::new();
    entries.insert(keys.derive_for(&identity, "Count"), b"10".to_vec());
    live.manager.state().initialize_existing_state(entries).unwrap();

    ticker.update(OwnedParameters::new()).await.unwrap();
    assert_eq!(ticker.with(|t| t.count), 11);

    theme.notify_changed_to(String::from("light")).await.unwrap();
    assert_eq!(ticker.with(|t| (t.count, t.theme.clone())), (12, String::from("light")));

    theme.notify_changed_to(String::from("blue")).await.unwrap();
    assert_eq!(ticker.with(|t| t.count), 13);

    // The persisted value is the component's latest, not the restored one.
    let store = MemoryStateStore::new();
    live.manager.persist_state(&store).await.unwrap();
    let key = keys.derive_for(&identity, "Count");
    assert_eq!(store.snapshot().get(&key).map(Vec::as_slice), Some(&b"13"[..]));
}

#[tokio::test]
async fn removed_components_stop_persisting() {
    let keys = Arc::new(PersistentKeyDeriver::new());
    let store = MemoryStateStore::new();
    let live = session(&keys);
    let counter = live
        .scope
        .add_component(None, ComponentOptions::default(), Counter::default())
        .unwrap();
    counter.update(seed(3)).await.unwrap();
    assert_eq!(live.manager.state().callback_count(), 1);

    live.scope.remove(counter.id());
    assert_eq!(live.supplier.subscription_count(), 0);
    assert_eq!(live.manager.state().callback_count(), 0);

    live.manager.persist_state(&store).await.unwrap();
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn keyed_siblings_persist_separately() {
    let keys = Arc::new(PersistentKeyDeriver::new());
    let store = MemoryStateStore::new().for_render_mode(RenderMode::Server);
    let live = session(&keys);
    for (key, value) in [(1_i32, 10_u32), (2, 20)] {
        let counter = live
            .scope
            .add_component(
                None,
                ComponentOptions::default()
                    .with_key(ParameterValue::new(key))
                    .with_render_mode(RenderMode::Server),
                Counter::default(),
            )
            .unwrap();
        counter.update(seed(value)).await.unwrap();
    }
    live.manager.persist_state(&store).await.unwrap();

    let saved = store.snapshot();
    assert_eq!(saved.len(), 2);
    let first = keys.derive_key(
        None,
        core::any::type_name::<Counter>(),
        "Count",
        Some(&ParameterValue::new(1_i32)),
    );
    assert_eq!(saved.get(&first).map(Vec::as_slice), Some(&b"10"[..]));
}

#[test]
fn bytes_are_taken_exactly_once() {
    let state = PersistentComponentState::new();
    let mut entries = PersistedState::new();
    entries.insert(String::from("key"), vec![1, 2, 3]);
    state.initialize_existing_state(entries).unwrap();

    assert_eq!(state.try_take_bytes("key"), Some(vec![1, 2, 3]));
    assert_eq!(state.try_take_bytes("key"), None);
}

fn name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_.]{0,24}"
}

proptest! {
    #[test]
    fn derived_keys_are_deterministic(
        parent in proptest::option::of(name()),
        component in name(),
        property in name(),
        identity in any::<i64>(),
    ) {
        let identity = ParameterValue::new(identity);
        let first = PersistentKeyDeriver::new()
            .derive_key(parent.as_deref(), &component, &property, Some(&identity));
        let second = PersistentKeyDeriver::new()
            .derive_key(parent.as_deref(), &component, &property, Some(&identity));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn property_name_changes_the_key(component in name(), property in name()) {
        let keys = PersistentKeyDeriver::new();
        let other = format!("{property}2");
        prop_assert_ne!(
            keys.derive_key(None, &component, &property, None),
            keys.derive_key(None, &component, &other, None)
        );
    }

    #[test]
    fn unsupported_identities_are_ignored(
        component in name(),
        values in proptest::collection::vec(any::<u8>(), 0..8),
    ) {
        let keys = PersistentKeyDeriver::new();
        let custom = ParameterValue::new(values);
        prop_assert_eq!(
            keys.derive_key(Some("Parent"), &component, "Value", Some(&custom)),
            keys.derive_key(Some("Parent"), &component, "Value", None)
        );
    }
}
