// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_parameter` + `understory_cascade` resolution.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use understory_cascade::{
    CascadingValueSource, CascadingValueSupplier, ComponentOptions, ComponentTree, Dispatcher,
    RootSuppliers, SupplierResolver,
};
use understory_parameter::{
    CapturedAttributes, CascadingAttribute, CascadingParameter, CascadingParameterRequest,
    ParameterSchemaBuilder, ParameterTarget, ParameterValue, ParameterView, RenderFrame,
    SchemaCache,
};

#[derive(Default)]
struct Row {
    label: String,
    index: i32,
    selected: bool,
    theme: String,
    extra: CapturedAttributes,
}

impl ParameterTarget for Row {
    fn describe(schema: ParameterSchemaBuilder<Self>) -> ParameterSchemaBuilder<Self> {
        schema
            .parameter("Label", |r, v: String| r.label = v)
            .parameter("Index", |r, v: i32| r.index = v)
            .parameter("Selected", |r, v: bool| r.selected = v)
            .cascading("Theme", [CascadingAttribute::cascading()], |r, v: String| {
                r.theme = v;
            })
            .capture_unmatched("Extra", |r, v| r.extra = v)
    }
}

fn frames() -> Vec<RenderFrame> {
    vec![
        RenderFrame::component::<Row>(6),
        RenderFrame::attribute("Label", ParameterValue::new(String::from("row"))),
        RenderFrame::attribute("Index", ParameterValue::new(3_i32)),
        RenderFrame::attribute("Selected", ParameterValue::new(true)),
        RenderFrame::attribute("class", ParameterValue::new(String::from("odd"))),
        RenderFrame::text("content"),
    ]
}

fn bench_view(c: &mut Criterion) {
    let frames = frames();
    let theme = [CascadingParameter::fixed(
        "Theme",
        ParameterValue::new(String::from("dark")),
    )];
    let view = ParameterView::new(&frames, 0).with_cascading(&theme);
    let cache = SchemaCache::new();

    let mut group = c.benchmark_group("parameter/view");

    group.bench_function("enumerate", |b| {
        b.iter(|| black_box(view.iter().count()));
    });

    group.bench_function("definitely_equals", |b| {
        let other = frames.clone();
        let old = ParameterView::new(&other, 0);
        b.iter(|| black_box(view.definitely_equals(&old)));
    });

    group.bench_function("bind", |b| {
        b.iter(|| {
            let mut row = Row::default();
            view.bind(&cache, &mut row).unwrap();
            black_box(row.index)
        });
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let dispatcher = dispatcher_id();
    let mut group = c.benchmark_group("cascade/resolve");
    let request =
        CascadingParameterRequest::new::<String>("Theme", CascadingAttribute::cascading());

    for depth in [1_u32, 8, 32] {
        let mut tree = ComponentTree::new(dispatcher);
        let root = tree.insert(None, "Root", ComponentOptions::default());
        let supplier: Arc<dyn CascadingValueSupplier> =
            Arc::new(CascadingValueSource::new(String::from("dark"), true));
        tree.set_supplier(root, supplier);
        let mut leaf = root;
        for _ in 0..depth {
            leaf = tree.insert(Some(leaf), "Node", ComponentOptions::default());
        }
        let identity = tree.identity(leaf).cloned().unwrap();
        let resolver = SupplierResolver::new(Arc::new(RootSuppliers::new()));

        group.bench_function(BenchmarkId::new("nearest_ancestor", depth), |b| {
            b.iter(|| {
                let requests = core::slice::from_ref(&request);
                black_box(resolver.resolve(&identity, requests, &&tree).len())
            });
        });
    }

    group.finish();
}

fn dispatcher_id() -> understory_cascade::DispatcherId {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(async { Dispatcher::spawn("bench").id() })
}

criterion_group!(benches, bench_view, bench_resolve);
criterion_main!(benches);
