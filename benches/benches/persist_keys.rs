// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_persist` key derivation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use understory_parameter::ParameterValue;
use understory_persist::PersistentKeyDeriver;

fn bench_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("persist/derive_key");
    let identity = ParameterValue::new(42_u64);

    group.bench_function("cached/no_identity", |b| {
        let keys = PersistentKeyDeriver::new();
        b.iter(|| black_box(keys.derive_key(Some("List"), "Row", "Expanded", None)));
    });

    group.bench_function("cached/identity", |b| {
        let keys = PersistentKeyDeriver::new();
        b.iter(|| black_box(keys.derive_key(Some("List"), "Row", "Expanded", Some(&identity))));
    });

    group.bench_function("cold", |b| {
        let keys = PersistentKeyDeriver::new();
        b.iter(|| {
            keys.invalidate_all();
            black_box(keys.derive_key(Some("List"), "Row", "Expanded", Some(&identity)))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_keys);
criterion_main!(benches);
