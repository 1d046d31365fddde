use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memscan::{Address, MatchStore, WidthFlags};

/// Dense runs of matches separated by short gaps, like a populated heap
fn populated(entries: usize) -> MatchStore {
    let mut store = MatchStore::new();
    let mut address = 0x10_0000;
    for i in 0..entries {
        address += if i % 64 == 0 { 16 } else { 1 };
        let flags = if i % 3 == 0 {
            WidthFlags::U8 | WidthFlags::U16
        } else {
            WidthFlags::empty()
        };
        store
            .append(Address::new(address), i as u8, flags)
            .unwrap();
    }
    store.finalize().unwrap();
    store
}

fn benchmark_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_store_append");
    for entries in [1_000usize, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, &entries| {
            b.iter(|| black_box(populated(entries)));
        });
    }
    group.finish();
}

fn benchmark_traversal(c: &mut Criterion) {
    let store = populated(100_000);
    c.bench_function("match_store_count_matches", |b| {
        b.iter(|| black_box(store.matches().count()));
    });
    c.bench_function("match_store_nth_last", |b| {
        b.iter(|| black_box(store.nth(store.count() - 1)));
    });
}

fn benchmark_delete_range(c: &mut Criterion) {
    let store = populated(100_000);
    c.bench_function("match_store_delete_range", |b| {
        b.iter(|| {
            let mut store = store.clone();
            black_box(
                store
                    .delete_range(Address::new(0x10_4000), Address::new(0x11_0000))
                    .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    benchmark_append,
    benchmark_traversal,
    benchmark_delete_range
);
criterion_main!(benches);
