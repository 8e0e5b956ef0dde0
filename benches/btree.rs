//! Benchmarks for B+-tree insertion and scanning.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

use tamarack::{BTree, DeletePolicy, DiskManager, Key, KeyType, PageId, PageStore, RecordId};

fn populated_tree(n: i32) -> (BTree, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
    let store = Arc::new(PageStore::new(256, dm));

    let mut tree =
        BTree::create(store, "bench", KeyType::Int, 4, DeletePolicy::Naive).unwrap();
    for i in 0..n {
        tree.insert(&Key::Int(i), RecordId::new(PageId::new(i as u32), 0))
            .unwrap();
    }
    (tree, dir)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_1k_sequential", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
                let store = Arc::new(PageStore::new(256, dm));
                let tree =
                    BTree::create(store, "bench", KeyType::Int, 4, DeletePolicy::Naive).unwrap();
                (tree, dir)
            },
            |(mut tree, _dir)| {
                for i in 0..1000 {
                    tree.insert(&Key::Int(i), RecordId::new(PageId::new(i as u32), 0))
                        .unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_scan(c: &mut Criterion) {
    let (tree, _dir) = populated_tree(10_000);

    c.bench_function("scan_full_10k", |b| {
        b.iter(|| {
            let count = tree.scan(None, None).unwrap().count();
            assert_eq!(count, 10_000);
        });
    });

    c.bench_function("scan_point_lookup", |b| {
        let key = Key::Int(7321);
        b.iter(|| {
            let count = tree.scan(Some(&key), Some(&key)).unwrap().count();
            assert_eq!(count, 1);
        });
    });
}

criterion_group!(benches, bench_insert, bench_scan);
criterion_main!(benches);
