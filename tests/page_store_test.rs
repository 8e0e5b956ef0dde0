//! Integration tests for the page store: pin discipline, eviction under
//! pressure, allocation and freeing, and the on-disk catalog.

use std::sync::Arc;
use std::thread;

use tempfile::{tempdir, TempDir};

use tamarack::{DiskManager, Error, PageId, PageStore};

fn new_store(pool_size: usize) -> (PageStore, TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");
    let dm = DiskManager::create(&path).unwrap();
    (PageStore::new(pool_size, dm), dir)
}

#[test]
fn test_working_set_larger_than_pool() {
    let (store, _dir) = new_store(4);

    // Write 20 pages through a 4-frame pool.
    let mut pids = Vec::new();
    for i in 0..20u8 {
        let mut guard = store.new_page().unwrap();
        guard.as_mut_slice()[100] = i;
        pids.push(guard.page_id());
    }

    // Everything reads back despite the evictions in between.
    for (i, &pid) in pids.iter().enumerate() {
        let guard = store.fetch_page_read(pid).unwrap();
        assert_eq!(guard.as_slice()[100], i as u8);
    }

    let stats = store.stats().snapshot();
    assert!(stats.evictions > 0);
    assert!(stats.pages_written > 0);
}

#[test]
fn test_all_frames_pinned_errors() {
    let (store, _dir) = new_store(3);

    let _g1 = store.new_page().unwrap();
    let _g2 = store.new_page().unwrap();
    let _g3 = store.new_page().unwrap();

    assert!(matches!(store.new_page(), Err(Error::NoFreeFrames)));
}

#[test]
fn test_free_and_reallocate() {
    let (store, _dir) = new_store(8);

    let a = store.new_page().unwrap().page_id();
    let b = store.new_page().unwrap().page_id();
    assert_ne!(a, b);

    store.free_page(a).unwrap();
    store.free_page(b).unwrap();

    // LIFO free list: the last freed page comes back first.
    assert_eq!(store.new_page().unwrap().page_id(), b);
    assert_eq!(store.new_page().unwrap().page_id(), a);
}

#[test]
fn test_directory_page_cannot_be_freed() {
    let (store, _dir) = new_store(8);
    assert!(matches!(
        store.free_page(PageId::new(0)),
        Err(Error::InvalidPageId(0))
    ));
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let dm = DiskManager::create(&path).unwrap();
        let store = PageStore::new(8, dm);
        let pid = store.new_page().unwrap().page_id();
        store.register("orders", pid).unwrap();
        store.flush_all_pages().unwrap();
    }

    {
        let dm = DiskManager::open(&path).unwrap();
        let store = PageStore::new(8, dm);
        let pid = store.lookup("orders").unwrap().unwrap();
        assert!(pid.is_valid());
        assert!(matches!(
            store.register("orders", pid),
            Err(Error::TreeExists(_))
        ));
        store.remove("orders").unwrap();
        assert_eq!(store.lookup("orders").unwrap(), None);
    }
}

#[test]
fn test_concurrent_readers_share_a_page() {
    let (store, _dir) = new_store(8);
    let store = Arc::new(store);

    let pid;
    {
        let mut guard = store.new_page().unwrap();
        pid = guard.page_id();
        guard.as_mut_slice()[10] = 0x5A;
    }

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..100 {
                    let guard = store.fetch_page_read(pid).unwrap();
                    assert_eq!(guard.as_slice()[10], 0x5A);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
