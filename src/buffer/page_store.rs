//! Page store - the page caching layer every index operation goes through.
//!
//! The [`PageStore`] provides:
//! - Pin-based page access through RAII guards
//! - Automatic dirty page write-back
//! - Page allocation and freeing
//! - The tree name catalog (delegated to the disk manager)

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{Frame, PageReadGuard, PageStoreStats, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Manages a fixed pool of buffer frames for caching disk pages.
///
/// Every pin is represented by a guard ([`PageReadGuard`] or
/// [`PageWriteGuard`]); dropping the guard unpins the page, so a pin can
/// never leak across an early return or an error path. This is the pin
/// discipline the B+-tree layer is written against.
///
/// # Thread Safety
/// - `page_table`: `RwLock` — many readers, few writers
/// - `free_list`, `replacer`, `disk_manager`: `Mutex`
/// - `frames`: no outer lock — fixed size, each frame has internal locks
/// - `stats`: atomic counters
pub struct PageStore {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<FifoReplacer>,

    /// Handles all disk I/O and the on-disk catalog.
    disk_manager: Mutex<DiskManager>,

    /// Performance statistics.
    stats: PageStoreStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl PageStore {
    /// Create a new page store.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: PageStoreStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Pin pages
    // ========================================================================

    /// Pin a page for reading (shared access).
    ///
    /// Loads the page from disk on a cache miss, possibly evicting another
    /// page.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page for writing (exclusive access).
    ///
    /// The page is marked dirty when the guard drops.
    ///
    /// # Errors
    /// Same as `fetch_page_read`.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Allocate and free pages
    // ========================================================================

    /// Allocate a new page on disk and pin it for writing.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let page_id = {
            let mut dm = self.disk_manager.lock();
            dm.allocate_page()?
        };

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        frame.set_page_id(Some(page_id));
        frame.pin();

        {
            let mut pt = self.page_table.write();
            pt.insert(page_id, frame_id);
        }

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Free a page: drop it from the pool and return it to the disk free
    /// list.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is still pinned
    /// - `Error::InvalidPageId` from the disk manager for pages that may
    ///   not be freed
    pub fn free_page(&self, page_id: PageId) -> Result<()> {
        let mut pt = self.page_table.write();

        if let Some(&frame_id) = pt.get(&page_id) {
            let frame = &self.frames[frame_id.0];

            if frame.is_pinned() {
                return Err(Error::PagePinned(page_id.0));
            }

            pt.remove(&page_id);
            drop(pt);

            frame.set_page_id(None);
            frame.clear_dirty();

            {
                let mut replacer = self.replacer.lock();
                replacer.remove(frame_id);
            }

            {
                let mut fl = self.free_list.lock();
                fl.push(frame_id);
            }
        } else {
            drop(pt);
        }

        let mut dm = self.disk_manager.lock();
        dm.free_page(page_id)
    }

    // ========================================================================
    // Public API: Catalog
    // ========================================================================

    /// Look up the header page registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<Option<PageId>> {
        self.disk_manager.lock().lookup(name)
    }

    /// Register `name` as pointing at `header_page`.
    pub fn register(&self, name: &str, header_page: PageId) -> Result<()> {
        self.disk_manager.lock().register(name, header_page)
    }

    /// Remove the catalog entry for `name`.
    pub fn remove(&self, name: &str) -> Result<()> {
        self.disk_manager.lock().remove(name)
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Flush a specific page to disk if it's dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let pt = self.page_table.read();
            match pt.get(&page_id) {
                Some(&fid) => fid,
                None => return Ok(()), // Page not in pool
            }
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Flush all dirty pages to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get page store statistics.
    pub fn stats(&self) -> &PageStoreStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Get the number of pages in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    // ========================================================================
    // Internal: Called by guards on drop
    // ========================================================================

    /// Unpin a page. Called by PageReadGuard/PageWriteGuard on drop.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        let new_pin_count = frame.unpin();
        if new_pin_count == 0 {
            let mut replacer = self.replacer.lock();
            replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Fetch a page into the pool, returning its frame ID.
    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(page_id)
    }

    fn handle_cache_hit(&self, frame_id: FrameId) {
        let frame = &self.frames[frame_id.0];
        frame.pin();

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let frame_id = self.get_free_frame()?;

        let page_data = {
            let mut dm = self.disk_manager.lock();
            dm.read_page(page_id)?
        };

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        {
            let mut page = frame.page_mut();
            page.as_mut_slice().copy_from_slice(page_data.as_slice());
        }

        frame.set_page_id(Some(page_id));
        frame.pin();

        {
            let mut pt = self.page_table.write();
            pt.insert(page_id, frame_id);
        }

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Get a free frame, evicting if necessary.
    fn get_free_frame(&self) -> Result<FrameId> {
        {
            let mut fl = self.free_list.lock();
            if let Some(frame_id) = fl.pop() {
                return Ok(frame_id);
            }
        }

        self.evict_page()
    }

    /// Evict a page and return its frame.
    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = {
            let mut replacer = self.replacer.lock();
            replacer.evict().ok_or(Error::NoFreeFrames)?
        };

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        trace!(frame = frame_id.0, page = ?old_page_id, "evicting frame");

        if frame.is_dirty() {
            if let Some(pid) = old_page_id {
                self.flush_frame(frame_id, pid)?;
            }
        }

        if let Some(pid) = old_page_id {
            let mut pt = self.page_table.write();
            pt.remove(&pid);
        }

        frame.clear_dirty();
        frame.set_page_id(None);

        Ok(frame_id)
    }

    /// Flush a frame to disk if dirty.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            // Write lock: write_page stamps the checksum into the page.
            let mut page = frame.page_mut();
            {
                let mut dm = self.disk_manager.lock();
                dm.write_page(page_id, &mut page)?;
            }
            drop(page);

            frame.clear_dirty();
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}
