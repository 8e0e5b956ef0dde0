//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages (with CRC32 stamping/verification)
//! - Allocating new pages and recycling freed ones
//! - The directory page: free-list head plus the tree name catalog

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::{DIRECTORY_PAGE, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Offset of the next-free pointer inside a page on the free list.
const OFFSET_NEXT_FREE: usize = PageHeader::SIZE;

/// Directory page layout, after the page header:
/// free-list head (u32), catalog entry count (u16), then packed entries of
/// (name_len u8, name bytes, header page id u32).
const OFFSET_FREE_HEAD: usize = PageHeader::SIZE;
const OFFSET_ENTRY_COUNT: usize = OFFSET_FREE_HEAD + 4;
const OFFSET_ENTRIES: usize = OFFSET_ENTRY_COUNT + 2;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// Pages are laid out sequentially; page N lives at offset `N × PAGE_SIZE`.
/// Page 0 is the directory page, created with the file: it anchors the
/// free list and maps tree names to their header pages.
///
/// # Thread Safety
/// `DiskManager` is single-threaded. The [`PageStore`] serializes access
/// behind a mutex.
///
/// # Durability
/// All writes are followed by `fsync()`. Every page written carries a CRC32
/// checksum; reads that fail verification return [`Error::Corrupted`].
///
/// [`PageStore`]: crate::buffer::PageStore
pub struct DiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new database file with an empty directory page.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self {
            file,
            page_count: 0,
        };
        dm.init_directory()?;
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist, cannot be opened, or its
    /// directory page is missing or corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let metadata = file.metadata()?;
        let page_count = (metadata.len() / PAGE_SIZE as u64) as u32;

        let mut dm = Self { file, page_count };
        if dm.page_count == 0 {
            dm.init_directory()?;
        } else {
            let directory = dm.read_page(PageId::new(DIRECTORY_PAGE))?;
            if directory.header().page_type != PageType::Directory {
                return Err(Error::Corrupted(DIRECTORY_PAGE));
            }
        }
        Ok(dm)
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read a page from disk, verifying its checksum.
    ///
    /// # Errors
    /// `Error::PageNotFound` if the page doesn't exist, `Error::Corrupted`
    /// if its contents don't match the stored checksum.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        if !page.verify_checksum() {
            return Err(Error::Corrupted(page_id.0));
        }

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// Stamps the page checksum (mutating the page in memory), writes, and
    /// fsyncs. The page must have been allocated with `allocate_page()`.
    pub fn write_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        page.update_checksum();

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Allocate a page, recycling from the free list before extending the
    /// file.
    ///
    /// The returned page is zeroed (and carries a valid checksum on disk).
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let mut directory = self.read_page(PageId::new(DIRECTORY_PAGE))?;
        let free_head = read_u32(&directory, OFFSET_FREE_HEAD);

        if free_head.is_valid() {
            // Pop the free list: the freed page stores its successor.
            let free_page = self.read_page(free_head)?;
            let next = read_u32(&free_page, OFFSET_NEXT_FREE);

            self.write_page(free_head, &mut Page::new())?;

            write_u32(&mut directory, OFFSET_FREE_HEAD, next);
            self.write_page(PageId::new(DIRECTORY_PAGE), &mut directory)?;

            return Ok(free_head);
        }

        let page_id = PageId::new(self.page_count);
        self.page_count += 1;
        self.write_page(page_id, &mut Page::new())?;
        Ok(page_id)
    }

    /// Return a page to the free list.
    ///
    /// # Errors
    /// `Error::InvalidPageId` for the directory page, the invalid sentinel,
    /// or a page beyond the end of the file.
    pub fn free_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 == DIRECTORY_PAGE || page_id.0 >= self.page_count {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut directory = self.read_page(PageId::new(DIRECTORY_PAGE))?;
        let old_head = read_u32(&directory, OFFSET_FREE_HEAD);

        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Free));
        write_u32(&mut page, OFFSET_NEXT_FREE, old_head);
        self.write_page(page_id, &mut page)?;

        write_u32(&mut directory, OFFSET_FREE_HEAD, page_id);
        self.write_page(PageId::new(DIRECTORY_PAGE), &mut directory)?;

        Ok(())
    }

    // ========================================================================
    // Catalog: tree name -> header page
    // ========================================================================

    /// Look up the header page registered under `name`.
    pub fn lookup(&mut self, name: &str) -> Result<Option<PageId>> {
        let directory = self.read_page(PageId::new(DIRECTORY_PAGE))?;
        let entries = parse_catalog(&directory);
        Ok(entries
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, pid)| pid))
    }

    /// Register `name` as pointing at `header_page`.
    ///
    /// # Errors
    /// `NameTooLong` for names over 255 bytes, `TreeExists` for duplicate
    /// names, `DirectoryFull` when the directory page has no room left.
    pub fn register(&mut self, name: &str, header_page: PageId) -> Result<()> {
        if name.len() > 255 {
            return Err(Error::NameTooLong(name.len()));
        }

        let mut directory = self.read_page(PageId::new(DIRECTORY_PAGE))?;
        let mut entries = parse_catalog(&directory);
        if entries.iter().any(|(n, _)| n == name) {
            return Err(Error::TreeExists(name.to_string()));
        }

        entries.push((name.to_string(), header_page));
        write_catalog(&mut directory, &entries)?;
        self.write_page(PageId::new(DIRECTORY_PAGE), &mut directory)
    }

    /// Remove the catalog entry for `name`.
    ///
    /// # Errors
    /// `TreeNotFound` if no such entry exists.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let mut directory = self.read_page(PageId::new(DIRECTORY_PAGE))?;
        let mut entries = parse_catalog(&directory);
        let before = entries.len();
        entries.retain(|(n, _)| n != name);
        if entries.len() == before {
            return Err(Error::TreeNotFound(name.to_string()));
        }

        write_catalog(&mut directory, &entries)?;
        self.write_page(PageId::new(DIRECTORY_PAGE), &mut directory)
    }

    /// Get the number of pages in the database (directory page included).
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Write a fresh directory page as page 0.
    fn init_directory(&mut self) -> Result<()> {
        debug_assert_eq!(self.page_count, 0);

        let mut directory = Page::new();
        directory.set_header(&PageHeader::new(PageType::Directory));
        write_u32(&mut directory, OFFSET_FREE_HEAD, PageId::INVALID);

        self.page_count = 1;
        self.write_page(PageId::new(DIRECTORY_PAGE), &mut directory)
    }
}

fn read_u32(page: &Page, offset: usize) -> PageId {
    let data = page.as_slice();
    PageId::new(u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]))
}

fn write_u32(page: &mut Page, offset: usize, value: PageId) {
    page.as_mut_slice()[offset..offset + 4].copy_from_slice(&value.0.to_le_bytes());
}

fn parse_catalog(directory: &Page) -> Vec<(String, PageId)> {
    let data = directory.as_slice();
    let count = u16::from_le_bytes([data[OFFSET_ENTRY_COUNT], data[OFFSET_ENTRY_COUNT + 1]]);

    let mut entries = Vec::with_capacity(count as usize);
    let mut offset = OFFSET_ENTRIES;
    for _ in 0..count {
        let len = data[offset] as usize;
        offset += 1;
        let name = String::from_utf8_lossy(&data[offset..offset + len]).into_owned();
        offset += len;
        let pid = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;
        entries.push((name, PageId::new(pid)));
    }
    entries
}

fn write_catalog(directory: &mut Page, entries: &[(String, PageId)]) -> Result<()> {
    let needed: usize = entries.iter().map(|(n, _)| 1 + n.len() + 4).sum();
    if OFFSET_ENTRIES + needed > PAGE_SIZE {
        return Err(Error::DirectoryFull);
    }

    let data = directory.as_mut_slice();
    data[OFFSET_ENTRY_COUNT..OFFSET_ENTRIES].fill(0);
    data[OFFSET_ENTRIES..].fill(0);

    data[OFFSET_ENTRY_COUNT..OFFSET_ENTRY_COUNT + 2]
        .copy_from_slice(&(entries.len() as u16).to_le_bytes());

    let mut offset = OFFSET_ENTRIES;
    for (name, pid) in entries {
        data[offset] = name.len() as u8;
        offset += 1;
        data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        offset += name.len();
        data[offset..offset + 4].copy_from_slice(&pid.0.to_le_bytes());
        offset += 4;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_dm() -> (DiskManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
        (dm, dir)
    }

    #[test]
    fn test_create_initializes_directory() {
        let (mut dm, _dir) = create_dm();
        assert_eq!(dm.page_count(), 1);

        let directory = dm.read_page(PageId::new(DIRECTORY_PAGE)).unwrap();
        assert_eq!(directory.header().page_type, PageType::Directory);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path).unwrap();
        assert!(DiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(DiskManager::open(dir.path().join("nonexistent.db")).is_err());
    }

    #[test]
    fn test_allocate_write_read() {
        let (mut dm, _dir) = create_dm();

        let page_id = dm.allocate_page().unwrap();
        assert_eq!(page_id, PageId::new(1));

        let mut page = Page::new();
        page.as_mut_slice()[100] = 0xCD;
        dm.write_page(page_id, &mut page).unwrap();

        let read_back = dm.read_page(page_id).unwrap();
        assert_eq!(read_back.as_slice()[100], 0xCD);
    }

    #[test]
    fn test_free_list_reuse() {
        let (mut dm, _dir) = create_dm();

        let a = dm.allocate_page().unwrap();
        let b = dm.allocate_page().unwrap();
        let count = dm.page_count();

        dm.free_page(a).unwrap();
        dm.free_page(b).unwrap();

        // LIFO reuse, no file growth.
        assert_eq!(dm.allocate_page().unwrap(), b);
        assert_eq!(dm.allocate_page().unwrap(), a);
        assert_eq!(dm.page_count(), count);
    }

    #[test]
    fn test_free_directory_page_rejected() {
        let (mut dm, _dir) = create_dm();
        assert!(matches!(
            dm.free_page(PageId::new(DIRECTORY_PAGE)),
            Err(Error::InvalidPageId(0))
        ));
        assert!(dm.free_page(PageId::INVALID).is_err());
    }

    #[test]
    fn test_catalog_roundtrip() {
        let (mut dm, _dir) = create_dm();

        assert_eq!(dm.lookup("orders").unwrap(), None);

        dm.register("orders", PageId::new(7)).unwrap();
        dm.register("users", PageId::new(9)).unwrap();
        assert_eq!(dm.lookup("orders").unwrap(), Some(PageId::new(7)));
        assert_eq!(dm.lookup("users").unwrap(), Some(PageId::new(9)));

        dm.remove("orders").unwrap();
        assert_eq!(dm.lookup("orders").unwrap(), None);
        assert!(matches!(dm.remove("orders"), Err(Error::TreeNotFound(_))));
    }

    #[test]
    fn test_catalog_duplicate_and_long_names() {
        let (mut dm, _dir) = create_dm();

        dm.register("t", PageId::new(1)).unwrap();
        assert!(matches!(
            dm.register("t", PageId::new(2)),
            Err(Error::TreeExists(_))
        ));

        let long = "x".repeat(300);
        assert!(matches!(
            dm.register(&long, PageId::new(3)),
            Err(Error::NameTooLong(300))
        ));
    }

    #[test]
    fn test_catalog_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            dm.register("orders", PageId::new(5)).unwrap();
        }
        {
            let mut dm = DiskManager::open(&path).unwrap();
            assert_eq!(dm.lookup("orders").unwrap(), Some(PageId::new(5)));
        }
    }

    #[test]
    fn test_corrupted_page_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let page_id;
        {
            let mut dm = DiskManager::create(&path).unwrap();
            page_id = dm.allocate_page().unwrap();
            let mut page = Page::new();
            page.as_mut_slice()[50] = 0xAA;
            dm.write_page(page_id, &mut page).unwrap();
        }

        // Flip a byte behind the disk manager's back.
        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(
                page_id.0 as u64 * PAGE_SIZE as u64 + 50,
            ))
            .unwrap();
            file.write_all(&[0xBB]).unwrap();
        }

        let mut dm = DiskManager::open(&path).unwrap();
        assert!(matches!(
            dm.read_page(page_id),
            Err(Error::Corrupted(pid)) if pid == page_id.0
        ));
    }

    #[test]
    fn test_read_invalid_page() {
        let (mut dm, _dir) = create_dm();
        assert!(dm.read_page(PageId::new(99)).is_err());
        assert!(dm.read_page(PageId::INVALID).is_err());
    }
}
