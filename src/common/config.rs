//! Configuration constants for tamarack.

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, which keeps page-granular I/O
/// aligned with the kernel's own caching.
pub const PAGE_SIZE: usize = 4096;

/// Page id of the directory page.
///
/// The directory page is created together with the database file and holds
/// the free-list head plus the name -> header-page catalog.
pub const DIRECTORY_PAGE: u32 = 0;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }
}
