//! Disk manager seam consumed by the buffer pool.

use kestrel_common::page::{PageId, PAGE_SIZE};
use kestrel_common::{KestrelError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Page-level storage backend.
///
/// The buffer pool dispatches all I/O through this trait and never touches
/// files itself. Implementations must be safe to share across threads; all
/// calls are synchronous and run to completion.
pub trait DiskManager: Send + Sync {
    /// Reads a page into `buf` (`PAGE_SIZE` bytes).
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Writes a page from `data` (`PAGE_SIZE` bytes).
    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Allocates a fresh zeroed page and returns its id.
    fn allocate_page(&self) -> Result<PageId>;

    /// Releases a page. The id may be handed out again by `allocate_page`.
    fn deallocate_page(&self, page_id: PageId) -> Result<()>;
}

/// In-memory disk manager for tests and ephemeral databases.
pub struct MemDisk {
    inner: Mutex<MemDiskInner>,
}

struct MemDiskInner {
    pages: HashMap<u32, Box<[u8; PAGE_SIZE]>>,
    next_page: u32,
    free_pages: Vec<u32>,
}

impl MemDisk {
    /// Creates an empty in-memory disk.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemDiskInner {
                pages: HashMap::new(),
                next_page: 0,
                free_pages: Vec::new(),
            }),
        }
    }

    /// Returns the number of currently allocated pages.
    pub fn page_count(&self) -> usize {
        self.inner.lock().pages.len()
    }
}

impl Default for MemDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskManager for MemDisk {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let inner = self.inner.lock();
        let page = inner
            .pages
            .get(&page_id.0)
            .ok_or(KestrelError::PageNotFound { page_id: page_id.0 })?;
        buf[..PAGE_SIZE].copy_from_slice(&page[..]);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        let page = inner
            .pages
            .get_mut(&page_id.0)
            .ok_or(KestrelError::PageNotFound { page_id: page_id.0 })?;
        page[..].copy_from_slice(&data[..PAGE_SIZE]);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();
        let page_num = match inner.free_pages.pop() {
            Some(num) => num,
            None => {
                let num = inner.next_page;
                inner.next_page += 1;
                num
            }
        };
        inner.pages.insert(page_num, Box::new([0u8; PAGE_SIZE]));
        Ok(PageId(page_num))
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.pages.remove(&page_id.0).is_some() {
            inner.free_pages.push(page_id.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_disk_allocate() {
        let disk = MemDisk::new();
        assert_eq!(disk.page_count(), 0);

        let p0 = disk.allocate_page().unwrap();
        let p1 = disk.allocate_page().unwrap();
        assert_eq!(p0, PageId(0));
        assert_eq!(p1, PageId(1));
        assert_eq!(disk.page_count(), 2);
    }

    #[test]
    fn test_mem_disk_write_read() {
        let disk = MemDisk::new();
        let page_id = disk.allocate_page().unwrap();

        let mut data = [0u8; PAGE_SIZE];
        data[0] = 0xAB;
        data[PAGE_SIZE - 1] = 0xEF;
        disk.write_page(page_id, &data).unwrap();

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(page_id, &mut buf).unwrap();
        assert_eq!(buf[0], 0xAB);
        assert_eq!(buf[PAGE_SIZE - 1], 0xEF);
    }

    #[test]
    fn test_mem_disk_read_unallocated() {
        let disk = MemDisk::new();
        let mut buf = [0u8; PAGE_SIZE];
        let result = disk.read_page(PageId(99), &mut buf);
        assert!(matches!(
            result,
            Err(KestrelError::PageNotFound { page_id: 99 })
        ));
    }

    #[test]
    fn test_mem_disk_allocated_page_is_zeroed() {
        let disk = MemDisk::new();
        let page_id = disk.allocate_page().unwrap();

        let mut buf = [0xFFu8; PAGE_SIZE];
        disk.read_page(page_id, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mem_disk_deallocate_reuses_id() {
        let disk = MemDisk::new();
        let p0 = disk.allocate_page().unwrap();
        let _p1 = disk.allocate_page().unwrap();

        disk.deallocate_page(p0).unwrap();
        assert_eq!(disk.page_count(), 1);

        let p2 = disk.allocate_page().unwrap();
        assert_eq!(p2, p0);

        // Reused page comes back zeroed.
        let mut buf = [0xFFu8; PAGE_SIZE];
        disk.read_page(p2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mem_disk_deallocate_unknown_is_noop() {
        let disk = MemDisk::new();
        disk.deallocate_page(PageId(7)).unwrap();
        assert_eq!(disk.page_count(), 0);
    }
}
