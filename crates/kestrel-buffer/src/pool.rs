//! Buffer pool manager.

use crate::disk::DiskManager;
use crate::frame::{BufferFrame, FrameId};
use crate::page_table::PageTable;
use crate::replacer::{ClockReplacer, Replacer};
use kestrel_common::page::{PageId, PAGE_SIZE};
use kestrel_common::{KestrelError, Result};
use log::{debug, error};
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;
use sysinfo::System;

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub pool_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { pool_size: 1024 } // 4 MB with 4 KB pages
    }
}

impl BufferPoolConfig {
    /// Sizes the pool to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so caching stays useful on low-memory systems;
    /// no upper limit.
    pub fn auto() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let pool_size = (target_bytes / PAGE_SIZE).max(1_000);

        Self { pool_size }
    }
}

/// Buffer pool manager.
///
/// Caches fixed-size pages between the disk manager and in-memory clients:
/// - Page ID to frame ID mapping and a free frame list
/// - Clock replacement for eviction with write-back of dirty pages
/// - Pin counting so resident pages cannot be evicted while in use
///
/// # Locking
///
/// One pool-global mutex guards the page table and the free list, and every
/// replacer call happens while it is held. Page bytes sit behind per-frame
/// reader-writer latches taken after the pool mutex, never before it. Frame
/// metadata (pin count, dirty flag, page id) is written only by the thread
/// holding the pool mutex.
///
/// # Pin contract
///
/// `fetch_page` and `new_page` return the frame pinned; every such borrow
/// must be balanced by `unpin_page`. The `read_page`/`write_page` guards
/// wrap that contract for callers that do not need the raw API.
pub struct BufferPoolManager {
    /// The underlying storage backend.
    disk: Arc<dyn DiskManager>,
    /// Array of buffer frames. Indexed by frame ID; immutable after construction.
    frames: Vec<BufferFrame>,
    /// Page replacement policy.
    replacer: ClockReplacer,
    /// Page table and free list, guarded by the pool mutex.
    inner: Mutex<PoolInner>,
    /// Configuration (immutable after construction).
    config: BufferPoolConfig,
}

struct PoolInner {
    page_table: PageTable,
    free_list: VecDeque<FrameId>,
}

impl BufferPoolManager {
    /// Creates a new buffer pool over the given disk manager.
    pub fn new(disk: Arc<dyn DiskManager>, config: BufferPoolConfig) -> Self {
        let pool_size = config.pool_size;
        let frames: Vec<_> = (0..pool_size)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list.
        let free_list: VecDeque<_> = (0..pool_size).map(|i| FrameId(i as u32)).collect();

        Self {
            disk,
            frames,
            replacer: ClockReplacer::new(pool_size),
            inner: Mutex::new(PoolInner {
                page_table: PageTable::new(pool_size),
                free_list,
            }),
            config,
        }
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.inner.lock().free_list.len()
    }

    /// Returns the number of pages currently resident.
    pub fn page_count(&self) -> usize {
        self.inner.lock().page_table.len()
    }

    /// Checks whether a page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().page_table.contains(page_id)
    }

    /// Fetches a page into the pool and returns its frame, pinned.
    ///
    /// A resident page is pinned and returned directly. Otherwise a frame
    /// is taken from the free list or, failing that, from the replacer
    /// (writing a dirty victim back first), and the page bytes are loaded
    /// from disk.
    ///
    /// # Errors
    ///
    /// - `PoolExhausted` if every frame is pinned
    /// - `PageNotFound` / `Io` from the disk manager
    pub fn fetch_page(&self, page_id: PageId) -> Result<&BufferFrame> {
        let mut inner = self.inner.lock();

        if let Some(frame_id) = inner.page_table.get(page_id) {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.pin() == 0 {
                self.replacer.pin(frame_id);
            }
            return Ok(frame);
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.frames[frame_id.0 as usize];

        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk.read_page(page_id, &mut data[..]) {
                drop(data);
                frame.reset();
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        }
        frame.set_page_id(Some(page_id));
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        Ok(frame)
    }

    /// Unpins a page, optionally marking it dirty.
    ///
    /// The dirty flag is sticky: `is_dirty = false` never clears an earlier
    /// mark; only a flush does. Returns false (and logs) when the page is
    /// not resident or its pin count is already zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();
        let Some(frame_id) = inner.page_table.get(page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.0 as usize];

        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.pin_count() == 0 {
            error!("unpin of page {} with zero pin count", page_id);
            return false;
        }
        if frame.unpin() == 0 {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Writes a resident page through to disk and clears its dirty flag.
    ///
    /// The write happens regardless of the dirty flag; pin counts are
    /// untouched. Returns Ok(false) when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let inner = self.inner.lock();
        let Some(frame_id) = inner.page_table.get(page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.0 as usize];

        {
            let data = frame.read_data();
            self.disk.write_page(page_id, &data[..])?;
        }
        frame.set_dirty(false);
        Ok(true)
    }

    /// Allocates a new disk page and returns its frame, pinned and zeroed.
    ///
    /// The frame is acquired before the disk allocation, so a full pool
    /// fails without allocating anything.
    ///
    /// # Errors
    ///
    /// - `PoolExhausted` if every frame is pinned
    /// - `Io` from the disk manager
    pub fn new_page(&self) -> Result<&BufferFrame> {
        let mut inner = self.inner.lock();

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.frames[frame_id.0 as usize];

        let page_id = match self.disk.allocate_page() {
            Ok(id) => id,
            Err(e) => {
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        frame.set_page_id(Some(page_id));
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        Ok(frame)
    }

    /// Deletes a page from the pool and the disk.
    ///
    /// Returns Ok(true) when the page is not resident ("already gone") or
    /// was removed; Ok(false) when it is pinned. The freed frame goes back
    /// to the free list.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(frame_id) = inner.page_table.get(page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.0 as usize];

        if frame.is_pinned() {
            return Ok(false);
        }

        inner.page_table.remove(page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }

    /// Flushes every resident page.
    ///
    /// The page set is snapshotted under the pool mutex, then each page is
    /// flushed without holding it across the whole pass.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids = self.inner.lock().page_table.page_ids();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Fetches a page and wraps it in a read guard that unpins on drop.
    pub fn read_page(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard {
            pool: self,
            page_id,
            frame,
        })
    }

    /// Fetches a page and wraps it in a write guard that unpins on drop,
    /// marking the page dirty if it was written through the guard.
    pub fn write_page(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard {
            pool: self,
            page_id,
            frame,
            dirtied: Cell::new(false),
        })
    }

    /// Returns statistics about the pool.
    pub fn stats(&self) -> BufferPoolStats {
        let inner = self.inner.lock();
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;

        for (_, frame_id) in inner.page_table.iter() {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_frames += 1;
            }
            if frame.is_dirty() {
                dirty_frames += 1;
            }
        }

        BufferPoolStats {
            total_frames: self.config.pool_size,
            free_frames: inner.free_list.len(),
            used_frames: inner.page_table.len(),
            pinned_frames,
            dirty_frames,
        }
    }

    /// Gets a usable frame: free list first, then a replacer victim.
    ///
    /// A dirty victim is written back before its mapping is removed. The
    /// returned frame is reset (empty, unpinned, clean, zeroed) and not yet
    /// mapped. Evicted frames are handed straight to the caller, not
    /// free-listed.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(KestrelError::PoolExhausted)?;
        let frame = &self.frames[frame_id.0 as usize];

        let Some(old_page_id) = frame.page_id() else {
            return Err(KestrelError::Internal(format!(
                "victim {} holds no page",
                frame_id
            )));
        };

        if frame.is_dirty() {
            let data = frame.read_data();
            if let Err(e) = self.disk.write_page(old_page_id, &data[..]) {
                drop(data);
                // Put the victim back so the pool stays consistent.
                self.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        debug!("evicting page {} from {}", old_page_id, frame_id);
        inner.page_table.remove(old_page_id);
        frame.reset();
        Ok(frame_id)
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// RAII guard for reading a page. Unpins (clean) on drop.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    frame: &'a BufferFrame,
}

impl<'a> PageReadGuard<'a> {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

/// RAII guard for writing a page. Unpins on drop, dirty if written through.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPoolManager,
    page_id: PageId,
    frame: &'a BufferFrame,
    dirtied: Cell<bool>,
}

impl<'a> PageWriteGuard<'a> {
    /// Returns the page ID.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns mutable access to the page data and marks the page dirty.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.dirtied.set(true);
        self.frame.write_data()
    }

    /// Returns read access to the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.dirtied.get());
    }
}
