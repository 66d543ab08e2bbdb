//! File-backed disk manager for page-level I/O.

use kestrel_buffer::DiskManager;
use kestrel_common::page::{PageId, PAGE_SIZE};
use kestrel_common::{KestrelError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Name of the data file inside the data directory.
const DATA_FILE_NAME: &str = "kestrel.dat";

/// Configuration for the disk manager.
#[derive(Debug, Clone)]
pub struct DiskManagerConfig {
    /// Base directory for the data file.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

/// Manages reading and writing pages in the database file.
///
/// The file is a dense array of `PAGE_SIZE` pages addressed by page number.
/// Allocation extends the file with a zeroed page or reuses a previously
/// deallocated page id. The free set lives in memory only; persisting it is
/// a recovery-layer concern, so ids freed in one process run are simply
/// left in place on disk until reused.
///
/// The database file uses little-endian integers throughout and is not
/// portable to big-endian readers.
pub struct FileDiskManager {
    /// Configuration.
    config: DiskManagerConfig,
    /// File handle and allocation state.
    inner: Mutex<DiskInner>,
}

struct DiskInner {
    /// The data file.
    file: File,
    /// Number of pages in the file.
    num_pages: u32,
    /// Deallocated page ids available for reuse.
    free_pages: Vec<u32>,
}

impl FileDiskManager {
    /// Creates a disk manager, creating the data directory and file as needed.
    pub fn new(config: DiskManagerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let path = config.data_dir.join(DATA_FILE_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            config,
            inner: Mutex::new(DiskInner {
                file,
                num_pages,
                free_pages: Vec::new(),
            }),
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    /// Flushes all pending writes to the file.
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    fn page_offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(KestrelError::PageNotFound { page_id: page_id.0 });
        }

        inner.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        inner.file.read_exact(&mut buf[..PAGE_SIZE])?;
        Ok(())
    }

    fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_id.0 >= inner.num_pages {
            return Err(KestrelError::PageNotFound { page_id: page_id.0 });
        }

        inner.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        inner.file.write_all(&data[..PAGE_SIZE])?;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId> {
        let mut inner = self.inner.lock();

        let page_num = match inner.free_pages.pop() {
            Some(num) => num,
            None => {
                let num = inner.num_pages;
                inner.num_pages = num + 1;
                num
            }
        };

        // Extend or overwrite with a zeroed page so reads see fresh pages.
        let offset = (page_num as u64) * (PAGE_SIZE as u64);
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(&[0u8; PAGE_SIZE])?;

        if self.config.fsync_enabled {
            inner.file.sync_all()?;
        }

        Ok(PageId(page_num))
    }

    fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.inner.lock();
        if page_id.0 < inner.num_pages && !inner.free_pages.contains(&page_id.0) {
            inner.free_pages.push(page_id.0);
        }
        Ok(())
    }
}

impl Drop for FileDiskManager {
    fn drop(&mut self) {
        let _ = self.inner.lock().file.sync_all();
    }
}
