//! Storage engine façade: disk manager, buffer pool, and master page.

use crate::disk::{DiskManagerConfig, FileDiskManager};
use crate::master::MASTER_PAGE_ID;
use kestrel_buffer::{BufferPoolConfig, BufferPoolManager};
use kestrel_common::page::PAGE_SIZE;
use kestrel_common::{KestrelError, Result, StorageConfig};
use std::sync::Arc;

/// An opened KestrelDB storage core.
///
/// Wires the file disk manager and the buffer pool together and guarantees
/// the master page (page 0) exists. Persistent structures such as the hash
/// index are built on top of `bpm()`.
pub struct Database {
    disk: Arc<FileDiskManager>,
    bpm: Arc<BufferPoolManager>,
}

impl Database {
    /// Opens (or creates) the database under `config.data_dir`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if config.page_size != PAGE_SIZE {
            return Err(KestrelError::ConfigError(format!(
                "page_size {} unsupported, this build uses {}",
                config.page_size, PAGE_SIZE
            )));
        }

        let disk = Arc::new(FileDiskManager::new(DiskManagerConfig {
            data_dir: config.data_dir.clone(),
            fsync_enabled: config.fsync_enabled,
        })?);
        let bpm = Arc::new(BufferPoolManager::new(
            disk.clone(),
            BufferPoolConfig {
                pool_size: config.buffer_pool_pages,
            },
        ));

        let db = Self { disk, bpm };
        db.ensure_master_page()?;
        Ok(db)
    }

    /// Returns the buffer pool.
    pub fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    /// Returns the disk manager.
    pub fn disk(&self) -> &Arc<FileDiskManager> {
        &self.disk
    }

    /// Flushes every cached page and syncs the data file.
    pub fn checkpoint(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.disk.flush()
    }

    /// Allocates page 0 on first open so the record table is addressable.
    fn ensure_master_page(&self) -> Result<()> {
        if self.disk.num_pages() > 0 {
            return Ok(());
        }

        let frame = self.bpm.new_page()?;
        let page_id = frame
            .page_id()
            .ok_or_else(|| KestrelError::Internal("new page has no id".to_string()))?;
        self.bpm.unpin_page(page_id, true);

        if page_id != MASTER_PAGE_ID {
            return Err(KestrelError::Internal(format!(
                "master page allocated at {}",
                page_id
            )));
        }
        self.bpm.flush_page(MASTER_PAGE_ID)?;
        Ok(())
    }
}
