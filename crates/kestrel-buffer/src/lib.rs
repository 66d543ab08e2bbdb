//! Buffer pool management for KestrelDB.
//!
//! This crate provides in-memory page caching with:
//! - Fixed-size buffer pool with configurable frame count
//! - Clock (second chance) eviction policy
//! - Pin counting for concurrent access
//! - Dirty page tracking with write-back on eviction
//! - A disk-manager trait so storage backends plug in underneath

pub mod disk;
mod frame;
mod page_table;
mod pool;
mod replacer;

pub use disk::{DiskManager, MemDisk};
pub use frame::{BufferFrame, FrameId};
pub use page_table::PageTable;
pub use pool::{
    BufferPoolConfig, BufferPoolManager, BufferPoolStats, PageReadGuard, PageWriteGuard,
};
pub use replacer::{ClockReplacer, Replacer};
