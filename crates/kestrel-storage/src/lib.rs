//! Storage engine for KestrelDB.
//!
//! This crate provides:
//! - File-backed disk manager for page-level I/O
//! - Master page holding the named record table
//! - Disk-resident linear-probe hash index over the buffer pool
//! - Database façade wiring disk manager and buffer pool together

mod db;
mod disk;
pub mod hash;
mod master;

pub use db::Database;
pub use disk::{DiskManagerConfig, FileDiskManager};
pub use hash::{default_hash, HashBlockPage, HashFn, HashHeaderPage, LinearProbeHashTable};
pub use master::{MasterPage, MASTER_PAGE_ID, MAX_NAME_LEN, MAX_RECORDS};
