//! Disk-resident linear-probe hash index.
//!
//! The index lives entirely in buffer-pool pages:
//!
//! ```text
//! master page (0)          header page                 block pages
//! +--------------+         +-----------------+         +------------------+
//! | name -> hdr  |-------->| page_id, lsn    |    +--->| occupied bitmap  |
//! +--------------+         | size (buckets)  |    |    | readable bitmap  |
//!                          | block_page_ids  |----+    | [(K, V); N]      |
//!                          +-----------------+         +------------------+
//! ```
//!
//! Bucket `b` maps to block `b / N` at slot `b % N`, where `N` slots fit a
//! page for the concrete `(K, V)` width. Probing is linear with tombstones;
//! growth doubles the bucket count and rewrites every block.

mod block;
mod header;
mod table;

pub use block::{block_array_size, HashBlockPage};
pub use header::{HashHeaderPage, MAX_BLOCK_NUM};
pub use table::{default_hash, HashFn, LinearProbeHashTable};
