//! Linear-probe hash table over the buffer pool.

use super::block::HashBlockPage;
use super::header::{HashHeaderPage, MAX_BLOCK_NUM};
use crate::master::{MasterPage, MASTER_PAGE_ID};
use kestrel_buffer::BufferPoolManager;
use kestrel_common::page::PageId;
use kestrel_common::types::{Storable, Transaction};
use kestrel_common::{KestrelError, Result};
use log::debug;
use parking_lot::RwLock;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// Hash function supplied by the caller.
pub type HashFn<K> = fn(&K) -> u64;

/// Default hash function (the standard library's SipHash).
pub fn default_hash<K: Hash>(key: &K) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Disk-resident hash index with linear probing.
///
/// The table owns one header page listing its block pages; bucket `b` lives
/// in block `b / BLOCK_ARRAY_SIZE` at offset `b % BLOCK_ARRAY_SIZE`. Probes
/// walk slot by slot, then block by block, and stop at the first
/// never-written slot or past the end of the last block. Tombstones keep
/// probes alive; inserts claim only never-written slots, and a probe that
/// runs off the last block triggers a resize (double the bucket count,
/// re-insert every live pair).
///
/// # Concurrency
///
/// A table latch is read-held by `get_value`/`insert`/`remove` and
/// write-held by `resize`, which therefore quiesces all point operations.
/// Under the table latch, per-block latches serialize writers per block:
/// operations on different blocks run in parallel. Latch order is table
/// latch, then block latch, then the buffer pool (via fetch); a thread
/// holding a block latch never takes the table latch. Block pages stay
/// pinned for the duration of each probe step and are released before the
/// probe advances to the next block.
pub struct LinearProbeHashTable<K: Storable, V: Storable> {
    /// Buffer pool backing all page access.
    bpm: Arc<BufferPoolManager>,
    /// Page id of this table's header page.
    header_page_id: PageId,
    /// Caller-supplied hash function.
    hash_fn: HashFn<K>,
    /// Table latch guarding the logical size and the block latch vector.
    state: RwLock<TableState>,
    _marker: PhantomData<(K, V)>,
}

struct TableState {
    /// Logical bucket count; mirrors the header page.
    size: u64,
    /// One latch per block page, rebuilt on resize.
    block_latches: Vec<RwLock<()>>,
}

enum ProbeOutcome {
    Inserted,
    DuplicatePair,
    /// The probe ran off the last block; carries the size it probed under.
    TableFull(u64),
}

impl<K: Storable, V: Storable> LinearProbeHashTable<K, V> {
    /// Creates a new hash table with `num_buckets` buckets, registering its
    /// header page under `name` in the master page.
    pub fn new(
        name: &str,
        bpm: Arc<BufferPoolManager>,
        num_buckets: usize,
        hash_fn: HashFn<K>,
    ) -> Result<Self> {
        if num_buckets == 0 {
            return Err(KestrelError::InvalidParameter {
                name: "num_buckets".to_string(),
                value: "0".to_string(),
            });
        }

        let slots_per_block = HashBlockPage::<K, V>::slot_count();
        let num_blocks = num_buckets / slots_per_block + 1;
        if num_blocks > MAX_BLOCK_NUM {
            return Err(KestrelError::HeaderFull { max: MAX_BLOCK_NUM });
        }

        let header_frame = bpm.new_page()?;
        let header_page_id = header_frame
            .page_id()
            .ok_or_else(|| KestrelError::Internal("new page has no id".to_string()))?;

        // Register the table in the master page before filling the header.
        {
            let master = bpm.write_page(MASTER_PAGE_ID)?;
            let inserted = {
                let mut data = master.data_mut();
                MasterPage::insert_record(&mut data[..], name, header_page_id)?
            };
            if !inserted {
                drop(master);
                bpm.unpin_page(header_page_id, false);
                return Err(KestrelError::InvalidParameter {
                    name: "name".to_string(),
                    value: name.to_string(),
                });
            }
        }

        {
            let mut data = header_frame.write_data();
            HashHeaderPage::init(&mut data[..], header_page_id, num_buckets as u64);
        }

        // Allocate the initial block pages. new_page hands them out zeroed,
        // so every slot starts empty.
        for _ in 0..num_blocks {
            let block_frame = bpm.new_page()?;
            let block_page_id = block_frame
                .page_id()
                .ok_or_else(|| KestrelError::Internal("new page has no id".to_string()))?;
            {
                let mut data = header_frame.write_data();
                HashHeaderPage::add_block_page_id(&mut data[..], block_page_id)?;
            }
            bpm.unpin_page(block_page_id, false);
        }

        bpm.unpin_page(header_page_id, true);

        let block_latches = (0..num_blocks).map(|_| RwLock::new(())).collect();
        Ok(Self {
            bpm,
            header_page_id,
            hash_fn,
            state: RwLock::new(TableState {
                size: num_buckets as u64,
                block_latches,
            }),
            _marker: PhantomData,
        })
    }

    /// Opens an existing hash table registered under `name`.
    pub fn open(name: &str, bpm: Arc<BufferPoolManager>, hash_fn: HashFn<K>) -> Result<Self> {
        let header_page_id = {
            let master = bpm.read_page(MASTER_PAGE_ID)?;
            let data = master.data();
            MasterPage::get_record(&data[..], name)?
                .ok_or_else(|| KestrelError::IndexNotFound(name.to_string()))?
        };

        let (size, num_blocks) = {
            let header = bpm.read_page(header_page_id)?;
            let data = header.data();
            (
                HashHeaderPage::size(&data[..]),
                HashHeaderPage::num_blocks(&data[..]),
            )
        };

        let block_latches = (0..num_blocks).map(|_| RwLock::new(())).collect();
        Ok(Self {
            bpm,
            header_page_id,
            hash_fn,
            state: RwLock::new(TableState {
                size,
                block_latches,
            }),
            _marker: PhantomData,
        })
    }

    /// Returns the page id of the table's header page.
    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Returns the current bucket count.
    pub fn get_size(&self) -> u64 {
        self.state.read().size
    }

    /// Collects every value stored under `key`, in probe order.
    pub fn get_value(&self, _txn: &Transaction, key: &K) -> Result<Vec<V>> {
        let state = self.state.read();
        let slots = HashBlockPage::<K, V>::slot_count();
        let (mut block_idx, mut offset) = self.slot_for(key, state.size);

        let header = self.bpm.read_page(self.header_page_id)?;
        let mut result = Vec::new();

        while block_idx < state.block_latches.len() {
            let block_page_id = {
                let data = header.data();
                HashHeaderPage::block_page_id_at(&data[..], block_idx)?
            };
            let block = self.bpm.read_page(block_page_id)?;
            let _latch = state.block_latches[block_idx].read();

            let terminated = {
                let data = block.data();
                while offset < slots && HashBlockPage::<K, V>::is_occupied(&data[..], offset) {
                    if HashBlockPage::<K, V>::is_readable(&data[..], offset)
                        && HashBlockPage::<K, V>::key_at(&data[..], offset) == *key
                    {
                        result.push(HashBlockPage::<K, V>::value_at(&data[..], offset));
                    }
                    offset += 1;
                }
                offset < slots
            };

            if terminated {
                // Hit a never-written slot: the probe sequence ends here.
                break;
            }
            block_idx += 1;
            offset = 0;
        }

        Ok(result)
    }

    /// Inserts a key-value pair.
    ///
    /// Returns Ok(false) if the exact pair is already present. A full probe
    /// sequence triggers a resize and the insert retries until it lands.
    pub fn insert(&self, _txn: &Transaction, key: &K, value: &V) -> Result<bool> {
        loop {
            let outcome = {
                let state = self.state.read();
                self.insert_impl(&state, key, value)?
            };
            match outcome {
                ProbeOutcome::Inserted => return Ok(true),
                ProbeOutcome::DuplicatePair => return Ok(false),
                ProbeOutcome::TableFull(observed_size) => {
                    // The table latch is released here; resize re-checks the
                    // size so concurrent growers double the table once.
                    self.resize(observed_size)?;
                }
            }
        }
    }

    /// Removes a key-value pair, leaving a tombstone. Returns Ok(false) if
    /// the pair is not present.
    pub fn remove(&self, _txn: &Transaction, key: &K, value: &V) -> Result<bool> {
        let state = self.state.read();
        let slots = HashBlockPage::<K, V>::slot_count();
        let (mut block_idx, mut offset) = self.slot_for(key, state.size);

        let header = self.bpm.read_page(self.header_page_id)?;

        while block_idx < state.block_latches.len() {
            let block_page_id = {
                let data = header.data();
                HashHeaderPage::block_page_id_at(&data[..], block_idx)?
            };
            let block = self.bpm.write_page(block_page_id)?;
            let _latch = state.block_latches[block_idx].write();

            let found_at = {
                let data = block.data();
                let mut found = None;
                while offset < slots && HashBlockPage::<K, V>::is_occupied(&data[..], offset) {
                    if HashBlockPage::<K, V>::is_readable(&data[..], offset)
                        && HashBlockPage::<K, V>::key_at(&data[..], offset) == *key
                        && HashBlockPage::<K, V>::value_at(&data[..], offset) == *value
                    {
                        found = Some(offset);
                        break;
                    }
                    offset += 1;
                }
                found
            };

            if let Some(slot) = found_at {
                let mut data = block.data_mut();
                HashBlockPage::<K, V>::remove(&mut data[..], slot);
                return Ok(true);
            }

            if offset < slots {
                // Hit a never-written slot without a match.
                return Ok(false);
            }
            block_idx += 1;
            offset = 0;
        }

        Ok(false)
    }

    /// Doubles the table and re-inserts every live pair.
    ///
    /// `old_size` is the bucket count the caller observed when its probe
    /// ran out of slots; if the table already grew past it, the call is a
    /// no-op. Runs with the table write latch held, so all point operations
    /// are quiesced.
    pub fn resize(&self, old_size: u64) -> Result<()> {
        let mut state = self.state.write();
        if state.size != old_size {
            return Ok(());
        }

        let slots = HashBlockPage::<K, V>::slot_count();
        let header = self.bpm.write_page(self.header_page_id)?;

        // Snapshot all live pairs and wipe the blocks, tombstones included.
        let pairs = self.drain_blocks(&state, &header)?;

        loop {
            state.size *= 2;
            debug!(
                "resizing hash table (header {}) to {} buckets",
                self.header_page_id, state.size
            );
            {
                let mut data = header.data_mut();
                HashHeaderPage::set_size(&mut data[..], state.size);
            }

            let target_blocks = (state.size as usize) / slots + 1;
            let mut num_blocks = {
                let data = header.data();
                HashHeaderPage::num_blocks(&data[..])
            };
            while num_blocks < target_blocks {
                let block_frame = self.bpm.new_page()?;
                let block_page_id = block_frame
                    .page_id()
                    .ok_or_else(|| KestrelError::Internal("new page has no id".to_string()))?;
                {
                    let mut data = header.data_mut();
                    HashHeaderPage::add_block_page_id(&mut data[..], block_page_id)?;
                }
                self.bpm.unpin_page(block_page_id, false);
                num_blocks += 1;
            }
            while state.block_latches.len() < target_blocks {
                state.block_latches.push(RwLock::new(()));
            }

            // Re-insert. If even the doubled table cannot hold a pair in
            // its natural probe position, wipe and double again.
            let mut overflowed = false;
            for (k, v) in &pairs {
                match self.insert_impl(&state, k, v)? {
                    ProbeOutcome::Inserted | ProbeOutcome::DuplicatePair => {}
                    ProbeOutcome::TableFull(_) => {
                        overflowed = true;
                        break;
                    }
                }
            }
            if !overflowed {
                break;
            }
            self.reset_blocks(&state, &header)?;
        }

        Ok(())
    }

    /// Computes the starting (block, slot) for a key under `size` buckets.
    fn slot_for(&self, key: &K, size: u64) -> (usize, usize) {
        let bucket = (self.hash_fn)(key) % size;
        let slots = HashBlockPage::<K, V>::slot_count() as u64;
        ((bucket / slots) as usize, (bucket % slots) as usize)
    }

    /// Probes for an insert position under the table latch held by the
    /// caller (read for point inserts, write during resize).
    fn insert_impl(&self, state: &TableState, key: &K, value: &V) -> Result<ProbeOutcome> {
        let slots = HashBlockPage::<K, V>::slot_count();
        let (mut block_idx, mut offset) = self.slot_for(key, state.size);

        let header = self.bpm.read_page(self.header_page_id)?;

        while block_idx < state.block_latches.len() {
            let block_page_id = {
                let data = header.data();
                HashHeaderPage::block_page_id_at(&data[..], block_idx)?
            };
            let block = self.bpm.write_page(block_page_id)?;
            let _latch = state.block_latches[block_idx].write();

            {
                let data = block.data();
                while offset < slots && HashBlockPage::<K, V>::is_occupied(&data[..], offset) {
                    if HashBlockPage::<K, V>::is_readable(&data[..], offset)
                        && HashBlockPage::<K, V>::key_at(&data[..], offset) == *key
                        && HashBlockPage::<K, V>::value_at(&data[..], offset) == *value
                    {
                        return Ok(ProbeOutcome::DuplicatePair);
                    }
                    offset += 1;
                }
            }

            if offset < slots {
                let mut data = block.data_mut();
                let ok = HashBlockPage::<K, V>::insert(&mut data[..], offset, key, value);
                debug_assert!(ok, "insert into probed empty slot failed");
                return Ok(ProbeOutcome::Inserted);
            }

            block_idx += 1;
            offset = 0;
        }

        Ok(ProbeOutcome::TableFull(state.size))
    }

    /// Collects every live pair and resets all block pages to empty.
    fn drain_blocks(
        &self,
        state: &TableState,
        header: &kestrel_buffer::PageWriteGuard<'_>,
    ) -> Result<Vec<(K, V)>> {
        let slots = HashBlockPage::<K, V>::slot_count();
        let num_blocks = {
            let data = header.data();
            HashHeaderPage::num_blocks(&data[..])
        };

        let mut pairs = Vec::new();
        for block_idx in 0..num_blocks {
            let block_page_id = {
                let data = header.data();
                HashHeaderPage::block_page_id_at(&data[..], block_idx)?
            };
            let block = self.bpm.write_page(block_page_id)?;
            let _latch = state.block_latches[block_idx].write();

            let mut data = block.data_mut();
            for offset in 0..slots {
                if HashBlockPage::<K, V>::is_readable(&data[..], offset) {
                    pairs.push((
                        HashBlockPage::<K, V>::key_at(&data[..], offset),
                        HashBlockPage::<K, V>::value_at(&data[..], offset),
                    ));
                }
            }
            HashBlockPage::<K, V>::reset(&mut data[..]);
        }
        Ok(pairs)
    }

    /// Resets every block page to empty (used between resize attempts).
    fn reset_blocks(
        &self,
        state: &TableState,
        header: &kestrel_buffer::PageWriteGuard<'_>,
    ) -> Result<()> {
        let num_blocks = {
            let data = header.data();
            HashHeaderPage::num_blocks(&data[..])
        };
        for block_idx in 0..num_blocks {
            let block_page_id = {
                let data = header.data();
                HashHeaderPage::block_page_id_at(&data[..], block_idx)?
            };
            let block = self.bpm.write_page(block_page_id)?;
            let _latch = state.block_latches[block_idx].write();
            let mut data = block.data_mut();
            HashBlockPage::<K, V>::reset(&mut data[..]);
        }
        Ok(())
    }
}
