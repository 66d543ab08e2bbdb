//! Resident-page bookkeeping for the buffer pool.

use crate::frame::FrameId;
use kestrel_common::page::PageId;
use std::collections::HashMap;

/// Mapping from resident page IDs to the frames holding them.
///
/// The pool serializes all access under its global mutex, so this is a
/// plain map. The mapping is bijective over resident pages: a page ID maps
/// to at most one frame and a frame holds at most one page; every frame is
/// either mapped here or sitting in the pool's free list, never both.
pub struct PageTable {
    map: HashMap<PageId, FrameId>,
}

impl PageTable {
    /// Creates a page table sized for the given frame count.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Looks up the frame holding a page.
    pub fn get(&self, page_id: PageId) -> Option<FrameId> {
        self.map.get(&page_id).copied()
    }

    /// Records that `page_id` now resides in `frame_id`.
    pub fn insert(&mut self, page_id: PageId, frame_id: FrameId) {
        debug_assert!(
            !self.map.values().any(|&f| f == frame_id),
            "{} already holds a page",
            frame_id
        );
        let prev = self.map.insert(page_id, frame_id);
        debug_assert!(prev.is_none(), "page {} mapped twice", page_id);
    }

    /// Removes the mapping for a page. Returns the frame it occupied.
    pub fn remove(&mut self, page_id: PageId) -> Option<FrameId> {
        self.map.remove(&page_id)
    }

    /// Returns true if the page is resident.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.map.contains_key(&page_id)
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no pages are resident.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Snapshot of all resident page IDs.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.map.keys().copied().collect()
    }

    /// Iterates over all (page, frame) entries.
    pub fn iter(&self) -> impl Iterator<Item = (PageId, FrameId)> + '_ {
        self.map.iter().map(|(&p, &f)| (p, f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get() {
        let mut table = PageTable::new(10);
        table.insert(PageId::new(42), FrameId(7));

        assert_eq!(table.get(PageId::new(42)), Some(FrameId(7)));
        assert!(table.contains(PageId::new(42)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut table = PageTable::new(10);
        table.insert(PageId::new(42), FrameId(7));

        assert_eq!(table.remove(PageId::new(42)), Some(FrameId(7)));
        assert_eq!(table.get(PageId::new(42)), None);
        assert!(table.is_empty());
        assert_eq!(table.remove(PageId::new(42)), None);
    }

    #[test]
    fn test_page_ids_snapshot() {
        let mut table = PageTable::new(10);
        table.insert(PageId::new(1), FrameId(0));
        table.insert(PageId::new(2), FrameId(1));
        table.insert(PageId::new(3), FrameId(2));

        let mut ids = table.page_ids();
        ids.sort();
        assert_eq!(ids, vec![PageId::new(1), PageId::new(2), PageId::new(3)]);
    }

    #[test]
    fn test_iter() {
        let mut table = PageTable::new(10);
        table.insert(PageId::new(5), FrameId(3));

        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![(PageId::new(5), FrameId(3))]);
    }
}
