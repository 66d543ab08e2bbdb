//! Page identifiers and constants for KestrelDB storage.

use serde::{Deserialize, Serialize};

/// Size of a page in bytes (4 KiB).
pub const PAGE_SIZE: usize = 4 * 1024;

/// Log sequence number of the last modification to a page.
///
/// Stored in on-disk headers for the benefit of a recovery layer; the
/// storage core itself never interprets it.
pub type Lsn = u64;

/// Persistent identifier of a page within the database file.
///
/// Page ids are dense, starting at 0 (the master page). `PageId::INVALID`
/// is the reserved sentinel for "no page".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid page ID.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Creates a new PageId.
    pub fn new(page_num: u32) -> Self {
        Self(page_num)
    }

    /// Returns true if this is a valid page ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_constant() {
        assert_eq!(PAGE_SIZE, 4 * 1024);
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_page_id_validity() {
        let valid = PageId::new(0);
        let invalid = PageId::INVALID;

        assert!(valid.is_valid());
        assert!(!invalid.is_valid());
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(PageId::new(42).to_string(), "42");
        assert_eq!(PageId::new(0).to_string(), "0");
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::new(100) < PageId::INVALID);
    }

    #[test]
    fn test_page_id_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(PageId::new(1));
        set.insert(PageId::new(2));
        set.insert(PageId::new(1)); // Duplicate

        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_page_id_serde_roundtrip() {
        let original = PageId::new(500);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: PageId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);
    }
}
