//! Header page of the linear-probe hash table.
//!
//! Layout (little-endian):
//! - page_id: 4 bytes (offset 0, 4 bytes reserved after it)
//! - lsn: 8 bytes (offset 8)
//! - size: 8 bytes (offset 16, logical bucket count)
//! - next_ind: 8 bytes (offset 24, number of block page ids recorded)
//! - block_page_ids: 4 bytes each (offset 32 to end of page)

use kestrel_common::page::{Lsn, PageId, PAGE_SIZE};
use kestrel_common::{KestrelError, Result};
use log::error;

const PAGE_ID_OFFSET: usize = 0;
const LSN_OFFSET: usize = 8;
const SIZE_OFFSET: usize = 16;
const NEXT_IND_OFFSET: usize = 24;
const BLOCK_IDS_OFFSET: usize = 32;

/// Maximum number of block page ids the header can record.
pub const MAX_BLOCK_NUM: usize = (PAGE_SIZE - BLOCK_IDS_OFFSET) / 4;

/// Accessors for the hash table header page.
///
/// All functions operate on the raw page bytes in place.
pub struct HashHeaderPage;

impl HashHeaderPage {
    /// Initializes a zeroed page as an empty header.
    pub fn init(data: &mut [u8], page_id: PageId, size: u64) {
        data[..PAGE_SIZE].fill(0);
        Self::set_page_id(data, page_id);
        Self::set_lsn(data, 0);
        Self::set_size(data, size);
    }

    /// Returns the header's own page id.
    pub fn page_id(data: &[u8]) -> PageId {
        PageId(read_u32(data, PAGE_ID_OFFSET))
    }

    /// Sets the header's own page id.
    pub fn set_page_id(data: &mut [u8], page_id: PageId) {
        write_u32(data, PAGE_ID_OFFSET, page_id.0);
    }

    /// Returns the log sequence number.
    pub fn lsn(data: &[u8]) -> Lsn {
        read_u64(data, LSN_OFFSET)
    }

    /// Sets the log sequence number.
    pub fn set_lsn(data: &mut [u8], lsn: Lsn) {
        write_u64(data, LSN_OFFSET, lsn);
    }

    /// Returns the logical bucket count.
    pub fn size(data: &[u8]) -> u64 {
        read_u64(data, SIZE_OFFSET)
    }

    /// Sets the logical bucket count.
    pub fn set_size(data: &mut [u8], size: u64) {
        write_u64(data, SIZE_OFFSET, size);
    }

    /// Returns the number of block pages recorded.
    pub fn num_blocks(data: &[u8]) -> usize {
        read_u64(data, NEXT_IND_OFFSET) as usize
    }

    /// Returns the page id of the block at `index`.
    pub fn block_page_id_at(data: &[u8], index: usize) -> Result<PageId> {
        let num_blocks = Self::num_blocks(data);
        if index >= num_blocks {
            error!("block index {} out of bounds ({} blocks)", index, num_blocks);
            return Err(KestrelError::SlotOutOfBounds {
                index,
                limit: num_blocks,
            });
        }
        Ok(PageId(read_u32(data, BLOCK_IDS_OFFSET + index * 4)))
    }

    /// Appends a block page id to the header.
    pub fn add_block_page_id(data: &mut [u8], page_id: PageId) -> Result<()> {
        let next_ind = Self::num_blocks(data);
        if next_ind >= MAX_BLOCK_NUM {
            error!("hash table header is full ({} blocks)", MAX_BLOCK_NUM);
            return Err(KestrelError::HeaderFull { max: MAX_BLOCK_NUM });
        }
        write_u32(data, BLOCK_IDS_OFFSET + next_ind * 4, page_id.0);
        write_u64(data, NEXT_IND_OFFSET, (next_ind + 1) as u64);
        Ok(())
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn write_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[test]
    fn test_header_init() {
        let mut page = empty_page();
        HashHeaderPage::init(&mut page, PageId(5), 64);

        assert_eq!(HashHeaderPage::page_id(&page), PageId(5));
        assert_eq!(HashHeaderPage::lsn(&page), 0);
        assert_eq!(HashHeaderPage::size(&page), 64);
        assert_eq!(HashHeaderPage::num_blocks(&page), 0);
    }

    #[test]
    fn test_header_size_roundtrip() {
        let mut page = empty_page();
        HashHeaderPage::init(&mut page, PageId(1), 16);

        HashHeaderPage::set_size(&mut page, 128);
        assert_eq!(HashHeaderPage::size(&page), 128);
    }

    #[test]
    fn test_header_lsn_roundtrip() {
        let mut page = empty_page();
        HashHeaderPage::init(&mut page, PageId(1), 16);

        HashHeaderPage::set_lsn(&mut page, 9001);
        assert_eq!(HashHeaderPage::lsn(&page), 9001);
    }

    #[test]
    fn test_add_and_get_block_page_ids() {
        let mut page = empty_page();
        HashHeaderPage::init(&mut page, PageId(1), 16);

        HashHeaderPage::add_block_page_id(&mut page, PageId(10)).unwrap();
        HashHeaderPage::add_block_page_id(&mut page, PageId(20)).unwrap();
        HashHeaderPage::add_block_page_id(&mut page, PageId(30)).unwrap();

        assert_eq!(HashHeaderPage::num_blocks(&page), 3);
        assert_eq!(HashHeaderPage::block_page_id_at(&page, 0).unwrap(), PageId(10));
        assert_eq!(HashHeaderPage::block_page_id_at(&page, 1).unwrap(), PageId(20));
        assert_eq!(HashHeaderPage::block_page_id_at(&page, 2).unwrap(), PageId(30));
    }

    #[test]
    fn test_block_index_out_of_bounds() {
        let mut page = empty_page();
        HashHeaderPage::init(&mut page, PageId(1), 16);
        HashHeaderPage::add_block_page_id(&mut page, PageId(10)).unwrap();

        let result = HashHeaderPage::block_page_id_at(&page, 1);
        assert!(matches!(
            result,
            Err(KestrelError::SlotOutOfBounds { index: 1, limit: 1 })
        ));
    }

    #[test]
    fn test_header_capacity() {
        let mut page = empty_page();
        HashHeaderPage::init(&mut page, PageId(1), 16);

        for i in 0..MAX_BLOCK_NUM {
            HashHeaderPage::add_block_page_id(&mut page, PageId(i as u32)).unwrap();
        }
        assert_eq!(HashHeaderPage::num_blocks(&page), MAX_BLOCK_NUM);

        let result = HashHeaderPage::add_block_page_id(&mut page, PageId(0));
        assert!(matches!(result, Err(KestrelError::HeaderFull { .. })));
    }

    #[test]
    fn test_max_block_num_fits_page() {
        assert_eq!(MAX_BLOCK_NUM, 1016);
        assert!(BLOCK_IDS_OFFSET + MAX_BLOCK_NUM * 4 <= PAGE_SIZE);
    }
}
