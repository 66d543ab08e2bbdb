//! Master page: the named record table on page 0.
//!
//! Every persistent structure in the database registers its root page here
//! under a name, so the file is self-describing. One page of records is
//! plenty for an embedded engine; name uniqueness is the caller's problem.

use kestrel_common::page::{PageId, PAGE_SIZE};
use kestrel_common::{KestrelError, Result};
use log::error;

/// Page ID of the master page.
pub const MASTER_PAGE_ID: PageId = PageId(0);

/// Maximum record name length in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Record layout: name (32 bytes, zero padded) + root page id (u32).
const RECORD_SIZE: usize = MAX_NAME_LEN + 4;

/// Record count (u32) at offset 0; records start at 8 (4 bytes reserved).
const COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 8;

/// Maximum number of records the master page can hold.
pub const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// Accessors for the master page record table.
///
/// All functions operate on the raw page bytes in place, so callers work
/// directly on a pinned buffer pool frame.
pub struct MasterPage;

impl MasterPage {
    /// Returns the number of records.
    pub fn record_count(data: &[u8]) -> usize {
        u32::from_le_bytes([
            data[COUNT_OFFSET],
            data[COUNT_OFFSET + 1],
            data[COUNT_OFFSET + 2],
            data[COUNT_OFFSET + 3],
        ]) as usize
    }

    fn set_record_count(data: &mut [u8], count: usize) {
        data[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn record_offset(index: usize) -> usize {
        RECORDS_OFFSET + index * RECORD_SIZE
    }

    fn name_at(data: &[u8], index: usize) -> &[u8] {
        let offset = Self::record_offset(index);
        &data[offset..offset + MAX_NAME_LEN]
    }

    fn page_id_at(data: &[u8], index: usize) -> PageId {
        let offset = Self::record_offset(index) + MAX_NAME_LEN;
        PageId(u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]))
    }

    fn find(data: &[u8], name: &[u8; MAX_NAME_LEN]) -> Option<usize> {
        (0..Self::record_count(data)).find(|&i| Self::name_at(data, i) == name)
    }

    fn padded_name(name: &str) -> Result<[u8; MAX_NAME_LEN]> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_NAME_LEN {
            return Err(KestrelError::InvalidParameter {
                name: "name".to_string(),
                value: name.to_string(),
            });
        }
        let mut padded = [0u8; MAX_NAME_LEN];
        padded[..bytes.len()].copy_from_slice(bytes);
        Ok(padded)
    }

    /// Registers `name -> page_id`. Returns Ok(false) if the name is taken.
    pub fn insert_record(data: &mut [u8], name: &str, page_id: PageId) -> Result<bool> {
        let padded = Self::padded_name(name)?;

        if Self::find(data, &padded).is_some() {
            return Ok(false);
        }

        let count = Self::record_count(data);
        if count >= MAX_RECORDS {
            error!("master page is full ({} records)", MAX_RECORDS);
            return Err(KestrelError::RecordTableFull);
        }

        let offset = Self::record_offset(count);
        data[offset..offset + MAX_NAME_LEN].copy_from_slice(&padded);
        data[offset + MAX_NAME_LEN..offset + RECORD_SIZE]
            .copy_from_slice(&page_id.0.to_le_bytes());
        Self::set_record_count(data, count + 1);
        Ok(true)
    }

    /// Looks up the page registered under `name`.
    pub fn get_record(data: &[u8], name: &str) -> Result<Option<PageId>> {
        let padded = Self::padded_name(name)?;
        Ok(Self::find(data, &padded).map(|i| Self::page_id_at(data, i)))
    }

    /// Removes the record for `name`. Returns Ok(false) if absent.
    pub fn delete_record(data: &mut [u8], name: &str) -> Result<bool> {
        let padded = Self::padded_name(name)?;
        let Some(index) = Self::find(data, &padded) else {
            return Ok(false);
        };

        let count = Self::record_count(data);
        // Shift the tail records down over the removed one.
        let start = Self::record_offset(index);
        let end = Self::record_offset(count);
        data.copy_within(start + RECORD_SIZE..end, start);
        // Clear the vacated slot.
        let last = Self::record_offset(count - 1);
        data[last..last + RECORD_SIZE].fill(0);
        Self::set_record_count(data, count - 1);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_page() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    #[test]
    fn test_empty_master_page() {
        let page = empty_page();
        assert_eq!(MasterPage::record_count(&page), 0);
        assert_eq!(MasterPage::get_record(&page, "missing").unwrap(), None);
    }

    #[test]
    fn test_insert_and_get_record() {
        let mut page = empty_page();

        assert!(MasterPage::insert_record(&mut page, "orders_pk", PageId(7)).unwrap());
        assert_eq!(MasterPage::record_count(&page), 1);
        assert_eq!(
            MasterPage::get_record(&page, "orders_pk").unwrap(),
            Some(PageId(7))
        );
    }

    #[test]
    fn test_insert_duplicate_name() {
        let mut page = empty_page();

        assert!(MasterPage::insert_record(&mut page, "idx", PageId(1)).unwrap());
        assert!(!MasterPage::insert_record(&mut page, "idx", PageId(2)).unwrap());

        // Original mapping untouched.
        assert_eq!(MasterPage::get_record(&page, "idx").unwrap(), Some(PageId(1)));
        assert_eq!(MasterPage::record_count(&page), 1);
    }

    #[test]
    fn test_delete_record() {
        let mut page = empty_page();

        MasterPage::insert_record(&mut page, "a", PageId(1)).unwrap();
        MasterPage::insert_record(&mut page, "b", PageId(2)).unwrap();
        MasterPage::insert_record(&mut page, "c", PageId(3)).unwrap();

        assert!(MasterPage::delete_record(&mut page, "b").unwrap());
        assert_eq!(MasterPage::record_count(&page), 2);
        assert_eq!(MasterPage::get_record(&page, "b").unwrap(), None);

        // Remaining records survive the shift.
        assert_eq!(MasterPage::get_record(&page, "a").unwrap(), Some(PageId(1)));
        assert_eq!(MasterPage::get_record(&page, "c").unwrap(), Some(PageId(3)));

        assert!(!MasterPage::delete_record(&mut page, "b").unwrap());
    }

    #[test]
    fn test_name_length_limits() {
        let mut page = empty_page();

        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(MasterPage::insert_record(&mut page, &long, PageId(1)).is_err());
        assert!(MasterPage::insert_record(&mut page, "", PageId(1)).is_err());

        let exact = "y".repeat(MAX_NAME_LEN);
        assert!(MasterPage::insert_record(&mut page, &exact, PageId(9)).unwrap());
        assert_eq!(
            MasterPage::get_record(&page, &exact).unwrap(),
            Some(PageId(9))
        );
    }

    #[test]
    fn test_record_table_full() {
        let mut page = empty_page();

        for i in 0..MAX_RECORDS {
            let name = format!("index_{}", i);
            assert!(MasterPage::insert_record(&mut page, &name, PageId(i as u32)).unwrap());
        }

        let result = MasterPage::insert_record(&mut page, "one_too_many", PageId(0));
        assert!(matches!(result, Err(KestrelError::RecordTableFull)));
    }

    #[test]
    fn test_max_records_fits_page() {
        assert!(RECORDS_OFFSET + MAX_RECORDS * RECORD_SIZE <= PAGE_SIZE);
        assert_eq!(MAX_RECORDS, 113);
    }
}
