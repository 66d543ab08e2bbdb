//! Configuration structures for KestrelDB.

use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for the database engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the data file.
    pub data_dir: PathBuf,
    /// Page size in bytes. Must match the compiled-in `PAGE_SIZE`.
    pub page_size: usize,
    /// Buffer pool size in number of pages.
    pub buffer_pool_pages: usize,
    /// Enable fsync for durability.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            page_size: PAGE_SIZE,
            buffer_pool_pages: 1024, // 4 MB with 4 KB pages
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the total buffer pool size in bytes.
    pub fn buffer_pool_size_bytes(&self) -> usize {
        self.buffer_pool_pages * self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.page_size, PAGE_SIZE);
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.buffer_pool_pages, 1024);
        assert!(config.fsync_enabled);
    }

    #[test]
    fn test_storage_config_custom() {
        let config = StorageConfig {
            data_dir: PathBuf::from("/var/lib/kestreldb"),
            page_size: 4096,
            buffer_pool_pages: 8192,
            fsync_enabled: false,
        };

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/kestreldb"));
        assert_eq!(config.buffer_pool_pages, 8192);
        assert!(!config.fsync_enabled);
    }

    #[test]
    fn test_buffer_pool_size_bytes() {
        let config = StorageConfig::default();
        assert_eq!(config.buffer_pool_size_bytes(), 1024 * 4096);
        assert_eq!(config.buffer_pool_size_bytes(), 4_194_304); // 4 MB
    }

    #[test]
    fn test_storage_config_clone() {
        let config1 = StorageConfig::default();
        let config2 = config1.clone();
        assert_eq!(config1.page_size, config2.page_size);
        assert_eq!(config1.data_dir, config2.data_dir);
    }

    #[test]
    fn test_storage_config_serde_roundtrip() {
        let original = StorageConfig::default();
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: StorageConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(original.data_dir, deserialized.data_dir);
        assert_eq!(original.page_size, deserialized.page_size);
        assert_eq!(original.buffer_pool_pages, deserialized.buffer_pool_pages);
        assert_eq!(original.fsync_enabled, deserialized.fsync_enabled);
    }
}
