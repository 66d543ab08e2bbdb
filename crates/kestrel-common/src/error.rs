//! Error types for KestrelDB.

use thiserror::Error;

/// Result type alias using KestrelError.
pub type Result<T> = std::result::Result<T, KestrelError>;

/// Errors that can occur in KestrelDB storage operations.
#[derive(Debug, Error)]
pub enum KestrelError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Buffer pool errors
    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: u32 },

    #[error("Buffer pool exhausted, all frames are pinned")]
    PoolExhausted,

    // Hash index errors
    #[error("Hash table header is full ({max} block pages)")]
    HeaderFull { max: usize },

    #[error("Slot index {index} out of bounds (limit {limit})")]
    SlotOutOfBounds { index: usize, limit: usize },

    // Master page errors
    #[error("Master page record table is full")]
    RecordTableFull,

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}
