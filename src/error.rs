//! Error types for idxstore
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::index::InvalidIndex;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for idxstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    #[error("Index {index} out of range for {len} records")]
    OutOfRange { index: i64, len: u64 },

    #[error("Invalid slice: {0}")]
    InvalidSlice(String),

    // -------------------------------------------------------------------------
    // State Errors
    // -------------------------------------------------------------------------
    #[error("{0} is closed")]
    Closed(&'static str),

    #[error("Writer is unusable after a failed append: {0}")]
    WriterFailed(String),

    #[error("Out-of-order index write: expected position {expected}, got {got}")]
    OutOfOrderPut { expected: u64, got: u64 },

    #[error("Offset {offset} precedes previous offset {previous}")]
    OffsetRegression { previous: u64, offset: u64 },

    #[error("Refusing to write index header into a non-empty index ({len} bytes)")]
    HeaderOnNonEmpty { len: u64 },

    // -------------------------------------------------------------------------
    // Index File Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt index file: {0}")]
    CorruptIndex(InvalidIndex),

    #[error("Index file {} is missing for a non-empty data file", .0.display())]
    MissingIndex(PathBuf),

    #[error(
        "Index file {} does not match its data file ({reason}); repair it before appending",
        .path.display()
    )]
    StaleIndex { path: PathBuf, reason: InvalidIndex },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Failed to decode record at offset {offset}: {reason}")]
    Decode { offset: u64, reason: String },

    #[error("Record {index} at offset {offset} is truncated")]
    TruncatedRecord { index: u64, offset: u64 },

    #[error("Serialization error: {0}")]
    Encode(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
