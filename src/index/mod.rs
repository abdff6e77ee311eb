//! Index File Module
//!
//! Side-car file mapping record positions to byte offsets in a data file.
//!
//! ## Responsibilities
//! - Header write/verify
//! - Offset get/put/append with sequential-write enforcement
//! - Record count derived from file size
//! - Rebuild from the data file when missing or stale
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (4 bytes)                        │
//! │   Magic: "IDV1"                         │
//! ├─────────────────────────────────────────┤
//! │ Entries (8 bytes each)                  │
//! │   [Offset: u64 LE]  record 0            │
//! │   [Offset: u64 LE]  record 1            │
//! │   ... one per record, record order ...  │
//! └─────────────────────────────────────────┘
//! ```
//! `count = (file_len - 4) / 8`. Any remainder means a torn or corrupt
//! index and is never rounded away.

mod handler;
mod reader;
mod rebuild;
mod writer;

use thiserror::Error;

pub use handler::IndexHandler;
pub use reader::{IndexHandlerReader, IndexSource, Verification};
pub use rebuild::{encode_index, rebuild_offsets, write_index_file, RebuildOutcome};
pub use writer::IndexHandlerWriter;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying an index file (format version 1)
pub const INDEX_MAGIC: &[u8; 4] = b"IDV1";

/// Header size: Magic (4) = 4 bytes
pub const HEADER_SIZE: u64 = 4;

/// Entry size: one u64 offset
pub const ENTRY_SIZE: u64 = 8;

/// Why an index cannot be used as-is.
///
/// Readers recover from every variant by rebuilding; writers surface it
/// wrapped in [`StoreError::CorruptIndex`](crate::StoreError::CorruptIndex).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIndex {
    #[error("index file does not exist")]
    Missing,

    #[error("index file cannot be opened: {0}")]
    Unreadable(String),

    #[error("index file is shorter than its header ({len} bytes)")]
    TooShort { len: u64 },

    #[error("index header does not match {:?}", String::from_utf8_lossy(INDEX_MAGIC))]
    BadHeader,

    #[error("{extra} trailing bytes after the last complete entry")]
    TrailingBytes { extra: u64 },

    #[error("last entry points at offset {offset}, past the end of data ({data_len} bytes)")]
    OffsetPastEnd { offset: u64, data_len: u64 },

    #[error("indexed records end at {end}, data ends at {data_len}")]
    TailMismatch { end: u64, data_len: u64 },

    #[error("last indexed record at offset {offset} is incomplete")]
    TailIncomplete { offset: u64 },

    #[error("last indexed record at offset {offset} does not decode: {reason}")]
    TailUndecodable { offset: u64, reason: String },
}

/// Derive the number of entries from an index file length
pub fn entry_count(file_len: u64) -> std::result::Result<u64, InvalidIndex> {
    if file_len < HEADER_SIZE {
        return Err(InvalidIndex::TooShort { len: file_len });
    }
    let body = file_len - HEADER_SIZE;
    let extra = body % ENTRY_SIZE;
    if extra != 0 {
        return Err(InvalidIndex::TrailingBytes { extra });
    }
    Ok(body / ENTRY_SIZE)
}

/// Byte position of entry `index` inside the index file
pub(crate) fn entry_position(index: u64) -> u64 {
    HEADER_SIZE + index * ENTRY_SIZE
}
