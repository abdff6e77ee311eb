//! Index Handler
//!
//! Owns an index stream: header, offsets, and the record count derived
//! from the stream length. Knows nothing about the data format.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;

use crate::error::{Result, StoreError};
use crate::slice::resolve_index;
use crate::stream::stream_len;

use super::{entry_count, entry_position, ENTRY_SIZE, HEADER_SIZE, INDEX_MAGIC};

/// Bytes read per batch when scanning offsets (16 KB)
const PAGE_SIZE: usize = 16 * 1024;

/// Offsets stored in an index stream
pub struct IndexHandler<S> {
    stream: S,
    /// Number of complete entries
    count: u64,
    /// Set once the index has been checked against its data file
    verified: bool,
    /// Known stream position; `None` after a failed or foreign operation.
    /// Lets sequential access skip seeks, which would drop buffered bytes.
    position: Option<u64>,
}

impl<S> IndexHandler<S> {
    /// Wrap a stream whose entry count is already known
    pub(crate) fn with_count(stream: S, count: u64) -> Self {
        Self {
            stream,
            count,
            verified: false,
            position: None,
        }
    }

    /// Number of offsets stored
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether this index has been verified against (or rebuilt from) its data
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub(crate) fn set_verified(&mut self, verified: bool) {
        self.verified = verified;
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Swap the stream for a wrapper around it (e.g. add buffering)
    pub(crate) fn map_stream<T>(self, wrap: impl FnOnce(S) -> T) -> IndexHandler<T> {
        IndexHandler {
            stream: wrap(self.stream),
            count: self.count,
            verified: self.verified,
            position: self.position,
        }
    }
}

impl<S: Seek> IndexHandler<S> {
    /// Attach to an existing index stream, deriving the count from its length.
    ///
    /// A stream shorter than the header or with a partial trailing entry is
    /// rejected with [`StoreError::CorruptIndex`].
    pub fn new(mut stream: S) -> Result<Self> {
        let len = stream_len(&mut stream)?;
        let count = entry_count(len).map_err(StoreError::CorruptIndex)?;
        Ok(Self::with_count(stream, count))
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        if self.position != Some(pos) {
            self.position = None;
            self.stream.seek(SeekFrom::Start(pos))?;
            self.position = Some(pos);
        }
        Ok(())
    }
}

// =============================================================================
// Read Side
// =============================================================================

impl<S: Read + Seek> IndexHandler<S> {
    /// Check the magic header. Unreadable or short streams count as a mismatch.
    pub fn check_header(&mut self) -> bool {
        let mut magic = [0u8; HEADER_SIZE as usize];
        match self.read_exact_at(0, &mut magic) {
            Ok(()) => &magic == INDEX_MAGIC,
            Err(_) => false,
        }
    }

    /// Offset stored at `index`; negative indices count from the end
    pub fn get(&mut self, index: i64) -> Result<u64> {
        let pos = resolve_index(index, self.count)?;
        self.get_at(pos)
    }

    /// Offset at a position already known to be non-negative
    pub(crate) fn get_at(&mut self, pos: u64) -> Result<u64> {
        if pos >= self.count {
            return Err(StoreError::OutOfRange {
                index: position_for_error(pos),
                len: self.count,
            });
        }
        let mut entry = [0u8; ENTRY_SIZE as usize];
        self.read_exact_at(entry_position(pos), &mut entry)?;
        Ok(u64::from_le_bytes(entry))
    }

    /// Offset of the last record, if any
    pub fn last(&mut self) -> Result<Option<u64>> {
        match self.count.checked_sub(1) {
            Some(pos) => self.get_at(pos).map(Some),
            None => Ok(None),
        }
    }

    /// Offsets for a contiguous range of positions, clamped to `count`
    pub fn offsets(&mut self, range: Range<u64>) -> Result<Vec<u64>> {
        let end = range.end.min(self.count);
        let start = range.start.min(end);
        let mut offsets = Vec::with_capacity((end - start) as usize);

        let per_page = PAGE_SIZE / ENTRY_SIZE as usize;
        let mut page = vec![0u8; PAGE_SIZE];
        let mut next = start;
        while next < end {
            let batch = ((end - next) as usize).min(per_page);
            let bytes = &mut page[..batch * ENTRY_SIZE as usize];
            self.read_exact_at(entry_position(next), bytes)?;
            offsets.extend(bytes.chunks_exact(ENTRY_SIZE as usize).map(le_u64));
            next += batch as u64;
        }

        Ok(offsets)
    }

    /// All offsets in record order
    pub fn scan(&mut self) -> Result<Vec<u64>> {
        self.offsets(0..self.count)
    }

    fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek_to(pos)?;
        self.position = None;
        self.stream.read_exact(buf)?;
        self.position = Some(pos + buf.len() as u64);
        Ok(())
    }
}

// =============================================================================
// Write Side
// =============================================================================

impl<S: Write + Seek> IndexHandler<S> {
    /// Start a fresh index on an empty stream
    pub fn create(stream: S) -> Result<Self> {
        let mut handler = Self::with_count(stream, 0);
        handler.write_header()?;
        Ok(handler)
    }

    /// Write the magic header. Only valid on an empty stream.
    pub fn write_header(&mut self) -> Result<()> {
        let len = stream_len(&mut self.stream)?;
        if len != 0 {
            return Err(StoreError::HeaderOnNonEmpty { len });
        }
        self.position = None;
        self.write_all_at(0, INDEX_MAGIC)?;
        self.count = 0;
        Ok(())
    }

    /// Store `offset` at `index`: overwrites when `index < count`,
    /// appends when `index == count`
    pub fn put(&mut self, index: u64, offset: u64) -> Result<()> {
        if index > self.count {
            return Err(StoreError::OutOfRange {
                index: position_for_error(index),
                len: self.count,
            });
        }
        self.write_all_at(entry_position(index), &offset.to_le_bytes())?;
        if index == self.count {
            self.count += 1;
        }
        Ok(())
    }

    /// Append `offset` as the next entry
    pub fn append(&mut self, offset: u64) -> Result<()> {
        self.put(self.count, offset)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    pub(crate) fn get_mut(&mut self) -> &mut S {
        // The caller may move the stream; forget the cached position
        self.position = None;
        &mut self.stream
    }

    fn write_all_at(&mut self, pos: u64, bytes: &[u8]) -> io::Result<()> {
        self.seek_to(pos)?;
        self.position = None;
        self.stream.write_all(bytes)?;
        self.position = Some(pos + bytes.len() as u64);
        Ok(())
    }
}

/// Positions past `i64::MAX` saturate in error reports
fn position_for_error(pos: u64) -> i64 {
    i64::try_from(pos).unwrap_or(i64::MAX)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut entry = [0u8; ENTRY_SIZE as usize];
    entry.copy_from_slice(bytes);
    u64::from_le_bytes(entry)
}
