//! Index Handler Reader
//!
//! Read-only view of an index, plus the cheap consistency check that
//! decides whether the index can be trusted for a given data stream.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use tracing::trace;

use crate::codec::{DecodeOutcome, RecordCodec};
use crate::error::Result;
use crate::stream::stream_len;

use super::{entry_count, IndexHandler, InvalidIndex};

/// Backing storage of a reader's index: a file, or bytes rebuilt in memory
pub enum IndexSource {
    File(BufReader<File>),
    Memory(Cursor<Vec<u8>>),
}

impl Read for IndexSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            IndexSource::File(file) => file.read(buf),
            IndexSource::Memory(bytes) => bytes.read(buf),
        }
    }
}

impl Seek for IndexSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            IndexSource::File(file) => file.seek(pos),
            IndexSource::Memory(bytes) => bytes.seek(pos),
        }
    }
}

/// Outcome of checking an index against its data stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid(InvalidIndex),
}

/// Read-only index handler
pub struct IndexHandlerReader<S = IndexSource> {
    handler: IndexHandler<S>,
}

impl IndexHandlerReader<IndexSource> {
    /// Open an index file read-only.
    ///
    /// Missing, unreadable, short, misaligned or mis-tagged files are
    /// reported as [`InvalidIndex`] rather than raised.
    pub fn open(path: &Path) -> std::result::Result<Self, InvalidIndex> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(InvalidIndex::Missing),
            Err(e) => return Err(InvalidIndex::Unreadable(e.to_string())),
        };
        Self::from_stream(IndexSource::File(BufReader::new(file)))
    }

    /// Wrap index bytes held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, InvalidIndex> {
        Self::from_stream(IndexSource::Memory(Cursor::new(bytes)))
    }
}

impl<S: Read + Seek> IndexHandlerReader<S> {
    /// Attach to an index stream, checking its length and header
    pub fn from_stream(mut stream: S) -> std::result::Result<Self, InvalidIndex> {
        let len = stream_len(&mut stream).map_err(|e| InvalidIndex::Unreadable(e.to_string()))?;
        let count = entry_count(len)?;

        let mut handler = IndexHandler::with_count(stream, count);
        if !handler.check_header() {
            return Err(InvalidIndex::BadHeader);
        }

        Ok(Self { handler })
    }

    /// Check this index against the data it describes.
    ///
    /// The index is usable when the last recorded offset lies within the
    /// data and the last record decodes to exactly the end of the data. An
    /// empty index is only valid for empty data (or a bare container header). I/O failures on the data
    /// stream are errors; everything else is an [`InvalidIndex`] reason.
    pub fn verify<D, C>(&mut self, data: &mut D, codec: &C) -> Result<Verification>
    where
        D: BufRead + Seek,
        C: RecordCodec,
    {
        let data_len = stream_len(data)?;

        let preamble_len = codec.preamble_len();
        let last = match self.handler.last()? {
            Some(offset) => offset,
            None if data_len == 0 || data_len == preamble_len => return Ok(self.mark_valid()),
            None => {
                return Ok(Verification::Invalid(InvalidIndex::TailMismatch {
                    end: preamble_len,
                    data_len,
                }))
            }
        };

        if last > data_len {
            return Ok(Verification::Invalid(InvalidIndex::OffsetPastEnd {
                offset: last,
                data_len,
            }));
        }

        data.seek(SeekFrom::Start(last))?;
        let invalid = match codec.decode(data)? {
            DecodeOutcome::Record { len, .. } => {
                let end = last + len;
                trace!(last, end, data_len, "checked tail record");
                if end == data_len {
                    return Ok(self.mark_valid());
                }
                InvalidIndex::TailMismatch { end, data_len }
            }
            DecodeOutcome::Eof | DecodeOutcome::Incomplete { .. } => {
                InvalidIndex::TailIncomplete { offset: last }
            }
            DecodeOutcome::Malformed { reason } => InvalidIndex::TailUndecodable {
                offset: last,
                reason,
            },
        };

        Ok(Verification::Invalid(invalid))
    }

    fn mark_valid(&mut self) -> Verification {
        self.handler.set_verified(true);
        Verification::Valid
    }

    pub(crate) fn set_verified(&mut self, verified: bool) {
        self.handler.set_verified(verified);
    }

    pub fn is_verified(&self) -> bool {
        self.handler.is_verified()
    }

    pub fn count(&self) -> u64 {
        self.handler.count()
    }

    pub fn is_empty(&self) -> bool {
        self.handler.is_empty()
    }

    /// Offset of record `index`; negative indices count from the end
    pub fn get(&mut self, index: i64) -> Result<u64> {
        self.handler.get(index)
    }

    /// Offset at an already resolved position
    pub(crate) fn get_at(&mut self, pos: u64) -> Result<u64> {
        self.handler.get_at(pos)
    }

    pub fn last(&mut self) -> Result<Option<u64>> {
        self.handler.last()
    }

    pub fn offsets(&mut self, range: Range<u64>) -> Result<Vec<u64>> {
        self.handler.offsets(range)
    }

    pub fn scan(&mut self) -> Result<Vec<u64>> {
        self.handler.scan()
    }
}
