//! Indexed Reader
//!
//! Random access over a record stream through its index. Opening verifies
//! the index and rebuilds it from the data when it is missing or stale.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::codec::{DecodeOutcome, RecordCodec};
use crate::config::{default_index_path, ProgressCallback, ReaderOptions};
use crate::error::{Result, StoreError};
use crate::index::{
    encode_index, rebuild_offsets, write_index_file, IndexHandlerReader, Verification,
};
use crate::slice::{resolve_index, SliceSpec};
use crate::stream::stream_len;

use super::Records;

/// Lifecycle of an [`IndexedReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Checking the existing index against the data
    Opening,
    /// Replaying the data stream to recover the index
    Rebuilding,
    /// Index verified; records can be read
    Open,
    Closed,
}

/// Reads records by position from a data stream and its index
///
/// ## Access:
/// - `get(i)` seeks to the indexed offset and decodes one record; negative
///   positions count from the end
/// - `slice(..)` / `iter()` lazily decode a range, reusing the open stream
/// - Every call re-reads from the stream; nothing is cached
pub struct IndexedReader<R: Read + Seek, C: RecordCodec> {
    /// Data stream; `None` once released by `close()`
    data: Option<BufReader<R>>,
    /// Verified index; `None` before opening completes and after close
    index: Option<IndexHandlerReader>,
    codec: C,
    /// Record count fixed at open time
    len: u64,
    state: ReaderState,
    /// Index file location; `None` keeps the index in memory
    index_path: Option<PathBuf>,
    close_stream_on_close: bool,
    /// Data stream position when known, to skip seeks between neighbours
    data_position: Option<u64>,
    rebuilt: bool,
}

impl<C: RecordCodec> IndexedReader<File, C> {
    /// Open `path` with its conventional index file (`<path>.idx`)
    pub fn open(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        Self::open_with(path, codec, ReaderOptions::default())
    }

    /// Open `path` with its conventional index file and explicit options
    pub fn open_with(path: impl AsRef<Path>, codec: C, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        Self::open_with_index(path, default_index_path(path), codec, options)
    }

    /// Open `path` with an index file kept somewhere else
    pub fn open_with_index(
        path: impl AsRef<Path>,
        index_path: impl Into<PathBuf>,
        codec: C,
        options: ReaderOptions,
    ) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_stream(file, Some(index_path.into()), codec, options)
    }
}

impl<R: Read + Seek, C: RecordCodec> IndexedReader<R, C> {
    /// Open a reader over any seekable stream.
    ///
    /// With an `index_path` the index file is verified and, if unusable,
    /// rebuilt and rewritten. Without one the index is rebuilt in memory.
    pub fn from_stream(
        stream: R,
        index_path: Option<PathBuf>,
        codec: C,
        options: ReaderOptions,
    ) -> Result<Self> {
        let ReaderOptions {
            close_stream_on_close,
            progress,
        } = options;

        let mut reader = Self {
            data: Some(BufReader::new(stream)),
            index: None,
            codec,
            len: 0,
            state: ReaderState::Opening,
            index_path,
            close_stream_on_close,
            data_position: None,
            rebuilt: false,
        };
        reader.open_index(progress)?;
        Ok(reader)
    }

    /// Opening → (Rebuilding →) Open
    fn open_index(&mut self, progress: Option<ProgressCallback>) -> Result<()> {
        let data = match self.data.as_mut() {
            Some(data) => data,
            None => return Err(StoreError::Closed("reader")),
        };

        let mut verified = None;
        if let Some(path) = self.index_path.as_deref() {
            verified = match IndexHandlerReader::open(path) {
                Ok(mut index) => match index.verify(data, &self.codec)? {
                    Verification::Valid => Some(index),
                    Verification::Invalid(reason) => {
                        debug!(path = %path.display(), %reason, "index is stale");
                        None
                    }
                },
                Err(reason) => {
                    debug!(path = %path.display(), %reason, "index is unusable");
                    None
                }
            };
        }

        let index = match verified {
            Some(index) => index,
            None => {
                self.state = ReaderState::Rebuilding;
                self.rebuilt = true;
                recover_index(data, &self.codec, self.index_path.as_deref(), progress)?
            }
        };

        self.len = index.count();
        self.index = Some(index);
        self.data_position = None;
        self.state = ReaderState::Open;

        debug!(len = self.len, rebuilt = self.rebuilt, format = self.codec.name(), "reader open");
        Ok(())
    }

    // =========================================================================
    // Positional Access
    // =========================================================================

    /// Number of records
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the record at `index`; `-1` is the last record
    pub fn get(&mut self, index: i64) -> Result<C::Record> {
        self.ensure_open()?;
        let position = resolve_index(index, self.len)?;
        self.read_at(position)
    }

    /// Lazily decode the records selected by a slice
    ///
    /// Accepts `SliceSpec` values as well as `a..b`, `a..`, `..b` and `..`.
    pub fn slice(&mut self, spec: impl Into<SliceSpec>) -> Result<Records<'_, R, C>> {
        self.ensure_open()?;
        let positions = spec.into().indices(self.len)?;
        Ok(Records::new(self, positions))
    }

    /// Lazily decode every record in order
    pub fn iter(&mut self) -> Result<Records<'_, R, C>> {
        self.slice(SliceSpec::full())
    }

    /// Byte offsets of all records, as stored in the index
    pub fn offsets(&mut self) -> Result<Vec<u64>> {
        self.ensure_open()?;
        match self.index.as_mut() {
            Some(index) => index.scan(),
            None => Err(StoreError::Closed("reader")),
        }
    }

    /// Decode the record at a resolved position
    pub(crate) fn read_at(&mut self, position: u64) -> Result<C::Record> {
        self.read_entry(position).map(|(value, _)| value)
    }

    /// Byte offset where the last indexed record ends
    pub(crate) fn records_end(&mut self) -> Result<u64> {
        self.ensure_open()?;
        match self.len.checked_sub(1) {
            Some(last) => self.read_entry(last).map(|(_, end)| end),
            None => {
                let data_len = match self.data.as_mut() {
                    Some(data) => stream_len(data)?,
                    None => return Err(StoreError::Closed("reader")),
                };
                let preamble_len = self.codec.preamble_len();
                Ok(if data_len >= preamble_len { preamble_len } else { 0 })
            }
        }
    }

    /// Decode the record at a resolved position, with the offset it ends at
    fn read_entry(&mut self, position: u64) -> Result<(C::Record, u64)> {
        let (data, index) = match (self.data.as_mut(), self.index.as_mut()) {
            (Some(data), Some(index)) => (data, index),
            _ => return Err(StoreError::Closed("reader")),
        };

        let offset = index.get_at(position)?;
        if self.data_position != Some(offset) {
            self.data_position = None;
            data.seek(SeekFrom::Start(offset))?;
        }
        self.data_position = None;

        match self.codec.decode(data)? {
            DecodeOutcome::Record { value, len } => {
                self.data_position = Some(offset + len);
                Ok((value, offset + len))
            }
            DecodeOutcome::Eof | DecodeOutcome::Incomplete { .. } => {
                Err(StoreError::TruncatedRecord {
                    index: position,
                    offset,
                })
            }
            DecodeOutcome::Malformed { reason } => Err(StoreError::Decode { offset, reason }),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ReaderState::Open => Ok(()),
            _ => Err(StoreError::Closed("reader")),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release the index (and the data stream if configured). Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ReaderState::Closed {
            return Ok(());
        }
        self.index = None;
        if self.close_stream_on_close {
            self.data = None;
        }
        self.data_position = None;
        self.state = ReaderState::Closed;
        Ok(())
    }

    /// Take back the data stream if it has not been released
    pub fn into_inner(mut self) -> Option<R> {
        self.data.take().map(BufReader::into_inner)
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Whether opening had to rebuild the index
    pub fn was_rebuilt(&self) -> bool {
        self.rebuilt
    }

    pub fn index_path(&self) -> Option<&Path> {
        self.index_path.as_deref()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

/// Replay the data stream and install the rebuilt index
fn recover_index<R, C>(
    data: &mut BufReader<R>,
    codec: &C,
    index_path: Option<&Path>,
    mut progress: Option<ProgressCallback>,
) -> Result<IndexHandlerReader>
where
    R: Read + Seek,
    C: RecordCodec,
{
    info!(format = codec.name(), index = ?index_path, "rebuilding index");

    let outcome = rebuild_offsets(data, codec, |count| {
        if let Some(callback) = progress.as_mut() {
            callback(count);
        }
    })?;

    if outcome.torn_bytes > 0 {
        warn!(
            torn_bytes = outcome.torn_bytes,
            end_offset = outcome.end_offset,
            "data ends with an incomplete record; index stops before it"
        );
    }

    let reopened = match index_path {
        Some(path) => {
            write_index_file(path, &outcome.offsets)?;
            IndexHandlerReader::open(path)
        }
        None => IndexHandlerReader::from_bytes(encode_index(&outcome.offsets)),
    };
    let mut index = reopened.map_err(StoreError::CorruptIndex)?;
    index.set_verified(true);

    info!(count = outcome.count(), "index rebuilt");
    Ok(index)
}
