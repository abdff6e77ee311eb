//! Index Handler Writer
//!
//! Append-only index handler used by writers. Every `put` must land exactly
//! at the current count; append mode trusts the existing entries without
//! re-checking them against the data file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::stream::{stream_len, DataSink};

use super::{entry_count, IndexHandler, InvalidIndex};

/// Append-only index handler
pub struct IndexHandlerWriter<S = BufWriter<File>> {
    handler: IndexHandler<S>,
    /// Most recent offset, for the monotonicity check
    last_offset: Option<u64>,
}

impl IndexHandlerWriter<BufWriter<File>> {
    /// Create (or truncate) an index file and write its header
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut handler = IndexHandler::create(BufWriter::new(file))?;
        handler.set_verified(true);

        Ok(Self {
            handler,
            last_offset: None,
        })
    }

    /// Open an index file for appending, creating it when absent
    pub fn open_append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let writer = IndexHandlerWriter::from_stream(file)?;
        Ok(IndexHandlerWriter {
            handler: writer.handler.map_stream(BufWriter::new),
            last_offset: writer.last_offset,
        })
    }
}

impl<S: Read + Write + Seek> IndexHandlerWriter<S> {
    /// Resume an index stream: an empty stream gets a fresh header, anything
    /// else must carry a valid header and whole entries.
    pub fn from_stream(mut stream: S) -> Result<Self> {
        let len = stream_len(&mut stream)?;
        if len == 0 {
            return Ok(Self {
                handler: IndexHandler::create(stream)?,
                last_offset: None,
            });
        }

        let count = entry_count(len).map_err(StoreError::CorruptIndex)?;
        let mut handler = IndexHandler::with_count(stream, count);
        if !handler.check_header() {
            return Err(StoreError::CorruptIndex(InvalidIndex::BadHeader));
        }
        let last_offset = handler.last()?;

        debug!(count, ?last_offset, "resuming index in append mode");

        Ok(Self {
            handler,
            last_offset,
        })
    }
}

impl<S: Write + Seek> IndexHandlerWriter<S> {
    /// Number of offsets written so far (including resumed ones)
    pub fn count(&self) -> u64 {
        self.handler.count()
    }

    /// Most recently written offset
    pub fn last_offset(&self) -> Option<u64> {
        self.last_offset
    }

    pub fn is_verified(&self) -> bool {
        self.handler.is_verified()
    }

    /// Record `offset` for position `index`, which must be the next position
    pub fn put(&mut self, index: u64, offset: u64) -> Result<()> {
        let expected = self.handler.count();
        if index != expected {
            return Err(StoreError::OutOfOrderPut {
                expected,
                got: index,
            });
        }
        if let Some(previous) = self.last_offset {
            if offset < previous {
                return Err(StoreError::OffsetRegression { previous, offset });
            }
        }

        self.handler.put(index, offset)?;
        self.last_offset = Some(offset);
        Ok(())
    }

    /// Record `offset` for the next position
    pub fn append(&mut self, offset: u64) -> Result<()> {
        self.put(self.handler.count(), offset)
    }

    /// Flush buffered entries to the stream
    pub fn commit(&mut self) -> Result<()> {
        self.handler.flush()
    }

    pub fn into_inner(self) -> S {
        self.handler.into_inner()
    }
}

impl<S: DataSink> IndexHandlerWriter<S> {
    /// Flush and force entries to durable storage
    pub fn sync(&mut self) -> Result<()> {
        self.handler.get_mut().sync()?;
        Ok(())
    }
}
