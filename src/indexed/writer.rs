//! Indexed Writer
//!
//! Appends encoded records to a data stream and records each start offset
//! in the index. Data always reaches the stream before its index entry, so
//! a crash leaves at worst unindexed tail records that a reader rebuilds.

use std::borrow::Borrow;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::codec::RecordCodec;
use crate::config::{default_index_path, SyncStrategy, WriteMode, WriterOptions};
use crate::error::{Result, StoreError};
use crate::index::{IndexHandlerReader, IndexHandlerWriter, InvalidIndex, Verification};
use crate::stream::{stream_len, DataSink};

/// Lifecycle of an [`IndexedWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    /// An append hit an I/O error; only `close()` is accepted
    Failed,
    Closed,
}

/// Writes records and their index side by side
pub struct IndexedWriter<W: DataSink, C: RecordCodec> {
    data: Option<BufWriter<W>>,
    index: Option<IndexHandlerWriter>,
    codec: C,
    /// Records indexed, including resumed ones
    len: u64,
    /// End of the data stream, where the next record starts
    offset: u64,
    mode: WriteMode,
    sync_strategy: SyncStrategy,
    /// Appends since the last sync
    unsynced: usize,
    close_stream_on_close: bool,
    state: WriterState,
    /// Error that moved the writer to `Failed`
    failure: Option<String>,
}

impl<C: RecordCodec> IndexedWriter<File, C> {
    /// Create `path` (truncating it) with a fresh index
    pub fn create(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        Self::open_with(path, codec, WriterOptions::default())
    }

    /// Append to `path`, resuming its existing index
    pub fn append_to(path: impl AsRef<Path>, codec: C) -> Result<Self> {
        let options = WriterOptions::builder().mode(WriteMode::Append).build();
        Self::open_with(path, codec, options)
    }

    pub fn open_with(path: impl AsRef<Path>, codec: C, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        Self::open_with_index(path, &default_index_path(path), codec, options)
    }

    /// Open `path` with an index file kept somewhere else
    pub fn open_with_index(
        path: impl AsRef<Path>,
        index_path: &Path,
        codec: C,
        options: WriterOptions,
    ) -> Result<Self> {
        options.validate()?;
        let truncate = options.mode == WriteMode::Create;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(truncate)
            .open(path.as_ref())?;

        Self::from_stream(file, index_path, codec, options)
    }
}

impl<W: DataSink + Read, C: RecordCodec> IndexedWriter<W, C> {
    /// Open a writer over any readable [`DataSink`], keeping the index at
    /// `index_path`.
    ///
    /// Writing starts at the end of `stream`. In append mode an existing
    /// index must pass the same tail check readers run: its last record has
    /// to end exactly where `stream` ends. A non-empty stream without an
    /// index is rejected with [`StoreError::MissingIndex`], one whose index
    /// fails the check with [`StoreError::StaleIndex`]; recover either with
    /// [`repair_index`](crate::repair_index).
    pub fn from_stream(
        mut stream: W,
        index_path: &Path,
        codec: C,
        options: WriterOptions,
    ) -> Result<Self> {
        options.validate()?;

        if options.mode == WriteMode::Append {
            if index_path.exists() {
                check_resume_target(&mut stream, index_path, &codec)?;
            } else if stream_len(&mut stream)? > 0 {
                return Err(StoreError::MissingIndex(index_path.to_path_buf()));
            }
        }

        let mut offset = stream.seek(SeekFrom::End(0))?;
        let preamble_len = codec.preamble_len();
        if preamble_len > 0 && offset > 0 && options.mode == WriteMode::Create {
            return Err(StoreError::Config(format!(
                "{} data must start empty in create mode",
                codec.name()
            )));
        }

        let index = match options.mode {
            WriteMode::Create => IndexHandlerWriter::create(index_path)?,
            WriteMode::Append => IndexHandlerWriter::open_append(index_path)?,
        };

        if preamble_len > 0 && offset == 0 {
            stream.write_all(&codec.encode_preamble(0)?)?;
            offset = preamble_len;
        }

        let len = index.count();
        debug!(
            index = %index_path.display(),
            mode = ?options.mode,
            offset,
            len,
            format = codec.name(),
            "writer open"
        );

        Ok(Self {
            data: Some(BufWriter::new(stream)),
            index: Some(index),
            len,
            codec,
            offset,
            mode: options.mode,
            sync_strategy: options.sync_strategy,
            unsynced: 0,
            close_stream_on_close: options.close_stream_on_close,
            state: WriterState::Open,
            failure: None,
        })
    }
}

impl<W: DataSink, C: RecordCodec> IndexedWriter<W, C> {
    // =========================================================================
    // Appending
    // =========================================================================

    /// Encode and append one record, returning its position
    pub fn append(&mut self, record: &C::Record) -> Result<u64> {
        self.ensure_writable()?;
        // Encode before touching either stream so a bad record changes nothing
        let bytes = self.codec.encode(record)?;

        let (data, index) = match (self.data.as_mut(), self.index.as_mut()) {
            (Some(data), Some(index)) => (data, index),
            _ => return Err(StoreError::Closed("writer")),
        };

        let offset = self.offset;
        let position = index.count();

        if let Err(e) = data.write_all(&bytes) {
            return Err(self.fail(e.into()));
        }
        self.offset += bytes.len() as u64;

        if let Err(e) = index.put(position, offset) {
            return Err(self.fail(e));
        }
        self.len += 1;
        self.unsynced += 1;

        trace!(position, offset, len = bytes.len(), "appended record");

        let due = match self.sync_strategy {
            SyncStrategy::OnClose => false,
            SyncStrategy::EveryAppend => true,
            SyncStrategy::EveryNAppends { count } => self.unsynced >= count,
        };
        if due {
            if let Err(e) = self.commit() {
                return Err(self.fail(e));
            }
        }

        Ok(position)
    }

    /// Append every record in order, returning how many were written
    pub fn extend<I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: Borrow<C::Record>,
    {
        let mut written = 0;
        for record in records {
            self.append(record.borrow())?;
            written += 1;
        }
        Ok(written)
    }

    fn fail(&mut self, error: StoreError) -> StoreError {
        warn!(error = %error, "writer failed; further appends are rejected");
        self.state = WriterState::Failed;
        self.failure = Some(error.to_string());
        error
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(StoreError::Closed("writer")),
            WriterState::Failed => Err(StoreError::WriterFailed(
                self.failure.clone().unwrap_or_default(),
            )),
        }
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Flush buffered bytes of data, then index, without forcing a sync
    pub fn flush(&mut self) -> Result<()> {
        if let Some(data) = self.data.as_mut() {
            data.flush()?;
        }
        if let Some(index) = self.index.as_mut() {
            index.commit()?;
        }
        Ok(())
    }

    /// Force data and then index to durable storage
    ///
    /// Formats with a container header get it rewritten with the current
    /// record count first.
    pub fn commit(&mut self) -> Result<()> {
        self.write_preamble()?;
        if let Some(data) = self.data.as_mut() {
            data.sync()?;
        }
        if let Some(index) = self.index.as_mut() {
            index.sync()?;
        }
        self.unsynced = 0;
        Ok(())
    }

    fn write_preamble(&mut self) -> Result<()> {
        if self.codec.preamble_len() == 0 {
            return Ok(());
        }
        let preamble = self.codec.encode_preamble(self.len)?;
        if let Some(data) = self.data.as_mut() {
            data.seek(SeekFrom::Start(0))?;
            data.write_all(&preamble)?;
            data.seek(SeekFrom::Start(self.offset))?;
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Commit and release both streams. Idempotent.
    ///
    /// The streams are released even when the final commit fails.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }

        let committed = self.commit();

        self.index = None;
        if self.close_stream_on_close {
            self.data = None;
        }
        self.state = WriterState::Closed;

        debug!(offset = self.offset, "writer closed");
        committed
    }

    /// Close and take back the data stream if it was not released
    pub fn into_inner(mut self) -> Result<Option<W>> {
        self.close()?;
        match self.data.take() {
            Some(data) => data
                .into_inner()
                .map(Some)
                .map_err(|e| StoreError::Io(e.into_error())),
            None => Ok(None),
        }
    }

    /// Number of records in the index, including resumed ones
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Data offset where the next record will start
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn is_append(&self) -> bool {
        self.mode == WriteMode::Append
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<W: DataSink, C: RecordCodec> Drop for IndexedWriter<W, C> {
    fn drop(&mut self) {
        if self.state != WriterState::Closed {
            if let Err(e) = self.close() {
                warn!(error = %e, "failed to commit writer on drop");
            }
        }
    }
}

/// Tail check of an existing index against the data it is about to extend
fn check_resume_target<D, C>(stream: &mut D, index_path: &Path, codec: &C) -> Result<()>
where
    D: Read + Seek,
    C: RecordCodec,
{
    let stale = |reason: InvalidIndex| StoreError::StaleIndex {
        path: index_path.to_path_buf(),
        reason,
    };

    let mut index = IndexHandlerReader::open(index_path).map_err(stale)?;
    let mut data = BufReader::new(stream);
    match index.verify(&mut data, codec)? {
        Verification::Valid => Ok(()),
        Verification::Invalid(reason) => {
            warn!(index = %index_path.display(), %reason, "index does not match data; not appending");
            Err(stale(reason))
        }
    }
}
