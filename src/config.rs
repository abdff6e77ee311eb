//! Configuration for idxstore readers and writers
//!
//! Options structs with sensible defaults and builders.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Extension appended to a data file name to locate its index file
pub const INDEX_FILE_EXTENSION: &str = "idx";

/// Derive the conventional index path for a data file.
///
/// The extension is appended to the full file name, so `data.jsonl`
/// maps to `data.jsonl.idx`.
pub fn default_index_path(data_path: &Path) -> PathBuf {
    let mut path = data_path.as_os_str().to_owned();
    path.push(".");
    path.push(INDEX_FILE_EXTENSION);
    PathBuf::from(path)
}

/// Observer invoked with the number of records indexed so far during a rebuild
pub type ProgressCallback = Box<dyn FnMut(u64) + Send>;

// =============================================================================
// Reader Options
// =============================================================================

/// Options for opening an [`IndexedReader`](crate::IndexedReader)
pub struct ReaderOptions {
    /// Release the data stream on `close()`. When false the stream stays
    /// owned by the reader and can be taken back with `into_inner()`.
    pub close_stream_on_close: bool,

    /// Called after each record while the index is being rebuilt
    pub progress: Option<ProgressCallback>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            close_stream_on_close: true,
            progress: None,
        }
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("close_stream_on_close", &self.close_stream_on_close)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ReaderOptions {
    /// Create a new options builder
    pub fn builder() -> ReaderOptionsBuilder {
        ReaderOptionsBuilder::default()
    }
}

/// Builder for ReaderOptions
#[derive(Default)]
pub struct ReaderOptionsBuilder {
    options: ReaderOptions,
}

impl ReaderOptionsBuilder {
    /// Whether `close()` releases the data stream
    pub fn close_stream_on_close(mut self, close: bool) -> Self {
        self.options.close_stream_on_close = close;
        self
    }

    /// Observe rebuild progress
    pub fn on_rebuild_progress(mut self, callback: impl FnMut(u64) + Send + 'static) -> Self {
        self.options.progress = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> ReaderOptions {
        self.options
    }
}

// =============================================================================
// Writer Options
// =============================================================================

/// How a writer treats existing data and index files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Truncate the data file and start a fresh index
    #[default]
    Create,

    /// Resume at the end of existing data, trusting the existing index
    Append,
}

/// How often a writer forces data and index to durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStrategy {
    /// Only on commit/close
    #[default]
    OnClose,

    /// fsync after every append (safest, slowest)
    EveryAppend,

    /// fsync after N appends (balanced durability/performance)
    EveryNAppends { count: usize },
}

/// Options for opening an [`IndexedWriter`](crate::IndexedWriter)
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Release the data stream on `close()`
    pub close_stream_on_close: bool,

    /// Create or append
    pub mode: WriteMode,

    /// Sync strategy for data and index
    pub sync_strategy: SyncStrategy,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            close_stream_on_close: true,
            mode: WriteMode::Create,
            sync_strategy: SyncStrategy::OnClose,
        }
    }
}

impl WriterOptions {
    /// Create a new options builder
    pub fn builder() -> WriterOptionsBuilder {
        WriterOptionsBuilder::default()
    }

    /// Reject option combinations that cannot work
    pub fn validate(&self) -> Result<()> {
        if let SyncStrategy::EveryNAppends { count: 0 } = self.sync_strategy {
            return Err(StoreError::Config(
                "EveryNAppends count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for WriterOptions
#[derive(Default)]
pub struct WriterOptionsBuilder {
    options: WriterOptions,
}

impl WriterOptionsBuilder {
    /// Whether `close()` releases the data stream
    pub fn close_stream_on_close(mut self, close: bool) -> Self {
        self.options.close_stream_on_close = close;
        self
    }

    /// Set the write mode
    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Shorthand for `mode(WriteMode::Append)` / `mode(WriteMode::Create)`
    pub fn append(self, append: bool) -> Self {
        self.mode(if append {
            WriteMode::Append
        } else {
            WriteMode::Create
        })
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.options.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> WriterOptions {
        self.options
    }
}
