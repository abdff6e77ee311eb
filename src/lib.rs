//! # idxstore
//!
//! Random access to records in append-only, line- or frame-oriented files:
//! - Side-car index file mapping record positions to byte offsets
//! - Cheap tail verification on open, full rebuild when the index is stale
//! - Torn trailing records dropped during recovery
//! - Pluggable record codecs (text, JSON lines, MessagePack, framed bincode)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           IndexedReader            IndexedWriter            │
//! │   get(i) / slice(a:b:s) / iter     append / extend / close  │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!        ┌───────┴────────┐             ┌───────┴────────┐
//!        ▼                ▼             ▼                ▼
//! ┌─────────────┐  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//! │ IndexHandler│  │ RecordCodec │ │ RecordCodec │ │ IndexHandler│
//! │   Reader    │  │  (decode)   │ │  (encode)   │ │   Writer    │
//! └──────┬──────┘  └──────┬──────┘ └──────┬──────┘ └──────┬──────┘
//!        │                │               │               │
//!        ▼                ▼               ▼               ▼
//!   <data>.idx          <data>          <data>        <data>.idx
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod stream;
pub mod slice;

pub mod codec;
pub mod index;
pub mod indexed;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{
    default_index_path, ReaderOptions, SyncStrategy, WriteMode, WriterOptions,
};
pub use codec::{
    DecodeOutcome, FramedCodec, JsonLineCodec, MsgpackArrayCodec, MsgpackCodec, RecordCodec,
    TextCodec,
};
pub use index::{IndexHandlerReader, IndexHandlerWriter, InvalidIndex, Verification};
pub use indexed::{
    rebuild_index, repair_index, IndexedReader, IndexedWriter, ReaderState, Records, WriterState,
};
pub use slice::SliceSpec;
pub use stream::DataSink;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of idxstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
