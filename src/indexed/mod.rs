//! Indexed Record Files
//!
//! The user-facing layer: a data file plus its side-car index.
//!
//! ```text
//!   IndexedWriter                         IndexedReader
//!   ─────────────                         ─────────────
//!   append(record)                        open()
//!     │ encode                              │ verify index tail
//!     ├─▶ data   (record bytes)             │   └─ invalid ─▶ rebuild
//!     └─▶ index  (start offset)             get(i) / slice(a:b:s)
//!                                             └─ seek offset, decode
//! ```

mod iterator;
mod reader;
mod writer;

pub use iterator::Records;
pub use reader::{IndexedReader, ReaderState};
pub use writer::{IndexedWriter, WriterState};

use std::fs::{self, File, OpenOptions};
use std::io::BufReader;
use std::path::Path;

use tracing::{info, warn};

use crate::codec::{JsonLineCodec, MsgpackArrayCodec, MsgpackCodec, RecordCodec, TextCodec};
use crate::error::Result;
use crate::index::{rebuild_offsets, write_index_file, RebuildOutcome};

/// Reader over a JSON-lines file
pub type JsonLineReader = IndexedReader<File, JsonLineCodec>;
/// Writer for a JSON-lines file
pub type JsonLineWriter = IndexedWriter<File, JsonLineCodec>;
/// Reader over a text file
pub type TextReader = IndexedReader<File, TextCodec>;
/// Writer for a text file
pub type TextWriter = IndexedWriter<File, TextCodec>;
/// Reader over a MessagePack stream
pub type MsgpackReader = IndexedReader<File, MsgpackCodec>;
/// Writer for a MessagePack stream
pub type MsgpackWriter = IndexedWriter<File, MsgpackCodec>;
/// Reader over a MessagePack array container
pub type MsgpackArrayReader = IndexedReader<File, MsgpackArrayCodec>;
/// Writer for a MessagePack array container
pub type MsgpackArrayWriter = IndexedWriter<File, MsgpackArrayCodec>;

/// Make `path` safe to append to again. Returns the number of indexed
/// records.
///
/// The index is rebuilt when verification fails, and bytes of an incomplete
/// trailing record are cut from the data file so the next record starts
/// right after the last complete one. This is the recovery step before
/// resuming a file in append mode whose index is missing or stale.
pub fn repair_index<C: RecordCodec>(path: impl AsRef<Path>, codec: C) -> Result<u64> {
    let path = path.as_ref();
    let mut reader = IndexedReader::open(path, codec)?;
    let len = reader.len();
    let end = reader.records_end()?;
    reader.close()?;

    let data_len = fs::metadata(path)?.len();
    if end < data_len {
        warn!(
            path = %path.display(),
            torn_bytes = data_len - end,
            "cutting incomplete trailing record from data file"
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(end)?;
        file.sync_all()?;
    }
    Ok(len)
}

/// Rebuild the index of the data file `path` into `index_path` from scratch,
/// whether or not the current index is valid.
pub fn rebuild_index<C, P>(
    path: impl AsRef<Path>,
    index_path: &Path,
    codec: &C,
    progress: P,
) -> Result<RebuildOutcome>
where
    C: RecordCodec,
    P: FnMut(u64),
{
    let path = path.as_ref();
    let mut data = BufReader::new(File::open(path)?);

    let outcome = rebuild_offsets(&mut data, codec, progress)?;
    write_index_file(index_path, &outcome.offsets)?;

    info!(
        path = %path.display(),
        count = outcome.count(),
        torn_bytes = outcome.torn_bytes,
        "index rebuilt"
    );
    Ok(outcome)
}
