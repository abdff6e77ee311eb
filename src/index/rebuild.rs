//! Index Rebuild
//!
//! Recovers an index by replaying the data stream. Scanning is pure (data in,
//! offsets out); persisting the result is a separate step.

use std::fs;
use std::io::{BufRead, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::codec::{read_full, DecodeOutcome, RecordCodec};
use crate::error::{Result, StoreError};
use crate::stream::stream_len;

use super::{IndexHandlerWriter, ENTRY_SIZE, HEADER_SIZE, INDEX_MAGIC};

/// Result of scanning a data stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RebuildOutcome {
    /// Start offset of every complete record, in order
    pub offsets: Vec<u64>,
    /// End of the last complete record
    pub end_offset: u64,
    /// Bytes of an incomplete trailing record that were left out
    pub torn_bytes: u64,
}

impl RebuildOutcome {
    pub fn count(&self) -> u64 {
        self.offsets.len() as u64
    }
}

/// Scan `data` from the start and collect the offset of every record.
///
/// `progress` receives the number of records indexed so far after each
/// record. An incomplete record at the end of the stream truncates the
/// result; a malformed record anywhere fails the scan. A container header
/// (see [`RecordCodec::preamble_len`]) is checked and skipped; the count it
/// declares is not trusted.
pub fn rebuild_offsets<D, C, P>(data: &mut D, codec: &C, mut progress: P) -> Result<RebuildOutcome>
where
    D: BufRead + Seek,
    C: RecordCodec,
    P: FnMut(u64),
{
    let data_len = stream_len(data)?;
    data.seek(SeekFrom::Start(0))?;

    let mut offsets = Vec::new();
    let mut offset = 0u64;

    let preamble_len = codec.preamble_len();
    if preamble_len > 0 && data_len > 0 {
        let mut preamble = vec![0u8; preamble_len as usize];
        let read = read_full(data, &mut preamble)? as u64;
        if read < preamble_len {
            warn!(read, format = codec.name(), "container header is incomplete");
            return Ok(RebuildOutcome {
                offsets,
                end_offset: 0,
                torn_bytes: data_len,
            });
        }
        let declared = codec
            .decode_preamble(&preamble)
            .map_err(|reason| StoreError::Decode { offset: 0, reason })?;
        debug!(declared, format = codec.name(), "read container header");
        offset = preamble_len;
    }

    loop {
        match codec.decode(data)? {
            DecodeOutcome::Record { len, .. } => {
                if len == 0 {
                    return Err(StoreError::Decode {
                        offset,
                        reason: format!("{} codec consumed no bytes", codec.name()),
                    });
                }
                offsets.push(offset);
                offset += len;
                progress(offsets.len() as u64);
            }
            DecodeOutcome::Eof => break,
            DecodeOutcome::Incomplete { len } => {
                warn!(
                    offset,
                    len,
                    format = codec.name(),
                    "dropping incomplete trailing record"
                );
                break;
            }
            DecodeOutcome::Malformed { reason } => {
                return Err(StoreError::Decode { offset, reason });
            }
        }
    }

    Ok(RebuildOutcome {
        offsets,
        end_offset: offset,
        torn_bytes: data_len.saturating_sub(offset),
    })
}

/// Serialize offsets into index file bytes (header included)
pub fn encode_index(offsets: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((HEADER_SIZE + ENTRY_SIZE * offsets.len() as u64) as usize);
    bytes.extend_from_slice(INDEX_MAGIC);
    for offset in offsets {
        bytes.extend_from_slice(&offset.to_le_bytes());
    }
    bytes
}

/// Persist offsets as a fresh index file.
///
/// Written to a temporary sibling and renamed into place, so other readers
/// see either the old index or the complete new one.
pub fn write_index_file(path: &Path, offsets: &[u64]) -> Result<()> {
    let temp_path = temp_index_path(path);

    let written = write_entries(&temp_path, offsets)
        .and_then(|()| fs::rename(&temp_path, path).map_err(StoreError::from));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    debug!(path = %path.display(), count = offsets.len(), "wrote index file");
    Ok(())
}

fn write_entries(path: &Path, offsets: &[u64]) -> Result<()> {
    let mut writer = IndexHandlerWriter::create(path)?;
    for &offset in offsets {
        writer.append(offset)?;
    }
    writer.sync()
}

fn temp_index_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".{}.tmp", std::process::id()));
    PathBuf::from(temp)
}
