//! Length-prefixed, checksummed binary records
//!
//! ## Frame Format
//! ```text
//! ┌─────────┬─────────┬──────────────────────┐
//! │ Len (4) │ CRC (4) │ bincode payload      │
//! └─────────┴─────────┴──────────────────────┘
//! ```
//! Both header fields are little-endian; the CRC32 covers the payload only.

use std::fmt;
use std::io::BufRead;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

use super::{read_full, DecodeOutcome, RecordCodec};

/// Frame header size: Len (4) + CRC (4) = 8 bytes
pub const FRAME_HEADER_SIZE: usize = 8;

/// Maximum payload size (64 MB); larger length fields are treated as garbage
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// bincode payloads framed with a length and CRC32
pub struct FramedCodec<T> {
    _record: PhantomData<fn() -> T>,
}

impl<T> FramedCodec<T> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Default for FramedCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FramedCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FramedCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FramedCodec")
    }
}

impl<T: Serialize + DeserializeOwned> RecordCodec for FramedCodec<T> {
    type Record = T;

    fn name(&self) -> &'static str {
        "framed"
    }

    fn encode(&self, record: &T) -> Result<Vec<u8>> {
        let payload = bincode::serialize(record).map_err(|e| StoreError::Encode(e.to_string()))?;
        if payload.len() > MAX_FRAME_SIZE as usize {
            return Err(StoreError::Encode(format!(
                "record of {} bytes exceeds the {} byte frame limit",
                payload.len(),
                MAX_FRAME_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    fn decode<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<DecodeOutcome<T>> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let read = read_full(reader, &mut header)?;
        if read == 0 {
            return Ok(DecodeOutcome::Eof);
        }
        if read < FRAME_HEADER_SIZE {
            return Ok(DecodeOutcome::Incomplete { len: read as u64 });
        }

        let payload_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if payload_len > MAX_FRAME_SIZE {
            return Ok(DecodeOutcome::Malformed {
                reason: format!("frame length {} exceeds limit {}", payload_len, MAX_FRAME_SIZE),
            });
        }

        let mut payload = vec![0u8; payload_len as usize];
        let read = read_full(reader, &mut payload)?;
        let len = (FRAME_HEADER_SIZE + read) as u64;
        if read < payload.len() {
            return Ok(DecodeOutcome::Incomplete { len });
        }

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            return Ok(DecodeOutcome::Malformed {
                reason: format!(
                    "checksum mismatch: expected {:08x}, got {:08x}",
                    expected_crc, actual_crc
                ),
            });
        }

        match bincode::deserialize(&payload) {
            Ok(value) => Ok(DecodeOutcome::Record { value, len }),
            Err(e) => Ok(DecodeOutcome::Malformed {
                reason: e.to_string(),
            }),
        }
    }
}
