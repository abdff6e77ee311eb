//! MessagePack values, one self-delimiting value per record
//!
//! Two layouts share the record encoding:
//! - [`MsgpackCodec`]: values back to back from offset 0
//! - [`MsgpackArrayCodec`]: the stream is one `array32` whose 5-byte header
//!   (`0xdd` + big-endian count) is rewritten by the writer on every commit,
//!   so the whole file also decodes as a single MessagePack array

use std::fmt;
use std::io::{self, BufRead};
use std::marker::PhantomData;

use rmp_serde::decode::Error as DecodeError;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

use super::{CountingReader, DecodeOutcome, RecordCodec};

/// One MessagePack value per record. Structs are written with named fields.
pub struct MsgpackCodec<T = serde_json::Value> {
    _record: PhantomData<fn() -> T>,
}

impl<T> MsgpackCodec<T> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Default for MsgpackCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MsgpackCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MsgpackCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MsgpackCodec")
    }
}

impl<T: Serialize + DeserializeOwned> RecordCodec for MsgpackCodec<T> {
    type Record = T;

    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, record: &T) -> Result<Vec<u8>> {
        encode_value(record)
    }

    fn decode<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<DecodeOutcome<T>> {
        decode_value(reader)
    }
}

// =============================================================================
// Array Container
// =============================================================================

/// `array32` marker byte
const ARRAY32_MARKER: u8 = 0xdd;

/// Size of the `array32` header: marker plus big-endian u32 count
pub const MSGPACK_ARRAY_HEADER_SIZE: u64 = 5;

/// MessagePack values inside a single `array32` container
pub struct MsgpackArrayCodec<T = serde_json::Value> {
    _record: PhantomData<fn() -> T>,
}

impl<T> MsgpackArrayCodec<T> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Default for MsgpackArrayCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MsgpackArrayCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MsgpackArrayCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MsgpackArrayCodec")
    }
}

impl<T: Serialize + DeserializeOwned> RecordCodec for MsgpackArrayCodec<T> {
    type Record = T;

    fn name(&self) -> &'static str {
        "msgpack-array"
    }

    fn encode(&self, record: &T) -> Result<Vec<u8>> {
        encode_value(record)
    }

    fn decode<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<DecodeOutcome<T>> {
        decode_value(reader)
    }

    fn preamble_len(&self) -> u64 {
        MSGPACK_ARRAY_HEADER_SIZE
    }

    fn encode_preamble(&self, count: u64) -> Result<Vec<u8>> {
        let count = u32::try_from(count).map_err(|_| {
            StoreError::Encode(format!("{} records exceed the msgpack array32 limit", count))
        })?;
        let mut header = Vec::with_capacity(MSGPACK_ARRAY_HEADER_SIZE as usize);
        header.push(ARRAY32_MARKER);
        header.extend_from_slice(&count.to_be_bytes());
        Ok(header)
    }

    fn decode_preamble(&self, bytes: &[u8]) -> std::result::Result<u64, String> {
        match bytes {
            [ARRAY32_MARKER, a, b, c, d] => Ok(u32::from_be_bytes([*a, *b, *c, *d]) as u64),
            [marker, ..] => Err(format!(
                "expected msgpack array32 header, found marker {:#04x}",
                marker
            )),
            [] => Err("missing msgpack array32 header".to_string()),
        }
    }
}

// =============================================================================
// Shared Encoding
// =============================================================================

fn encode_value<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(record).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode_value<T, R>(reader: &mut R) -> Result<DecodeOutcome<T>>
where
    T: DeserializeOwned,
    R: BufRead + ?Sized,
{
    if reader.fill_buf()?.is_empty() {
        return Ok(DecodeOutcome::Eof);
    }

    let mut counting = CountingReader::new(reader);
    let decoded = rmp_serde::from_read::<_, T>(&mut counting);
    let len = counting.count();

    match decoded {
        Ok(value) => Ok(DecodeOutcome::Record { value, len }),
        Err(DecodeError::InvalidMarkerRead(e)) | Err(DecodeError::InvalidDataRead(e)) => {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Ok(DecodeOutcome::Incomplete { len })
            } else {
                Err(StoreError::Io(e))
            }
        }
        Err(e) => Ok(DecodeOutcome::Malformed {
            reason: e.to_string(),
        }),
    }
}
