//! Record Codec Module
//!
//! Format plugins that frame one record of a concrete serialization. The
//! indexed reader and writer only ever talk to a codec through
//! [`RecordCodec`]: "encode one record" and "decode the record starting at
//! the current stream position, reporting its byte length".
//!
//! ## Formats
//! ```text
//! ┌──────────┬──────────────────────────────────────────────┐
//! │ text     │ UTF-8 line, terminated by '\n'               │
//! │ jsonline │ compact JSON value, terminated by '\n'       │
//! │ msgpack  │ one MessagePack value, self-delimiting       │
//! │ msgpack  │ array32 header [0xdd][count u32 BE], then    │
//! │ (array)  │ one MessagePack value per record             │
//! │ framed   │ [Len u32][CRC32 u32][bincode payload]        │
//! └──────────┴──────────────────────────────────────────────┘
//! ```

mod framed;
mod jsonline;
mod msgpack;
mod text;

use std::io::{self, BufRead, Read};

use crate::error::Result;

pub use framed::{FramedCodec, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
pub use jsonline::JsonLineCodec;
pub use msgpack::{MsgpackArrayCodec, MsgpackCodec, MSGPACK_ARRAY_HEADER_SIZE};
pub use text::TextCodec;

/// Result of decoding one record
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome<T> {
    /// A complete record occupying `len` bytes
    Record { value: T, len: u64 },

    /// Clean end of stream, no bytes left
    Eof,

    /// The stream ended partway through a record (`len` bytes were present)
    Incomplete { len: u64 },

    /// The bytes do not form a valid record
    Malformed { reason: String },
}

/// Frames and parses single records of one serialization format
pub trait RecordCodec {
    /// The decoded record type
    type Record;

    /// Short format name used in logs
    fn name(&self) -> &'static str;

    /// Serialize one record, including any framing/terminator bytes
    fn encode(&self, record: &Self::Record) -> Result<Vec<u8>>;

    /// Decode the record starting at the reader's current position.
    ///
    /// Must consume exactly the bytes of that record. I/O failures are
    /// returned as errors; torn and malformed input are outcomes.
    fn decode<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<DecodeOutcome<Self::Record>>;

    /// Size of the container header that precedes the first record.
    /// Zero for formats that store records back to back from offset 0.
    fn preamble_len(&self) -> u64 {
        0
    }

    /// Container header declaring `count` records
    fn encode_preamble(&self, count: u64) -> Result<Vec<u8>> {
        let _ = count;
        Ok(Vec::new())
    }

    /// Validate a container header, returning the record count it declares
    fn decode_preamble(&self, bytes: &[u8]) -> std::result::Result<u64, String> {
        let _ = bytes;
        Ok(0)
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// A newline-terminated line, or how the stream ended without one
pub(crate) enum Line {
    Complete(Vec<u8>),
    Incomplete(u64),
    Eof,
}

/// Read up to and including the next `\n`
pub(crate) fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Line> {
    let mut buf = Vec::new();
    let read = reader.read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() != Some(&b'\n') {
        return Ok(Line::Incomplete(read as u64));
    }
    Ok(Line::Complete(buf))
}

/// Fill `buf` as far as the stream allows, returning the bytes read
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Counts bytes pulled through a reader
pub(crate) struct CountingReader<'a, R: ?Sized> {
    inner: &'a mut R,
    count: u64,
}

impl<'a, R: Read + ?Sized> CountingReader<'a, R> {
    pub(crate) fn new(inner: &'a mut R) -> Self {
        Self { inner, count: 0 }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read + ?Sized> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
