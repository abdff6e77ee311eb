//! JSON lines

use std::fmt;
use std::io::BufRead;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

use super::{read_line, DecodeOutcome, Line, RecordCodec};

/// Longest line prefix quoted in decode errors
const ERROR_SNIPPET_LEN: usize = 128;

/// One compact JSON value per `\n`-terminated line
pub struct JsonLineCodec<T = serde_json::Value> {
    _record: PhantomData<fn() -> T>,
}

impl<T> JsonLineCodec<T> {
    pub fn new() -> Self {
        Self {
            _record: PhantomData,
        }
    }
}

impl<T> Default for JsonLineCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonLineCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonLineCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonLineCodec")
    }
}

impl<T: Serialize + DeserializeOwned> RecordCodec for JsonLineCodec<T> {
    type Record = T;

    fn name(&self) -> &'static str {
        "jsonline"
    }

    fn encode(&self, record: &T) -> Result<Vec<u8>> {
        // Compact output escapes newlines inside strings, so one value is one line
        let mut bytes = serde_json::to_vec(record).map_err(|e| StoreError::Encode(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<DecodeOutcome<T>> {
        let line = match read_line(reader)? {
            Line::Complete(line) => line,
            Line::Incomplete(len) => return Ok(DecodeOutcome::Incomplete { len }),
            Line::Eof => return Ok(DecodeOutcome::Eof),
        };

        match serde_json::from_slice(&line) {
            Ok(value) => Ok(DecodeOutcome::Record {
                value,
                len: line.len() as u64,
            }),
            Err(e) => Ok(DecodeOutcome::Malformed {
                reason: format!("{} in line {}", e, snippet(&line)),
            }),
        }
    }
}

/// Abbreviate a line for error messages
fn snippet(line: &[u8]) -> String {
    if line.len() > ERROR_SNIPPET_LEN {
        format!(
            "{:?} ... ({} bytes in total)",
            String::from_utf8_lossy(&line[..ERROR_SNIPPET_LEN]),
            line.len()
        )
    } else {
        format!("{:?}", String::from_utf8_lossy(line))
    }
}
