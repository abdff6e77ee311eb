//! Plain text lines

use std::io::BufRead;

use crate::error::{Result, StoreError};

use super::{read_line, DecodeOutcome, Line, RecordCodec};

/// One UTF-8 string per `\n`-terminated line
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec {
    lossy: bool,
}

impl TextCodec {
    /// Invalid UTF-8 is reported as a malformed record
    pub fn new() -> Self {
        Self { lossy: false }
    }

    /// Invalid UTF-8 sequences are replaced with U+FFFD
    pub fn lossy() -> Self {
        Self { lossy: true }
    }
}

impl RecordCodec for TextCodec {
    type Record = String;

    fn name(&self) -> &'static str {
        "text"
    }

    fn encode(&self, record: &String) -> Result<Vec<u8>> {
        // An embedded newline would split one record into two on disk
        if record.contains('\n') {
            return Err(StoreError::Encode(
                "text record must not contain a newline".to_string(),
            ));
        }
        let mut bytes = Vec::with_capacity(record.len() + 1);
        bytes.extend_from_slice(record.as_bytes());
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode<R: BufRead + ?Sized>(&self, reader: &mut R) -> Result<DecodeOutcome<String>> {
        let mut line = match read_line(reader)? {
            Line::Complete(line) => line,
            Line::Incomplete(len) => return Ok(DecodeOutcome::Incomplete { len }),
            Line::Eof => return Ok(DecodeOutcome::Eof),
        };
        let len = line.len() as u64;
        line.pop();

        let value = if self.lossy {
            String::from_utf8_lossy(&line).into_owned()
        } else {
            match String::from_utf8(line) {
                Ok(value) => value,
                Err(e) => {
                    return Ok(DecodeOutcome::Malformed {
                        reason: format!("invalid UTF-8: {}", e.utf8_error()),
                    })
                }
            }
        };

        Ok(DecodeOutcome::Record { value, len })
    }
}
