//! Stream contract
//!
//! Readers work over any `Read + Seek` stream. Writers need a [`DataSink`]:
//! a seekable writer that can also be forced to durable storage. Local
//! files, in-memory buffers and borrowed streams all qualify, so a remote
//! object-store stream only has to provide the same three capabilities.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};

/// A seekable, writable stream that can be synced to durable storage
pub trait DataSink: Write + Seek {
    /// Flush buffered bytes and force them to durable storage
    fn sync(&mut self) -> io::Result<()>;
}

impl DataSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_all()
    }
}

impl DataSink for Cursor<Vec<u8>> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl DataSink for Cursor<&mut Vec<u8>> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<W: DataSink> DataSink for BufWriter<W> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_mut().sync()
    }
}

impl<W: DataSink + ?Sized> DataSink for &mut W {
    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

/// Total length of a seekable stream, leaving its position unchanged
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let position = stream.stream_position()?;
    let len = stream.seek(SeekFrom::End(0))?;
    if position != len {
        stream.seek(SeekFrom::Start(position))?;
    }
    Ok(len)
}
