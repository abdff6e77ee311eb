//! Record iterator
//!
//! Lazily decodes a range of positions through the reader, one record per
//! `next()`. Consecutive positions read straight through the buffered data
//! stream without seeking.

use std::io::{Read, Seek};

use crate::codec::RecordCodec;
use crate::error::Result;
use crate::slice::IndexRange;

use super::IndexedReader;

/// Iterator over the records selected by a slice
pub struct Records<'a, R: Read + Seek, C: RecordCodec> {
    reader: &'a mut IndexedReader<R, C>,
    positions: IndexRange,
}

impl<'a, R: Read + Seek, C: RecordCodec> Records<'a, R, C> {
    pub(crate) fn new(reader: &'a mut IndexedReader<R, C>, positions: IndexRange) -> Self {
        Self { reader, positions }
    }

    /// Positions not yet visited
    pub fn remaining(&self) -> usize {
        self.positions.len()
    }
}

impl<R: Read + Seek, C: RecordCodec> Iterator for Records<'_, R, C> {
    type Item = Result<C::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.positions.next()?;
        Some(self.reader.read_at(position))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<R: Read + Seek, C: RecordCodec> ExactSizeIterator for Records<'_, R, C> {}
