//! Positional access helpers
//!
//! Negative index resolution and Python-style slices (`start:stop:step`,
//! negative bounds, negative step) translated into a lazy sequence of
//! record positions.

use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Resolve a possibly negative index against `len`.
///
/// `-1` addresses the last record, `-len` the first.
pub fn resolve_index(index: i64, len: u64) -> Result<u64> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index as u64)
    };
    match resolved {
        Some(position) if position < len => Ok(position),
        _ => Err(StoreError::OutOfRange { index, len }),
    }
}

// =============================================================================
// SliceSpec
// =============================================================================

/// Slice parameters, each bound optional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Self { start, stop, step }
    }

    /// The whole sequence in order (`::`)
    pub fn full() -> Self {
        Self::default()
    }

    /// Replace the step
    pub fn step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Clamp the bounds against `len` and produce the selected positions
    pub fn indices(&self, len: u64) -> Result<IndexRange> {
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return Err(StoreError::InvalidSlice("slice step cannot be zero".to_string()));
        }

        let len = i64::try_from(len)
            .map_err(|_| StoreError::InvalidSlice(format!("{} records cannot be sliced", len)))?;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };

        let clamp = |bound: i64| -> i64 {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };

        let start = match self.start {
            Some(start) => clamp(start),
            None if step < 0 => upper,
            None => lower,
        };
        let stop = match self.stop {
            Some(stop) => clamp(stop),
            None if step < 0 => lower,
            None => upper,
        };

        // Bounds are clamped to [-1, len], so the span always fits
        let span = if step > 0 { stop - start } else { start - stop };
        let remaining = if span > 0 {
            (span as u64 - 1) / step.unsigned_abs() + 1
        } else {
            0
        };

        Ok(IndexRange {
            next: start,
            step,
            remaining,
        })
    }
}

impl From<Range<i64>> for SliceSpec {
    fn from(range: Range<i64>) -> Self {
        Self::new(Some(range.start), Some(range.end), None)
    }
}

impl From<RangeFrom<i64>> for SliceSpec {
    fn from(range: RangeFrom<i64>) -> Self {
        Self::new(Some(range.start), None, None)
    }
}

impl From<RangeTo<i64>> for SliceSpec {
    fn from(range: RangeTo<i64>) -> Self {
        Self::new(None, Some(range.end), None)
    }
}

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self {
        Self::full()
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |bound: Option<i64>| bound.map(|b| b.to_string()).unwrap_or_default();
        write!(f, "{}:{}", show(self.start), show(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{}", step)?;
        }
        Ok(())
    }
}

/// Parses `start:stop[:step]`, any part may be empty (`"1:"`, `"::-1"`)
impl FromStr for SliceSpec {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(StoreError::InvalidSlice(format!(
                "expected start:stop[:step], got {:?}",
                s
            )));
        }

        let parse = |part: &str| -> Result<Option<i64>> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            part.parse::<i64>()
                .map(Some)
                .map_err(|e| StoreError::InvalidSlice(format!("{:?}: {}", part, e)))
        };

        Ok(Self {
            start: parse(parts[0])?,
            stop: parse(parts[1])?,
            step: match parts.get(2) {
                Some(part) => parse(part)?,
                None => None,
            },
        })
    }
}

// =============================================================================
// IndexRange
// =============================================================================

/// Lazy sequence of record positions selected by a slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRange {
    next: i64,
    step: i64,
    remaining: u64,
}

impl IndexRange {
    /// Positions `start..end` in order
    pub fn ascending(start: u64, end: u64) -> Self {
        Self {
            next: i64::try_from(start).unwrap_or(i64::MAX),
            step: 1,
            remaining: end.saturating_sub(start),
        }
    }

    /// Distance between consecutive positions
    pub fn step_size(&self) -> i64 {
        self.step
    }
}

impl Iterator for IndexRange {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next;
        self.remaining -= 1;
        // Only step while another in-range position follows
        if self.remaining > 0 {
            self.next += self.step;
        }
        Some(current as u64)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IndexRange {}
