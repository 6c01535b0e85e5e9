//! Test fixtures shared by unit and end-to-end tests.

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use crate::block::{BoxCursor, MemoryPart, Part, PartCursor, PartSource};
use crate::error::{KeyError, PopulationError};
use crate::key::Layout;
use crate::merge::Cancellation;

/// `i64 -> i64` entries ordered by key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongLayout;

fn read_i64(bytes: &[u8]) -> Result<i64, KeyError> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| KeyError::Truncated {
        offset: bytes.len(),
        needed: 8_usize.saturating_sub(bytes.len()),
    })?;
    Ok(i64::from_le_bytes(raw))
}

impl Layout for LongLayout {
    type Key = i64;
    type Value = i64;

    fn compare(&self, a: &i64, b: &i64) -> Ordering {
        a.cmp(b)
    }

    fn key_size(&self, _key: &i64) -> usize {
        8
    }

    fn value_size(&self, _value: &i64) -> usize {
        8
    }

    fn write_key(&self, key: &i64, out: &mut Vec<u8>) -> Result<(), KeyError> {
        out.extend_from_slice(&key.to_le_bytes());
        Ok(())
    }

    fn read_key(&self, bytes: &[u8]) -> Result<i64, KeyError> {
        read_i64(bytes)
    }

    fn write_value(&self, value: &i64, out: &mut Vec<u8>) -> Result<(), KeyError> {
        out.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn read_value(&self, bytes: &[u8]) -> Result<i64, KeyError> {
        read_i64(bytes)
    }
}

/// Sorted in-memory part of `(key, value)` pairs.
pub fn memory_part(mut entries: Vec<(i64, i64)>) -> Part<i64, i64> {
    entries.sort_by_key(|(k, _)| *k);
    Box::new(MemoryPart::new(entries))
}

/// Counts how many cursors were opened and closed.
#[derive(Debug, Default)]
pub struct CursorTracker {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl CursorTracker {
    pub fn opened(&self) -> usize {
        self.opened.load(AtomicOrdering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(AtomicOrdering::SeqCst)
    }
}

/// Wraps a part so that opening and closing is counted, and optionally
/// requests cancellation after a number of reads.
pub struct TrackedPart {
    inner: Part<i64, i64>,
    tracker: Arc<CursorTracker>,
    cancel_after: Option<(usize, Cancellation)>,
}

impl TrackedPart {
    pub fn wrap(inner: Part<i64, i64>, tracker: &Arc<CursorTracker>) -> Part<i64, i64> {
        Box::new(Self {
            inner,
            tracker: Arc::clone(tracker),
            cancel_after: None,
        })
    }

    pub fn cancelling(
        inner: Part<i64, i64>,
        tracker: &Arc<CursorTracker>,
        reads: usize,
        cancellation: Cancellation,
    ) -> Part<i64, i64> {
        Box::new(Self {
            inner,
            tracker: Arc::clone(tracker),
            cancel_after: Some((reads, cancellation)),
        })
    }
}

impl PartSource<i64, i64> for TrackedPart {
    fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    fn open(self: Box<Self>) -> Result<BoxCursor<i64, i64>, PopulationError> {
        let inner = self.inner.open()?;
        self.tracker.opened.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(TrackedCursor {
            inner,
            tracker: self.tracker,
            cancel_after: self.cancel_after,
            reads: 0,
            closed: false,
        }))
    }
}

struct TrackedCursor {
    inner: BoxCursor<i64, i64>,
    tracker: Arc<CursorTracker>,
    cancel_after: Option<(usize, Cancellation)>,
    reads: usize,
    closed: bool,
}

impl PartCursor<i64, i64> for TrackedCursor {
    fn next(&mut self) -> Result<bool, PopulationError> {
        self.reads += 1;
        if let Some((after, cancellation)) = &self.cancel_after {
            if self.reads >= *after {
                cancellation.cancel();
            }
        }
        self.inner.next()
    }

    fn key(&self) -> Option<&i64> {
        self.inner.key()
    }

    fn value(&self) -> Option<&i64> {
        self.inner.value()
    }

    fn take(&mut self) -> Option<(i64, i64)> {
        self.inner.take()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.inner.close();
            self.tracker.closed.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }
}

impl Drop for TrackedCursor {
    fn drop(&mut self) {
        self.close();
    }
}
