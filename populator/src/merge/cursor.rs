//! Lazy k-way merge over sorted cursors.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::block::{BoxCursor, PartCursor};
use crate::error::PopulationError;
use crate::key::Layout;
use crate::merge::{Cancellation, MergeResult, ValueMerger};

/// Entries emitted between two cancellation checks.
pub const CANCELLATION_CHECK_INTERVAL: u64 = 128;

/// Head entry of one source, ordered so that the max-heap pops the smallest
/// key first and the lowest source first among equal keys.
struct Head<L: Layout> {
    layout: Arc<L>,
    key: L::Key,
    value: L::Value,
    source: usize,
}

impl<L: Layout> PartialEq for Head<L> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<L: Layout> Eq for Head<L> {}

impl<L: Layout> PartialOrd for Head<L> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<L: Layout> Ord for Head<L> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.layout
            .compare(&other.key, &self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges sorted cursors into one sorted cursor.
///
/// Source heads sit in a binary heap. Each step emits the smallest head,
/// preferring the lowest source index on ties, so merging is stable with
/// respect to source order. Whenever the emitted entry and the next one have
/// equal keys the [`ValueMerger`] decides whether they collapse into one
/// entry.
///
/// Exhausted sources are closed right away. Every source is closed when the
/// cursor is closed, dropped, fails, or observes cancellation.
pub struct MergingCursor<L: Layout> {
    layout: Arc<L>,
    merger: Arc<dyn ValueMerger<L::Key, L::Value>>,
    cancellation: Cancellation,
    sources: Vec<BoxCursor<L::Key, L::Value>>,
    heads: BinaryHeap<Head<L>>,
    pending: Option<(L::Key, L::Value)>,
    current: Option<(L::Key, L::Value)>,
    primed: bool,
    closed: bool,
    emitted: u64,
    collapsed: u64,
}

impl<L: Layout> MergingCursor<L> {
    pub fn new(
        layout: Arc<L>,
        merger: Arc<dyn ValueMerger<L::Key, L::Value>>,
        cancellation: Cancellation,
        cursors: Vec<BoxCursor<L::Key, L::Value>>,
    ) -> Self {
        Self {
            layout,
            merger,
            cancellation,
            heads: BinaryHeap::with_capacity(cursors.len()),
            sources: cursors,
            pending: None,
            current: None,
            primed: false,
            closed: false,
            emitted: 0,
            collapsed: 0,
        }
    }

    /// Entries emitted so far.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Entries absorbed by `Replaced` or `Merged` outcomes.
    #[must_use]
    pub const fn collapsed(&self) -> u64 {
        self.collapsed
    }

    /// Pushes the next entry of `source` onto the heap, closing the source
    /// once it is exhausted.
    fn refill(&mut self, source: usize) -> Result<(), PopulationError> {
        let cursor = &mut self.sources[source];
        if !cursor.next()? {
            cursor.close();
            return Ok(());
        }
        if let Some((key, value)) = cursor.take() {
            self.heads.push(Head {
                layout: Arc::clone(&self.layout),
                key,
                value,
                source,
            });
        }
        Ok(())
    }

    fn pop_smallest(&mut self) -> Result<Option<(L::Key, L::Value)>, PopulationError> {
        let Some(head) = self.heads.pop() else {
            return Ok(None);
        };
        self.refill(head.source)?;
        Ok(Some((head.key, head.value)))
    }

    fn advance(&mut self) -> Result<bool, PopulationError> {
        if self.emitted % CANCELLATION_CHECK_INTERVAL == 0 {
            self.cancellation.check()?;
        }
        if !self.primed {
            for source in 0..self.sources.len() {
                self.refill(source)?;
            }
            self.primed = true;
            self.pending = self.pop_smallest()?;
        }
        let Some(mut entry) = self.pending.take() else {
            self.close();
            return Ok(false);
        };
        while let Some(next) = self.pop_smallest()? {
            if self.layout.compare(&entry.0, &next.0) != Ordering::Equal {
                self.pending = Some(next);
                break;
            }
            match self.merger.merge(&entry.0, &next.0, &mut entry.1, &next.1) {
                MergeResult::Replaced => {
                    entry.1 = next.1;
                    self.collapsed += 1;
                }
                MergeResult::Merged => self.collapsed += 1,
                MergeResult::Unchanged => {
                    self.pending = Some(next);
                    break;
                }
            }
        }
        self.emitted += 1;
        self.current = Some(entry);
        Ok(true)
    }
}

impl<L: Layout> PartCursor<L::Key, L::Value> for MergingCursor<L> {
    fn next(&mut self) -> Result<bool, PopulationError> {
        self.current = None;
        if self.closed {
            return Ok(false);
        }
        let advanced = self.advance();
        if advanced.is_err() {
            self.close();
        }
        advanced
    }

    fn key(&self) -> Option<&L::Key> {
        self.current.as_ref().map(|(k, _)| k)
    }

    fn value(&self) -> Option<&L::Value> {
        self.current.as_ref().map(|(_, v)| v)
    }

    fn take(&mut self) -> Option<(L::Key, L::Value)> {
        self.current.take()
    }

    fn close(&mut self) {
        self.closed = true;
        self.pending = None;
        self.heads.clear();
        for source in &mut self.sources {
            source.close();
        }
        self.sources.clear();
    }
}

impl<L: Layout> Drop for MergingCursor<L> {
    fn drop(&mut self) {
        self.close();
    }
}
