//! Bounded in-memory accumulation of entries, spilled as sorted parts.

use std::sync::Arc;

use crate::block::part::Part;
use crate::block::spill::{PartWriter, SpillDirectory};
use crate::error::PopulationError;
use crate::key::Layout;

/// Per-entry bookkeeping charged against the block budget, matching the
/// length prefixes an entry costs in a part file.
pub const ENTRY_OVERHEAD: usize = 8;

/// Accumulates entries and spills them as sorted parts.
///
/// Storage created with [`BlockStorage::in_arrival_order`] skips the sort and
/// keeps entries in the order they were added, part after part.
///
/// Owned by a single populating thread. Parts already returned by a flush
/// are independent files, so merging them can run while this keeps adding.
///
/// # Invariants
/// - `buffered_bytes` is the sum of the entry sizes in `buffer`
/// - `buffered_bytes < block_size` after every `add` returns
/// - every part in `parts` is sorted by `layout`, unless `sorted` is false
pub struct BlockStorage<L: Layout> {
    layout: Arc<L>,
    sorted: bool,
    spill: Arc<SpillDirectory>,
    block_size: usize,
    buffer: Vec<(L::Key, L::Value)>,
    buffered_bytes: usize,
    parts: Vec<Part<L::Key, L::Value>>,
    entries_added: u64,
    done: bool,
}

impl<L: Layout> BlockStorage<L> {
    /// # Pre-conditions
    /// - `block_size > 0`
    pub const fn new(layout: Arc<L>, spill: Arc<SpillDirectory>, block_size: usize) -> Self {
        Self::with_ordering(layout, spill, block_size, true)
    }

    /// Storage whose parts replay entries exactly as they were added.
    pub const fn in_arrival_order(
        layout: Arc<L>,
        spill: Arc<SpillDirectory>,
        block_size: usize,
    ) -> Self {
        Self::with_ordering(layout, spill, block_size, false)
    }

    const fn with_ordering(
        layout: Arc<L>,
        spill: Arc<SpillDirectory>,
        block_size: usize,
        sorted: bool,
    ) -> Self {
        Self {
            layout,
            sorted,
            spill,
            block_size,
            buffer: Vec::new(),
            buffered_bytes: 0,
            parts: Vec::new(),
            entries_added: 0,
            done: false,
        }
    }

    /// Bytes one entry costs against the block budget.
    pub fn entry_size(&self, key: &L::Key, value: &L::Value) -> usize {
        self.layout.key_size(key) + self.layout.value_size(value) + ENTRY_OVERHEAD
    }

    /// Buffers an entry, spilling the block when it reaches its budget.
    pub fn add(&mut self, key: L::Key, value: L::Value) -> Result<(), PopulationError> {
        if self.done {
            return Err(PopulationError::IllegalState("block storage is done adding"));
        }
        self.buffered_bytes += self.entry_size(&key, &value);
        self.buffer.push((key, value));
        self.entries_added += 1;
        if self.buffered_bytes >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Sorts the buffer and writes it out as a new part. No-op when empty.
    pub fn flush(&mut self) -> Result<(), PopulationError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let kind = if self.sorted {
            let layout = &self.layout;
            self.buffer.sort_by(|a, b| layout.compare(&a.0, &b.0));
            "block"
        } else {
            "updates"
        };

        let mut writer = PartWriter::create(&self.spill, Arc::clone(&self.layout), kind)?;
        for (key, value) in &self.buffer {
            writer.append(key, value)?;
        }
        let part = writer.finish()?;
        tracing::debug!(
            part = self.parts.len(),
            kind,
            entries = self.buffer.len(),
            bytes = self.buffered_bytes,
            "Flushed block"
        );
        self.parts.push(Box::new(part));
        self.buffer.clear();
        self.buffered_bytes = 0;
        Ok(())
    }

    /// Flushes the trailing block and hands over every part, in flush order.
    /// Empty when nothing was ever added. Further `add` calls fail.
    pub fn done_adding(&mut self) -> Result<Vec<Part<L::Key, L::Value>>, PopulationError> {
        if self.done {
            return Err(PopulationError::IllegalState("done_adding called twice"));
        }
        self.flush()?;
        self.done = true;
        Ok(std::mem::take(&mut self.parts))
    }

    /// Drops buffered entries and parts that were never handed over.
    pub fn release(&mut self) {
        self.done = true;
        self.buffer = Vec::new();
        self.buffered_bytes = 0;
        self.parts.clear();
    }

    #[must_use]
    pub const fn entries_added(&self) -> u64 {
        self.entries_added
    }

    #[must_use]
    pub fn parts_flushed(&self) -> usize {
        self.parts.len()
    }
}
