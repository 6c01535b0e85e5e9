//! The seam to the tree builder that consumes the merged stream.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::PopulationError;
use crate::key::Layout;
use crate::merge::{MergeResult, ValueMerger};

/// Bytes of a tree page reserved for the page header.
pub const PAGE_HEADER_SIZE: usize = 32;

/// Entries that must fit in one leaf page.
pub const MIN_ENTRIES_PER_PAGE: usize = 2;

/// Per-entry offset and length bookkeeping inside a page.
pub const ENTRY_BOOKKEEPING_SIZE: usize = 4;

/// Largest key plus value a tree with `page_size` pages can store.
///
/// `(page_size - header) / 2 - bookkeeping`, so 8 KiB pages give 4076 bytes.
#[must_use]
pub const fn key_value_size_cap(page_size: usize) -> usize {
    (page_size.saturating_sub(PAGE_HEADER_SIZE) / MIN_ENTRIES_PER_PAGE)
        .saturating_sub(ENTRY_BOOKKEEPING_SIZE)
}

/// Consumer of one globally sorted entry stream.
pub trait TreeSink<K, V> {
    /// Size cap the sink can store, derived from its page geometry.
    fn max_key_value_size(&self) -> usize;

    /// Appends the next entry. Keys arrive in strictly ascending order.
    fn write(&mut self, key: &K, value: &V) -> Result<(), PopulationError>;

    /// Called once after the last entry.
    fn finish(&mut self) -> Result<(), PopulationError>;
}

/// Point writes applied after the sorted stream and before `finish`, for
/// updates that arrived while the scan was running.
pub trait TreeUpdater<K, V>: TreeSink<K, V> {
    /// Inserts an entry. When an equal key is stored, `merger` decides
    /// whether the stored value is replaced. The stored key always stays.
    fn merge(&mut self, key: K, value: V, merger: &dyn ValueMerger<K, V>)
    -> Result<(), PopulationError>;

    /// Removes the stored entry that is the same entry as `key`. Returns
    /// whether one was found.
    fn remove(&mut self, key: &K) -> Result<bool, PopulationError>;
}

/// In-memory sink that checks ordering, for tests and dry runs.
pub struct MemoryTree<L: Layout> {
    layout: Arc<L>,
    page_size: usize,
    entries: Vec<(L::Key, L::Value)>,
    finished: bool,
}

impl<L: Layout> MemoryTree<L>
where
    L::Key: Clone,
    L::Value: Clone,
{
    #[must_use]
    pub const fn new(layout: Arc<L>, page_size: usize) -> Self {
        Self {
            layout,
            page_size,
            entries: Vec::new(),
            finished: false,
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[(L::Key, L::Value)] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    fn check_fits(&self, key: &L::Key, value: &L::Value) -> Result<(), PopulationError> {
        let size = self.layout.key_size(key) + self.layout.value_size(value);
        if size > key_value_size_cap(self.page_size) {
            return Err(PopulationError::IllegalState("entry larger than the tree can store"));
        }
        Ok(())
    }

    fn position(&self, key: &L::Key) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|(stored, _)| self.layout.compare(stored, key))
    }
}

impl<L: Layout> TreeSink<L::Key, L::Value> for MemoryTree<L>
where
    L::Key: Clone,
    L::Value: Clone,
{
    fn max_key_value_size(&self) -> usize {
        key_value_size_cap(self.page_size)
    }

    fn write(&mut self, key: &L::Key, value: &L::Value) -> Result<(), PopulationError> {
        if self.finished {
            return Err(PopulationError::IllegalState("write after finish"));
        }
        if let Some((last, _)) = self.entries.last() {
            if self.layout.compare(last, key) != Ordering::Less {
                return Err(PopulationError::IllegalState("tree input is not strictly ascending"));
            }
        }
        self.check_fits(key, value)?;
        self.entries.push((key.clone(), value.clone()));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PopulationError> {
        self.finished = true;
        Ok(())
    }
}

impl<L: Layout> TreeUpdater<L::Key, L::Value> for MemoryTree<L>
where
    L::Key: Clone,
    L::Value: Clone,
{
    fn merge(
        &mut self,
        key: L::Key,
        value: L::Value,
        merger: &dyn ValueMerger<L::Key, L::Value>,
    ) -> Result<(), PopulationError> {
        if self.finished {
            return Err(PopulationError::IllegalState("write after finish"));
        }
        self.check_fits(&key, &value)?;
        match self.position(&key) {
            Ok(index) => {
                let (stored_key, stored_value) = &mut self.entries[index];
                if merger.merge(stored_key, &key, stored_value, &value) == MergeResult::Replaced {
                    *stored_value = value;
                }
            }
            Err(index) => self.entries.insert(index, (key, value)),
        }
        Ok(())
    }

    fn remove(&mut self, key: &L::Key) -> Result<bool, PopulationError> {
        if self.finished {
            return Err(PopulationError::IllegalState("write after finish"));
        }
        match self.position(key) {
            Ok(index) if self.layout.same_entry(&self.entries[index].0, key) => {
                self.entries.remove(index);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
