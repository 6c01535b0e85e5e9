//! Sorted parts and the forward-only cursors that read them.

use crate::error::PopulationError;

/// Single-pass cursor over sorted entries.
///
/// `next` must return `true` before `key`, `value` or `take` see an entry.
/// After `close` (or exhaustion) the cursor holds no resources and `next`
/// keeps returning `false`.
pub trait PartCursor<K, V>: Send {
    /// Advances to the next entry. `Ok(false)` means exhausted.
    fn next(&mut self) -> Result<bool, PopulationError>;

    fn key(&self) -> Option<&K>;

    fn value(&self) -> Option<&V>;

    /// Moves the current entry out of the cursor.
    fn take(&mut self) -> Option<(K, V)>;

    /// Releases the underlying storage. Idempotent.
    fn close(&mut self);
}

/// An immutable sorted part that can be opened exactly once.
pub trait PartSource<K, V>: Send {
    /// Number of entries the cursor will yield.
    fn entry_count(&self) -> u64;

    fn open(self: Box<Self>) -> Result<BoxCursor<K, V>, PopulationError>;
}

pub type Part<K, V> = Box<dyn PartSource<K, V>>;
pub type BoxCursor<K, V> = Box<dyn PartCursor<K, V>>;

/// A part held in memory.
pub struct MemoryPart<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> MemoryPart<K, V> {
    /// # Pre-conditions
    /// - `entries` is sorted by the layout the part will be merged with
    #[must_use]
    pub const fn new(entries: Vec<(K, V)>) -> Self {
        Self { entries }
    }
}

impl<K: Send + 'static, V: Send + 'static> PartSource<K, V> for MemoryPart<K, V> {
    fn entry_count(&self) -> u64 {
        self.entries.len() as u64
    }

    fn open(self: Box<Self>) -> Result<BoxCursor<K, V>, PopulationError> {
        Ok(Box::new(MemoryCursor {
            entries: self.entries.into_iter(),
            current: None,
        }))
    }
}

struct MemoryCursor<K, V> {
    entries: std::vec::IntoIter<(K, V)>,
    current: Option<(K, V)>,
}

impl<K: Send, V: Send> PartCursor<K, V> for MemoryCursor<K, V> {
    fn next(&mut self) -> Result<bool, PopulationError> {
        self.current = self.entries.next();
        Ok(self.current.is_some())
    }

    fn key(&self) -> Option<&K> {
        self.current.as_ref().map(|(k, _)| k)
    }

    fn value(&self) -> Option<&V> {
        self.current.as_ref().map(|(_, v)| v)
    }

    fn take(&mut self) -> Option<(K, V)> {
        self.current.take()
    }

    fn close(&mut self) {
        self.current = None;
        self.entries = Vec::new().into_iter();
    }
}

/// Cursor over nothing.
pub struct EmptyCursor;

impl<K, V> PartCursor<K, V> for EmptyCursor {
    fn next(&mut self) -> Result<bool, PopulationError> {
        Ok(false)
    }

    fn key(&self) -> Option<&K> {
        None
    }

    fn value(&self) -> Option<&V> {
        None
    }

    fn take(&mut self) -> Option<(K, V)> {
        None
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_part_yields_entries_once() {
        let part: Part<u32, &str> = Box::new(MemoryPart::new(vec![(1, "a"), (2, "b")]));
        assert_eq!(part.entry_count(), 2);
        let mut cursor = part.open().unwrap();
        assert!(cursor.key().is_none());
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.key(), Some(&1));
        assert_eq!(cursor.value(), Some(&"a"));
        assert_eq!(cursor.take(), Some((1, "a")));
        assert!(cursor.key().is_none());
        assert!(cursor.next().unwrap());
        cursor.close();
        assert!(!cursor.next().unwrap());
    }
}
