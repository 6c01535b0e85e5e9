//! How entries of an index are ordered, sized and serialized.
//!
//! Block storage, the part merger and spill files are generic over a
//! [`Layout`], so they never look inside keys themselves.

use std::cmp::Ordering;

use crate::error::KeyError;
use crate::key::IndexKey;

/// Ordering and serialization of one kind of index entry.
pub trait Layout: Send + Sync + 'static {
    type Key: Send + 'static;
    type Value: Send + 'static;

    /// Total order over keys.
    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Whether `a` and `b` are the same stored entry. Stricter than `compare`
    /// for layouts that let different entries tie.
    fn same_entry(&self, a: &Self::Key, b: &Self::Key) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Exact serialized size of `key`.
    fn key_size(&self, key: &Self::Key) -> usize;

    /// Exact serialized size of `value`.
    fn value_size(&self, value: &Self::Value) -> usize;

    fn write_key(&self, key: &Self::Key, out: &mut Vec<u8>) -> Result<(), KeyError>;

    fn read_key(&self, bytes: &[u8]) -> Result<Self::Key, KeyError>;

    fn write_value(&self, value: &Self::Value, out: &mut Vec<u8>) -> Result<(), KeyError>;

    fn read_value(&self, bytes: &[u8]) -> Result<Self::Value, KeyError>;
}

/// Empty entry value of a property index. The key carries everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullValue;

/// Layout of a property index over `slots` properties.
#[derive(Debug, Clone)]
pub struct GenericLayout {
    slots: usize,
    compare_entity_ids: bool,
}

impl GenericLayout {
    /// Unique indexes ignore entity ids when comparing, so equal values from
    /// different entities tie.
    #[must_use]
    pub const fn new(slots: usize, unique: bool) -> Self {
        Self {
            slots,
            compare_entity_ids: !unique,
        }
    }

    #[must_use]
    pub const fn slots(&self) -> usize {
        self.slots
    }

    #[must_use]
    pub const fn compares_entity_ids(&self) -> bool {
        self.compare_entity_ids
    }

    /// A fresh key shaped for this layout.
    #[must_use]
    pub fn new_key(&self, entity_id: i64) -> IndexKey {
        let mut key = IndexKey::new(self.slots);
        key.initialize(entity_id);
        key.set_compare_id(self.compare_entity_ids);
        key
    }
}

impl Layout for GenericLayout {
    type Key = IndexKey;
    type Value = NullValue;

    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering {
        a.compare(b)
    }

    fn same_entry(&self, a: &IndexKey, b: &IndexKey) -> bool {
        a.entity_id() == b.entity_id() && a.compare_values(b) == Ordering::Equal
    }

    fn key_size(&self, key: &IndexKey) -> usize {
        key.size()
    }

    fn value_size(&self, _value: &NullValue) -> usize {
        0
    }

    fn write_key(&self, key: &IndexKey, out: &mut Vec<u8>) -> Result<(), KeyError> {
        key.write_to(out)
    }

    fn read_key(&self, bytes: &[u8]) -> Result<IndexKey, KeyError> {
        let key = IndexKey::read_from(bytes, self.compare_entity_ids)?;
        if key.slot_count() != self.slots {
            return Err(KeyError::SlotOutOfRange {
                slot: key.slot_count(),
                slots: self.slots,
            });
        }
        Ok(key)
    }

    fn write_value(&self, _value: &NullValue, _out: &mut Vec<u8>) -> Result<(), KeyError> {
        Ok(())
    }

    fn read_value(&self, bytes: &[u8]) -> Result<NullValue, KeyError> {
        match bytes.len() {
            0 => Ok(NullValue),
            n => Err(KeyError::TrailingBytes(n)),
        }
    }
}
