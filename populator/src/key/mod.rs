//! Binary key codec.
//!
//! An [`IndexKey`] is an entity id plus one slot per indexed property. Keys
//! compare slot by slot, left to right, and fall back to the entity id only
//! when both keys ask for it (see [`IndexKey::set_compare_id`]).
//!
//! # Key Format
//!
//! ```text
//! +----------+--------------------------------------------+
//! | 0-7      | entity id (i64, little-endian)             |
//! | 8-N      | slot 0, slot 1, ... (see `value` module)   |
//! +----------+--------------------------------------------+
//! ```
//!
//! The encoded length is exactly [`IndexKey::size`]. Nothing is truncated:
//! callers check the size against the tree's cap before storing a key.

mod codec;
mod layout;
mod number;
mod spatial;
mod temporal;
mod value;

use std::cmp::Ordering;

pub use layout::{GenericLayout, Layout, NullValue};
pub use number::{Number, NumberArray, NumberType};
pub use spatial::{Crs, Point};
pub use temporal::{Date, DateTime, Duration, LocalDateTime, LocalTime, Time};
pub use value::{TypeTag, Value};

use crate::error::KeyError;
use codec::{KeyReader, KeyWriter};
use value::TAG_SIZE;

/// Bytes of the entity id that prefixes every key.
pub const ENTITY_ID_SIZE: usize = 8;

/// Entity id of a key that has not been initialized.
pub const NO_ENTITY_ID: i64 = -1;

/// How a slot value compares against equal values, for range bounds.
///
/// Stored entries are always `Neutral`. A scan from "greater than x" starts
/// at x with `High`, a scan to "less than x" ends at x with `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Inclusion {
    Low,
    #[default]
    Neutral,
    High,
}

/// Contents of one key slot.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Below every value. Range bounds only.
    Lowest,
    Value { value: Value, inclusion: Inclusion },
    /// Property absent. Sorts after every value.
    NoValue,
    /// Above every value. Range bounds only.
    Highest,
}

impl Slot {
    const fn rank(&self) -> u8 {
        match self {
            Self::Lowest => 0,
            Self::Value { .. } => 1,
            Self::NoValue => 2,
            Self::Highest => 3,
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Self::Value {
                    value: a,
                    inclusion: ia,
                },
                Self::Value {
                    value: b,
                    inclusion: ib,
                },
            ) => a.compare(b).then(ia.cmp(ib)),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Encoded size. Boundary markers count their tag only.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Value { value, .. } => value.encoded_size(),
            Self::Lowest | Self::NoValue | Self::Highest => TAG_SIZE,
        }
    }
}

/// A composite index key.
///
/// # Invariants
/// - the number of slots never changes after construction
/// - `size()` equals the length of the bytes `write_to` produces
#[derive(Debug, Clone)]
pub struct IndexKey {
    entity_id: i64,
    compare_id: bool,
    slots: Vec<Slot>,
}

impl IndexKey {
    /// A key with `slot_count` empty slots and no entity id.
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        Self {
            entity_id: NO_ENTITY_ID,
            compare_id: true,
            slots: vec![Slot::NoValue; slot_count],
        }
    }

    /// A stored-entry key with one `Neutral` slot per value.
    pub fn from_values(entity_id: i64, values: Vec<Value>) -> Result<Self, KeyError> {
        let mut key = Self::new(values.len());
        key.initialize(entity_id);
        for (slot, value) in values.into_iter().enumerate() {
            key.write_value(slot, value, Inclusion::Neutral)?;
        }
        Ok(key)
    }

    /// Resets every slot and sets the entity id.
    pub fn initialize(&mut self, entity_id: i64) {
        self.entity_id = entity_id;
        self.compare_id = true;
        self.slots.fill(Slot::NoValue);
    }

    /// Stores `value` in `slot`.
    ///
    /// # Pre-conditions
    /// - `slot < self.slot_count()`
    ///
    /// # Post-conditions
    /// - the value is guaranteed to encode, so a later `write_to` cannot fail
    ///   because of it
    pub fn write_value(
        &mut self,
        slot: usize,
        value: Value,
        inclusion: Inclusion,
    ) -> Result<(), KeyError> {
        let slots = self.slots.len();
        let target = self
            .slots
            .get_mut(slot)
            .ok_or(KeyError::SlotOutOfRange { slot, slots })?;
        value.validate()?;
        *target = Slot::Value { value, inclusion };
        Ok(())
    }

    /// Turns this key into the lower bound of a full scan.
    pub fn init_as_lowest(&mut self) {
        self.entity_id = i64::MIN;
        self.slots.fill(Slot::Lowest);
    }

    /// Turns this key into the upper bound of a full scan.
    pub fn init_as_highest(&mut self) {
        self.entity_id = i64::MAX;
        self.slots.fill(Slot::Highest);
    }

    #[must_use]
    pub const fn entity_id(&self) -> i64 {
        self.entity_id
    }

    #[must_use]
    pub const fn compare_id(&self) -> bool {
        self.compare_id
    }

    /// Whether ties on every slot are broken by entity id. Unique indexes
    /// turn this off so that equal values from different entities collide.
    pub const fn set_compare_id(&mut self, compare_id: bool) {
        self.compare_id = compare_id;
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// The stored values, or `None` if any slot is not a value.
    #[must_use]
    pub fn values(&self) -> Option<Vec<Value>> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Value { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Exact encoded size in bytes, entity id included.
    #[must_use]
    pub fn size(&self) -> usize {
        ENTITY_ID_SIZE + self.slots.iter().map(Slot::size).sum::<usize>()
    }

    /// Slot-by-slot comparison, ignoring entity ids.
    #[must_use]
    pub fn compare_values(&self, other: &Self) -> Ordering {
        self.slots
            .iter()
            .zip(&other.slots)
            .map(|(a, b)| a.compare(b))
            .find(|c| c.is_ne())
            .unwrap_or_else(|| self.slots.len().cmp(&other.slots.len()))
    }

    /// Total order used by sorting, merging and the tree.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        let by_value = self.compare_values(other);
        if by_value.is_ne() || !(self.compare_id && other.compare_id) {
            return by_value;
        }
        self.entity_id.cmp(&other.entity_id)
    }

    /// Appends the encoded key to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), KeyError> {
        let mut w = KeyWriter::new(out);
        w.put_i64(self.entity_id);
        for (index, slot) in self.slots.iter().enumerate() {
            match slot {
                Slot::Value { value, .. } => value.write(&mut w)?,
                Slot::NoValue => w.put_u8(TypeTag::NoValue as u8),
                Slot::Lowest | Slot::Highest => return Err(KeyError::UnstorableSlot(index)),
            }
        }
        Ok(())
    }

    /// Decodes a key that `write_to` produced. `bytes` must hold exactly one
    /// key.
    pub fn read_from(bytes: &[u8], compare_id: bool) -> Result<Self, KeyError> {
        let mut r = KeyReader::new(bytes);
        let entity_id = r.i64()?;
        let mut slots = Vec::new();
        while r.remaining() > 0 {
            let tag = TypeTag::try_from(r.u8()?)?;
            slots.push(match Value::read(tag, &mut r)? {
                Some(value) => Slot::Value {
                    value,
                    inclusion: Inclusion::Neutral,
                },
                None => Slot::NoValue,
            });
        }
        r.finish()?;
        Ok(Self {
            entity_id,
            compare_id,
            slots,
        })
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}
