//! Log entries for updates that arrive while the scan is still running.
//!
//! Each update is logged as one or two steps keyed by the index key it
//! touches. A change is logged as `ChangeFrom` on the old key followed by
//! `ChangeTo` on the new one. The log is written with
//! [`BlockStorage::in_arrival_order`](crate::block::BlockStorage::in_arrival_order)
//! through an [`UpdateLayout`], so it shares the part file format with the
//! sorted blocks but replays in the order it was written.

use std::cmp::Ordering;

use crate::error::KeyError;
use crate::key::Layout;

/// One step of a logged update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateStep {
    Add = 0,
    Remove = 1,
    ChangeFrom = 2,
    ChangeTo = 3,
}

impl UpdateStep {
    /// Whether the key of this step is removed from the tree.
    #[must_use]
    pub const fn removes(self) -> bool {
        matches!(self, Self::Remove | Self::ChangeFrom)
    }

    /// Whether this step finishes an update. A change counts once.
    #[must_use]
    pub const fn completes_update(self) -> bool {
        !matches!(self, Self::ChangeFrom)
    }
}

impl TryFrom<u8> for UpdateStep {
    type Error = KeyError;

    fn try_from(byte: u8) -> Result<Self, KeyError> {
        match byte {
            0 => Ok(Self::Add),
            1 => Ok(Self::Remove),
            2 => Ok(Self::ChangeFrom),
            3 => Ok(Self::ChangeTo),
            other => Err(KeyError::UnknownUpdateStep(other)),
        }
    }
}

/// Wraps an index layout, storing the update step as the entry value.
#[derive(Debug, Clone)]
pub struct UpdateLayout<L> {
    inner: L,
}

impl<L> UpdateLayout<L> {
    pub const fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: Layout> Layout for UpdateLayout<L> {
    type Key = L::Key;
    type Value = UpdateStep;

    fn compare(&self, a: &L::Key, b: &L::Key) -> Ordering {
        self.inner.compare(a, b)
    }

    fn same_entry(&self, a: &L::Key, b: &L::Key) -> bool {
        self.inner.same_entry(a, b)
    }

    fn key_size(&self, key: &L::Key) -> usize {
        self.inner.key_size(key)
    }

    fn value_size(&self, _value: &UpdateStep) -> usize {
        1
    }

    fn write_key(&self, key: &L::Key, out: &mut Vec<u8>) -> Result<(), KeyError> {
        self.inner.write_key(key, out)
    }

    fn read_key(&self, bytes: &[u8]) -> Result<L::Key, KeyError> {
        self.inner.read_key(bytes)
    }

    fn write_value(&self, value: &UpdateStep, out: &mut Vec<u8>) -> Result<(), KeyError> {
        out.push(*value as u8);
        Ok(())
    }

    fn read_value(&self, bytes: &[u8]) -> Result<UpdateStep, KeyError> {
        match bytes {
            [byte] => UpdateStep::try_from(*byte),
            [] => Err(KeyError::Truncated {
                offset: 0,
                needed: 1,
            }),
            [_, rest @ ..] => Err(KeyError::TrailingBytes(rest.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::block::{BlockStorage, SpillDirectory};
    use crate::key::{GenericLayout, Inclusion, IndexKey, Value};

    fn key(layout: &GenericLayout, entity_id: i64, value: &str) -> IndexKey {
        let mut key = layout.new_key(entity_id);
        key.write_value(0, Value::from(value), Inclusion::Neutral)
            .unwrap();
        key
    }

    #[test]
    fn test_step_bytes() {
        for step in [
            UpdateStep::Add,
            UpdateStep::Remove,
            UpdateStep::ChangeFrom,
            UpdateStep::ChangeTo,
        ] {
            assert_eq!(UpdateStep::try_from(step as u8), Ok(step));
        }
        assert_eq!(UpdateStep::try_from(9), Err(KeyError::UnknownUpdateStep(9)));

        let layout = UpdateLayout::new(GenericLayout::new(1, false));
        assert!(layout.read_value(&[]).is_err());
        assert_eq!(layout.read_value(&[1, 0]), Err(KeyError::TrailingBytes(1)));
    }

    #[test]
    fn test_logged_updates_replay_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let spill = SpillDirectory::create(dir.path()).unwrap();
        let index = GenericLayout::new(1, true);
        let layout = Arc::new(UpdateLayout::new(index.clone()));
        let mut log = BlockStorage::in_arrival_order(layout, spill, 40);

        let steps = [
            (key(&index, 3, "c"), UpdateStep::Add),
            (key(&index, 1, "a"), UpdateStep::ChangeFrom),
            (key(&index, 1, "z"), UpdateStep::ChangeTo),
            (key(&index, 2, "b"), UpdateStep::Remove),
        ];
        for (key, step) in steps.clone() {
            log.add(key, step).unwrap();
        }
        let parts = log.done_adding().unwrap();
        assert!(parts.len() > 1);

        let mut replayed = Vec::new();
        for part in parts {
            let mut cursor = part.open().unwrap();
            while cursor.next().unwrap() {
                let (key, step) = cursor.take().unwrap();
                replayed.push((key.entity_id(), key.values().unwrap(), step));
            }
        }
        let expected: Vec<_> = steps
            .into_iter()
            .map(|(key, step)| (key.entity_id(), key.values().unwrap(), step))
            .collect();
        assert_eq!(replayed, expected);
    }
}
