//! Deferred uniqueness checking.
//!
//! During the merge, every equal-key pair of a unique index goes through
//! [`ConflictDetectingValueMerger::merge`], which records the two entity ids
//! under the shared value and lets the merge carry on. Updates applied to the
//! tree afterwards go through the same merger, and removals release their
//! entity with [`ConflictDetectingValueMerger::release`]. Once all of that is
//! written, [`ConflictDetectingValueMerger::finalize`] reports every value
//! still held by more than one entity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::PopulationError;
use crate::key::{IndexKey, NullValue, Value};
use crate::merge::{MergeResult, ValueMerger};

/// The last colliding pair recorded for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictPair {
    pub existing_entity_id: i64,
    pub added_entity_id: i64,
}

/// Everything recorded about one colliding value.
#[derive(Debug)]
struct Collision {
    last: ConflictPair,
    /// Entities seen holding the value that were not released since.
    holders: BTreeSet<i64>,
}

impl Collision {
    /// The pair to report, or `None` when at most one holder is left.
    ///
    /// The last recorded pair wins while both of its entities still hold the
    /// value. Otherwise the two lowest remaining holders are reported.
    fn reported_pair(&self) -> Option<ConflictPair> {
        let mut holders = self.holders.iter().copied();
        let (first, second) = (holders.next()?, holders.next()?);
        let last = self.last;
        if self.holders.contains(&last.existing_entity_id)
            && self.holders.contains(&last.added_entity_id)
        {
            return Some(last);
        }
        Some(ConflictPair {
            existing_entity_id: first,
            added_entity_id: second,
        })
    }
}

/// Value merger for property indexes that records uniqueness violations.
///
/// # Invariants
/// - never records anything when `unique` is false
/// - never records a pair of identical entity ids
/// - holds at most one pair per value, the last one observed
#[derive(Debug)]
pub struct ConflictDetectingValueMerger {
    index: String,
    unique: bool,
    ledger: Mutex<BTreeMap<Vec<Value>, Collision>>,
}

impl ConflictDetectingValueMerger {
    #[must_use]
    pub fn new(index: impl Into<String>, unique: bool) -> Self {
        Self {
            index: index.into(),
            unique,
            ledger: Mutex::new(BTreeMap::new()),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, BTreeMap<Vec<Value>, Collision>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether any collision has been recorded.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.ledger().is_empty()
    }

    /// Number of distinct colliding values.
    #[must_use]
    pub fn conflict_count(&self) -> usize {
        self.ledger().len()
    }

    /// Forgets that `entity_id` holds `values`. Returns the lowest entity
    /// recorded as still holding them, if the value ever collided.
    pub fn release(&self, values: &[Value], entity_id: i64) -> Option<i64> {
        let mut ledger = self.ledger();
        let collision = ledger.get_mut(values)?;
        collision.holders.remove(&entity_id);
        collision.holders.first().copied()
    }

    /// Fails if `values` are held by more than one entity.
    pub fn check_conflict(&self, values: &[Value]) -> Result<(), PopulationError> {
        let pair = self.ledger().get(values).and_then(Collision::reported_pair);
        match pair {
            None => Ok(()),
            Some(pair) => Err(self.conflict(pair, values.to_vec())),
        }
    }

    /// Checks every recorded value after the merged stream and all later
    /// updates were applied. Conflicts come back in value order.
    #[must_use]
    pub fn finalize(&self) -> Vec<PopulationError> {
        let surviving: Vec<(Vec<Value>, ConflictPair)> = self
            .ledger()
            .iter()
            .filter_map(|(values, collision)| {
                collision.reported_pair().map(|pair| (values.clone(), pair))
            })
            .collect();
        surviving
            .into_iter()
            .map(|(values, pair)| self.conflict(pair, values))
            .collect()
    }

    fn conflict(&self, pair: ConflictPair, values: Vec<Value>) -> PopulationError {
        PopulationError::ConflictDetected {
            index: self.index.clone(),
            existing_entity_id: pair.existing_entity_id,
            added_entity_id: pair.added_entity_id,
            values,
        }
    }
}

impl ValueMerger<IndexKey, NullValue> for ConflictDetectingValueMerger {
    fn merge(
        &self,
        existing_key: &IndexKey,
        new_key: &IndexKey,
        _existing_value: &mut NullValue,
        _new_value: &NullValue,
    ) -> MergeResult {
        if self.unique && existing_key.entity_id() != new_key.entity_id() {
            if let Some(values) = existing_key.values() {
                let last = ConflictPair {
                    existing_entity_id: existing_key.entity_id(),
                    added_entity_id: new_key.entity_id(),
                };
                let mut ledger = self.ledger();
                let collision = ledger.entry(values).or_insert_with(|| Collision {
                    last,
                    holders: BTreeSet::new(),
                });
                collision.last = last;
                collision.holders.insert(last.existing_entity_id);
                collision.holders.insert(last.added_entity_id);
            }
        }
        MergeResult::Unchanged
    }
}
