//! The model a population outcome is checked against.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::PopulationError;
use crate::key::{GenericLayout, Value};
use crate::populator::{IndexUpdate, PopulationSummary};
use crate::tree::MemoryTree;

/// What a correct population of a workload produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    /// Success, writing `(values, entity_id)` in this order.
    Entries(Vec<(Vec<Value>, i64)>),
    /// Failure with a conflict on one of these values. Each value maps to the
    /// entities sharing it.
    Conflict(BTreeMap<Vec<Value>, BTreeSet<i64>>),
}

impl Expected {
    /// Derives the outcome straight from the updates, without sorting parts.
    #[must_use]
    pub fn from_updates(updates: &[IndexUpdate], unique: bool) -> Self {
        if !unique {
            let entries: BTreeSet<(Vec<Value>, i64)> = updates
                .iter()
                .map(|u| (u.values.clone(), u.entity_id))
                .collect();
            return Self::Entries(entries.into_iter().collect());
        }

        let mut owners: BTreeMap<Vec<Value>, BTreeSet<i64>> = BTreeMap::new();
        for update in updates {
            owners
                .entry(update.values.clone())
                .or_default()
                .insert(update.entity_id);
        }
        if owners.values().any(|ids| ids.len() > 1) {
            owners.retain(|_, ids| ids.len() > 1);
            return Self::Conflict(owners);
        }
        Self::Entries(
            owners
                .into_iter()
                .filter_map(|(values, ids)| ids.first().map(|&id| (values, id)))
                .collect(),
        )
    }
}

/// A mismatch between a population and its model.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub description: String,
    pub context: String,
}

/// Collects violations found in population outcomes.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    #[must_use]
    pub fn into_violations(self) -> Vec<InvariantViolation> {
        self.violations
    }

    fn violation(&mut self, description: impl Into<String>, context: impl Into<String>) {
        self.violations.push(InvariantViolation {
            description: description.into(),
            context: context.into(),
        });
    }

    /// Compares a finished population with `expected`.
    pub fn check_outcome(
        &mut self,
        expected: &Expected,
        outcome: &Result<PopulationSummary, PopulationError>,
        tree: &MemoryTree<GenericLayout>,
    ) {
        match (expected, outcome) {
            (Expected::Entries(entries), Ok(summary)) => self.check_entries(entries, summary, tree),
            (Expected::Entries(_), Err(error)) => {
                self.violation("population failed unexpectedly", error.to_string());
            }
            (Expected::Conflict(owners), Err(error)) => self.check_conflict(owners, error, tree),
            (Expected::Conflict(owners), Ok(summary)) => self.violation(
                "shared values were not reported",
                format!("{} colliding values, {summary:?}", owners.len()),
            ),
        }
    }

    fn check_entries(
        &mut self,
        expected: &[(Vec<Value>, i64)],
        summary: &PopulationSummary,
        tree: &MemoryTree<GenericLayout>,
    ) {
        if !tree.is_finished() {
            self.violation("tree was not finished", String::new());
        }
        if summary.entries_written != expected.len() as u64 || tree.len() != expected.len() {
            self.violation(
                "entry count differs",
                format!(
                    "expected {}, summary {}, tree {}",
                    expected.len(),
                    summary.entries_written,
                    tree.len()
                ),
            );
        }
        let mut distinct: Vec<&Vec<Value>> = expected.iter().map(|(values, _)| values).collect();
        distinct.dedup();
        if summary.distinct_values != distinct.len() as u64 {
            self.violation(
                "distinct value count differs",
                format!("expected {}, got {}", distinct.len(), summary.distinct_values),
            );
        }
        for (position, ((values, entity_id), (key, _))) in
            expected.iter().zip(tree.entries()).enumerate()
        {
            let actual = key.values().unwrap_or_default();
            if &actual != values || key.entity_id() != *entity_id {
                self.violation(
                    "entry differs from model",
                    format!(
                        "position {position}: expected {entity_id} {values:?}, got {} {actual:?}",
                        key.entity_id()
                    ),
                );
                return;
            }
        }
    }

    fn check_conflict(
        &mut self,
        owners: &BTreeMap<Vec<Value>, BTreeSet<i64>>,
        error: &PopulationError,
        tree: &MemoryTree<GenericLayout>,
    ) {
        if tree.is_finished() {
            self.violation("tree was finished despite a conflict", String::new());
        }
        let PopulationError::ConflictDetected {
            existing_entity_id,
            added_entity_id,
            values,
            ..
        } = error
        else {
            self.violation("expected a conflict", error.to_string());
            return;
        };
        let Some(ids) = owners.get(values) else {
            self.violation("conflict on a value no two entities share", error.to_string());
            return;
        };
        if existing_entity_id == added_entity_id
            || !ids.contains(existing_entity_id)
            || !ids.contains(added_entity_id)
        {
            self.violation("conflict names the wrong entities", error.to_string());
        }
    }
}
