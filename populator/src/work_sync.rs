//! Request-coalescing gate around a step that is not safe to run
//! concurrently.
//!
//! Callers hand their work to [`WorkSync::apply`]. Whoever finds the gate
//! idle becomes the applier: it takes everything queued so far, combines it
//! into one unit and applies that once. Everyone else waits until a batch
//! containing their work has been applied, and then returns that batch's
//! outcome. Under contention many calls share one invocation of the
//! underlying step.
//!
//! # Invariants
//! - at most one `Work::apply` runs at any instant
//! - every submitted work is applied exactly once, in a batch together with
//!   work submitted at about the same time
//! - a caller returns only after its own work was applied

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::PopulationError;

/// A unit of work that can be folded together with others of its kind.
pub trait Work<M>: Send {
    /// Folds `other` into `self`. Applying the result must equal applying
    /// both, in order.
    fn combine(&mut self, other: Self);

    fn apply(self, material: &mut M) -> Result<(), PopulationError>;
}

struct Gate<W> {
    next_ticket: u64,
    pending: Vec<(u64, W)>,
    applying: bool,
    outcomes: HashMap<u64, Result<(), Arc<PopulationError>>>,
}

pub struct WorkSync<M, W> {
    material: Mutex<M>,
    gate: Mutex<Gate<W>>,
    applied: Condvar,
}

impl<M: Send, W: Work<M>> WorkSync<M, W> {
    pub fn new(material: M) -> Self {
        Self {
            material: Mutex::new(material),
            gate: Mutex::new(Gate {
                next_ticket: 0,
                pending: Vec::new(),
                applying: false,
                outcomes: HashMap::new(),
            }),
            applied: Condvar::new(),
        }
    }

    fn gate(&self) -> MutexGuard<'_, Gate<W>> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submits `work` and blocks until a batch containing it was applied.
    ///
    /// Every caller of a failed batch gets the same error.
    pub fn apply(&self, work: W) -> Result<(), PopulationError> {
        let mut gate = self.gate();
        let ticket = gate.next_ticket;
        gate.next_ticket += 1;
        gate.pending.push((ticket, work));

        loop {
            if let Some(outcome) = gate.outcomes.remove(&ticket) {
                return outcome.map_err(PopulationError::from_shared);
            }
            if gate.applying {
                gate = self
                    .applied
                    .wait(gate)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }

            gate.applying = true;
            let batch = std::mem::take(&mut gate.pending);
            drop(gate);

            let tickets: Vec<u64> = batch.iter().map(|(t, _)| *t).collect();
            let outcome = self.apply_batch(batch).map_err(Arc::new);

            gate = self.gate();
            gate.applying = false;
            for t in tickets {
                gate.outcomes.insert(t, outcome.clone());
            }
            self.applied.notify_all();
        }
    }

    fn apply_batch(&self, batch: Vec<(u64, W)>) -> Result<(), PopulationError> {
        let mut works = batch.into_iter().map(|(_, w)| w);
        let Some(mut combined) = works.next() else {
            return Ok(());
        };
        for work in works {
            combined.combine(work);
        }
        let mut material = self.material.lock().unwrap_or_else(PoisonError::into_inner);
        panic::catch_unwind(AssertUnwindSafe(|| combined.apply(&mut material)))
            .unwrap_or(Err(PopulationError::IllegalState("ingestion step panicked")))
    }

    /// Runs `f` on the material, outside of any batch.
    pub fn with_material<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        let mut material = self.material.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut material)
    }
}
