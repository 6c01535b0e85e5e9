//! Reproducible scan workloads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::key::{Crs, Date, Point, Value};
use crate::populator::IndexUpdate;

/// Kinds of property values a workload draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
    TextArray,
    Date,
    Point,
}

impl ValueKind {
    pub const ALL: [Self; 5] = [
        Self::Number,
        Self::Text,
        Self::TextArray,
        Self::Date,
        Self::Point,
    ];
}

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Properties per update.
    pub slots: usize,
    /// Distinct value tuples entities draw from. A pool smaller than the
    /// number of entities guarantees shared values.
    pub value_pool_size: usize,
    /// Probability that an update repeats an earlier one unchanged, as when a
    /// scan visits an entity twice.
    pub rescan_rate: f64,
    pub max_string_length: usize,
    pub kinds: Vec<ValueKind>,
    /// Derive every new entity's values from its id, so that no two
    /// entities share a value. The pool is not used.
    pub distinct_values: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            slots: 1,
            value_pool_size: 64,
            rescan_rate: 0.05,
            max_string_length: 24,
            kinds: ValueKind::ALL.to_vec(),
            distinct_values: false,
        }
    }
}

/// Generator of index updates.
///
/// Produces the same sequence for the same seed and configuration.
pub struct WorkloadGenerator {
    rng: StdRng,
    config: WorkloadConfig,
    pool: Vec<Vec<Value>>,
    history: Vec<IndexUpdate>,
    next_entity_id: i64,
}

impl WorkloadGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let kinds: Vec<ValueKind> = if config.kinds.is_empty() {
            vec![ValueKind::Number]
        } else {
            config.kinds.clone()
        };
        // One kind per slot, so a slot's values are comparable within a type.
        let slot_kinds: Vec<ValueKind> = (0..config.slots)
            .map(|_| kinds[rng.random_range(0..kinds.len())])
            .collect();
        let pool = (0..config.value_pool_size.max(1))
            .map(|_| {
                slot_kinds
                    .iter()
                    .map(|&kind| random_value(&mut rng, kind, config.max_string_length))
                    .collect()
            })
            .collect();

        Self {
            rng,
            config,
            pool,
            history: Vec::new(),
            next_entity_id: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Generates the next update.
    pub fn next_update(&mut self) -> IndexUpdate {
        if !self.history.is_empty() && self.rng.random::<f64>() < self.config.rescan_rate {
            let index = self.rng.random_range(0..self.history.len());
            return self.history[index].clone();
        }
        let entity_id = self.next_entity_id;
        self.next_entity_id += 1;
        let values = if self.config.distinct_values {
            (0..self.config.slots)
                .map(|slot| Value::from(format!("{entity_id}-{slot}")))
                .collect()
        } else {
            self.pool[self.rng.random_range(0..self.pool.len())].clone()
        };
        let update = IndexUpdate::new(entity_id, values);
        self.history.push(update.clone());
        update
    }

    /// Generates `count` updates cut into batches of at most `batch_size`.
    pub fn batches(&mut self, count: usize, batch_size: usize) -> Vec<Vec<IndexUpdate>> {
        let updates: Vec<IndexUpdate> = (0..count).map(|_| self.next_update()).collect();
        updates
            .chunks(batch_size.max(1))
            .map(<[IndexUpdate]>::to_vec)
            .collect()
    }
}

fn random_text(rng: &mut StdRng, max_length: usize) -> String {
    let length = rng.random_range(0..=max_length);
    (0..length)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

fn random_value(rng: &mut StdRng, kind: ValueKind, max_string_length: usize) -> Value {
    match kind {
        ValueKind::Number => match rng.random_range(0..3) {
            0 => Value::from(rng.random_range(-10_000..10_000_i32)),
            1 => Value::from(rng.random_range(-1_000_000..1_000_000_i64)),
            _ => Value::from(rng.random_range(-1000.0..1000.0_f64)),
        },
        ValueKind::Text => Value::from(random_text(rng, max_string_length)),
        ValueKind::TextArray => {
            let length = rng.random_range(0..4);
            Value::from(
                (0..length)
                    .map(|_| random_text(rng, max_string_length))
                    .collect::<Vec<_>>(),
            )
        }
        ValueKind::Date => Value::Date(Date {
            epoch_day: rng.random_range(-50_000..50_000),
        }),
        ValueKind::Point => {
            let x = rng.random_range(-1000.0..1000.0);
            let y = rng.random_range(-1000.0..1000.0);
            Point::new(Crs::Cartesian, &[x, y]).map_or_else(|_| Value::from(x), Value::from)
        }
    }
}
