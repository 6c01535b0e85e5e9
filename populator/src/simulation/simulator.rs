//! Runs generated workloads through a real populator.

use std::path::Path;
use std::thread;

use crate::config::PopulatorConfig;
use crate::error::PopulationError;
use crate::key::GenericLayout;
use crate::populator::{BlockBasedPopulator, IndexDescriptor, IndexUpdate, PopulationSummary};
use crate::scheduler::ThreadPoolScheduler;
use crate::tree::MemoryTree;

use super::invariants::{Expected, InvariantChecker, InvariantViolation};
use super::workload::{WorkloadConfig, WorkloadGenerator};

/// Configuration for one simulated population.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    pub updates: usize,
    pub batch_size: usize,
    /// Threads calling `add` concurrently.
    pub producers: usize,
    pub unique: bool,
    pub workload: WorkloadConfig,
    pub block_size: usize,
    pub merge_factor: usize,
    pub workers: usize,
}

impl SimulatorConfig {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            updates: 2_000,
            batch_size: 32,
            producers: 4,
            unique: false,
            workload: WorkloadConfig::default(),
            block_size: PopulatorConfig::MIN_BLOCK_SIZE * 4,
            merge_factor: 3,
            workers: 2,
        }
    }

    #[must_use]
    pub const fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[must_use]
    pub const fn with_updates(mut self, updates: usize) -> Self {
        self.updates = updates;
        self
    }

    #[must_use]
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    #[must_use]
    pub const fn with_merge_factor(mut self, merge_factor: usize) -> Self {
        self.merge_factor = merge_factor;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    pub seed: u64,
    pub updates_generated: usize,
    /// Present when the population succeeded.
    pub summary: Option<PopulationSummary>,
    /// The population error, expected or not.
    pub error: Option<String>,
    pub invariant_violations: Vec<InvariantViolation>,
}

impl SimulationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.invariant_violations.is_empty()
    }
}

pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    #[must_use]
    pub const fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Generates the workload, populates it under `spill_parent` and checks
    /// the outcome against the model.
    pub fn run(&self, spill_parent: &Path) -> SimulationResult {
        let config = &self.config;
        let mut generator = WorkloadGenerator::with_config(config.seed, config.workload.clone());
        let batches = generator.batches(config.updates, config.batch_size);
        let updates: Vec<IndexUpdate> = batches.iter().flatten().cloned().collect();
        let expected = Expected::from_updates(&updates, config.unique);

        let mut result = SimulationResult {
            seed: config.seed,
            updates_generated: updates.len(),
            summary: None,
            error: None,
            invariant_violations: Vec::new(),
        };

        let populator_config = match self.populator_config(spill_parent) {
            Ok(populator_config) => populator_config,
            Err(e) => {
                result.error = Some(e);
                result.invariant_violations.push(InvariantViolation {
                    description: "invalid simulator configuration".to_string(),
                    context: String::new(),
                });
                return result;
            }
        };
        let descriptor = IndexDescriptor::new(
            format!("simulated-{}", config.seed),
            config.unique,
            config.workload.slots,
        );
        let populator = match BlockBasedPopulator::new(descriptor, &populator_config) {
            Ok(populator) => populator,
            Err(e) => {
                result.error = Some(e.to_string());
                result.invariant_violations.push(InvariantViolation {
                    description: "populator could not be created".to_string(),
                    context: String::new(),
                });
                return result;
            }
        };
        let mut tree = MemoryTree::new(populator.layout(), populator_config.page_size);
        let outcome = Self::populate(
            &populator,
            batches,
            config.producers,
            &populator_config,
            &mut tree,
        );
        populator.close(outcome.is_ok());

        let mut checker = InvariantChecker::new();
        checker.check_outcome(&expected, &outcome, &tree);
        result.invariant_violations = checker.into_violations();
        match outcome {
            Ok(summary) => result.summary = Some(summary),
            Err(e) => result.error = Some(e.to_string()),
        }
        if !result.passed() {
            tracing::warn!(
                seed = config.seed,
                violations = result.invariant_violations.len(),
                "Simulation found invariant violations"
            );
        }
        result
    }

    fn populator_config(&self, spill_parent: &Path) -> Result<PopulatorConfig, String> {
        PopulatorConfig::default()
            .with_spill_directory(spill_parent)
            .with_block_size(self.config.block_size)
            .and_then(|c| c.with_merge_factor(self.config.merge_factor))
            .and_then(|c| c.with_workers(self.config.workers))
            .map_err(|e| e.to_string())
    }

    fn populate(
        populator: &BlockBasedPopulator,
        batches: Vec<Vec<IndexUpdate>>,
        producers: usize,
        config: &PopulatorConfig,
        tree: &mut MemoryTree<GenericLayout>,
    ) -> Result<PopulationSummary, PopulationError> {
        let producers = producers.max(1);
        let mut shares: Vec<Vec<Vec<IndexUpdate>>> = vec![Vec::new(); producers];
        for (i, batch) in batches.into_iter().enumerate() {
            shares[i % producers].push(batch);
        }
        thread::scope(|scope| {
            let handles: Vec<_> = shares
                .into_iter()
                .map(|share| {
                    scope.spawn(move || {
                        share
                            .into_iter()
                            .try_for_each(|batch| populator.add(batch))
                    })
                })
                .collect();
            handles.into_iter().try_for_each(|handle| {
                handle
                    .join()
                    .unwrap_or(Err(PopulationError::IllegalState("producer thread panicked")))
            })
        })?;
        populator.scan_completed(&ThreadPoolScheduler::new(config.workers), tree)
    }
}
