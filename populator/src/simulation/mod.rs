//! Deterministic population simulation.
//!
//! A seeded [`WorkloadGenerator`] produces scan output with a controlled
//! amount of value collisions and re-scanned entities. The [`Simulator`] feeds
//! it through a real [`crate::BlockBasedPopulator`] and the
//! [`InvariantChecker`] compares the outcome with a model computed directly
//! from the generated updates.
//!
//! Given the same seed, the workload and the expected outcome are identical.
//!
//! # Usage
//!
//! ```ignore
//! use populator::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_unique(true);
//! let result = Simulator::new(config).run(&spill_parent);
//! assert!(result.passed());
//! ```

mod invariants;
mod simulator;
mod workload;

pub use invariants::{Expected, InvariantChecker, InvariantViolation};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
pub use workload::{ValueKind, WorkloadConfig, WorkloadGenerator};
