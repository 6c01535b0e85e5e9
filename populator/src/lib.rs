// Life of a population:
// 1. A store scan hands batches of property updates to `add`
// 2. Updates become index keys, checked against the size cap
// 3. Keys are buffered into blocks, sorted and spilled as parts
// 4. Writes made during the scan go to `process_external` and are logged
// 5. On `scan_completed`:
//     - Merge parts level by level on a scheduler
//     - Stream the last merge straight into the tree
//     - Replay the logged writes onto the tree
//     - Fail if two entities still share a value of a unique index
//
// System components:
//  - Key codec
//  - Block storage
//  - Part merger
//  - Conflict detector
//  - Work-synchronized ingestion

pub mod block;
pub mod config;
pub mod conflict;
pub mod error;
pub mod key;
pub mod merge;
pub mod populator;
pub mod range;
pub mod scheduler;
pub mod simulation;
pub mod tree;
pub mod work_sync;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod testing;

pub use config::{ConfigError, PopulatorConfig, SchedulerKind};
pub use error::{KeyError, PopulationError};
pub use populator::{
    BlockBasedPopulator, ExternalUpdate, IndexDescriptor, IndexUpdate, PopulationSummary,
};
