//! Populator configuration.
//!
//! Configuration is loaded from environment variables, with a default for
//! every setting.
//!
//! # Environment Variables
//!
//! - `POPULATOR_BLOCK_SIZE`: In-memory block budget in bytes (default: 1 MiB)
//! - `POPULATOR_MERGE_FACTOR`: Parts merged by one job (default: `8`)
//! - `POPULATOR_WORKERS`: Merge worker threads (default: available
//!   parallelism, at most 8)
//! - `POPULATOR_PAGE_SIZE`: Page size of the target tree (default: `8192`)
//! - `POPULATOR_SPILL_DIRECTORY`: Where parts are spilled (default:
//!   `<tmp>/index-population`)
//! - `POPULATOR_SCHEDULER`: `threads` or `tokio` (default: `threads`)
//!
//! # Invariants
//!
//! - `block_size >= MIN_BLOCK_SIZE`
//! - `merge_factor >= 2`
//! - `workers >= 1`
//! - `page_size >= MIN_PAGE_SIZE`

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::tree::key_value_size_cap;

/// Which scheduler runs merge jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerKind {
    #[default]
    Threads,
    Tokio,
}

impl FromStr for SchedulerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threads" => Ok(Self::Threads),
            "tokio" => Ok(Self::Tokio),
            other => Err(format!("'{other}' is not one of: threads, tokio")),
        }
    }
}

/// Error returned when a setting is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

fn invalid(name: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Populator configuration.
///
/// # Post-conditions
///
/// Every constructor and `with_*` setter enforces the module invariants.
#[derive(Debug, Clone)]
pub struct PopulatorConfig {
    /// Bytes buffered in memory before a block is sorted and spilled.
    pub block_size: usize,
    /// Maximum number of parts merged by one job.
    pub merge_factor: usize,
    /// Merge jobs run concurrently.
    pub workers: usize,
    /// Page size of the tree the population feeds. Determines the size cap.
    pub page_size: usize,
    /// Parent directory of per-population spill directories.
    pub spill_directory: PathBuf,
    pub scheduler: SchedulerKind,
}

impl Default for PopulatorConfig {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            merge_factor: Self::DEFAULT_MERGE_FACTOR,
            workers: Self::default_workers(),
            page_size: Self::DEFAULT_PAGE_SIZE,
            spill_directory: std::env::temp_dir().join(Self::DEFAULT_SPILL_SUBDIRECTORY),
            scheduler: SchedulerKind::default(),
        }
    }
}

impl PopulatorConfig {
    pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;
    pub const MIN_BLOCK_SIZE: usize = 1024;
    pub const DEFAULT_MERGE_FACTOR: usize = 8;
    pub const MAX_DEFAULT_WORKERS: usize = 8;
    pub const DEFAULT_PAGE_SIZE: usize = 8192;
    pub const MIN_PAGE_SIZE: usize = 256;
    pub const DEFAULT_SPILL_SUBDIRECTORY: &'static str = "index-population";

    fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .min(Self::MAX_DEFAULT_WORKERS)
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed
    /// or breaks an invariant.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "POPULATOR_BLOCK_SIZE")? {
            config = config.with_block_size(v)?;
        }
        if let Some(v) = parse_var(&lookup, "POPULATOR_MERGE_FACTOR")? {
            config = config.with_merge_factor(v)?;
        }
        if let Some(v) = parse_var(&lookup, "POPULATOR_WORKERS")? {
            config = config.with_workers(v)?;
        }
        if let Some(v) = parse_var(&lookup, "POPULATOR_PAGE_SIZE")? {
            config = config.with_page_size(v)?;
        }
        if let Some(v) = lookup("POPULATOR_SPILL_DIRECTORY") {
            config = config.with_spill_directory(v);
        }
        if let Some(v) = lookup("POPULATOR_SCHEDULER") {
            config.scheduler = v
                .parse()
                .map_err(|message: String| invalid("POPULATOR_SCHEDULER", message))?;
        }
        Ok(config)
    }

    pub fn with_block_size(mut self, block_size: usize) -> Result<Self, ConfigError> {
        if block_size < Self::MIN_BLOCK_SIZE {
            return Err(invalid(
                "POPULATOR_BLOCK_SIZE",
                format!("must be at least {}", Self::MIN_BLOCK_SIZE),
            ));
        }
        self.block_size = block_size;
        Ok(self)
    }

    pub fn with_merge_factor(mut self, merge_factor: usize) -> Result<Self, ConfigError> {
        if merge_factor < 2 {
            return Err(invalid("POPULATOR_MERGE_FACTOR", "must be at least 2"));
        }
        self.merge_factor = merge_factor;
        Ok(self)
    }

    pub fn with_workers(mut self, workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(invalid("POPULATOR_WORKERS", "must be at least 1"));
        }
        self.workers = workers;
        Ok(self)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Result<Self, ConfigError> {
        if page_size < Self::MIN_PAGE_SIZE {
            return Err(invalid(
                "POPULATOR_PAGE_SIZE",
                format!("must be at least {}", Self::MIN_PAGE_SIZE),
            ));
        }
        self.page_size = page_size;
        Ok(self)
    }

    #[must_use]
    pub fn with_spill_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.spill_directory = directory.into();
        self
    }

    #[must_use]
    pub const fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Largest key plus value an entry may encode to.
    #[must_use]
    pub const fn key_value_size_cap(&self) -> usize {
        key_value_size_cap(self.page_size)
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<usize>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(name, format!("'{value}' is not a non-negative integer")))
        })
        .transpose()
}
