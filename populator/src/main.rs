// Forbid unwrap() in production code to prevent panics from bad input.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::io::{self, BufRead};
use std::thread;

use clap::Parser;
use populator::key::Value;
use populator::scheduler::{ThreadPoolScheduler, TokioScheduler};
use populator::simulation::WorkloadGenerator;
use populator::tree::MemoryTree;
use populator::{
    BlockBasedPopulator, IndexDescriptor, IndexUpdate, PopulationError, PopulationSummary,
    PopulatorConfig, SchedulerKind,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BATCH_SIZE: usize = 256;

/// Builds one property index from `entity_id,value` lines on stdin.
#[derive(Parser, Debug)]
#[command(author, version, about = "Populates a property index through external sort-merge")]
struct Args {
    /// Index name used in logs and errors.
    #[arg(long, default_value = "index")]
    name: String,

    /// Fail when two entities share a value.
    #[arg(long)]
    unique: bool,

    /// Threads feeding updates into the populator.
    #[arg(long, default_value_t = 4)]
    producers: usize,

    /// Generate this many updates instead of reading stdin.
    #[arg(long)]
    generate: Option<usize>,

    /// Seed for generated updates.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

/// Integer, float and boolean literals keep their type. Anything else is
/// text.
fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = raw.parse::<f64>() {
        return Value::from(n);
    }
    match raw {
        "true" => Value::from(true),
        "false" => Value::from(false),
        _ => Value::from(raw.trim_matches('"')),
    }
}

fn parse_line(line: &str) -> Result<Option<IndexUpdate>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (id, value) = line
        .split_once(',')
        .ok_or_else(|| format!("expected 'entity_id,value', got '{line}'"))?;
    let entity_id = id
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{id}' is not a valid entity id"))?;
    Ok(Some(IndexUpdate::new(entity_id, vec![parse_value(value)])))
}

fn read_updates(input: impl BufRead) -> Result<Vec<IndexUpdate>, String> {
    let mut updates = Vec::new();
    for (number, line) in input.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read input: {e}"))?;
        if let Some(update) = parse_line(&line).map_err(|e| format!("line {}: {e}", number + 1))? {
            updates.push(update);
        }
    }
    Ok(updates)
}

/// Feeds `updates` from `producers` threads, then merges into an in-memory
/// tree with the configured scheduler.
fn populate(
    populator: &BlockBasedPopulator,
    config: &PopulatorConfig,
    updates: Vec<IndexUpdate>,
    producers: usize,
) -> Result<PopulationSummary, PopulationError> {
    let batches: Vec<Vec<IndexUpdate>> = updates
        .chunks(BATCH_SIZE)
        .map(<[IndexUpdate]>::to_vec)
        .collect();
    let producers = producers.max(1);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..producers)
            .map(|producer| {
                let batches = &batches;
                scope.spawn(move || {
                    batches
                        .iter()
                        .skip(producer)
                        .step_by(producers)
                        .try_for_each(|batch| populator.add(batch.clone()))
                })
            })
            .collect();
        handles.into_iter().try_for_each(|handle| {
            handle
                .join()
                .unwrap_or(Err(PopulationError::IllegalState("producer thread panicked")))
        })
    })?;

    let mut tree = MemoryTree::new(populator.layout(), config.page_size);
    match config.scheduler {
        SchedulerKind::Threads => {
            populator.scan_completed(&ThreadPoolScheduler::new(config.workers), &mut tree)
        }
        SchedulerKind::Tokio => {
            let scheduler = TokioScheduler::new(config.workers)?;
            populator.scan_completed(&scheduler, &mut tree)
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "populator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match PopulatorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    let args = Args::parse();

    tracing::info!(
        "Loaded configuration: block_size={}, merge_factor={}, workers={}, page_size={}, scheduler={:?}",
        config.block_size,
        config.merge_factor,
        config.workers,
        config.page_size,
        config.scheduler
    );

    let updates = match args.generate {
        Some(count) => {
            let mut generator = WorkloadGenerator::new(args.seed);
            (0..count).map(|_| generator.next_update()).collect()
        }
        None => match read_updates(io::stdin().lock()) {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!("{e}");
                std::process::exit(1);
            }
        },
    };

    let descriptor = IndexDescriptor::new(args.name, args.unique, 1);
    let populator = match BlockBasedPopulator::new(descriptor, &config) {
        Ok(populator) => populator,
        Err(e) => {
            tracing::error!("Failed to start population: {e}");
            std::process::exit(1);
        }
    };

    let outcome = populate(&populator, &config, updates, args.producers);
    populator.close(outcome.is_ok());
    match outcome {
        Ok(summary) => tracing::info!(
            "Populated {} entries ({} distinct values) from {} parts in {} merge levels, {} duplicates collapsed",
            summary.entries_written,
            summary.distinct_values,
            summary.parts_spilled,
            summary.merge_levels,
            summary.duplicates_collapsed
        ),
        Err(e) => {
            tracing::error!("Population failed: {e}");
            std::process::exit(1);
        }
    }
}
