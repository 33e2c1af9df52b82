//! Runtime for parallel top-K selection: partitioning, the worker pool and
//! the end-to-end entry points.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use timely::communication::WorkerGuards;
use tk_core::{RecordId, TopKError};
use tk_views::{merge_partials, ChunkReducer, HeapReducer};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod input;
pub mod metrics;
pub mod partition;
pub mod scheduler;
pub mod shutdown;

pub use metrics::{MetricsRegistry, MetricsSnapshot, RunTimer};
pub use partition::{Partitioner, DEFAULT_CHUNK_CAPACITY};
pub use shutdown::ShutdownSignal;

/// Install the global fmt subscriber. Honors `RUST_LOG`, defaults to INFO and
/// writes to stderr so stdout carries only results.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Start `workers` timely worker threads, each running `f` with its index.
/// The caller thread is free until it joins the returned guards.
pub fn start_workers<T, F>(workers: usize, f: F) -> Result<WorkerGuards<T>, TopKError>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    info!(%workers, "starting worker pool");
    timely::execute(timely::Config::process(workers), move |worker| {
        let index = worker.index();
        f(index)
    })
    .map_err(TopKError::WorkerPool)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectConfig {
    pub k: usize,
    pub chunk_capacity: usize,
    pub workers: usize,
    pub in_flight_per_worker: usize,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            k: 10,
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
            workers: num_cpus::get().max(1),
            in_flight_per_worker: 2,
        }
    }
}

impl SelectConfig {
    pub fn with_k(k: usize) -> Self {
        Self { k, ..Self::default() }
    }

    /// Chunks that may wait in the work queue at once.
    pub fn queue_capacity(&self) -> usize {
        self.workers.saturating_mul(self.in_flight_per_worker).max(1)
    }

    pub fn validate(&self) -> Result<(), TopKError> {
        if self.chunk_capacity == 0 {
            return Err(TopKError::InvalidParameter("chunk capacity must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(TopKError::InvalidParameter("worker count must be at least 1".into()));
        }
        if self.in_flight_per_worker == 0 {
            return Err(TopKError::InvalidParameter(
                "in-flight chunks per worker must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SelectOutcome {
    /// Winning identifiers, largest value first.
    pub ids: Vec<RecordId>,
    pub metrics: MetricsSnapshot,
    pub elapsed: Duration,
}

/// Identifiers of the `k` largest values among `lines`, using the default
/// configuration. `k == 0` and empty input both give an empty list.
pub fn select_top_k_ids<I>(lines: I, k: usize) -> Result<Vec<RecordId>, TopKError>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let lines = lines.into_iter().map(Ok::<_, io::Error>);
    select_top_k_ids_with(lines, &SelectConfig::with_k(k), &ShutdownSignal::new()).map(|o| o.ids)
}

/// Like [`select_top_k_ids`] over a fallible line source, with explicit
/// configuration and a caller-owned shutdown signal.
pub fn select_top_k_ids_with<I, S>(
    lines: I,
    cfg: &SelectConfig,
    shutdown: &ShutdownSignal,
) -> Result<SelectOutcome, TopKError>
where
    I: IntoIterator<Item = io::Result<S>>,
    S: Into<String>,
{
    select_with_reducer(lines, cfg, shutdown, Arc::new(HeapReducer))
}

/// Full pipeline with a caller-supplied chunk reducer.
pub fn select_with_reducer<I, S, R>(
    lines: I,
    cfg: &SelectConfig,
    shutdown: &ShutdownSignal,
    reducer: Arc<R>,
) -> Result<SelectOutcome, TopKError>
where
    I: IntoIterator<Item = io::Result<S>>,
    S: Into<String>,
    R: ChunkReducer,
{
    cfg.validate()?;
    let timer = RunTimer::start();
    let metrics = MetricsRegistry::default();
    if cfg.k == 0 {
        return Ok(SelectOutcome {
            ids: Vec::new(),
            metrics: metrics.snapshot(),
            elapsed: timer.elapsed(),
        });
    }

    info!(
        k = cfg.k,
        chunk_capacity = cfg.chunk_capacity,
        workers = cfg.workers,
        queue_capacity = cfg.queue_capacity(),
        "starting top-k selection"
    );
    let lines = lines.into_iter().map(|line| line.map(Into::<String>::into));
    let chunks = Partitioner::new(lines, cfg.chunk_capacity);
    let partials = scheduler::run_chunks(chunks, cfg, reducer, shutdown, &metrics)?;

    let candidates: usize = partials.iter().map(|p| p.records.len()).sum();
    metrics.inc_candidates_merged(candidates as u64);
    let ids = merge_partials(partials.into_iter().map(|p| p.records), cfg.k);

    let snapshot = metrics.snapshot();
    info!(
        selected = ids.len(),
        lines = snapshot.lines_read,
        chunks = snapshot.chunks_completed,
        malformed = snapshot.malformed_lines,
        candidates,
        "top-k selection finished"
    );
    Ok(SelectOutcome {
        ids,
        metrics: snapshot,
        elapsed: timer.elapsed(),
    })
}
