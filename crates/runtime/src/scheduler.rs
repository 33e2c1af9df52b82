//! Fan chunks out to the worker pool and gather every partial result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{self as channel, SendTimeoutError};
use tk_core::{ChunkIndex, TopKError};
use tk_views::{Chunk, ChunkReducer, PartialResult};
use tracing::{debug, error};

use crate::metrics::MetricsRegistry;
use crate::shutdown::ShutdownSignal;
use crate::{start_workers, SelectConfig};

/// How often a blocked dispatcher re-checks the stop flags.
const SUBMIT_POLL: Duration = Duration::from_millis(50);

struct ChunkFailure {
    chunk: ChunkIndex,
    reason: String,
}

enum Halt {
    Cancelled,
    WorkersGone,
}

/// Reduce every chunk on the worker pool and return the partial results
/// ordered by chunk index. Returns only after every worker has finished.
/// Any chunk failure, input error or cancellation fails the whole run.
pub fn run_chunks<C, E, R>(
    chunks: C,
    cfg: &SelectConfig,
    reducer: Arc<R>,
    shutdown: &ShutdownSignal,
    metrics: &MetricsRegistry,
) -> Result<Vec<PartialResult>, TopKError>
where
    C: IntoIterator<Item = Result<Chunk, E>>,
    E: Into<TopKError>,
    R: ChunkReducer,
{
    let (tx, rx) = channel::bounded::<Chunk>(cfg.queue_capacity());
    let abort = ShutdownSignal::new();
    let k = cfg.k;

    let guards = {
        let abort = abort.clone();
        let cancel = shutdown.clone();
        let metrics = metrics.clone();
        start_workers(cfg.workers, move |index| {
            debug!(worker = index, "worker started");
            let mut partials = Vec::new();
            while let Ok(chunk) = rx.recv() {
                if abort.is_shutdown() || cancel.is_shutdown() {
                    break;
                }
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| reducer.reduce(&chunk, k)));
                let reason = match outcome {
                    Ok(Ok(partial)) => {
                        metrics.inc_malformed_lines(partial.malformed);
                        metrics.inc_chunks_completed(1);
                        partials.push(partial);
                        continue;
                    }
                    Ok(Err(err)) => format!("{err:#}"),
                    Err(payload) => panic_message(payload),
                };
                abort.shutdown();
                error!(worker = index, chunk = chunk.index, %reason, "chunk reduction failed");
                return Err(ChunkFailure {
                    chunk: chunk.index,
                    reason,
                });
            }
            debug!(worker = index, chunks = partials.len(), "worker finished");
            Ok(partials)
        })?
    };

    let mut halted: Option<TopKError> = None;
    let mut dispatched = 0usize;
    for item in chunks {
        if shutdown.is_shutdown() {
            halted = Some(TopKError::Cancelled);
            break;
        }
        if abort.is_shutdown() {
            break;
        }
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(err) => {
                halted = Some(err.into());
                break;
            }
        };
        let lines = chunk.len() as u64;
        match submit(&tx, chunk, &abort, shutdown) {
            Ok(()) => {
                dispatched += 1;
                metrics.inc_lines_read(lines);
                metrics.inc_chunks_dispatched(1);
                metrics.record_in_flight(metrics.in_flight());
            }
            Err(Halt::Cancelled) => {
                halted = Some(TopKError::Cancelled);
                break;
            }
            Err(Halt::WorkersGone) => break,
        }
    }
    if halted.is_some() {
        abort.shutdown();
    }
    drop(tx);

    let mut partials = Vec::new();
    let mut failure: Option<TopKError> = None;
    for outcome in guards.join() {
        match outcome {
            Ok(Ok(mut worker_partials)) => partials.append(&mut worker_partials),
            Ok(Err(ChunkFailure { chunk, reason })) => {
                failure.get_or_insert(TopKError::Processing { chunk, reason });
            }
            Err(reason) => {
                failure.get_or_insert(TopKError::WorkerPool(reason));
            }
        }
    }

    if let Some(err) = failure.or(halted) {
        return Err(err);
    }
    // Workers drop queued chunks once cancelled, so a late signal still
    // leaves the ranking incomplete.
    if shutdown.is_shutdown() {
        return Err(TopKError::Cancelled);
    }
    if partials.len() != dispatched {
        return Err(TopKError::WorkerPool(format!(
            "{} of {dispatched} chunks completed",
            partials.len()
        )));
    }

    partials.sort_unstable_by_key(|p| p.chunk);
    Ok(partials)
}

/// Blocking send that gives up when the run is cancelled or aborted.
fn submit(
    tx: &channel::Sender<Chunk>,
    mut chunk: Chunk,
    abort: &ShutdownSignal,
    shutdown: &ShutdownSignal,
) -> Result<(), Halt> {
    loop {
        match tx.send_timeout(chunk, SUBMIT_POLL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(back)) => {
                if shutdown.is_shutdown() {
                    return Err(Halt::Cancelled);
                }
                if abort.is_shutdown() {
                    return Err(Halt::WorkersGone);
                }
                chunk = back;
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(Halt::WorkersGone),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        String::from("panicked")
    }
}
