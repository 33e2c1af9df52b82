use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    lines_read: AtomicU64,
    chunks_dispatched: AtomicU64,
    chunks_completed: AtomicU64,
    malformed_lines: AtomicU64,
    candidates_merged: AtomicU64,
    in_flight_peak: AtomicU64,
}

impl MetricsRegistry {
    pub fn inc_lines_read(&self, delta: u64) {
        self.inner.lines_read.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_chunks_dispatched(&self, delta: u64) {
        self.inner.chunks_dispatched.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_chunks_completed(&self, delta: u64) {
        self.inner.chunks_completed.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_malformed_lines(&self, delta: u64) {
        self.inner.malformed_lines.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_candidates_merged(&self, delta: u64) {
        self.inner.candidates_merged.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn record_in_flight(&self, in_flight: u64) {
        self.inner.in_flight_peak.fetch_max(in_flight, Ordering::Relaxed);
    }

    /// Chunks handed to workers that have not completed yet.
    pub fn in_flight(&self) -> u64 {
        let dispatched = self.inner.chunks_dispatched.load(Ordering::Relaxed);
        let completed = self.inner.chunks_completed.load(Ordering::Relaxed);
        dispatched.saturating_sub(completed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_read: self.inner.lines_read.load(Ordering::Relaxed),
            chunks_dispatched: self.inner.chunks_dispatched.load(Ordering::Relaxed),
            chunks_completed: self.inner.chunks_completed.load(Ordering::Relaxed),
            malformed_lines: self.inner.malformed_lines.load(Ordering::Relaxed),
            candidates_merged: self.inner.candidates_merged.load(Ordering::Relaxed),
            in_flight_peak: self.inner.in_flight_peak.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub chunks_dispatched: u64,
    pub chunks_completed: u64,
    pub malformed_lines: u64,
    pub candidates_merged: u64,
    pub in_flight_peak: u64,
}

impl MetricsSnapshot {
    pub fn to_json_line(&self, label: &str, elapsed: Option<Duration>) -> String {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            label: &'a str,
            #[serde(flatten)]
            counters: &'a MetricsSnapshot,
            elapsed_ms: Option<u128>,
        }

        let payload = Snapshot {
            label,
            counters: self,
            elapsed_ms: elapsed.map(|d| d.as_millis()),
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"))
    }
}

pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
