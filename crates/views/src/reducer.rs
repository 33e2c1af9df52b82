use std::cmp::Reverse;
use std::collections::BinaryHeap;

use anyhow::Result;
use tk_core::{Record, Value};
use tracing::warn;

use crate::{Chunk, PartialResult};

/// Min-heap holding the `capacity` largest records offered so far.
#[derive(Debug, Clone)]
pub struct BoundedTopK {
    capacity: usize,
    heap: BinaryHeap<Reverse<Record>>,
}

impl BoundedTopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Returns true when the record was kept.
    pub fn offer(&mut self, record: Record) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(record));
            return true;
        }
        match self.heap.peek_mut() {
            Some(mut min) if record.value > min.0.value => {
                *min = Reverse(record);
                true
            }
            _ => false,
        }
    }

    pub fn min_value(&self) -> Option<Value> {
        self.heap.peek().map(|r| r.0.value)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Heap contents in no particular order.
    pub fn into_records(self) -> Vec<Record> {
        self.heap.into_iter().map(|r| r.0).collect()
    }
}

/// Reduces one chunk to its local top-K. Implementations run on worker
/// threads and must not share mutable state.
pub trait ChunkReducer: Send + Sync + 'static {
    fn reduce(&self, chunk: &Chunk, k: usize) -> Result<PartialResult>;
}

/// Parses each line and folds valid records through a [`BoundedTopK`].
/// Malformed lines are logged and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapReducer;

impl ChunkReducer for HeapReducer {
    fn reduce(&self, chunk: &Chunk, k: usize) -> Result<PartialResult> {
        let mut top = BoundedTopK::new(k);
        let mut malformed = 0u64;
        for (line_no, line) in chunk.lines.iter().enumerate() {
            match Record::parse_line(line) {
                Ok(record) => {
                    top.offer(record);
                }
                Err(err) => {
                    malformed += 1;
                    warn!(chunk = chunk.index, line_no, line = %line.trim_end(), error = %err, "skipping malformed input line");
                }
            }
        }
        Ok(PartialResult {
            chunk: chunk.index,
            records: top.into_records(),
            lines_seen: chunk.lines.len() as u64,
            malformed,
        })
    }
}
