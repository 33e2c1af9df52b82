//! Top-K view builders: per-chunk bounded reduction and the global merge.

use serde::{Deserialize, Serialize};
use tk_core::{ChunkIndex, Record};

pub mod merge;
pub mod reducer;

pub use merge::merge_partials;
pub use reducer::{BoundedTopK, ChunkReducer, HeapReducer};

/// A contiguous slice of the input, the unit of parallel work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub index: ChunkIndex,
    pub lines: Vec<String>,
}

impl Chunk {
    pub fn new(index: ChunkIndex, lines: Vec<String>) -> Self {
        Self { index, lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Local top-K of one chunk plus the counters gathered while reducing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialResult {
    pub chunk: ChunkIndex,
    pub records: Vec<Record>,
    pub lines_seen: u64,
    pub malformed: u64,
}
