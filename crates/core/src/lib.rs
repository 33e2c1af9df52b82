//! Core types for top-K identifier selection.

use std::io;

pub type RecordId = i64;
pub type Value = i64;
pub type ChunkIndex = usize;

#[derive(thiserror::Error, Debug)]
pub enum TopKError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("processing failed in chunk {chunk}: {reason}")]
    Processing { chunk: ChunkIndex, reason: String },
    #[error("worker pool failed: {0}")]
    WorkerPool(String),
    #[error("run cancelled before all chunks were processed")]
    Cancelled,
    #[error("input error: {0}")]
    Input(#[from] io::Error),
}

/// Validate a caller-supplied K. Only positive integers are accepted.
pub fn parse_k(raw: &str) -> Result<usize, TopKError> {
    let trimmed = raw.trim();
    let k: i128 = trimmed.parse().map_err(|_| {
        TopKError::InvalidParameter(format!("K must be a positive integer, got '{trimmed}'"))
    })?;
    if k <= 0 {
        return Err(TopKError::InvalidParameter(format!(
            "K must be a positive integer, got {k}"
        )));
    }
    usize::try_from(k)
        .map_err(|_| TopKError::InvalidParameter(format!("K is too large: {k}")))
}

pub mod record;

pub use record::{LineError, Record};
