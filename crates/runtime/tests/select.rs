use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use tk_core::{Record, TopKError};
use tk_runtime::input::read_lines;
use tk_runtime::{
    select_top_k_ids, select_top_k_ids_with, select_with_reducer, SelectConfig, ShutdownSignal,
};
use tk_views::{Chunk, ChunkReducer, HeapReducer, PartialResult};

fn small_chunks(k: usize, workers: usize) -> SelectConfig {
    SelectConfig {
        k,
        chunk_capacity: 3,
        workers,
        in_flight_per_worker: 2,
    }
}

fn run(lines: &[String], cfg: &SelectConfig) -> Vec<i64> {
    select_top_k_ids_with(
        lines.iter().cloned().map(Ok::<_, io::Error>),
        cfg,
        &ShutdownSignal::new(),
    )
    .unwrap()
    .ids
}

/// Deterministic pseudo-random records; values repeat so ties occur.
fn generated(n: usize, seed: u64) -> Vec<String> {
    let mut state = seed;
    (0..n)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let value = ((state >> 33) % 500) as i64 - 250;
            match i % 17 {
                5 => format!("{i}"),
                11 => format!("{i} not-a-number"),
                _ => format!("{i} {value}"),
            }
        })
        .collect()
}

fn valid_records(lines: &[String]) -> Vec<Record> {
    lines.iter().filter_map(|l| Record::parse_line(l).ok()).collect()
}

fn values_of(ids: &[i64], lines: &[String]) -> Vec<i64> {
    let by_id: HashMap<i64, i64> = valid_records(lines).into_iter().map(|r| (r.id, r.value)).collect();
    ids.iter().map(|id| by_id[id]).collect()
}

#[test]
fn picks_three_largest() {
    let lines = ["101 50", "102 30", "103 70", "104 20", "105 60", "106 40", "107 90"];
    assert_eq!(select_top_k_ids(lines, 3).unwrap(), vec![107, 103, 105]);
}

#[test]
fn handles_negative_values() {
    let lines = ["101 -50", "102 -30", "103 -70", "104 -20", "105 -60", "106 -40", "107 -90"];
    assert_eq!(select_top_k_ids(lines, 3).unwrap(), vec![104, 102, 106]);
}

#[test]
fn skips_malformed_lines() {
    let lines = ["101 50", "102", "103 70", "ABC 80", "105 60", "106 DE", "    90"];
    assert_eq!(select_top_k_ids(lines, 3).unwrap(), vec![103, 105, 101]);
}

#[test]
fn k_larger_than_input_returns_everything_sorted() {
    let lines = ["101 50", "102 30", "103 70", "104 20", "105 60", "106 40"];
    assert_eq!(
        select_top_k_ids(lines, 10).unwrap(),
        vec![103, 105, 101, 106, 102, 104]
    );
}

#[test]
fn empty_input_gives_empty_result() {
    assert!(select_top_k_ids(Vec::<String>::new(), 3).unwrap().is_empty());
}

#[test]
fn zero_k_gives_empty_result() {
    let lines = ["101 50", "102 30", "103 70"];
    assert!(select_top_k_ids(lines, 0).unwrap().is_empty());
}

#[test]
fn ties_keep_the_value_multiset() {
    let lines = ["101 50", "102 30", "103 70", "104 20", "105 60", "106 40", "107 70"];
    let ids = select_top_k_ids(lines, 3).unwrap();
    let lines: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(values_of(&ids, &lines), vec![70, 70, 60]);
    assert!(ids[..2].contains(&103) && ids[..2].contains(&107));
    assert_eq!(ids[2], 105);
}

#[test]
fn many_chunks_many_workers_match_a_full_sort() {
    let lines = generated(2_000, 7);
    let mut expected: Vec<i64> = valid_records(&lines).iter().map(|r| r.value).collect();
    expected.sort_unstable_by(|a, b| b.cmp(a));

    for (k, workers) in [(1, 1), (5, 2), (25, 4), (3_000, 3)] {
        let cfg = SelectConfig {
            chunk_capacity: 64,
            ..small_chunks(k, workers)
        };
        let ids = run(&lines, &cfg);
        let want = &expected[..k.min(expected.len())];
        assert_eq!(ids.len(), want.len(), "k={k} workers={workers}");
        assert_eq!(values_of(&ids, &lines), want, "k={k} workers={workers}");
    }
}

#[test]
fn result_dominates_excluded_records() {
    let lines = generated(500, 99);
    let ids = run(&lines, &small_chunks(20, 3));
    let chosen: Vec<i64> = values_of(&ids, &lines);
    let floor = *chosen.iter().min().unwrap();
    let excluded_max = valid_records(&lines)
        .iter()
        .filter(|r| !ids.contains(&r.id))
        .map(|r| r.value)
        .max()
        .unwrap();
    assert!(excluded_max <= floor);
    assert!(chosen.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn repeated_runs_are_reproducible() {
    let lines = generated(1_000, 3);
    let first = run(&lines, &small_chunks(40, 4));
    for workers in [1, 2, 8] {
        assert_eq!(run(&lines, &small_chunks(40, workers)), first);
    }
}

#[test]
fn metrics_count_lines_and_malformed() {
    let lines = generated(170, 11);
    let outcome = select_top_k_ids_with(
        lines.iter().cloned().map(Ok::<_, io::Error>),
        &small_chunks(4, 2),
        &ShutdownSignal::new(),
    )
    .unwrap();
    assert_eq!(outcome.metrics.lines_read, 170);
    assert_eq!(outcome.metrics.chunks_completed, 57);
    assert_eq!(outcome.metrics.malformed_lines, 20);
    assert!(outcome.metrics.candidates_merged <= 57 * 4);
}

struct FailOnSecondChunk;

impl ChunkReducer for FailOnSecondChunk {
    fn reduce(&self, chunk: &Chunk, k: usize) -> Result<PartialResult> {
        if chunk.index == 1 {
            bail!("disk on fire");
        }
        HeapReducer.reduce(chunk, k)
    }
}

#[test]
fn chunk_failure_reports_no_partial_answer() {
    let lines = generated(100, 5);
    let err = select_with_reducer(
        lines.into_iter().map(Ok::<_, io::Error>),
        &small_chunks(5, 2),
        &ShutdownSignal::new(),
        Arc::new(FailOnSecondChunk),
    )
    .unwrap_err();
    assert!(matches!(err, TopKError::Processing { chunk: 1, .. }), "{err}");
}

#[test]
fn cancelled_run_fails() {
    let shutdown = ShutdownSignal::new();
    shutdown.shutdown();
    let err = select_top_k_ids_with(
        generated(100, 1).into_iter().map(Ok::<_, io::Error>),
        &small_chunks(5, 2),
        &shutdown,
    )
    .unwrap_err();
    assert!(matches!(err, TopKError::Cancelled));
}

#[test]
fn invalid_config_fails_before_processing() {
    let cfg = SelectConfig {
        workers: 0,
        ..small_chunks(3, 1)
    };
    let err = select_top_k_ids_with(vec![Ok::<_, io::Error>("1 1")], &cfg, &ShutdownSignal::new())
        .unwrap_err();
    assert!(matches!(err, TopKError::InvalidParameter(_)));
}

#[test]
fn reads_records_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in ["101 50", "102 30", "oops", "103 70", "107 90"] {
        writeln!(file, "{line}").unwrap();
    }
    let lines = read_lines(file.path()).unwrap();
    let outcome =
        select_top_k_ids_with(lines, &small_chunks(2, 2), &ShutdownSignal::new()).unwrap();
    assert_eq!(outcome.ids, vec![107, 103]);
    assert_eq!(outcome.metrics.malformed_lines, 1);
}
