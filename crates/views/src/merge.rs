use std::cmp::Ordering;

use tk_core::{Record, RecordId, Value};

fn descending(a: &Record, b: &Record) -> Ordering {
    b.value.cmp(&a.value)
}

/// Combine per-chunk results into the global top-K identifiers, largest value
/// first. Candidates with equal values keep the order they were supplied in.
pub fn merge_partials<I>(partials: I, k: usize) -> Vec<RecordId>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = Record>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<Record> = partials.into_iter().flatten().collect();
    if candidates.len() > k {
        // Stable sort below needs the winners in original relative order,
        // so select the cutoff value first and filter by it.
        let mut values: Vec<Value> = candidates.iter().map(|r| r.value).collect();
        let (_, cutoff, _) = values.select_nth_unstable_by(k - 1, |a, b| b.cmp(a));
        let cutoff = *cutoff;
        drop(values);
        let above = candidates.iter().filter(|r| r.value > cutoff).count();
        let mut ties_left = k - above;
        candidates.retain(|r| match r.value.cmp(&cutoff) {
            Ordering::Greater => true,
            Ordering::Equal if ties_left > 0 => {
                ties_left -= 1;
                true
            }
            _ => false,
        });
    }
    candidates.sort_by(descending);
    candidates.into_iter().map(|r| r.id).collect()
}
