use std::iter::FusedIterator;

use tk_views::Chunk;

/// Lines per chunk when nothing else is configured.
pub const DEFAULT_CHUNK_CAPACITY: usize = 10_000;

/// Splits a line stream into chunks of at most `capacity` lines. The last
/// chunk may be shorter; an empty stream yields no chunks. A read error is
/// yielded once and ends the stream.
pub struct Partitioner<I> {
    lines: I,
    capacity: usize,
    next_index: usize,
    done: bool,
}

impl<I, E> Partitioner<I>
where
    I: Iterator<Item = Result<String, E>>,
{
    pub fn new(lines: I, capacity: usize) -> Self {
        Self {
            lines,
            capacity: capacity.max(1),
            next_index: 0,
            done: false,
        }
    }
}

impl<I, E> Iterator for Partitioner<I>
where
    I: Iterator<Item = Result<String, E>>,
{
    type Item = Result<Chunk, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut lines = Vec::with_capacity(self.capacity.min(1024));
        while lines.len() < self.capacity {
            match self.lines.next() {
                Some(Ok(line)) => lines.push(line),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if lines.is_empty() {
            return None;
        }
        let chunk = Chunk::new(self.next_index, lines);
        self.next_index += 1;
        Some(Ok(chunk))
    }
}

impl<I, E> FusedIterator for Partitioner<I> where I: Iterator<Item = Result<String, E>> {}
