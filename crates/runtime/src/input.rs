use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

/// Open `path` and stream its lines. Opening fails with the path in the
/// error message; later read errors surface through the iterator.
pub fn read_lines(path: impl AsRef<Path>) -> Result<impl Iterator<Item = io::Result<String>>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("cannot open input file '{}'", path.display()))?;
    Ok(BufReader::new(file).lines())
}
