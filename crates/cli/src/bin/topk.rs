use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tk_core::{parse_k, TopKError};
use tk_runtime::input::read_lines;
use tk_runtime::{
    init_tracing, select_top_k_ids_with, SelectConfig, SelectOutcome, ShutdownSignal,
    DEFAULT_CHUNK_CAPACITY,
};
use tracing::info;

/// Print the identifiers of the K largest values in a stream of
/// "<identifier> <value>" lines.
#[derive(Parser, Debug)]
#[command(name = "topk", version)]
struct Args {
    /// Input file; reads standard input when omitted.
    file: Option<PathBuf>,

    /// How many identifiers to report; prompted for when omitted.
    #[arg(short = 'k', long = "top", allow_hyphen_values = true)]
    k: Option<String>,

    /// Lines per chunk of parallel work.
    #[arg(long, default_value_t = DEFAULT_CHUNK_CAPACITY)]
    chunk_capacity: usize,

    /// Worker threads (defaults to the number of CPUs).
    #[arg(long)]
    workers: Option<usize>,

    /// Queued chunks allowed per worker.
    #[arg(long, default_value_t = 2)]
    in_flight: usize,

    /// Print run metrics as a JSON line on stderr.
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let args = Args::parse();

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        if handler_signal.is_shutdown() {
            std::process::exit(130);
        }
        eprintln!("\nInterrupt received, stopping (press Ctrl-C again to exit now)");
        handler_signal.shutdown();
    })
    .context("installing Ctrl-C handler")?;

    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    let raw_k = match args.k.clone() {
        Some(raw) => raw,
        None => prompt_k(&mut stdin)?,
    };
    let k = parse_k(&raw_k)?;

    let mut cfg = SelectConfig {
        k,
        chunk_capacity: args.chunk_capacity,
        in_flight_per_worker: args.in_flight,
        ..SelectConfig::default()
    };
    if let Some(workers) = args.workers {
        cfg.workers = workers;
    }

    let result = match &args.file {
        Some(path) => {
            info!(path = %path.display(), "reading records from file");
            select_top_k_ids_with(read_lines(path)?, &cfg, &shutdown)
        }
        None => {
            eprintln!("Enter data in the format '<identifier> <value>', one record per line:");
            select_top_k_ids_with(stdin.lines(), &cfg, &shutdown)
        }
    };

    match result {
        Ok(outcome) => {
            print_outcome(&outcome, k, args.stats, &mut io::stdout().lock(), &mut io::stderr())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(TopKError::Cancelled) => {
            eprintln!("Aborted by the user.");
            Ok(ExitCode::from(130))
        }
        Err(err) => Err(err.into()),
    }
}

fn prompt_k(input: &mut impl BufRead) -> Result<String> {
    eprint!("Enter the value of K: ");
    io::stderr().flush()?;
    let mut line = String::new();
    input.read_line(&mut line).context("reading K")?;
    Ok(line)
}

/// Identifiers go to `out`, one per line; the header and stats go to `diag`.
fn print_outcome(
    outcome: &SelectOutcome,
    k: usize,
    stats: bool,
    out: &mut impl Write,
    diag: &mut impl Write,
) -> Result<()> {
    writeln!(diag, "Identifiers of the {k} largest values:")?;
    diag.flush()?;
    for id in &outcome.ids {
        writeln!(out, "{id}")?;
    }
    out.flush()?;
    if stats {
        writeln!(diag, "{}", outcome.metrics.to_json_line("topk", Some(outcome.elapsed)))?;
    }
    Ok(())
}
