// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressline: single-printer job dispatcher
//
// Entry point. Initialises logging, loads the dispatch config, submits the
// jobs given on the command line to a simulated printer, and reports what
// was printed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use pressline_core::config::DispatchConfig;
use pressline_core::error::{PresslineError, Result};
use pressline_core::paper::{IsoPaperSize, MediaSize};
use pressline_core::types::{Document, PrintOutcome, Printable};
use pressline_dispatch::{PrintDispatcher, SimulatedPrinter};

#[derive(Debug, Parser)]
#[command(name = "pressline")]
#[command(about = "Dispatch print jobs to a simulated printer", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON dispatch config (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Divide every print duration by this factor
    #[arg(long, default_value_t = 1)]
    speedup: u32,

    /// Cancel whatever is printing this many milliseconds after submission
    #[arg(long, value_name = "MILLIS")]
    cancel_after_ms: Option<u64>,

    /// Make a document fail every time it is printed (repeatable)
    #[arg(long = "fail", value_name = "NAME=REASON", value_parser = parse_fault)]
    faults: Vec<(String, String)>,

    /// Jobs to print, as NAME[:SIZE[:MILLIS]], e.g. report:A3:1500
    #[arg(required = true, value_name = "JOB")]
    jobs: Vec<Document>,
}

fn parse_fault(s: &str) -> std::result::Result<(String, String), String> {
    let (name, reason) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=REASON, got {s:?}"))?;
    Ok((name.to_string(), reason.to_string()))
}

/// ISO name when the size is a standard one, dimensions otherwise.
fn size_label(size: MediaSize) -> String {
    IsoPaperSize::from_size(size).map_or_else(|| size.to_string(), |iso| iso.to_string())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Pressline starting");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "pressline failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => DispatchConfig::load(path)?,
        None => DispatchConfig::default(),
    };

    let printer = cli
        .faults
        .into_iter()
        .fold(SimulatedPrinter::new().with_speedup(cli.speedup), |printer, (name, reason)| {
            printer.with_fault(name, reason)
        });
    let dispatcher = PrintDispatcher::start(Arc::new(printer), &config)?;

    let handles: Vec<_> = cli
        .jobs
        .into_iter()
        .map(|document| dispatcher.submit_and_await(document.shared()))
        .collect();

    if let Some(millis) = cli.cancel_after_ms {
        std::thread::sleep(Duration::from_millis(millis));
        info!(after_ms = millis, "cancelling the active job");
        dispatcher.cancel_current();
    }

    let (mut completed, mut cancelled) = (0usize, 0usize);
    for handle in handles {
        match handle.wait() {
            Some(PrintOutcome::Completed) => completed += 1,
            Some(PrintOutcome::Cancelled) => cancelled += 1,
            None => return Err(PresslineError::LedgerUnavailable),
        }
    }
    if !dispatcher.wait_until_drained() {
        warn!("ledger did not report drained");
    }

    println!("printed {completed} document(s), cancelled {cancelled}:");
    for document in dispatcher.list_printed() {
        println!(
            "  {:<24} {:>12} {:>8} ms",
            document.name(),
            size_label(document.size()),
            document.print_duration().as_millis()
        );
    }
    println!(
        "average print time: {} ms",
        dispatcher.average_print_time().as_millis()
    );

    let unprinted = dispatcher.shutdown();
    if !unprinted.is_empty() {
        warn!(count = unprinted.len(), "documents left unprinted");
    }
    Ok(())
}
