#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that parses the command line and runs backup/prune cycles
//! until the process is asked to stop.

use std::process::ExitCode;

use clap::Parser;
use filekeeper_app::{AppResult, Cli, run_app};

/// Parses arguments and blocks until shutdown or the single run completes.
#[tokio::main]
async fn main() -> AppResult<ExitCode> {
    run_app(&Cli::parse()).await
}
