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

//! filekeeper application wiring.
//!
//! Layout: `cli.rs` (flags), `bootstrap.rs` (config, logging, startup),
//! `runner.rs` (interval loop and shutdown signals), `error.rs`.

/// Application bootstrap.
pub mod bootstrap;
/// Command-line flags.
pub mod cli;
/// Application error type.
pub mod error;
/// Cycle loop and signal handling.
pub mod runner;

pub use bootstrap::{check_config, run_app};
pub use cli::Cli;
pub use error::{AppError, AppResult};
pub use runner::{Schedule, run_loop, spawn_shutdown_listener};
