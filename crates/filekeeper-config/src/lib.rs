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

//! File-backed configuration for filekeeper.
//!
//! Layout: `model.rs` (document, validated config, run parameters),
//! `validate.rs` (parsing/validation helpers), `loader.rs` (JSON ingestion),
//! `destinations.rs` (single/list destination merging), `defaults.rs`.

pub mod defaults;
pub mod destinations;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use destinations::merge_unique;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, read_document};
pub use model::{
    ArchiveFormat, ArchivePolicy, ArchiveSection, CompressionAlgorithm, CompressionPolicy,
    CompressionSection, Config, ConfigDocument, GroupBy, LogFormat, RunParameters,
};
pub use validate::is_valid_remote_destination;
