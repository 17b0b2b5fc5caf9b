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
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Backup, archive and prune engine.
//!
//! Layout: `select.rs` (tree walk and age classification), `compress.rs`
//! (single-file copy/gzip), `archive.rs` (dated batch archives),
//! `transport.rs` (remote copies), `replicate.rs` (per-file fan-out),
//! `prune.rs` (deletion pass with breaker), `service.rs` (cycle orchestration),
//! `result.rs` (accounting), `model/`, `error.rs`.

pub mod archive;
pub mod compress;
pub mod error;
pub mod model;
pub mod prune;
pub mod replicate;
pub mod result;
pub mod select;
pub mod service;
pub mod transport;

pub use archive::{ArchiveStats, archive_name, create_archive, detect_format, extract_archive};
pub use compress::{CompressionStats, compress_file, decompress_file, destination_path};
pub use error::{FsOpsError, FsOpsResult};
pub use model::FileRecord;
pub use prune::{PrunePlan, PruneScope, prune, prune_with};
pub use replicate::{Replication, Replicator};
pub use result::{FileError, Operation, RunResult};
pub use select::{Selection, Selector, cutoff_from, select_files};
pub use service::{BackupService, CycleReport};
pub use transport::{RemoteTransport, ScpTransport, remote_target};
