//! Single-file copy and gzip compression.
//!
//! # Design
//! - Output is written under a `.partial` name and renamed once flushed, so an
//!   interrupted copy never leaves a file that looks complete.
//! - The destination suffix is derived from the policy alone.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use filekeeper_config::{CompressionAlgorithm, CompressionPolicy};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{FsOpsError, FsOpsResult};
use crate::result::ratio_percent;

const PARTIAL_SUFFIX: &str = ".partial";

/// Sizes and timing of one produced artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionStats {
    /// Final path of the artifact.
    pub destination: PathBuf,
    /// Bytes read from the source.
    pub original_bytes: u64,
    /// Bytes written to the artifact.
    pub compressed_bytes: u64,
    /// Algorithm applied.
    pub algorithm: CompressionAlgorithm,
    /// Wall time spent producing the artifact.
    pub duration: Duration,
}

impl CompressionStats {
    /// Artifact size as a percentage of the source; `100` for an empty source.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        ratio_percent(self.original_bytes, self.compressed_bytes)
    }

    /// Percentage of the source size saved.
    #[must_use]
    pub fn space_saved(&self) -> f64 {
        100.0 - self.ratio()
    }
}

/// Final artifact path for `destination` under `policy`.
#[must_use]
pub fn destination_path(destination: &Path, policy: CompressionPolicy) -> PathBuf {
    with_suffix(destination, policy.effective_algorithm().extension())
}

/// Copy or compress `source` to `destination` (suffix applied from `policy`).
///
/// The parent directory of `destination` must already exist.
///
/// # Errors
///
/// Returns an IO error if the source cannot be read or the artifact cannot be written.
pub fn compress_file(
    source: &Path,
    destination: &Path,
    policy: CompressionPolicy,
) -> FsOpsResult<CompressionStats> {
    let started = Instant::now();
    let algorithm = policy.effective_algorithm();
    let target = destination_path(destination, policy);
    let partial = partial_path(&target);

    let input = File::open(source).map_err(|err| FsOpsError::io("compress.open", source, err))?;
    let original_bytes = input
        .metadata()
        .map_err(|err| FsOpsError::io("compress.stat", source, err))?
        .len();
    let output =
        File::create(&partial).map_err(|err| FsOpsError::io("compress.create", &partial, err))?;

    let written = match algorithm {
        CompressionAlgorithm::None => copy_verbatim(input, output),
        CompressionAlgorithm::Gzip => copy_gzip(input, output, policy.level),
    };
    if let Err(err) = written {
        discard_partial(&partial);
        return Err(FsOpsError::io("compress.write", &target, err));
    }

    finalize(&partial, &target)?;
    let compressed_bytes = fs::metadata(&target)
        .map_err(|err| FsOpsError::io("compress.stat_output", &target, err))?
        .len();

    Ok(CompressionStats {
        destination: target,
        original_bytes,
        compressed_bytes,
        algorithm,
        duration: started.elapsed(),
    })
}

/// Restore an artifact produced by [`compress_file`]; `.gz` inputs are
/// decompressed, anything else is copied verbatim. Returns the bytes written.
///
/// # Errors
///
/// Returns an IO error if the artifact cannot be read or is not valid gzip.
pub fn decompress_file(source: &Path, destination: &Path) -> FsOpsResult<u64> {
    let input = File::open(source).map_err(|err| FsOpsError::io("decompress.open", source, err))?;
    let mut output = File::create(destination)
        .map_err(|err| FsOpsError::io("decompress.create", destination, err))?;
    let is_gzip = source
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("gz"));
    let copied = if is_gzip {
        io::copy(&mut GzDecoder::new(BufReader::new(input)), &mut output)
    } else {
        io::copy(&mut BufReader::new(input), &mut output)
    };
    copied.map_err(|err| FsOpsError::io("decompress.write", destination, err))
}

fn copy_verbatim(input: File, output: File) -> io::Result<()> {
    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);
    io::copy(&mut reader, &mut writer)?;
    let output = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    output.sync_all()
}

fn copy_gzip(input: File, output: File, level: u32) -> io::Result<()> {
    let mut reader = BufReader::new(input);
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::new(level));
    io::copy(&mut reader, &mut encoder)?;
    let writer = encoder.finish()?;
    let output = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    output.sync_all()
}

pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn partial_path(target: &Path) -> PathBuf {
    with_suffix(target, PARTIAL_SUFFIX)
}

pub(crate) fn finalize(partial: &Path, target: &Path) -> FsOpsResult<()> {
    fs::rename(partial, target).map_err(|err| {
        discard_partial(partial);
        FsOpsError::io("finalize.rename", target, err)
    })
}

pub(crate) fn discard_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            tracing::debug!(path = %partial.display(), error = %err, "partial file left behind");
        }
        _ => {}
    }
}
