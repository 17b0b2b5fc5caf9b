//! Dated batch archives and their extraction.
//!
//! # Design
//! - Names are a pure function of `(date, group_by, format)`; an existing archive is
//!   never overwritten, a `-N` counter is inserted instead.
//! - Every source is stat'ed before the container is opened; one failure aborts the
//!   whole archive for that destination.
//! - Tar variants stream entries straight from disk. Zip entries use deflate.
//! - Extraction rejects absolute entry names and parent traversal.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use filekeeper_config::{ArchiveFormat, ArchivePolicy, GroupBy};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::compress::{discard_partial, finalize, partial_path};
use crate::error::{FsOpsError, FsOpsResult};
use crate::result::ratio_percent;

const ARCHIVE_PREFIX: &str = "backup-";

/// Outcome of building one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Archive written; `None` when there was nothing to archive.
    pub path: Option<PathBuf>,
    /// Entries written.
    pub files: usize,
    /// Sum of the source sizes.
    pub total_bytes: u64,
    /// Size of the archive on disk.
    pub archive_bytes: u64,
}

impl ArchiveStats {
    /// Archive size as a percentage of the source bytes.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        ratio_percent(self.total_bytes, self.archive_bytes)
    }
}

/// Deterministic archive file name for `reference`.
///
/// Daily archives are `backup-YYYY-MM-DD`, weekly ones use the ISO week
/// (`backup-YYYY-Www`) and monthly ones `backup-YYYY-MM`, followed by the
/// format extension.
#[must_use]
pub fn archive_name(reference: &impl Datelike, group_by: GroupBy, format: ArchiveFormat) -> String {
    format!("{}{}", archive_stem(reference, group_by), format.extension())
}

fn archive_stem(reference: &impl Datelike, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Daily => format!(
            "{ARCHIVE_PREFIX}{:04}-{:02}-{:02}",
            reference.year(),
            reference.month(),
            reference.day()
        ),
        GroupBy::Weekly => {
            let week = reference.iso_week();
            format!("{ARCHIVE_PREFIX}{:04}-W{:02}", week.year(), week.week())
        }
        GroupBy::Monthly => format!(
            "{ARCHIVE_PREFIX}{:04}-{:02}",
            reference.year(),
            reference.month()
        ),
    }
}

/// Build one archive in `destination_dir` from `files` (source path to entry name).
///
/// An empty map produces no file and a zeroed [`ArchiveStats`].
///
/// # Errors
///
/// Returns an error if any source cannot be stat'ed or read, or if the archive
/// cannot be written. No partial archive is left behind.
pub fn create_archive(
    files: &BTreeMap<PathBuf, String>,
    reference: NaiveDate,
    policy: ArchivePolicy,
    destination_dir: &Path,
) -> FsOpsResult<ArchiveStats> {
    if files.is_empty() {
        return Ok(ArchiveStats::default());
    }

    let mut total_bytes = 0_u64;
    for source in files.keys() {
        let metadata =
            fs::metadata(source).map_err(|err| FsOpsError::io("archive.stat", source, err))?;
        total_bytes += metadata.len();
    }

    fs::create_dir_all(destination_dir)
        .map_err(|err| FsOpsError::io("archive.create_dir", destination_dir, err))?;
    let target = unused_archive_path(destination_dir, reference, policy);
    let partial = partial_path(&target);
    let output =
        File::create(&partial).map_err(|err| FsOpsError::io("archive.create", &partial, err))?;

    let written = match policy.format {
        ArchiveFormat::Tar => write_tar(BufWriter::new(output), files, &partial)
            .and_then(|writer| finish_buffered(writer, &partial)),
        ArchiveFormat::TarGz => {
            let encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
            write_tar(encoder, files, &partial).and_then(|encoder| {
                let writer = encoder
                    .finish()
                    .map_err(|err| FsOpsError::io("archive.finish_gzip", &partial, err))?;
                finish_buffered(writer, &partial)
            })
        }
        ArchiveFormat::Zip => write_zip(BufWriter::new(output), files, &partial)
            .and_then(|writer| finish_buffered(writer, &partial)),
    };
    if let Err(err) = written {
        discard_partial(&partial);
        return Err(err);
    }

    finalize(&partial, &target)?;
    let archive_bytes = fs::metadata(&target)
        .map_err(|err| FsOpsError::io("archive.stat_output", &target, err))?
        .len();

    Ok(ArchiveStats {
        path: Some(target),
        files: files.len(),
        total_bytes,
        archive_bytes,
    })
}

fn unused_archive_path(dir: &Path, reference: NaiveDate, policy: ArchivePolicy) -> PathBuf {
    let stem = archive_stem(&reference, policy.group_by);
    let extension = policy.format.extension();
    let mut candidate = dir.join(format!("{stem}{extension}"));
    let mut counter = 1_u32;
    while candidate.exists() || partial_path(&candidate).exists() {
        candidate = dir.join(format!("{stem}-{counter}{extension}"));
        counter += 1;
    }
    candidate
}

fn write_tar<W: io::Write>(
    writer: W,
    files: &BTreeMap<PathBuf, String>,
    partial: &Path,
) -> FsOpsResult<W> {
    let mut builder = tar::Builder::new(writer);
    for (source, name) in files {
        let mut file =
            File::open(source).map_err(|err| FsOpsError::io("archive.open_entry", source, err))?;
        builder
            .append_file(name, &mut file)
            .map_err(|err| FsOpsError::io("archive.append_entry", source, err))?;
    }
    builder
        .into_inner()
        .map_err(|err| FsOpsError::io("archive.finish_tar", partial, err))
}

fn write_zip(
    writer: BufWriter<File>,
    files: &BTreeMap<PathBuf, String>,
    partial: &Path,
) -> FsOpsResult<BufWriter<File>> {
    let mut archive = ZipWriter::new(writer);
    for (source, name) in files {
        let mut file =
            File::open(source).map_err(|err| FsOpsError::io("archive.open_entry", source, err))?;
        let size = file
            .metadata()
            .map_err(|err| FsOpsError::io("archive.stat", source, err))?
            .len();
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= u64::from(u32::MAX));
        archive
            .start_file(name.as_str(), options)
            .map_err(|err| FsOpsError::zip("archive.start_entry", source, err))?;
        io::copy(&mut file, &mut archive)
            .map_err(|err| FsOpsError::io("archive.append_entry", source, err))?;
    }
    archive
        .finish()
        .map_err(|err| FsOpsError::zip("archive.finish_zip", partial, err))
}

fn finish_buffered(writer: BufWriter<File>, partial: &Path) -> FsOpsResult<()> {
    let file = writer
        .into_inner()
        .map_err(|err| FsOpsError::io("archive.flush", partial, err.into_error()))?;
    file.sync_all()
        .map_err(|err| FsOpsError::io("archive.sync", partial, err))
}

/// Detect the container format from the archive's file name.
///
/// # Errors
///
/// Returns [`FsOpsError::Unsupported`] for unknown extensions.
pub fn detect_format(path: &Path) -> FsOpsResult<ArchiveFormat> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar") {
        Ok(ArchiveFormat::Tar)
    } else if name.ends_with(".zip") {
        Ok(ArchiveFormat::Zip)
    } else {
        Err(FsOpsError::Unsupported {
            operation: "archive.detect_format",
            value: Some(path.display().to_string()),
        })
    }
}

/// Extract `archive` into `destination`, returning the number of files written.
///
/// # Errors
///
/// Returns an error for unknown formats, unsafe entry names, or IO failures.
pub fn extract_archive(archive: &Path, destination: &Path) -> FsOpsResult<usize> {
    let format = detect_format(archive)?;
    fs::create_dir_all(destination)
        .map_err(|err| FsOpsError::io("extract.create_dir", destination, err))?;
    let file = File::open(archive).map_err(|err| FsOpsError::io("extract.open", archive, err))?;
    match format {
        ArchiveFormat::Tar => extract_tar(file, archive, destination),
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(file), archive, destination),
        ArchiveFormat::Zip => extract_zip(file, archive, destination),
    }
}

fn extract_tar<R: io::Read>(input: R, archive: &Path, destination: &Path) -> FsOpsResult<usize> {
    let mut reader = tar::Archive::new(input);
    let mut extracted = 0;
    let entries = reader
        .entries()
        .map_err(|err| FsOpsError::io("extract_tar.entries", archive, err))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| FsOpsError::io("extract_tar.read_entry", archive, err))?;
        let name = entry
            .path()
            .map_err(|err| FsOpsError::io("extract_tar.entry_path", archive, err))?
            .to_string_lossy()
            .into_owned();
        let target = destination.join(sanitize_archive_path(&name)?);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| FsOpsError::io("extract_tar.create_dir", &target, err))?;
            continue;
        }
        if !kind.is_file() {
            continue;
        }
        create_parent(&target)?;
        entry
            .unpack(&target)
            .map_err(|err| FsOpsError::io("extract_tar.unpack", &target, err))?;
        extracted += 1;
    }
    Ok(extracted)
}

fn extract_zip(file: File, archive: &Path, destination: &Path) -> FsOpsResult<usize> {
    let mut reader =
        ZipArchive::new(file).map_err(|err| FsOpsError::zip("extract_zip.decode", archive, err))?;
    let mut extracted = 0;
    for index in 0..reader.len() {
        let mut entry = reader
            .by_index(index)
            .map_err(|err| FsOpsError::zip("extract_zip.read_entry", archive, err))?;
        let target = destination.join(sanitize_archive_path(entry.name())?);
        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| FsOpsError::io("extract_zip.create_dir", &target, err))?;
            continue;
        }
        create_parent(&target)?;
        let mut output = File::create(&target)
            .map_err(|err| FsOpsError::io("extract_zip.create_file", &target, err))?;
        io::copy(&mut entry, &mut output)
            .map_err(|err| FsOpsError::io("extract_zip.copy", &target, err))?;
        extracted += 1;
    }
    Ok(extracted)
}

fn create_parent(target: &Path) -> FsOpsResult<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| FsOpsError::io("extract.create_parent", parent, err))?;
    }
    Ok(())
}

fn sanitize_archive_path(entry: &str) -> FsOpsResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(FsOpsError::InvalidInput {
            field: "archive_entry",
            reason: "absolute_path",
            value: Some(entry.to_string()),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(FsOpsError::InvalidInput {
                    field: "archive_entry",
                    reason: "invalid_segment",
                    value: Some(entry.to_string()),
                });
            }
        }
    }
    if sanitized.as_os_str().is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "archive_entry",
            reason: "empty_name",
            value: Some(entry.to_string()),
        });
    }
    Ok(sanitized)
}
