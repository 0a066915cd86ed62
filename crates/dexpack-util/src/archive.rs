//! Zip archive helpers shared by the archive, merge, and package steps.
//!
//! Entries are always written in name order with a fixed timestamp, so the
//! same inputs produce byte-identical archives.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::UtilError;

/// File entries of an archive, keyed by entry name.
pub type Entries = BTreeMap<String, Vec<u8>>;

fn archive_err(path: &Path, e: impl std::fmt::Display) -> UtilError {
    UtilError::Archive {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn file_options() -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
}

/// How an entry of an installable package is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStorage {
    Deflated,
    /// Uncompressed and aligned to `STORED_ALIGNMENT`, so the platform can
    /// map it straight from the package.
    Stored,
}

/// Package entries with their storage, keyed by entry name.
pub type PackageEntries = BTreeMap<String, (EntryStorage, Vec<u8>)>;

/// Data offset alignment of stored entries, matching `zipalign -p 4`.
pub const STORED_ALIGNMENT: u16 = 4;

/// Read every file entry of the zip archive at `path`. Directory entries are skipped.
///
/// # Errors
/// Returns an error if the file cannot be opened or is not a valid zip archive.
pub fn read_entries(path: &Path) -> Result<Entries, UtilError> {
    let file = File::open(path).map_err(|source| UtilError::io(path, source))?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_err(path, e))?;

    let mut entries = Entries::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_err(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|source| UtilError::io(path, source))?;
        entries.insert(name, data);
    }
    Ok(entries)
}

/// Write `entries` as a new zip archive at `path`, replacing any existing file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_entries<'a, I>(path: &Path, entries: I) -> Result<(), UtilError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    if let Some(parent) = path.parent() {
        crate::fs::ensure_dir(parent)?;
    }
    let file = File::create(path).map_err(|source| UtilError::io(path, source))?;
    let mut zip = ZipWriter::new(file);

    let mut sorted: Vec<(&str, &[u8])> = entries.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    for (name, data) in sorted {
        zip.start_file(name, file_options())
            .map_err(|e| archive_err(path, e))?;
        zip.write_all(data)
            .map_err(|source| UtilError::io(path, source))?;
    }
    zip.finish().map_err(|e| archive_err(path, e))?;
    Ok(())
}

/// Like `read_entries`, keeping whether each entry was stored uncompressed.
///
/// # Errors
/// Returns an error if the file cannot be opened or is not a valid zip archive.
pub fn read_package_entries(path: &Path) -> Result<PackageEntries, UtilError> {
    let file = File::open(path).map_err(|source| UtilError::io(path, source))?;
    let mut archive = ZipArchive::new(file).map_err(|e| archive_err(path, e))?;

    let mut entries = PackageEntries::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| archive_err(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let storage = if entry.compression() == CompressionMethod::Stored {
            EntryStorage::Stored
        } else {
            EntryStorage::Deflated
        };
        let name = entry.name().to_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|source| UtilError::io(path, source))?;
        entries.insert(name, (storage, data));
    }
    Ok(entries)
}

/// Write an installable package: entries in name order, stored entries
/// uncompressed with their data aligned to `STORED_ALIGNMENT`.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_package_entries(path: &Path, entries: &PackageEntries) -> Result<(), UtilError> {
    if let Some(parent) = path.parent() {
        crate::fs::ensure_dir(parent)?;
    }
    let file = File::create(path).map_err(|source| UtilError::io(path, source))?;
    let mut zip = ZipWriter::new(file);

    for (name, (storage, data)) in entries {
        match storage {
            EntryStorage::Deflated => zip
                .start_file(name.as_str(), file_options())
                .map_err(|e| archive_err(path, e))?,
            EntryStorage::Stored => {
                let stored = file_options().compression_method(CompressionMethod::Stored);
                zip.start_file_aligned(name.as_str(), stored, STORED_ALIGNMENT)
                    .map_err(|e| archive_err(path, e))?;
            }
        }
        zip.write_all(data)
            .map_err(|source| UtilError::io(path, source))?;
    }
    zip.finish().map_err(|e| archive_err(path, e))?;
    Ok(())
}

/// Collect every file under `dir` as archive entries named by their
/// `/`-separated path relative to `dir`.
///
/// # Errors
/// Returns an error if `dir` or any file under it cannot be read.
pub fn dir_entries(dir: &Path) -> Result<Entries, UtilError> {
    let mut entries = Entries::new();
    collect_dir(dir, dir, &mut entries)?;
    Ok(entries)
}

fn collect_dir(base: &Path, dir: &Path, out: &mut Entries) -> Result<(), UtilError> {
    let read = std::fs::read_dir(dir).map_err(|source| UtilError::io(dir, source))?;
    for entry in read {
        let entry = entry.map_err(|source| UtilError::io(dir, source))?;
        let path = entry.path();
        if path.is_dir() {
            collect_dir(base, &path, out)?;
            continue;
        }
        let rel = path.strip_prefix(base).unwrap_or(&path);
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let data = std::fs::read(&path).map_err(|source| UtilError::io(&path, source))?;
        out.insert(name, data);
    }
    Ok(())
}

/// Archive the contents of `dir` into a zip at `output`, adding `extra` entries
/// (e.g. `META-INF/MANIFEST.MF`) on top. An `extra` entry wins over a file of
/// the same name.
///
/// # Errors
/// Returns an error if the directory cannot be read or the archive cannot be written.
pub fn archive_dir(dir: &Path, output: &Path, extra: &[(&str, &[u8])]) -> Result<usize, UtilError> {
    let mut entries = dir_entries(dir)?;
    for (name, data) in extra {
        entries.insert((*name).to_owned(), data.to_vec());
    }
    write_entries(
        output,
        entries.iter().map(|(k, v)| (k.as_str(), v.as_slice())),
    )?;
    Ok(entries.len())
}
