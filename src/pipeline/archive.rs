//! Safe ZIP ingestion and output bundling.
//!
//! Extraction validates every entry name before any entry is written, so a
//! partially-unsafe archive cannot leave an out-of-bounds file behind
//! (Zip Slip).

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive is corrupt or unreadable: {0}")]
    Malformed(#[from] zip::result::ZipError),

    #[error("unsafe path in archive: {0}")]
    PathTraversal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Extract `archive` into `dest`, preserving relative paths.
///
/// Every entry must resolve inside `dest`; an absolute path or a `..`
/// traversal fails the whole extraction before anything is written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    // Validation pass over all entries first: no partial extraction is
    // considered safe to keep.
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        if entry.enclosed_name().is_none() {
            return Err(ArchiveError::PathTraversal(entry.name().to_string()));
        }
    }

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let relative = match entry.enclosed_name() {
            Some(path) => path,
            None => return Err(ArchiveError::PathTraversal(entry.name().to_string())),
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }
    }

    tracing::debug!(
        entries = zip.len(),
        dest = %dest.display(),
        "Archive extracted"
    );
    Ok(())
}

/// Bundle the immediate regular-file children of `out_dir` into a ZIP at
/// `zip_path`, sorted by filename for a reproducible byte layout. Entry
/// names carry no directory prefix.
pub fn pack_outputs(out_dir: &Path, zip_path: &Path) -> Result<PathBuf, ArchiveError> {
    let mut files: Vec<PathBuf> = fs::read_dir(out_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    files.sort();

    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writer.start_file(name, options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
    }
    writer.finish()?;

    tracing::debug!(
        files = files.len(),
        bundle = %zip_path.display(),
        "Outputs packed"
    );
    Ok(zip_path.to_path_buf())
}
