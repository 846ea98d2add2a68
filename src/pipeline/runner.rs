//! Batch conversion driver: ingest → discover → extract → write → pack.
//!
//! Documents are converted sequentially with blocking model calls. A
//! failing document is captured in its per-document result instead of
//! aborting the batch, so one bad scan cannot sink the rest.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::archive::{self, ArchiveError};
use super::discovery::{self, ReceiptGroup};
use super::extraction::{self, ExtractError, RepairStatus};
use super::output;
use super::prompt::OutputFormat;
use super::workdir::Workdir;
use crate::llama::ChatClient;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("no receipt folders with PNG pages were found in the archive")]
    NoQualifyingContent,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One document's written output.
#[derive(Debug)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub repair: RepairStatus,
}

/// Task/result entry for one document in a batch.
#[derive(Debug)]
pub struct DocumentResult {
    pub name: String,
    pub outcome: Result<WrittenOutput, PipelineError>,
}

/// Everything a batch conversion produced.
#[derive(Debug)]
pub struct BatchReport {
    pub results: Vec<DocumentResult>,
    pub bundle: PathBuf,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }
}

/// Prepare a working directory, safely extract `archive` into it and
/// discover the receipt groups.
///
/// Fails with [`PipelineError::NoQualifyingContent`] before any model
/// invocation when no folder holds a qualifying page; the working
/// directory is torn down on every failure path.
pub fn ingest_archive(archive: &Path) -> Result<(Workdir, Vec<ReceiptGroup>), PipelineError> {
    let workdir = Workdir::create()?;
    archive::extract_archive(archive, workdir.path())?;

    let groups = discovery::discover(workdir.path())?;
    if groups.is_empty() {
        return Err(PipelineError::NoQualifyingContent);
    }

    tracing::info!(
        receipts = groups.len(),
        workdir = %workdir.path().display(),
        "Archive ingested"
    );
    Ok((workdir, groups))
}

/// Convert the selected receipt groups and bundle the output directory.
///
/// Selection names with no matching group are skipped. The bundle includes
/// every file present in the shared output directory, so outputs of earlier
/// conversions against the same working directory ride along.
pub fn convert_batch(
    client: &dyn ChatClient,
    workdir: &Workdir,
    groups: &[ReceiptGroup],
    selection: &[String],
    format: OutputFormat,
) -> Result<BatchReport, PipelineError> {
    let out_dir = workdir.outputs_dir();
    fs::create_dir_all(&out_dir)?;

    let mut results = Vec::with_capacity(selection.len());
    for name in selection {
        let Some(group) = groups.iter().find(|g| g.name == *name) else {
            continue;
        };
        let outcome = convert_one(client, group, format, &out_dir);
        match &outcome {
            Ok(written) => tracing::info!(
                receipt = %group.name,
                path = %written.path.display(),
                repair = ?written.repair,
                "Receipt converted"
            ),
            Err(err) => tracing::error!(
                receipt = %group.name,
                error = %err,
                "Receipt conversion failed"
            ),
        }
        results.push(DocumentResult {
            name: group.name.clone(),
            outcome,
        });
    }

    let bundle = archive::pack_outputs(&out_dir, &workdir.bundle_path())?;
    Ok(BatchReport { results, bundle })
}

fn convert_one(
    client: &dyn ChatClient,
    group: &ReceiptGroup,
    format: OutputFormat,
    out_dir: &Path,
) -> Result<WrittenOutput, PipelineError> {
    let extraction = extraction::extract_document(client, group, format)?;
    let path = output::write_output(&group.name, &extraction.content, format, out_dir)?;
    Ok(WrittenOutput {
        path,
        repair: extraction.repair,
    })
}
