//! # Dataset Adapter
//!
//! Rewrites the canonical LeNER layout (`train/`, `dev/`, `test/` holding one
//! header-less, space-separated file per document) into the layout a model
//! family expects.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dataset::format::{FormatSpec, Freshness, Layout};
use crate::dataset::manifest::AdaptManifest;
use crate::error::{LenerError, Result};
use crate::types::Split;

/// What an [`adapt`] call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdaptSummary {
    pub target: PathBuf,
    /// True when an existing target was reused as-is.
    pub reused: bool,
    /// Number of source documents written per split.
    pub documents: BTreeMap<Split, usize>,
}

/// Adapt `source_dir` into `target_dir` following `spec`.
///
/// Every split directory must exist and hold at least one file. Parameters are
/// validated before touching the filesystem.
pub fn adapt(source_dir: &Path, target_dir: &Path, spec: &FormatSpec) -> Result<AdaptSummary> {
    spec.validate()?;

    let mut listings = Vec::with_capacity(Split::ALL.len());
    for split in Split::ALL {
        listings.push((split, list_documents(&source_dir.join(split.dir_name()))?));
    }

    let manifest = match spec.freshness {
        Freshness::ContentHash => Some(AdaptManifest::compute(spec, &listings)?),
        _ => None,
    };

    if target_dir.is_dir() {
        match spec.freshness {
            Freshness::SkipIfExists => {
                warn!(
                    target = %target_dir.display(),
                    "adapted dataset already exists, reusing it; source changes since then are ignored"
                );
                return Ok(reused(target_dir));
            }
            Freshness::ContentHash
                if AdaptManifest::load(target_dir).as_ref() == manifest.as_ref() =>
            {
                info!(target = %target_dir.display(), "adapted dataset is up to date");
                return Ok(reused(target_dir));
            }
            _ => {
                debug!(target = %target_dir.display(), "removing previous adapted dataset");
                fs::remove_dir_all(target_dir)?;
            }
        }
    }
    fs::create_dir_all(target_dir)?;

    let mut documents = BTreeMap::new();
    for (split, files) in &listings {
        let written = match spec.layout {
            Layout::Segmented => write_segmented(files, &target_dir.join(split.dir_name()), spec)?,
            Layout::Concatenated { percentage } => write_concatenated(
                files,
                &target_dir.join(format!("{}.txt", split.dir_name())),
                percentage,
                spec,
            )?,
        };
        debug!(%split, documents = written, "split adapted");
        documents.insert(*split, written);
    }

    if let Some(manifest) = manifest {
        manifest.store(target_dir)?;
    }

    info!(
        source = %source_dir.display(),
        target = %target_dir.display(),
        "dataset adapted"
    );

    Ok(AdaptSummary {
        target: target_dir.to_path_buf(),
        reused: false,
        documents,
    })
}

/// Number of documents the concatenated policy keeps out of `total`.
pub fn sample_size(total: usize, percentage: f64) -> usize {
    ((total as f64 * percentage).floor() as usize).max(1)
}

/// Regular, non-hidden files of `dir`, sorted by file name.
pub(crate) fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LenerError::not_found(dir));
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    if files.is_empty() {
        return Err(LenerError::EmptyInput {
            path: dir.to_path_buf(),
        });
    }
    files.sort();
    Ok(files)
}

fn reused(target_dir: &Path) -> AdaptSummary {
    AdaptSummary {
        target: target_dir.to_path_buf(),
        reused: true,
        documents: BTreeMap::new(),
    }
}

fn write_segmented(files: &[PathBuf], out_dir: &Path, spec: &FormatSpec) -> Result<usize> {
    fs::create_dir_all(out_dir)?;
    for file in files {
        let content = fs::read_to_string(file)?;
        let mut lines = content.lines().peekable();

        let file_name = file
            .file_name()
            .ok_or_else(|| LenerError::not_found(file))?;
        let out_path = out_dir.join(file_name);
        let tmp_path = out_dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

        let mut out = BufWriter::new(File::create(&tmp_path)?);
        if let Some(header) = &spec.header {
            if lines.peek().map(|l| l.trim_end()) == Some(header.as_str()) {
                lines.next();
            }
            writeln!(out, "{header}")?;
        }
        for line in lines {
            writeln!(out, "{}", convert_line(line, spec))?;
        }
        out.flush()?;
        drop(out);
        fs::rename(&tmp_path, &out_path)?;
    }
    Ok(files.len())
}

fn write_concatenated(
    files: &[PathBuf],
    out_path: &Path,
    percentage: f64,
    spec: &FormatSpec,
) -> Result<usize> {
    let limit = sample_size(files.len(), percentage);
    let mut out = BufWriter::new(File::create(out_path)?);
    if let Some(header) = &spec.header {
        writeln!(out, "{header}")?;
    }
    for file in &files[..limit] {
        let content = fs::read_to_string(file)?;
        let mut last_blank = true;
        for line in content.lines() {
            let converted = convert_line(line, spec);
            last_blank = converted.is_empty();
            writeln!(out, "{converted}")?;
        }
        // Keep the last block of one document from running into the next.
        if !last_blank {
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(limit)
}

/// Re-join the columns of `line` with the target separator; blank lines stay blank.
fn convert_line(line: &str, spec: &FormatSpec) -> String {
    line.split_whitespace()
        .collect::<Vec<_>>()
        .join(spec.separator.as_str())
}
