//! # Sequence Loader
//!
//! Reads adapted column files back into [`TaggedSequence`]s. One sequence per
//! blank-line delimited block, files visited in file-name order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::adapter::list_documents;
use crate::dataset::format::{CRF_HEADER, Separator};
use crate::error::{LenerError, Result};
use crate::types::TaggedSequence;

/// How a family's data files are laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Expected first non-blank line, naming the columns (e.g. `w chunk`).
    pub header: Option<String>,
    /// Last column holds the reference label.
    pub y_ref: bool,
    pub column_sep: Separator,
    /// Label of tokens outside any entity.
    pub outside_symbol: String,
}

impl ParseOptions {
    /// Options matching the segmented CRF layout.
    pub fn segmented() -> Self {
        Self {
            header: Some(CRF_HEADER.to_string()),
            y_ref: true,
            column_sep: Separator::Space,
            outside_symbol: "O".to_string(),
        }
    }

    /// Options matching the concatenated, tab-separated layout.
    pub fn concatenated() -> Self {
        Self {
            header: None,
            y_ref: true,
            column_sep: Separator::Tab,
            outside_symbol: "O".to_string(),
        }
    }

    /// Options for the raw LeNER files (no header, any whitespace).
    pub fn raw() -> Self {
        Self {
            header: None,
            y_ref: true,
            column_sep: Separator::Whitespace,
            outside_symbol: "O".to_string(),
        }
    }
}

/// Load every file of `directory` in file-name order.
///
/// Sequence ids are 1-based and continue across files.
pub fn load_split(directory: &Path, options: &ParseOptions) -> Result<Vec<TaggedSequence>> {
    load_split_with(directory, |_| Ok(options.clone()))
}

/// Like [`load_split`], with the options chosen per file.
pub fn load_split_with(
    directory: &Path,
    mut options_for: impl FnMut(&Path) -> Result<ParseOptions>,
) -> Result<Vec<TaggedSequence>> {
    let files = list_documents(directory)?;
    let mut sequences = Vec::new();
    for file in &files {
        let options = options_for(file)?;
        let parsed = parse_file(file, &options, sequences.len() + 1)?;
        debug!(file = %file.display(), sequences = parsed.len(), "parsed");
        sequences.extend(parsed);
    }
    Ok(sequences)
}

/// Load a single file. Sequence ids start at 1.
pub fn load_file(path: &Path, options: &ParseOptions) -> Result<Vec<TaggedSequence>> {
    if !path.is_file() {
        return Err(LenerError::not_found(path));
    }
    parse_file(path, options, 1)
}

fn parse_file(path: &Path, options: &ParseOptions, first_id: usize) -> Result<Vec<TaggedSequence>> {
    let reader = BufReader::new(File::open(path)?);

    let mut sequences = Vec::new();
    let mut tokens = Vec::new();
    let mut labels = Vec::new();
    let mut columns = if options.header.is_some() {
        None
    } else if options.y_ref {
        Some(2)
    } else {
        Some(1)
    };

    let mut flush = |tokens: &mut Vec<String>, labels: &mut Vec<String>| {
        if !tokens.is_empty() {
            let id = first_id + sequences.len();
            sequences.push(
                TaggedSequence::new(id, std::mem::take(tokens), std::mem::take(labels))
                    .with_origin(path),
            );
        }
    };

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            flush(&mut tokens, &mut labels);
            continue;
        }

        let fields = options.column_sep.split(line);

        let Some(expected) = columns else {
            if let Some(header) = &options.header {
                if line.trim_end() != header.as_str() {
                    return Err(LenerError::parse(
                        path,
                        line_no,
                        format!("expected header {header:?}, found {line:?}"),
                    ));
                }
            }
            if options.y_ref && fields.len() < 2 {
                return Err(LenerError::parse(
                    path,
                    line_no,
                    format!("header {line:?} has no label column"),
                ));
            }
            columns = Some(fields.len());
            continue;
        };

        if fields.len() != expected {
            return Err(LenerError::parse(
                path,
                line_no,
                format!("expected {expected} columns, found {}", fields.len()),
            ));
        }

        tokens.push(fields[0].to_string());
        labels.push(if options.y_ref {
            fields[expected - 1].to_string()
        } else {
            options.outside_symbol.clone()
        });
    }
    flush(&mut tokens, &mut labels);

    Ok(sequences)
}

/// True when the first non-blank line of `path` is the CRF header.
pub fn has_crf_header(path: &Path) -> Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            return Ok(line.trim_end() == CRF_HEADER);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn three_blocks_three_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.conll");
        fs::write(
            &path,
            "w chunk\nO O\nTribunal B-ORGANIZACAO\n\nJoão B-PESSOA\nSilva I-PESSOA\n\n\nem O\n2016 B-TEMPO\n",
        )
        .unwrap();

        let seqs = load_file(&path, &ParseOptions::segmented()).unwrap();
        assert_eq!(seqs.len(), 3);
        assert_eq!(seqs[0].tokens(), ["O", "Tribunal"]);
        assert_eq!(seqs[0].labels(), ["O", "B-ORGANIZACAO"]);
        assert_eq!(seqs[1].tokens(), ["João", "Silva"]);
        assert_eq!(seqs[2].labels(), ["O", "B-TEMPO"]);
        assert_eq!(
            seqs.iter().map(|s| s.id()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(seqs[0].origin(), Some(path.as_path()));
    }

    #[test]
    fn wrong_column_count_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        fs::write(&path, "Lei\tO\n\nart\t5\tO\n").unwrap();

        let err = load_file(&path, &ParseOptions::concatenated()).unwrap_err();
        match err {
            LenerError::Parse { line, path: p, .. } => {
                assert_eq!(line, 3);
                assert_eq!(p, path);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn no_reference_column_uses_outside_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        fs::write(&path, "Lei\nnº\n").unwrap();
        let options = ParseOptions {
            y_ref: false,
            ..ParseOptions::raw()
        };
        let seqs = load_file(&path, &options).unwrap();
        assert_eq!(seqs.len(), 1);
        assert_eq!(seqs[0].labels(), ["O", "O"]);
    }

    #[test]
    fn split_ids_continue_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "Lei O\n\nart O\n").unwrap();
        fs::write(dir.path().join("a.txt"), "TCU B-ORGANIZACAO\n").unwrap();

        let seqs = load_split(dir.path(), &ParseOptions::raw()).unwrap();
        assert_eq!(seqs.len(), 3);
        assert_eq!(seqs[0].tokens(), ["TCU"]);
        assert_eq!(seqs[2].id(), 3);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_file(Path::new("/nonexistent/x.txt"), &ParseOptions::raw()).unwrap_err();
        assert!(matches!(err, LenerError::NotFound { .. }));
    }

    #[test]
    fn missing_header_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.conll");
        fs::write(&path, "\nLei B-LEGISLACAO\n8.666 I-LEGISLACAO\n").unwrap();

        let err = load_file(&path, &ParseOptions::segmented()).unwrap_err();
        match err {
            LenerError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mixed_directory_detects_header_per_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.conll"),
            "Lei B-LEGISLACAO\n8.666 I-LEGISLACAO\n\nTCU B-ORGANIZACAO\n",
        )
        .unwrap();
        fs::write(dir.path().join("b.conll"), "w chunk\nJoão B-PESSOA\n").unwrap();

        let seqs = load_split_with(dir.path(), |file| {
            Ok(if has_crf_header(file)? {
                ParseOptions::segmented()
            } else {
                ParseOptions::raw()
            })
        })
        .unwrap();
        let tokens: Vec<&str> = seqs
            .iter()
            .flat_map(|s| s.tokens().iter().map(String::as_str))
            .collect();
        assert_eq!(tokens, ["Lei", "8.666", "TCU", "João"]);
        assert_eq!(seqs[2].id(), 3);

        let err = load_split(dir.path(), &ParseOptions::segmented()).unwrap_err();
        assert!(matches!(err, LenerError::Parse { line: 1, .. }));
    }

    #[test]
    fn detects_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.conll");
        fs::write(&path, "\nw chunk\nLei O\n").unwrap();
        assert!(has_crf_header(&path).unwrap());
        fs::write(&path, "Lei O\n").unwrap();
        assert!(!has_crf_header(&path).unwrap());
    }
}
