//! Target layouts understood by the downstream engines.

use serde::{Deserialize, Serialize};

use crate::error::{LenerError, Result};

/// Header line the CRF engine expects at the top of every document.
pub const CRF_HEADER: &str = "w chunk";

/// Column separator of a column-formatted data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    /// A single space between columns.
    Space,
    /// A tab between columns.
    Tab,
    /// Any run of whitespace. Written as a single space.
    Whitespace,
}

impl Separator {
    /// The literal written between columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            Separator::Space | Separator::Whitespace => " ",
            Separator::Tab => "\t",
        }
    }

    /// Split a data line into its non-empty columns.
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Separator::Space => line.split(' ').filter(|c| !c.is_empty()).collect(),
            Separator::Tab => line
                .split('\t')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect(),
            Separator::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// How the adapted files are grouped on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum Layout {
    /// One output file per input document.
    Segmented,
    /// The first `max(floor(n * percentage), 1)` documents of each split
    /// concatenated into `<split>.txt`.
    Concatenated { percentage: f64 },
}

/// When an existing adapted directory may be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Reuse the target whenever it exists. Source edits are not picked up.
    SkipIfExists,
    /// Always delete and regenerate the target.
    Force,
    /// Reuse the target only if its manifest matches the current sources.
    #[default]
    ContentHash,
}

/// Everything the Dataset Adapter needs to know about a target family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub separator: Separator,
    pub header: Option<String>,
    pub layout: Layout,
    #[serde(default)]
    pub freshness: Freshness,
}

impl FormatSpec {
    /// Per-document files with a `w chunk` header, space separated.
    pub fn segmented() -> Self {
        Self {
            separator: Separator::Space,
            header: Some(CRF_HEADER.to_string()),
            layout: Layout::Segmented,
            freshness: Freshness::ContentHash,
        }
    }

    /// One tab-separated file per split built from a fraction of the documents.
    pub fn concatenated(percentage: f64) -> Self {
        Self {
            separator: Separator::Tab,
            header: None,
            layout: Layout::Concatenated { percentage },
            freshness: Freshness::Force,
        }
    }

    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_header(mut self, header: Option<String>) -> Self {
        self.header = header;
        self
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = freshness;
        self
    }

    /// Reject out-of-range parameters. Called before any filesystem access.
    pub fn validate(&self) -> Result<()> {
        if let Layout::Concatenated { percentage } = self.layout {
            if !(0.0..=1.0).contains(&percentage) {
                return Err(LenerError::InvalidArgument(format!(
                    "percentage {percentage} outside [0, 1]"
                )));
            }
        }
        if let Some(header) = &self.header {
            if header.trim().is_empty() || header.contains('\n') {
                return Err(LenerError::InvalidArgument(format!(
                    "header must be a single non-empty line, got {header:?}"
                )));
            }
        }
        Ok(())
    }
}
