//! # Tagged Sequences
//!
//! The unit every engine trains and decodes on: one sentence or document
//! block of tokens paired with their BIO labels.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LenerError;

/// One of the three fixed dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    /// All splits, in the order adapters process them.
    pub const ALL: [Split; 3] = [Split::Train, Split::Test, Split::Dev];

    /// Directory (and concatenated file stem) name of this split.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev => "dev",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Split {
    type Err = LenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "dev" => Ok(Split::Dev),
            "test" => Ok(Split::Test),
            other => Err(LenerError::InvalidArgument(format!(
                "unknown split {other:?}, expected train, dev or test"
            ))),
        }
    }
}

/// An ordered list of (observation, label) pairs.
///
/// Tokens and labels always have the same length; the struct is immutable
/// once built so that alignment with predictions stays positional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSequence {
    id: usize,
    tokens: Vec<String>,
    labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    origin: Option<PathBuf>,
}

impl TaggedSequence {
    /// Build a sequence from parallel token/label vectors.
    ///
    /// # Panics
    /// Panics if `tokens` and `labels` differ in length.
    pub fn new(id: usize, tokens: Vec<String>, labels: Vec<String>) -> Self {
        assert_eq!(
            tokens.len(),
            labels.len(),
            "tokens and labels must have the same length"
        );
        Self {
            id,
            tokens,
            labels,
            origin: None,
        }
    }

    /// Build a sequence from `(token, label)` pairs.
    pub fn from_pairs<T, L>(id: usize, pairs: impl IntoIterator<Item = (T, L)>) -> Self
    where
        T: Into<String>,
        L: Into<String>,
    {
        let (tokens, labels) = pairs
            .into_iter()
            .map(|(t, l)| (t.into(), l.into()))
            .unzip();
        Self {
            id,
            tokens,
            labels,
            origin: None,
        }
    }

    /// Attach the file this sequence was parsed from.
    pub fn with_origin(mut self, origin: impl AsRef<Path>) -> Self {
        self.origin = Some(origin.as_ref().to_path_buf());
        self
    }

    /// 1-based position of this sequence in its load order.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate over `(token, label)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tokens
            .iter()
            .zip(self.labels.iter())
            .map(|(t, l)| (t.as_str(), l.as_str()))
    }
}
