//! # BIO Tags for Named Entity Recognition
//!
//! LeNER labels tokens with `B-<ENTITY>`, `I-<ENTITY>` or `O`. The entity set
//! is open at parse time; [`LENER_TAGS`] lists the tags the corpus uses.

use std::fmt;

/// Entity tags of the LeNER corpus, in report order.
pub const LENER_TAGS: &[&str] = &[
    "B-ORGANIZACAO",
    "I-ORGANIZACAO",
    "B-PESSOA",
    "I-PESSOA",
    "B-JURISPRUDENCIA",
    "I-JURISPRUDENCIA",
    "B-TEMPO",
    "I-TEMPO",
    "B-LEGISLACAO",
    "I-LEGISLACAO",
    "B-LOCAL",
    "I-LOCAL",
];

/// A parsed BIO label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BioTag {
    Begin(String),
    Inside(String),
    Outside,
}

impl BioTag {
    /// Parse a label. Anything without a `B-`/`I-` prefix is [`BioTag::Outside`].
    pub fn parse(label: &str) -> Self {
        if let Some(entity) = label.strip_prefix("B-") {
            BioTag::Begin(entity.to_string())
        } else if let Some(entity) = label.strip_prefix("I-") {
            BioTag::Inside(entity.to_string())
        } else {
            BioTag::Outside
        }
    }

    /// Check if this is an "Inside" tag.
    pub fn is_inside(&self) -> bool {
        matches!(self, BioTag::Inside(_))
    }

    /// Entity type carried by this tag.
    pub fn entity(&self) -> Option<&str> {
        match self {
            BioTag::Begin(e) | BioTag::Inside(e) => Some(e),
            BioTag::Outside => None,
        }
    }

    /// Whether `to` may follow `from`: an `I-X` must continue a `B-X` or `I-X`.
    pub fn is_valid_transition(from: &BioTag, to: &BioTag) -> bool {
        match to {
            BioTag::Inside(entity) => from.entity() == Some(entity.as_str()),
            _ => true,
        }
    }

    /// Whether a sequence may open with this tag.
    pub fn is_valid_start(&self) -> bool {
        !self.is_inside()
    }
}

impl fmt::Display for BioTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BioTag::Begin(e) => write!(f, "B-{e}"),
            BioTag::Inside(e) => write!(f, "I-{e}"),
            BioTag::Outside => write!(f, "O"),
        }
    }
}
