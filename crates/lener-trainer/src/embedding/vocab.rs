//! Token vocabulary and tag set for the embedding family.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lener_core::{Result, TaggedSequence};
use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "<unk>";
pub const PADDING: &str = "<pad>";

/// Maps tokens to embedding rows. Row 0 is the unknown token, row 1 pads
/// windows at sequence boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vocabulary {
    tokens: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl Vocabulary {
    pub const UNKNOWN_ID: u32 = 0;
    pub const PADDING_ID: u32 = 1;

    /// Every distinct token of `sequences`, in first-seen order.
    pub fn from_sequences(sequences: &[TaggedSequence]) -> Self {
        let mut vocab = Self::from_tokens(vec![UNKNOWN.to_string(), PADDING.to_string()]);
        for token in sequences.iter().flat_map(|s| s.tokens()) {
            if !vocab.index.contains_key(token) {
                vocab.index.insert(token.clone(), vocab.tokens.len() as u32);
                vocab.tokens.push(token.clone());
            }
        }
        vocab
    }

    fn from_tokens(tokens: Vec<String>) -> Self {
        let index = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { tokens, index }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn id(&self, token: &str) -> u32 {
        self.index.get(token).copied().unwrap_or(Self::UNKNOWN_ID)
    }

    pub fn encode(&self, tokens: &[String]) -> Vec<u32> {
        tokens.iter().map(|t| self.id(t)).collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Output labels plus log transition probabilities between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    pub labels: Vec<String>,
    /// `transitions[prev][curr]`, add-one smoothed log probabilities.
    pub transitions: Vec<Vec<f32>>,
}

impl TagSet {
    /// Labels in sorted order, transitions counted from adjacent label pairs.
    pub fn from_sequences(sequences: &[TaggedSequence]) -> Self {
        let mut labels: Vec<String> = sequences
            .iter()
            .flat_map(|s| s.labels().iter().cloned())
            .collect();
        labels.sort();
        labels.dedup();

        let n = labels.len();
        let position: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut counts = vec![vec![1.0f32; n]; n];
        for seq in sequences {
            for pair in seq.labels().windows(2) {
                let prev = position[pair[0].as_str()];
                let curr = position[pair[1].as_str()];
                counts[prev][curr] += 1.0;
            }
        }
        let transitions = counts
            .into_iter()
            .map(|row| {
                let total: f32 = row.iter().sum();
                row.into_iter().map(|c| (c / total).ln()).collect()
            })
            .collect();

        Self {
            labels,
            transitions,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Index of `label`, if the training data had it.
    pub fn id(&self, label: &str) -> Option<u32> {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .ok()
            .map(|i| i as u32)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
