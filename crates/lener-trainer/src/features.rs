//! Attribute templates for the CRF family.
//!
//! A template turns the tokens of a sequence into one attribute list per
//! position. The CRF engine weighs every (attribute, label) pair and every
//! label bigram on its own; the template only decides what the attributes are.

use std::collections::BTreeSet;

use crate::config::CrfVariant;

pub const BOS: &str = "__BOS__";
pub const EOS: &str = "__EOS__";

/// Observation template over the word track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureTemplate {
    /// Relative offsets considered around each position, inclusive.
    pub window: (isize, isize),
    /// Longest contiguous n-gram of window tokens emitted (1 or 2).
    pub max_ngram: usize,
    /// Emit begin/end-of-sequence markers.
    pub boundaries: bool,
    /// Emit word-shape attributes for the current token.
    pub shape: bool,
}

impl FeatureTemplate {
    pub fn for_variant(variant: CrfVariant) -> Self {
        match variant {
            CrfVariant::FirstOrder => Self {
                window: (-1, 1),
                max_ngram: 1,
                boundaries: false,
                shape: false,
            },
            CrfVariant::HigherOrder => Self {
                window: (-1, 1),
                max_ngram: 2,
                boundaries: true,
                shape: false,
            },
            CrfVariant::SemiMarkov => Self {
                window: (-2, 2),
                max_ngram: 2,
                boundaries: true,
                shape: true,
            },
        }
    }

    /// Attribute names for every position of `tokens`.
    pub fn extract<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Vec<String>> {
        let len = tokens.len() as isize;
        let at = |pos: isize| token_at(tokens, pos);

        (0..len)
            .map(|i| {
                let mut attrs = vec!["bias".to_string()];
                for off in self.window.0..=self.window.1 {
                    if let Some(tok) = at(i + off) {
                        attrs.push(format!("w[{off}]={tok}"));
                    }
                    if self.max_ngram >= 2 && off < self.window.1 {
                        if let (Some(a), Some(b)) = (at(i + off), at(i + off + 1)) {
                            attrs.push(format!("w[{off}]|w[{}]={a}|{b}", off + 1));
                        }
                    }
                }
                if self.shape {
                    if let Some(tok) = at(i) {
                        push_shape(&mut attrs, tok);
                    }
                }
                if self.boundaries {
                    if i == 0 {
                        attrs.push(BOS.to_string());
                    }
                    if i == len - 1 {
                        attrs.push(EOS.to_string());
                    }
                }
                attrs
            })
            .collect()
    }
}

fn push_shape(attrs: &mut Vec<String>, token: &str) {
    attrs.push(format!("shape={}", word_shape(token)));
    if token.chars().next().is_some_and(char::is_uppercase) {
        attrs.push("is_title".to_string());
    }
    if token.chars().any(char::is_alphabetic) && !token.chars().any(char::is_lowercase) {
        attrs.push("is_upper".to_string());
    }
    if token.chars().any(|c| c.is_ascii_digit()) {
        attrs.push("has_digit".to_string());
    }
}

/// `Xx` for `Tribunal`, `d.d` for `8.666`: character classes with runs
/// collapsed.
pub fn word_shape(token: &str) -> String {
    let mut shape = String::new();
    for c in token.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_ascii_digit() {
            'd'
        } else {
            c
        };
        if !shape.ends_with(class) {
            shape.push(class);
        }
    }
    shape
}

fn token_at<S: AsRef<str>>(tokens: &[S], pos: isize) -> Option<&str> {
    usize::try_from(pos)
        .ok()
        .and_then(|p| tokens.get(p))
        .map(|t| t.as_ref())
}

/// Size of the model's observation space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSummary {
    /// Distinct attribute names seen in the training sequences.
    pub attributes: usize,
    pub labels: Vec<String>,
}

impl FeatureSummary {
    pub fn from_attributes<'a>(
        attributes: impl IntoIterator<Item = &'a Vec<Vec<String>>>,
        labels: impl IntoIterator<Item = String>,
    ) -> Self {
        let distinct: BTreeSet<&str> = attributes
            .into_iter()
            .flatten()
            .flatten()
            .map(String::as_str)
            .collect();
        let labels: BTreeSet<String> = labels.into_iter().collect();
        Self {
            attributes: distinct.len(),
            labels: labels.into_iter().collect(),
        }
    }
}
