//! # Viterbi Decoding
//!
//! Finds the highest scoring label path given per-position emission scores and
//! a label-to-label transition matrix, refusing BIO-invalid transitions.

use crate::error::{LenerError, Result};
use crate::tagging::bio_tags::BioTag;

/// Viterbi decoder over a fixed label set.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    num_tags: usize,
    /// `allowed[prev][curr]`
    allowed: Vec<Vec<bool>>,
    allowed_start: Vec<bool>,
}

impl ViterbiDecoder {
    /// Create a decoder that allows every transition.
    pub fn new(num_tags: usize) -> Self {
        Self {
            num_tags,
            allowed: vec![vec![true; num_tags]; num_tags],
            allowed_start: vec![true; num_tags],
        }
    }

    /// Create a decoder constrained by the BIO scheme of `labels`.
    ///
    /// Index `i` of every score vector refers to `labels[i]`.
    pub fn constrained<S: AsRef<str>>(labels: &[S]) -> Self {
        let tags: Vec<BioTag> = labels.iter().map(|l| BioTag::parse(l.as_ref())).collect();
        let allowed = tags
            .iter()
            .map(|prev| {
                tags.iter()
                    .map(|curr| BioTag::is_valid_transition(prev, curr))
                    .collect()
            })
            .collect();
        let allowed_start = tags.iter().map(BioTag::is_valid_start).collect();
        Self {
            num_tags: tags.len(),
            allowed,
            allowed_start,
        }
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    /// Decode the optimal tag sequence.
    ///
    /// # Arguments
    /// * `emission_scores` - `[seq_len][num_tags]` emission scores
    /// * `transition_matrix` - `[num_tags][num_tags]`, `[prev][curr]`
    ///
    /// # Returns
    /// The optimal tag sequence as indices. When the constraints leave no
    /// finite path the per-position argmax is returned instead.
    pub fn decode(
        &self,
        emission_scores: &[Vec<f32>],
        transition_matrix: &[Vec<f32>],
    ) -> Result<Vec<usize>> {
        let seq_len = emission_scores.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }

        if let Some(row) = emission_scores.iter().find(|r| r.len() != self.num_tags) {
            return Err(LenerError::Engine(format!(
                "emission score dimension mismatch: expected {}, got {}",
                self.num_tags,
                row.len()
            )));
        }
        if transition_matrix.len() != self.num_tags
            || transition_matrix.iter().any(|r| r.len() != self.num_tags)
        {
            return Err(LenerError::Engine(format!(
                "transition matrix must be {0}x{0}",
                self.num_tags
            )));
        }

        let mut dp = vec![vec![f32::NEG_INFINITY; self.num_tags]; seq_len];
        let mut backptr = vec![vec![0usize; self.num_tags]; seq_len];

        for tag in 0..self.num_tags {
            if self.allowed_start[tag] {
                dp[0][tag] = emission_scores[0][tag];
            }
        }

        for pos in 1..seq_len {
            for curr in 0..self.num_tags {
                let mut best_score = f32::NEG_INFINITY;
                let mut best_prev = 0;

                for prev in 0..self.num_tags {
                    if !self.allowed[prev][curr] {
                        continue;
                    }
                    let score = dp[pos - 1][prev] + transition_matrix[prev][curr];
                    if score > best_score {
                        best_score = score;
                        best_prev = prev;
                    }
                }

                dp[pos][curr] = best_score + emission_scores[pos][curr];
                backptr[pos][curr] = best_prev;
            }
        }

        let (best_final_tag, best_final_score) = argmax(&dp[seq_len - 1]);
        if best_final_score == f32::NEG_INFINITY {
            return Ok(emission_scores.iter().map(|row| argmax(row).0).collect());
        }

        let mut path = Vec::with_capacity(seq_len);
        let mut curr = best_final_tag;
        path.push(curr);
        for pos in (1..seq_len).rev() {
            curr = backptr[pos][curr];
            path.push(curr);
        }
        path.reverse();
        Ok(path)
    }
}

fn argmax(row: &[f32]) -> (usize, f32) {
    row.iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, s)| {
            if s > best.1 { (i, s) } else { best }
        })
}
