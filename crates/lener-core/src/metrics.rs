//! Token-level evaluation metrics
//!
//! Aligns predicted label sequences with reference sequences position by
//! position and derives precision, recall, F1 and accuracy from a confusion
//! table:
//! - overall accuracy over every token
//! - overall micro precision/recall/F1 over every tag except the outside class
//! - per-tag metrics treating the tag as positive and all others as negative

use std::collections::{BTreeMap, HashMap};

use crate::error::{LenerError, Result};
use crate::types::{EvaluationReport, MetricSet, TaggedSequence};

/// Counts of (reference, predicted) label pairs.
#[derive(Debug, Clone, Default)]
pub struct ConfusionTable {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    /// `matrix[reference][predicted]`
    matrix: Vec<Vec<usize>>,
}

impl ConfusionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from reference sequences and the labels predicted for them.
    ///
    /// `predicted[i]` must belong to `reference[i]` and have the same length.
    pub fn from_sequences(reference: &[TaggedSequence], predicted: &[Vec<String>]) -> Result<Self> {
        if reference.len() != predicted.len() {
            return Err(LenerError::PreconditionViolation(format!(
                "cannot align {} reference sequences with {} predictions",
                reference.len(),
                predicted.len()
            )));
        }
        let mut table = Self::new();
        for (seq, pred) in reference.iter().zip(predicted) {
            if seq.len() != pred.len() {
                return Err(LenerError::PreconditionViolation(format!(
                    "sequence {} has {} tokens but {} predicted labels",
                    seq.id(),
                    seq.len(),
                    pred.len()
                )));
            }
            for (truth, guess) in seq.labels().iter().zip(pred) {
                table.add(truth, guess);
            }
        }
        Ok(table)
    }

    /// Record one aligned position.
    pub fn add(&mut self, reference: &str, predicted: &str) {
        let r = self.slot(reference);
        let p = self.slot(predicted);
        self.matrix[r][p] += 1;
    }

    fn slot(&mut self, label: &str) -> usize {
        if let Some(&i) = self.index.get(label) {
            return i;
        }
        let i = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), i);
        for row in &mut self.matrix {
            row.push(0);
        }
        self.matrix.push(vec![0; i + 1]);
        i
    }

    /// Labels seen so far, in first-seen order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.labels.len()).map(|i| self.matrix[i][i]).sum()
    }

    pub fn true_positives(&self, label: &str) -> usize {
        self.index.get(label).map_or(0, |&i| self.matrix[i][i])
    }

    /// Predicted as `label` but was something else.
    pub fn false_positives(&self, label: &str) -> usize {
        self.index.get(label).map_or(0, |&c| {
            (0..self.labels.len())
                .filter(|&i| i != c)
                .map(|i| self.matrix[i][c])
                .sum()
        })
    }

    /// Was `label` but predicted as something else.
    pub fn false_negatives(&self, label: &str) -> usize {
        self.index.get(label).map_or(0, |&c| {
            (0..self.labels.len())
                .filter(|&j| j != c)
                .map(|j| self.matrix[c][j])
                .sum()
        })
    }

    pub fn true_negatives(&self, label: &str) -> usize {
        self.total()
            - self.true_positives(label)
            - self.false_positives(label)
            - self.false_negatives(label)
    }

    /// Token accuracy over all positions.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Binary metrics for `label` against every other label.
    pub fn tag_metrics(&self, label: &str) -> MetricSet {
        let tp = self.true_positives(label);
        let fp = self.false_positives(label);
        let fn_ = self.false_negatives(label);
        let tn = self.true_negatives(label);
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        MetricSet {
            precision,
            recall,
            f1: f1(precision, recall),
            accuracy: ratio(tp + tn, self.total()),
        }
    }

    /// Micro-averaged precision/recall/F1 over all labels but `outside_symbol`,
    /// with token accuracy over all positions.
    pub fn overall(&self, outside_symbol: &str) -> MetricSet {
        let entity_labels = self.labels.iter().filter(|l| l.as_str() != outside_symbol);
        let (tp, fp, fn_) = entity_labels.fold((0, 0, 0), |(tp, fp, fn_), l| {
            (
                tp + self.true_positives(l),
                fp + self.false_positives(l),
                fn_ + self.false_negatives(l),
            )
        });
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        MetricSet {
            precision,
            recall,
            f1: f1(precision, recall),
            accuracy: self.accuracy(),
        }
    }
}

/// Evaluate `predicted` against `reference`.
///
/// When `per_tag` is given, the report also carries binary metrics for each of
/// those tags.
pub fn evaluate(
    reference: &[TaggedSequence],
    predicted: &[Vec<String>],
    outside_symbol: &str,
    per_tag: Option<&[String]>,
) -> Result<EvaluationReport> {
    let table = ConfusionTable::from_sequences(reference, predicted)?;
    let per_tag = per_tag
        .map(|tags| {
            tags.iter()
                .map(|t| (t.clone(), table.tag_metrics(t)))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    Ok(EvaluationReport {
        overall: table.overall(outside_symbol),
        per_tag,
        sequences: reference.len(),
        tokens: table.total(),
    })
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}
