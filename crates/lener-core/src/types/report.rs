use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tagging::LENER_TAGS;

/// Precision, recall, F1 and accuracy, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

/// Result of evaluating a trained model against reference sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Metrics over all entity tags (outside class excluded from P/R/F1).
    pub overall: MetricSet,
    /// Per-tag metrics, keyed by tag name. Empty when not requested.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub per_tag: BTreeMap<String, MetricSet>,
    /// Number of sequences compared.
    pub sequences: usize,
    /// Number of token positions compared.
    pub tokens: usize,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        self.overall.accuracy
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1", "accuracy"
        )?;
        let mut rows: Vec<_> = self.per_tag.iter().collect();
        rows.sort_by_key(|(tag, _)| {
            LENER_TAGS
                .iter()
                .position(|t| t == tag)
                .unwrap_or(LENER_TAGS.len())
        });
        for (tag, m) in rows {
            writeln!(
                f,
                "{:<20} {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
                tag, m.precision, m.recall, m.f1, m.accuracy
            )?;
        }
        write!(
            f,
            "{:<20} {:>9.4} {:>9.4} {:>9.4} {:>9.4}\n({} sequences, {} tokens)",
            "overall",
            self.overall.precision,
            self.overall.recall,
            self.overall.f1,
            self.overall.accuracy,
            self.sequences,
            self.tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display_lists_tags() {
        let mut report = EvaluationReport {
            sequences: 2,
            tokens: 10,
            ..Default::default()
        };
        report
            .per_tag
            .insert("B-PESSOA".into(), MetricSet::default());
        report
            .per_tag
            .insert("B-ORGANIZACAO".into(), MetricSet::default());
        let text = report.to_string();
        // LeNER order, not alphabetical.
        let organizacao = text.find("B-ORGANIZACAO").unwrap();
        let pessoa = text.find("B-PESSOA").unwrap();
        assert!(organizacao < pessoa);
        assert!(text.contains("overall"));
        assert!(text.contains("2 sequences"));
    }

    #[test]
    fn report_json_omits_empty_per_tag() {
        let report = EvaluationReport::default();
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("per_tag"));
        let back: EvaluationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
    }
}
