//! # Model Adapters
//!
//! A uniform build / train / predict / evaluate contract over the supported
//! model families. Each family implements [`SequenceLabeler`]; the driver
//! holds a [`ModelAdapter`], picked once from the command line.
//!
//! Lifecycle: `Unbuilt -> Built -> Trained`. Only a successful `train`
//! produces a [`TrainedModelHandle`], and predict/evaluate refuse to run
//! without one.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lener_core::dataset::has_crf_header;
use lener_core::metrics;
use lener_core::{
    EvaluationReport, LENER_TAGS, LenerError, ParseOptions, Result, TaggedSequence, load_file,
    load_split_with,
};
use tracing::info;

use crate::config::{DataOptions, ModelFamily, TrainingConfig};
use crate::crf::CrfModel;
use crate::embedding::EmbeddingModel;

/// File the predictions of an `evaluate` call are written to, inside the
/// trained model's directory.
pub const EVALUATION_OUTPUT: &str = "output_evaluation.txt";

/// Sequence id -> predicted labels.
pub type Predictions = BTreeMap<usize, Vec<String>>;

/// Where a trained model lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainedModelHandle {
    /// Directory holding the artifact.
    pub dir: PathBuf,
    /// The artifact itself (model file).
    pub artifact: PathBuf,
    /// Fold that produced the artifact, for fold-wise training.
    pub fold: Option<usize>,
}

/// Lifecycle stage of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unbuilt,
    Built,
    Trained,
}

/// Capability set every model family provides.
pub trait SequenceLabeler {
    /// Human-readable family name, used in logs.
    fn name(&self) -> String;

    fn stage(&self) -> Stage;

    /// Construct the underlying model. Fails if already built.
    fn build(&mut self) -> Result<()>;

    /// Fit the model. Returns `Ok(None)` when there is nothing to train on.
    fn train(&mut self, config: &TrainingConfig) -> Result<Option<TrainedModelHandle>>;

    /// Drop any built or trained state.
    fn reset(&mut self);

    fn handle(&self) -> Option<&TrainedModelHandle>;

    /// Labels the trained model can emit.
    fn labels(&self) -> Vec<String>;

    fn outside_symbol(&self) -> &str;

    /// Parse options for one evaluation file: the segmented layout when it
    /// starts with the CRF header, raw LeNER columns otherwise.
    fn source_options(&self, file: &Path) -> Result<ParseOptions> {
        if has_crf_header(file)? {
            Ok(ParseOptions::segmented())
        } else {
            Ok(ParseOptions::raw())
        }
    }

    /// Best-path labels for each sequence, in input order.
    fn decode(&mut self, sequences: &[TaggedSequence]) -> Result<Vec<Vec<String>>>;

    /// Decode `sequences`, write them to `output` and return them keyed by id.
    fn predict(&mut self, sequences: &[TaggedSequence], output: &Path) -> Result<Predictions> {
        require_trained(self.handle(), "predict")?;
        let decoded = self.decode(sequences)?;
        write_predictions(output, sequences, &decoded)?;
        Ok(sequences
            .iter()
            .map(TaggedSequence::id)
            .zip(decoded)
            .collect())
    }

    /// Load `source` (a file or a directory of files), predict it and score
    /// the predictions against its reference labels.
    fn evaluate(&mut self, source: &Path, per_tag: bool) -> Result<EvaluationReport> {
        let handle = require_trained(self.handle(), "evaluate")?.clone();

        let sequences = if source.is_dir() {
            load_split_with(source, |file| self.source_options(file))?
        } else if source.is_file() {
            load_file(source, &self.source_options(source)?)?
        } else {
            return Err(LenerError::not_found(source));
        };

        let output = handle.dir.join(EVALUATION_OUTPUT);
        let predictions = self.predict(&sequences, &output)?;
        let aligned: Vec<Vec<String>> = sequences
            .iter()
            .map(|seq| predictions.get(&seq.id()).cloned().unwrap_or_default())
            .collect();

        let outside = self.outside_symbol().to_string();
        let tags: Option<Vec<String>> = per_tag.then(|| {
            let known = self.labels();
            LENER_TAGS
                .iter()
                .filter(|tag| known.iter().any(|l| l == *tag))
                .map(|tag| tag.to_string())
                .collect()
        });
        let report = metrics::evaluate(&sequences, &aligned, &outside, tags.as_deref())?;

        info!(
            model = %self.name(),
            source = %source.display(),
            accuracy = report.overall.accuracy,
            f1 = report.overall.f1,
            "evaluation finished"
        );
        Ok(report)
    }
}

/// Fail with `PreconditionViolation` unless a model has been trained.
pub fn require_trained<'a>(
    handle: Option<&'a TrainedModelHandle>,
    operation: &str,
) -> Result<&'a TrainedModelHandle> {
    handle.ok_or_else(|| {
        LenerError::PreconditionViolation(format!("{operation} called before a successful train"))
    })
}

/// Write `token<TAB>label` rows, one blank line between sequences.
pub fn write_predictions(
    output: &Path,
    sequences: &[TaggedSequence],
    labels: &[Vec<String>],
) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(output)?);
    for (seq, predicted) in sequences.iter().zip(labels) {
        for (token, label) in seq.tokens().iter().zip(predicted) {
            writeln!(out, "{token}\t{label}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// The adapter for one model family.
pub enum ModelAdapter {
    Crf(CrfModel),
    Embedding(EmbeddingModel),
}

impl ModelAdapter {
    /// Create the adapter for `family`.
    ///
    /// `dataset_dir` is the family's adapted dataset, `working_dir` receives
    /// trained artifacts.
    pub fn new(
        family: ModelFamily,
        dataset_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        data: DataOptions,
    ) -> Self {
        match family {
            ModelFamily::Crf(variant) => {
                Self::Crf(CrfModel::new(variant, dataset_dir, working_dir, data))
            }
            ModelFamily::Embedding(variant) => {
                Self::Embedding(EmbeddingModel::new(variant, dataset_dir, working_dir, data))
            }
        }
    }

    fn labeler(&self) -> &dyn SequenceLabeler {
        match self {
            Self::Crf(m) => m,
            Self::Embedding(m) => m,
        }
    }

    fn labeler_mut(&mut self) -> &mut dyn SequenceLabeler {
        match self {
            Self::Crf(m) => m,
            Self::Embedding(m) => m,
        }
    }

    pub fn name(&self) -> String {
        self.labeler().name()
    }

    pub fn stage(&self) -> Stage {
        self.labeler().stage()
    }

    pub fn build(&mut self) -> Result<()> {
        self.labeler_mut().build()
    }

    pub fn train(&mut self, config: &TrainingConfig) -> Result<Option<TrainedModelHandle>> {
        self.labeler_mut().train(config)
    }

    pub fn reset(&mut self) {
        self.labeler_mut().reset()
    }

    pub fn handle(&self) -> Option<&TrainedModelHandle> {
        self.labeler().handle()
    }

    pub fn predict(&mut self, sequences: &[TaggedSequence], output: &Path) -> Result<Predictions> {
        self.labeler_mut().predict(sequences, output)
    }

    pub fn evaluate(&mut self, source: &Path, per_tag: bool) -> Result<EvaluationReport> {
        self.labeler_mut().evaluate(source, per_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictions_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/out.txt");
        let sequences = vec![
            TaggedSequence::from_pairs(1, [("TCU", "B-ORGANIZACAO"), ("julgou", "O")]),
            TaggedSequence::from_pairs(2, [("2016", "B-TEMPO")]),
        ];
        let labels = vec![
            vec!["B-ORGANIZACAO".to_string(), "O".to_string()],
            vec!["O".to_string()],
        ];
        write_predictions(&output, &sequences, &labels).unwrap();
        let text = fs::read_to_string(&output).unwrap();
        assert_eq!(text, "TCU\tB-ORGANIZACAO\njulgou\tO\n\n2016\tO\n\n");
    }

    #[test]
    fn require_trained_without_handle() {
        let err = require_trained(None, "predict").unwrap_err();
        assert!(matches!(err, LenerError::PreconditionViolation(_)));
        assert!(err.to_string().contains("predict"));
    }
}
