//! Experiment driver: adapt, build, train, evaluate.

use std::path::PathBuf;

use lener_core::{AdaptSummary, EvaluationReport, FormatSpec, LenerError, Result, adapt};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapter::{ModelAdapter, TrainedModelHandle};
use crate::config::{ExperimentConfig, ModelFamily};

/// Result of one experiment run.
#[derive(Debug, Serialize)]
pub struct ExperimentOutcome {
    pub model: String,
    pub adapted: AdaptSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fold: Option<usize>,
    pub evaluated: PathBuf,
    /// `None` when there was nothing to train on.
    pub report: Option<EvaluationReport>,
}

/// One configured run over a single model family.
#[derive(Debug, Clone)]
pub struct Experiment {
    family: ModelFamily,
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(family: ModelFamily, config: ExperimentConfig) -> Self {
        Self { family, config }
    }

    /// Resolve the `--method` / `--model` selectors.
    pub fn from_selectors(method: &str, model: &str, config: ExperimentConfig) -> Result<Self> {
        Ok(Self::new(ModelFamily::select(method, model)?, config))
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Layout the family's engine reads.
    pub fn format_spec(&self) -> FormatSpec {
        let spec = match self.family {
            ModelFamily::Crf(_) => FormatSpec::segmented(),
            ModelFamily::Embedding(_) => FormatSpec::concatenated(self.config.percentage),
        };
        match self.config.freshness {
            Some(freshness) => spec.with_freshness(freshness),
            None => spec,
        }
    }

    /// Directory the adapted dataset is written to.
    pub fn adapted_dir(&self) -> PathBuf {
        self.config.dataset_dir.join(self.family.dataset_dir_name())
    }

    /// File or directory evaluated after training.
    pub fn eval_source(&self) -> PathBuf {
        if let Some(path) = &self.config.eval_file {
            return path.clone();
        }
        let split = self.config.eval_split.dir_name();
        match self.family {
            ModelFamily::Crf(_) => self.adapted_dir().join(split),
            ModelFamily::Embedding(_) => self.adapted_dir().join(format!("{split}.txt")),
        }
    }

    pub fn run(&self) -> Result<ExperimentOutcome> {
        info!(
            model = %self.family,
            dataset = %self.config.dataset_dir.display(),
            "experiment started"
        );

        let adapted = adapt(
            &self.config.dataset_dir,
            &self.adapted_dir(),
            &self.format_spec(),
        )?;
        info!(
            target = %adapted.target.display(),
            reused = adapted.reused,
            "dataset adapted"
        );

        let mut adapter = ModelAdapter::new(
            self.family,
            self.adapted_dir(),
            &self.config.output_dir,
            self.config.data.clone(),
        );
        adapter.build()?;
        let training = self.config.training_for(self.family);
        let handle = adapter.train(&training)?;

        let evaluated = self.eval_source();
        let report = match &handle {
            Some(_) => {
                if !evaluated.exists() {
                    return Err(LenerError::not_found(&evaluated));
                }
                Some(adapter.evaluate(&evaluated, self.config.per_tag)?)
            }
            None => {
                warn!(model = %self.family, "training produced no model, skipping evaluation");
                None
            }
        };

        let (artifact, fold) = match handle {
            Some(TrainedModelHandle { artifact, fold, .. }) => (Some(artifact), fold),
            None => (None, None),
        };
        Ok(ExperimentOutcome {
            model: self.family.to_string(),
            adapted,
            artifact,
            fold,
            evaluated,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrfVariant, EmbeddingVariant};
    use lener_core::{Freshness, Layout, Split};

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            dataset_dir: PathBuf::from("/data/lener"),
            percentage: 0.5,
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn crf_reads_segmented_test_split() {
        let exp = Experiment::new(ModelFamily::Crf(CrfVariant::FirstOrder), config());
        assert_eq!(exp.adapted_dir(), PathBuf::from("/data/lener/crf"));
        assert_eq!(exp.eval_source(), PathBuf::from("/data/lener/crf/test"));
        let spec = exp.format_spec();
        assert_eq!(spec.layout, Layout::Segmented);
        assert_eq!(spec.freshness, Freshness::ContentHash);
    }

    #[test]
    fn embedding_reads_concatenated_file() {
        let mut cfg = config();
        cfg.eval_split = Split::Dev;
        cfg.freshness = Some(Freshness::SkipIfExists);
        let exp = Experiment::new(ModelFamily::Embedding(EmbeddingVariant::Bilstm), cfg);
        assert_eq!(exp.eval_source(), PathBuf::from("/data/lener/embedding/dev.txt"));
        let spec = exp.format_spec();
        assert_eq!(spec.layout, Layout::Concatenated { percentage: 0.5 });
        assert_eq!(spec.freshness, Freshness::SkipIfExists);
    }

    #[test]
    fn eval_file_overrides_split() {
        let mut cfg = config();
        cfg.eval_file = Some(PathBuf::from("/tmp/sample.txt"));
        let exp = Experiment::new(ModelFamily::Crf(CrfVariant::HigherOrder), cfg);
        assert_eq!(exp.eval_source(), PathBuf::from("/tmp/sample.txt"));
    }

    #[test]
    fn unknown_selector() {
        let err = Experiment::from_selectors("hmm", "first-order", config()).unwrap_err();
        assert!(matches!(err, LenerError::InvalidArgument(_)));
    }
}
