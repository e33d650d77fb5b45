//! Experiment configuration.
//!
//! Everything here is a plain value built once per run. Selector strings
//! (`--method`, `--model`) are resolved into a closed [`ModelFamily`] up front;
//! optimisation settings stay as strings until the chosen adapter validates
//! them, so an unsupported method surfaces as `InvalidConfig` from `train`.

use std::fmt;
use std::path::PathBuf;

use lener_core::{Freshness, LenerError, Result, Split};
use serde::{Deserialize, Serialize};

/// Variants of the CRF family. They differ in the attribute template only:
/// every variant is trained as a first-order linear chain (label bigrams).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrfVariant {
    /// Token unigrams over a [-1, 1] window.
    FirstOrder,
    /// Unigrams and bigrams over a [-1, 1] window plus sequence boundaries.
    /// Higher-order observations, not a higher-order label chain.
    HigherOrder,
    /// Unigrams and bigrams over a [-2, 2] window, boundaries, and word-shape
    /// attributes (capitalisation, digits, shape) that describe the segment a
    /// token sits in.
    SemiMarkov,
}

/// Variants of the embedding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingVariant {
    /// Embedding, bidirectional LSTM, linear projection.
    Bilstm,
    /// Embedding of a three-token window, hidden layer, linear projection.
    Window,
}

/// The model family chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Crf(CrfVariant),
    Embedding(EmbeddingVariant),
}

impl ModelFamily {
    /// Methods accepted by [`ModelFamily::select`].
    pub const METHODS: &'static [&'static str] = &["crf", "embedding"];

    /// Resolve a `(method, model)` selector pair.
    pub fn select(method: &str, model: &str) -> Result<Self> {
        let model_key = model.trim().to_ascii_lowercase();
        match method.trim().to_ascii_lowercase().as_str() {
            "crf" => match model_key.as_str() {
                "first-order" | "firstordercrf" => Ok(Self::Crf(CrfVariant::FirstOrder)),
                "higher-order" | "hocrfad" => Ok(Self::Crf(CrfVariant::HigherOrder)),
                "semi-markov" | "hosemicrfad" => Ok(Self::Crf(CrfVariant::SemiMarkov)),
                _ => Err(unknown_model(
                    "crf",
                    model,
                    &["first-order", "higher-order", "semi-markov"],
                )),
            },
            "embedding" => match model_key.as_str() {
                "bilstm" | "blstm" => Ok(Self::Embedding(EmbeddingVariant::Bilstm)),
                "window" => Ok(Self::Embedding(EmbeddingVariant::Window)),
                _ => Err(unknown_model("embedding", model, &["bilstm", "window"])),
            },
            other => Err(LenerError::InvalidArgument(format!(
                "unknown method {other:?}, expected one of: {}",
                Self::METHODS.join(", ")
            ))),
        }
    }

    /// Name of the adapted dataset directory this family reads.
    pub fn dataset_dir_name(&self) -> &'static str {
        match self {
            Self::Crf(_) => "crf",
            Self::Embedding(_) => "embedding",
        }
    }

    /// Name used for the family's working directory.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Crf(CrfVariant::FirstOrder) => "crf-first-order",
            Self::Crf(CrfVariant::HigherOrder) => "crf-higher-order",
            Self::Crf(CrfVariant::SemiMarkov) => "crf-semi-markov",
            Self::Embedding(EmbeddingVariant::Bilstm) => "embedding-bilstm",
            Self::Embedding(EmbeddingVariant::Window) => "embedding-window",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

fn unknown_model(method: &str, model: &str, known: &[&str]) -> LenerError {
    LenerError::InvalidArgument(format!(
        "unknown {method} model {model:?}, expected one of: {}",
        known.join(", ")
    ))
}

/// How the training sequences are partitioned before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum SplitStrategy {
    /// Train once per fold on the other `k - 1` folds.
    CrossValidation { k: usize },
    /// Train once on every sequence.
    Single,
}

impl Default for SplitStrategy {
    fn default() -> Self {
        Self::CrossValidation { k: 5 }
    }
}

/// Which training sequences a model is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataOptions {
    pub split: SplitStrategy,
    /// Only the first `n` training sequences are used when set.
    pub max_train_sequences: Option<usize>,
    pub seed: u64,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            split: SplitStrategy::default(),
            max_train_sequences: None,
            seed: 42,
        }
    }
}

impl DataOptions {
    pub fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    pub fn with_max_train_sequences(mut self, max: Option<usize>) -> Self {
        self.max_train_sequences = max;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Optimisation settings handed to `train`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub optimization_method: String,
    /// `none`, `l1` or `l2`.
    pub regularization_type: String,
    pub regularization_value: f64,
    pub epochs: usize,
    /// Step size for the embedding family's optimiser.
    pub learning_rate: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            optimization_method: "lbfgs".to_string(),
            regularization_type: "l2".to_string(),
            regularization_value: 0.0,
            epochs: 10,
            learning_rate: 0.01,
        }
    }
}

impl TrainingConfig {
    /// Defaults for the embedding family.
    pub fn embedding() -> Self {
        Self {
            optimization_method: "adamw".to_string(),
            regularization_type: "none".to_string(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.optimization_method = method.into();
        self
    }

    pub fn with_regularization(mut self, kind: impl Into<String>, value: f64) -> Self {
        self.regularization_type = kind.into();
        self.regularization_value = value;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }
}

/// Regularisation kind parsed from [`TrainingConfig::regularization_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regularization {
    None,
    L1,
    L2,
}

impl Regularization {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            other => Err(LenerError::InvalidConfig(format!(
                "unknown regularization type {other:?}, expected none, l1 or l2"
            ))),
        }
    }
}

/// Everything the experiment driver needs. Loadable from a JSON file; every
/// field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Root holding `train/`, `dev/` and `test/`.
    pub dataset_dir: PathBuf,
    /// Where trained models and predictions are written.
    pub output_dir: PathBuf,
    /// Share of documents kept by the concatenated layout.
    pub percentage: f64,
    /// Overrides the family's default freshness policy when set.
    pub freshness: Option<Freshness>,
    pub training: Option<TrainingConfig>,
    pub data: DataOptions,
    pub per_tag: bool,
    /// Evaluate on this file or directory instead of the adapted split.
    pub eval_file: Option<PathBuf>,
    pub eval_split: Split,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("lener"),
            output_dir: PathBuf::from("output"),
            percentage: 1.0,
            freshness: None,
            training: None,
            data: DataOptions::default(),
            per_tag: true,
            eval_file: None,
            eval_split: Split::Test,
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON configuration file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LenerError::not_found(path));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Training settings for `family`, falling back to the family default.
    pub fn training_for(&self, family: ModelFamily) -> TrainingConfig {
        match (&self.training, family) {
            (Some(cfg), _) => cfg.clone(),
            (None, ModelFamily::Crf(_)) => TrainingConfig::default(),
            (None, ModelFamily::Embedding(_)) => TrainingConfig::embedding(),
        }
    }
}
