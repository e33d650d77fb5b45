//! # LeNER Trainer
//!
//! Model adapters and the experiment driver. A run resolves a model family
//! from `(method, model)` selectors, adapts the dataset into the layout that
//! family reads, trains it and scores the result.
//!
//! Families:
//! - `crf`: `first-order`, `higher-order`, `semi-markov` (CRFsuite)
//! - `embedding`: `bilstm`, `window` (candle)

pub mod adapter;
pub mod config;
pub mod crf;
pub mod driver;
pub mod embedding;
pub mod features;
pub mod split;

pub use adapter::{ModelAdapter, Predictions, SequenceLabeler, Stage, TrainedModelHandle};
pub use config::{
    CrfVariant, DataOptions, EmbeddingVariant, ExperimentConfig, ModelFamily, SplitStrategy,
    TrainingConfig,
};
pub use crf::CrfModel;
pub use driver::{Experiment, ExperimentOutcome};
pub use embedding::EmbeddingModel;
