//! CRF family, backed by CRFsuite.
//!
//! `build` loads the adapted training split and turns every sequence into
//! attribute lists; `train` fits one CRFsuite model per fold and keeps the
//! last one.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crfsuite::{Algorithm, Attribute, GraphicalModel, Item, Model, Trainer};
use lener_core::metrics;
use lener_core::{LenerError, ParseOptions, Result, Split, TaggedSequence, load_split};
use tracing::{debug, info};

use crate::adapter::{SequenceLabeler, Stage, TrainedModelHandle};
use crate::config::{CrfVariant, DataOptions, ModelFamily, Regularization, TrainingConfig};
use crate::features::{FeatureSummary, FeatureTemplate};
use crate::split::{Fold, partition};

pub const MODEL_FILE: &str = "model.crfsuite";

/// Training algorithms CRFsuite offers for a first-order chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrfMethod {
    Lbfgs,
    L2sgd,
    Ap,
    Pa,
    Arow,
}

impl CrfMethod {
    pub const NAMES: &'static [&'static str] = &["lbfgs", "l2sgd", "ap", "pa", "arow"];

    pub fn parse(method: &str) -> Result<Self> {
        match method.trim().to_ascii_lowercase().as_str() {
            "lbfgs" => Ok(Self::Lbfgs),
            "l2sgd" => Ok(Self::L2sgd),
            "ap" => Ok(Self::Ap),
            "pa" => Ok(Self::Pa),
            "arow" => Ok(Self::Arow),
            _ => Err(LenerError::InvalidConfig(format!(
                "unknown CRF optimization method {method:?}, expected one of: {}",
                Self::NAMES.join(", ")
            ))),
        }
    }

    fn algorithm(self) -> Algorithm {
        match self {
            Self::Lbfgs => Algorithm::LBFGS,
            Self::L2sgd => Algorithm::L2SGD,
            Self::Ap => Algorithm::AP,
            Self::Pa => Algorithm::PA,
            Self::Arow => Algorithm::AROW,
        }
    }
}

impl fmt::Display for CrfMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lbfgs => "lbfgs",
            Self::L2sgd => "l2sgd",
            Self::Ap => "ap",
            Self::Pa => "pa",
            Self::Arow => "arow",
        };
        f.write_str(name)
    }
}

/// Validated trainer parameters, as CRFsuite `name=value` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct CrfParams {
    pub method: CrfMethod,
    pub params: Vec<(&'static str, String)>,
}

impl CrfParams {
    /// Check `config` against what the chosen method supports.
    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        let method = CrfMethod::parse(&config.optimization_method)?;
        let regularization = Regularization::parse(&config.regularization_type)?;
        let value = config.regularization_value;
        if !value.is_finite() || value < 0.0 {
            return Err(LenerError::InvalidConfig(format!(
                "regularization value must be a non-negative number, got {value}"
            )));
        }

        let mut params = vec![("max_iterations", config.epochs.to_string())];
        match (method, regularization) {
            (CrfMethod::Lbfgs, Regularization::L1) => {
                params.push(("c1", value.to_string()));
                params.push(("c2", "0".to_string()));
            }
            (CrfMethod::Lbfgs, Regularization::L2) => {
                params.push(("c1", "0".to_string()));
                params.push(("c2", value.to_string()));
            }
            (CrfMethod::Lbfgs, Regularization::None) => {
                params.push(("c1", "0".to_string()));
                params.push(("c2", "0".to_string()));
            }
            (CrfMethod::L2sgd, Regularization::L2) => params.push(("c2", value.to_string())),
            (CrfMethod::L2sgd, Regularization::None) => params.push(("c2", "0".to_string())),
            (_, Regularization::None) => {}
            // A zero-weight L2 term is the same as none.
            (_, Regularization::L2) if value == 0.0 => {}
            (method, regularization) => {
                return Err(LenerError::InvalidConfig(format!(
                    "{} regularization is not supported by {method}",
                    match regularization {
                        Regularization::L1 => "l1",
                        _ => "l2",
                    }
                )));
            }
        }
        Ok(Self { method, params })
    }
}

#[derive(Debug)]
struct Prepared {
    sequences: Vec<TaggedSequence>,
    attributes: Vec<Vec<Vec<String>>>,
    folds: Vec<Fold>,
}

enum State {
    Unbuilt,
    Built(Prepared),
    Trained {
        prepared: Prepared,
        handle: TrainedModelHandle,
        model: Model,
    },
}

/// CRF model adapter.
pub struct CrfModel {
    variant: CrfVariant,
    template: FeatureTemplate,
    dataset_dir: PathBuf,
    working_dir: PathBuf,
    data: DataOptions,
    outside_symbol: String,
    labels: Vec<String>,
    state: State,
}

impl fmt::Debug for CrfModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrfModel")
            .field("variant", &self.variant)
            .field("dataset_dir", &self.dataset_dir)
            .field("working_dir", &self.working_dir)
            .field("stage", &self.stage())
            .finish()
    }
}

impl CrfModel {
    pub fn new(
        variant: CrfVariant,
        dataset_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        data: DataOptions,
    ) -> Self {
        Self {
            variant,
            template: FeatureTemplate::for_variant(variant),
            dataset_dir: dataset_dir.into(),
            working_dir: working_dir.into(),
            data,
            outside_symbol: ParseOptions::segmented().outside_symbol,
            labels: Vec::new(),
            state: State::Unbuilt,
        }
    }

    fn model_dir(&self) -> PathBuf {
        self.working_dir.join(ModelFamily::Crf(self.variant).slug())
    }

    fn prepared(&self) -> Option<&Prepared> {
        match &self.state {
            State::Unbuilt => None,
            State::Built(p) | State::Trained { prepared: p, .. } => Some(p),
        }
    }

    /// Distinct attributes and labels of the built training data.
    pub fn feature_summary(&self) -> Option<FeatureSummary> {
        self.prepared().map(|p| {
            FeatureSummary::from_attributes(
                &p.attributes,
                p.sequences.iter().flat_map(|s| s.labels().iter().cloned()),
            )
        })
    }

    /// Number of folds `train` will fit.
    pub fn fold_count(&self) -> Option<usize> {
        self.prepared().map(|p| p.folds.len())
    }

    fn items(&self, tokens: &[String]) -> Vec<Item> {
        to_items(self.template.extract(tokens))
    }

    fn fit_fold(
        &self,
        prepared: &Prepared,
        fold_index: usize,
        fold: &Fold,
        params: &CrfParams,
    ) -> Result<TrainedModelHandle> {
        let dir = self.model_dir().join(format!("fold-{fold_index}"));
        fs::create_dir_all(&dir)?;
        let artifact = dir.join(MODEL_FILE);

        let mut trainer = Trainer::new(false);
        trainer
            .select(params.method.algorithm(), GraphicalModel::CRF1D)
            .map_err(engine)?;
        for &i in &fold.train {
            let xseq = to_items(prepared.attributes[i].clone());
            let yseq: Vec<&str> = prepared.sequences[i]
                .labels()
                .iter()
                .map(String::as_str)
                .collect();
            trainer.append(&xseq, &yseq, 0).map_err(engine)?;
        }
        for (name, value) in &params.params {
            trainer.set(name, value).map_err(engine)?;
        }

        let path = artifact.to_str().ok_or_else(|| {
            LenerError::InvalidArgument(format!("non UTF-8 model path {}", artifact.display()))
        })?;
        trainer.train(path, -1).map_err(engine)?;

        debug!(
            fold = fold_index,
            train = fold.train.len(),
            validation = fold.validation.len(),
            artifact = %artifact.display(),
            "fold trained"
        );
        Ok(TrainedModelHandle {
            dir,
            artifact,
            fold: Some(fold_index),
        })
    }

    fn validate_fold(
        &self,
        model: &Model,
        prepared: &Prepared,
        fold_index: usize,
        fold: &Fold,
    ) -> Result<()> {
        if fold.validation.is_empty() {
            return Ok(());
        }
        let reference: Vec<TaggedSequence> = fold
            .validation
            .iter()
            .map(|&i| prepared.sequences[i].clone())
            .collect();
        let predicted = tag_all(model, &reference, |tokens| self.items(tokens))?;
        let report = metrics::evaluate(&reference, &predicted, &self.outside_symbol, None)?;
        info!(
            fold = fold_index,
            accuracy = report.overall.accuracy,
            f1 = report.overall.f1,
            "fold validation"
        );
        Ok(())
    }

    /// Fit every fold in order. The last fold's model is the one kept.
    fn fit_folds(
        &self,
        prepared: &Prepared,
        params: &CrfParams,
    ) -> Result<Option<(TrainedModelHandle, Model)>> {
        let mut last = None;
        for (i, fold) in prepared.folds.iter().enumerate() {
            let handle = self.fit_fold(prepared, i, fold, params)?;
            let model = load_model(&handle.artifact)?;
            self.validate_fold(&model, prepared, i, fold)?;
            last = Some((handle, model));
        }
        Ok(last)
    }
}

impl SequenceLabeler for CrfModel {
    fn name(&self) -> String {
        ModelFamily::Crf(self.variant).to_string()
    }

    fn stage(&self) -> Stage {
        match self.state {
            State::Unbuilt => Stage::Unbuilt,
            State::Built(_) => Stage::Built,
            State::Trained { .. } => Stage::Trained,
        }
    }

    fn build(&mut self) -> Result<()> {
        if !matches!(self.state, State::Unbuilt) {
            return Err(LenerError::PreconditionViolation(format!(
                "{} is already built, call reset() first",
                self.name()
            )));
        }

        let train_dir = self.dataset_dir.join(Split::Train.dir_name());
        let mut sequences = load_split(&train_dir, &ParseOptions::segmented())?;
        if let Some(max) = self.data.max_train_sequences {
            sequences.truncate(max);
        }
        let attributes: Vec<_> = sequences
            .iter()
            .map(|s| self.template.extract(s.tokens()))
            .collect();
        let folds = partition(sequences.len(), self.data.split, self.data.seed);

        let labels: BTreeSet<String> = sequences
            .iter()
            .flat_map(|s| s.labels().iter().cloned())
            .collect();
        self.labels = labels.into_iter().collect();

        info!(
            model = %self.name(),
            sequences = sequences.len(),
            folds = folds.len(),
            labels = self.labels.len(),
            "CRF built"
        );
        self.state = State::Built(Prepared {
            sequences,
            attributes,
            folds,
        });
        Ok(())
    }

    fn train(&mut self, config: &TrainingConfig) -> Result<Option<TrainedModelHandle>> {
        let params = CrfParams::from_config(config)?;

        if matches!(self.state, State::Unbuilt) {
            self.build()?;
        }
        let prepared = match std::mem::replace(&mut self.state, State::Unbuilt) {
            State::Built(p) | State::Trained { prepared: p, .. } => p,
            State::Unbuilt => {
                return Err(LenerError::PreconditionViolation(format!(
                    "{} has no training data",
                    self.name()
                )));
            }
        };

        if prepared.sequences.is_empty() {
            info!(model = %self.name(), "no training sequences, nothing to train");
            self.state = State::Built(prepared);
            return Ok(None);
        }

        info!(
            model = %self.name(),
            method = %params.method,
            folds = prepared.folds.len(),
            "training CRF"
        );
        match self.fit_folds(&prepared, &params) {
            Ok(Some((handle, model))) => {
                info!(
                    model = %self.name(),
                    artifact = %handle.artifact.display(),
                    "CRF trained"
                );
                self.state = State::Trained {
                    prepared,
                    handle: handle.clone(),
                    model,
                };
                Ok(Some(handle))
            }
            other => {
                self.state = State::Built(prepared);
                other.map(|_| None)
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Unbuilt;
        self.labels.clear();
    }

    fn handle(&self) -> Option<&TrainedModelHandle> {
        match &self.state {
            State::Trained { handle, .. } => Some(handle),
            _ => None,
        }
    }

    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn outside_symbol(&self) -> &str {
        &self.outside_symbol
    }

    fn decode(&mut self, sequences: &[TaggedSequence]) -> Result<Vec<Vec<String>>> {
        let State::Trained { model, .. } = &self.state else {
            return Err(LenerError::PreconditionViolation(
                "decode called before a successful train".to_string(),
            ));
        };
        tag_all(model, sequences, |tokens| self.items(tokens))
    }
}

fn tag_all(
    model: &Model,
    sequences: &[TaggedSequence],
    items: impl Fn(&[String]) -> Vec<Item>,
) -> Result<Vec<Vec<String>>> {
    let mut tagger = model.tagger().map_err(engine)?;
    sequences
        .iter()
        .map(|seq| {
            if seq.is_empty() {
                return Ok(Vec::new());
            }
            tagger.tag(&items(seq.tokens())).map_err(engine)
        })
        .collect()
}

fn to_items(attributes: Vec<Vec<String>>) -> Vec<Item> {
    attributes
        .into_iter()
        .map(|names| names.into_iter().map(|n| Attribute::new(n, 1.0)).collect())
        .collect()
}

fn load_model(path: &Path) -> Result<Model> {
    let path = path.to_str().ok_or_else(|| {
        LenerError::InvalidArgument(format!("non UTF-8 model path {}", path.display()))
    })?;
    Model::from_file(path).map_err(engine)
}

fn engine(e: impl fmt::Display) -> LenerError {
    LenerError::Engine(e.to_string())
}
