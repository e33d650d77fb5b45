//! Embedding family: a small candle network produces per-token emissions,
//! decoded with BIO-constrained Viterbi over transitions counted from the
//! training labels.
//!
//! Reads the concatenated layout (`<dataset>/train.txt`, tab separated).

pub mod network;
pub mod vocab;

use std::fmt;
use std::fs;
use std::path::PathBuf;

use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use lener_core::{
    LenerError, ParseOptions, Result, Split, TaggedSequence, ViterbiDecoder, load_file,
};
use oorandom::Rand32;
use tracing::{debug, info};

use crate::adapter::{SequenceLabeler, Stage, TrainedModelHandle};
use crate::config::{DataOptions, EmbeddingVariant, ModelFamily, TrainingConfig};

pub use network::{EmbeddingMethod, Network, NetworkShape, StepOptimizer};
pub use vocab::{TagSet, Vocabulary};

pub const MODEL_FILE: &str = "model.safetensors";
pub const VOCAB_FILE: &str = "vocab.json";
pub const LABELS_FILE: &str = "labels.json";

struct Built {
    sequences: Vec<TaggedSequence>,
    vocab: Vocabulary,
    tags: TagSet,
    varmap: VarMap,
    network: Network,
    decoder: ViterbiDecoder,
}

enum State {
    Unbuilt,
    Built(Built),
    Trained {
        built: Built,
        handle: TrainedModelHandle,
    },
}

/// Embedding model adapter.
pub struct EmbeddingModel {
    variant: EmbeddingVariant,
    shape: NetworkShape,
    dataset_dir: PathBuf,
    working_dir: PathBuf,
    data: DataOptions,
    outside_symbol: String,
    device: Device,
    state: State,
}

impl fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingModel")
            .field("variant", &self.variant)
            .field("shape", &self.shape)
            .field("dataset_dir", &self.dataset_dir)
            .field("stage", &self.stage())
            .finish()
    }
}

impl EmbeddingModel {
    pub fn new(
        variant: EmbeddingVariant,
        dataset_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        data: DataOptions,
    ) -> Self {
        Self {
            variant,
            shape: NetworkShape::default(),
            dataset_dir: dataset_dir.into(),
            working_dir: working_dir.into(),
            data,
            outside_symbol: ParseOptions::concatenated().outside_symbol,
            device: Device::Cpu,
            state: State::Unbuilt,
        }
    }

    pub fn with_shape(mut self, shape: NetworkShape) -> Self {
        self.shape = shape;
        self
    }

    fn model_dir(&self) -> PathBuf {
        self.working_dir.join(ModelFamily::Embedding(self.variant).slug())
    }

    fn built(&self) -> Option<&Built> {
        match &self.state {
            State::Unbuilt => None,
            State::Built(b) | State::Trained { built: b, .. } => Some(b),
        }
    }

    /// Vocabulary of the built model.
    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.built().map(|b| &b.vocab)
    }

    fn fit(&self, built: &Built, method: EmbeddingMethod, config: &TrainingConfig) -> Result<()> {
        let mut optimizer =
            StepOptimizer::new(method, &built.varmap, config.learning_rate).map_err(engine)?;

        let examples: Vec<(Vec<u32>, Vec<u32>)> = built
            .sequences
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| {
                let targets = s
                    .labels()
                    .iter()
                    .map(|l| built.tags.id(l).unwrap_or(0))
                    .collect();
                (built.vocab.encode(s.tokens()), targets)
            })
            .collect();

        let mut rng = Rand32::new(self.data.seed);
        let mut order: Vec<usize> = (0..examples.len()).collect();
        for epoch in 0..config.epochs {
            for i in (1..order.len()).rev() {
                let j = rng.rand_range(0..(i as u32 + 1)) as usize;
                order.swap(i, j);
            }

            let mut total_loss = 0.0f32;
            for &idx in &order {
                let (ids, targets) = &examples[idx];
                let logits = built.network.forward(ids, &self.device).map_err(engine)?;
                let targets = Tensor::new(targets.as_slice(), &self.device).map_err(engine)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &targets).map_err(engine)?;
                optimizer.backward_step(&loss).map_err(engine)?;
                total_loss += loss.to_scalar::<f32>().map_err(engine)?;
            }

            let mean_loss = total_loss / examples.len().max(1) as f32;
            info!(
                epoch = epoch + 1,
                epochs = config.epochs,
                loss = mean_loss,
                "embedding epoch complete"
            );
        }
        Ok(())
    }

    fn save(&self, built: &Built) -> Result<TrainedModelHandle> {
        let dir = self.model_dir();
        fs::create_dir_all(&dir)?;
        let artifact = dir.join(MODEL_FILE);
        built.varmap.save(&artifact).map_err(engine)?;
        built.vocab.save(&dir.join(VOCAB_FILE))?;
        built.tags.save(&dir.join(LABELS_FILE))?;
        debug!(artifact = %artifact.display(), "embedding model saved");
        Ok(TrainedModelHandle {
            dir,
            artifact,
            fold: None,
        })
    }
}

impl SequenceLabeler for EmbeddingModel {
    fn name(&self) -> String {
        ModelFamily::Embedding(self.variant).to_string()
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

        let train_file = self
            .dataset_dir
            .join(format!("{}.txt", Split::Train.dir_name()));
        let mut sequences = load_file(&train_file, &ParseOptions::concatenated())?;
        if let Some(max) = self.data.max_train_sequences {
            sequences.truncate(max);
        }

        let vocab = Vocabulary::from_sequences(&sequences);
        let tags = TagSet::from_sequences(&sequences);
        let decoder = ViterbiDecoder::constrained(&tags.labels);
        let varmap = VarMap::new();
        let network = Network::new(
            self.variant,
            self.shape,
            vocab.len(),
            tags.len().max(1),
            network::var_builder(&varmap, &self.device),
        )
        .map_err(engine)?;

        info!(
            model = %self.name(),
            sequences = sequences.len(),
            vocabulary = vocab.len(),
            labels = tags.len(),
            "embedding network built"
        );
        self.state = State::Built(Built {
            sequences,
            vocab,
            tags,
            varmap,
            network,
            decoder,
        });
        Ok(())
    }

    fn train(&mut self, config: &TrainingConfig) -> Result<Option<TrainedModelHandle>> {
        let method = EmbeddingMethod::from_config(config)?;

        if matches!(self.state, State::Unbuilt) {
            self.build()?;
        }
        let built = match std::mem::replace(&mut self.state, State::Unbuilt) {
            State::Built(b) | State::Trained { built: b, .. } => b,
            State::Unbuilt => {
                return Err(LenerError::PreconditionViolation(format!(
                    "{} has no network",
                    self.name()
                )));
            }
        };

        if built.sequences.iter().all(TaggedSequence::is_empty) {
            info!(model = %self.name(), "no training sequences, nothing to train");
            self.state = State::Built(built);
            return Ok(None);
        }

        info!(
            model = %self.name(),
            method = ?method,
            epochs = config.epochs,
            "training embedding tagger"
        );
        let result = self
            .fit(&built, method, config)
            .and_then(|()| self.save(&built));
        match result {
            Ok(handle) => {
                info!(
                    model = %self.name(),
                    artifact = %handle.artifact.display(),
                    "embedding tagger trained"
                );
                self.state = State::Trained {
                    built,
                    handle: handle.clone(),
                };
                Ok(Some(handle))
            }
            Err(e) => {
                self.state = State::Built(built);
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Unbuilt;
    }

    fn handle(&self) -> Option<&TrainedModelHandle> {
        match &self.state {
            State::Trained { handle, .. } => Some(handle),
            _ => None,
        }
    }

    fn labels(&self) -> Vec<String> {
        self.built()
            .map(|b| b.tags.labels.clone())
            .unwrap_or_default()
    }

    fn outside_symbol(&self) -> &str {
        &self.outside_symbol
    }

    fn decode(&mut self, sequences: &[TaggedSequence]) -> Result<Vec<Vec<String>>> {
        let State::Trained { built, .. } = &self.state else {
            return Err(LenerError::PreconditionViolation(
                "decode called before a successful train".to_string(),
            ));
        };

        sequences
            .iter()
            .map(|seq| {
                if seq.is_empty() {
                    return Ok(Vec::new());
                }
                let ids = built.vocab.encode(seq.tokens());
                let emissions = built
                    .network
                    .log_probs(&ids, &self.device)
                    .map_err(engine)?;
                let path = built.decoder.decode(&emissions, &built.tags.transitions)?;
                Ok(path
                    .into_iter()
                    .map(|i| built.tags.labels[i].clone())
                    .collect())
            })
            .collect()
    }
}

fn engine(e: candle_core::Error) -> LenerError {
    LenerError::Engine(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write_train(root: &Path) {
        fs::create_dir_all(root).unwrap();
        fs::write(
            root.join("train.txt"),
            "TCU\tB-ORGANIZACAO\njulgou\tO\n\nLei\tB-LEGISLACAO\n8.666\tI-LEGISLACAO\n\n",
        )
        .unwrap();
    }

    fn tiny(variant: EmbeddingVariant, root: &Path) -> EmbeddingModel {
        EmbeddingModel::new(variant, root, root.join("work"), DataOptions::default()).with_shape(
            NetworkShape {
                embedding_dim: 8,
                hidden_dim: 8,
            },
        )
    }

    #[test]
    fn build_reads_concatenated_train() {
        let dir = tempfile::tempdir().unwrap();
        write_train(dir.path());
        let mut model = tiny(EmbeddingVariant::Window, dir.path());
        model.build().unwrap();
        assert_eq!(model.stage(), Stage::Built);
        assert_eq!(model.vocabulary().unwrap().len(), 6);
        assert_eq!(
            model.labels(),
            ["B-LEGISLACAO", "B-ORGANIZACAO", "I-LEGISLACAO", "O"]
        );
        assert!(matches!(
            model.build(),
            Err(LenerError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn train_writes_artifacts_and_decodes() {
        let dir = tempfile::tempdir().unwrap();
        write_train(dir.path());
        let mut model = tiny(EmbeddingVariant::Bilstm, dir.path());
        let config = TrainingConfig::embedding().with_epochs(2);
        let handle = model.train(&config).unwrap().unwrap();

        assert_eq!(model.stage(), Stage::Trained);
        assert!(handle.artifact.is_file());
        assert!(handle.dir.join(VOCAB_FILE).is_file());
        assert!(handle.dir.join(LABELS_FILE).is_file());

        let seq = TaggedSequence::from_pairs(1, [("Lei", "O"), ("desconhecida", "O")]);
        let decoded = model.decode(&[seq]).unwrap();
        assert_eq!(decoded[0].len(), 2);
        // Inside tags never open a sequence.
        assert!(!decoded[0][0].starts_with("I-"));
    }

    #[test]
    fn unknown_method_is_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = tiny(EmbeddingVariant::Window, dir.path());
        let config = TrainingConfig::embedding().with_method("ADAM");
        assert!(matches!(
            model.train(&config),
            Err(LenerError::InvalidConfig(_))
        ));
        assert_eq!(model.stage(), Stage::Unbuilt);
    }
}
