//! Emission networks assembled from candle layers.

use candle_core::{D, DType, Device, Module, Tensor};
use candle_nn::rnn::{LSTM, LSTMConfig, RNN, lstm};
use candle_nn::{AdamW, Embedding, Linear, Optimizer, ParamsAdamW, SGD, VarBuilder, VarMap};
use lener_core::{LenerError, Result};
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingVariant, Regularization, TrainingConfig};
use crate::embedding::vocab::Vocabulary;

/// Layer sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkShape {
    pub embedding_dim: usize,
    pub hidden_dim: usize,
}

impl Default for NetworkShape {
    fn default() -> Self {
        Self {
            embedding_dim: 64,
            hidden_dim: 64,
        }
    }
}

/// Maps a token id sequence to `(seq_len, num_labels)` emission scores.
pub enum Network {
    Bilstm {
        embedding: Embedding,
        forward: LSTM,
        backward: LSTM,
        output: Linear,
    },
    Window {
        embedding: Embedding,
        hidden: Linear,
        output: Linear,
        embedding_dim: usize,
    },
}

impl Network {
    pub fn new(
        variant: EmbeddingVariant,
        shape: NetworkShape,
        vocab_size: usize,
        num_labels: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let embedding = candle_nn::embedding(vocab_size, shape.embedding_dim, vb.pp("embedding"))?;
        match variant {
            EmbeddingVariant::Bilstm => Ok(Self::Bilstm {
                embedding,
                forward: lstm(
                    shape.embedding_dim,
                    shape.hidden_dim,
                    LSTMConfig::default(),
                    vb.pp("lstm_forward"),
                )?,
                backward: lstm(
                    shape.embedding_dim,
                    shape.hidden_dim,
                    LSTMConfig::default(),
                    vb.pp("lstm_backward"),
                )?,
                output: candle_nn::linear(2 * shape.hidden_dim, num_labels, vb.pp("output"))?,
            }),
            EmbeddingVariant::Window => Ok(Self::Window {
                embedding,
                hidden: candle_nn::linear(3 * shape.embedding_dim, shape.hidden_dim, vb.pp("hidden"))?,
                output: candle_nn::linear(shape.hidden_dim, num_labels, vb.pp("output"))?,
                embedding_dim: shape.embedding_dim,
            }),
        }
    }

    /// Emission logits for one sequence of token ids.
    pub fn forward(&self, ids: &[u32], device: &Device) -> candle_core::Result<Tensor> {
        let len = ids.len();
        match self {
            Self::Bilstm {
                embedding,
                forward,
                backward,
                output,
            } => {
                let ids = Tensor::new(ids, device)?.unsqueeze(0)?;
                let embedded = embedding.forward(&ids)?;

                let fwd_states = forward.seq(&embedded)?;
                let fwd = forward.states_to_tensor(&fwd_states)?;

                let reversed: Vec<u32> = (0..len as u32).rev().collect();
                let reversed = Tensor::new(reversed.as_slice(), device)?;
                let bwd_input = embedded.index_select(&reversed, 1)?;
                let bwd_states = backward.seq(&bwd_input)?;
                let bwd = backward
                    .states_to_tensor(&bwd_states)?
                    .index_select(&reversed, 1)?;

                let hidden = Tensor::cat(&[&fwd, &bwd], 2)?.squeeze(0)?;
                output.forward(&hidden)
            }
            Self::Window {
                embedding,
                hidden,
                output,
                embedding_dim,
            } => {
                let windows = window_ids(ids);
                let windows = Tensor::from_vec(windows, (len, 3), device)?;
                let embedded = embedding
                    .forward(&windows)?
                    .reshape((len, 3 * embedding_dim))?;
                let hidden = hidden.forward(&embedded)?.tanh()?;
                output.forward(&hidden)
            }
        }
    }

    /// Per-position log probabilities, `[seq_len][num_labels]`.
    pub fn log_probs(&self, ids: &[u32], device: &Device) -> candle_core::Result<Vec<Vec<f32>>> {
        let logits = self.forward(ids, device)?;
        candle_nn::ops::log_softmax(&logits, D::Minus1)?.to_vec2::<f32>()
    }
}

/// `[prev, curr, next]` ids for every position, padded at the boundaries.
fn window_ids(ids: &[u32]) -> Vec<u32> {
    let at = |i: Option<usize>| {
        i.and_then(|i| ids.get(i))
            .copied()
            .unwrap_or(Vocabulary::PADDING_ID)
    };
    (0..ids.len())
        .flat_map(|i| [at(i.checked_sub(1)), ids[i], at(Some(i + 1))])
        .collect()
}

/// Optimisers accepted by the embedding family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EmbeddingMethod {
    AdamW { weight_decay: f64 },
    Sgd,
}

impl EmbeddingMethod {
    pub const NAMES: &'static [&'static str] = &["adamw", "sgd"];

    /// Validate `config` for this family.
    pub fn from_config(config: &TrainingConfig) -> Result<Self> {
        let regularization = Regularization::parse(&config.regularization_type)?;
        let value = config.regularization_value;
        if !(config.learning_rate > 0.0 && config.learning_rate.is_finite()) {
            return Err(LenerError::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                config.learning_rate
            )));
        }
        match config.optimization_method.trim().to_ascii_lowercase().as_str() {
            "adamw" => match regularization {
                Regularization::None => Ok(Self::AdamW { weight_decay: 0.0 }),
                Regularization::L2 => Ok(Self::AdamW { weight_decay: value }),
                Regularization::L1 => Err(LenerError::InvalidConfig(
                    "l1 regularization is not supported by adamw".to_string(),
                )),
            },
            "sgd" => match regularization {
                Regularization::None => Ok(Self::Sgd),
                _ if value == 0.0 => Ok(Self::Sgd),
                _ => Err(LenerError::InvalidConfig(
                    "sgd does not support regularization".to_string(),
                )),
            },
            other => Err(LenerError::InvalidConfig(format!(
                "unknown embedding optimization method {other:?}, expected one of: {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

/// A constructed optimiser over every variable of a [`VarMap`].
pub enum StepOptimizer {
    AdamW(AdamW),
    Sgd(SGD),
}

impl StepOptimizer {
    pub fn new(
        method: EmbeddingMethod,
        varmap: &VarMap,
        learning_rate: f64,
    ) -> candle_core::Result<Self> {
        match method {
            EmbeddingMethod::AdamW { weight_decay } => {
                let params = ParamsAdamW {
                    lr: learning_rate,
                    weight_decay,
                    ..Default::default()
                };
                Ok(Self::AdamW(AdamW::new(varmap.all_vars(), params)?))
            }
            EmbeddingMethod::Sgd => Ok(Self::Sgd(SGD::new(varmap.all_vars(), learning_rate)?)),
        }
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> candle_core::Result<()> {
        match self {
            Self::AdamW(opt) => opt.backward_step(loss),
            Self::Sgd(opt) => opt.backward_step(loss),
        }
    }
}

/// Variable builder for a fresh F32 network on `device`.
pub fn var_builder<'a>(varmap: &'a VarMap, device: &Device) -> VarBuilder<'a> {
    VarBuilder::from_varmap(varmap, DType::F32, device)
}
