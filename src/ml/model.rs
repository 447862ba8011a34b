// ============================================================
// Layer 5 — Character RNN Architecture
// ============================================================
//   ids      [batch, 30]
//   → Embedding(vocab, 64)                 [batch, 30, 64]
//   → RecurrentLayer(64 → 128)             [batch, 30, 128]
//   → RecurrentLayer(128 → 128)            [batch, 30, 128]
//   → attention_pool                       [batch, 128]
//   → Dense(256, relu, He) → Dropout(0.2)
//   → Dense(128, relu, He) → Dropout(0.2)
//   → Dense(vocab)                         [batch, vocab] logits
//
// `predict` applies the softmax; the loss works on logits.

use burn::{
    module::Param,
    nn::{
        loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Embedding, EmbeddingConfig,
        Initializer, Linear, LinearConfig,
    },
    prelude::*,
    tensor::{
        activation::{relu, softmax},
        TensorData,
    },
};

use crate::data::windowing::SEQ_LENGTH;
use crate::domain::errors::{CoreError, CoreResult};
use crate::infra::weight_codec::ParameterTensor;
use crate::ml::attention::attention_pool;
use crate::ml::recurrent::{RecurrentLayer, RecurrentLayerConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct CharRnnConfig {
    pub vocab_size: usize,
    #[config(default = 30)]
    pub seq_length: usize,
    #[config(default = 64)]
    pub embedding_dim: usize,
    #[config(default = 128)]
    pub hidden_units: usize,
    /// Width of the first dense layer; the second is half of it.
    #[config(default = 256)]
    pub ffn_units: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl CharRnnConfig {
    /// The default architecture for a vocabulary of `vocab_size` characters.
    pub fn for_vocab(vocab_size: usize) -> Self {
        Self::new(vocab_size).with_seq_length(SEQ_LENGTH)
    }

    fn recurrent_configs(&self) -> [RecurrentLayerConfig; 2] {
        [
            RecurrentLayerConfig::new(self.embedding_dim, self.hidden_units)
                .with_recurrent_dropout(self.dropout),
            RecurrentLayerConfig::new(self.hidden_units, self.hidden_units)
                .with_recurrent_dropout(self.dropout),
        ]
    }

    fn dense(&self, d_input: usize, d_output: usize) -> LinearConfig {
        LinearConfig::new(d_input, d_output).with_initializer(Initializer::KaimingNormal {
            gain:          2f64.sqrt(),
            fan_out_only:  false,
        })
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CharRnn<B> {
        let [r1, r2] = self.recurrent_configs();
        let ffn2 = self.ffn_units / 2;
        CharRnn {
            embedding:  EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device),
            recurrent1: r1.init(device),
            recurrent2: r2.init(device),
            dense1:     self.dense(self.hidden_units, self.ffn_units).init(device),
            dense2:     self.dense(self.ffn_units, ffn2).init(device),
            output:     LinearConfig::new(ffn2, self.vocab_size).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }

    /// Shapes of every parameter tensor, in canonical order:
    /// embedding, recurrent 1, recurrent 2, dense 1, dense 2, output.
    pub fn parameter_shapes(&self) -> Vec<Vec<usize>> {
        let [r1, r2] = self.recurrent_configs();
        let ffn2 = self.ffn_units / 2;

        let mut shapes = vec![vec![self.vocab_size, self.embedding_dim]];
        shapes.extend(r1.parameter_shapes());
        shapes.extend(r2.parameter_shapes());
        for (d_in, d_out) in [
            (self.hidden_units, self.ffn_units),
            (self.ffn_units, ffn2),
            (ffn2, self.vocab_size),
        ] {
            shapes.push(vec![d_in, d_out]);
            shapes.push(vec![d_out]);
        }
        shapes
    }
}

#[derive(Module, Debug)]
pub struct CharRnn<B: Backend> {
    pub embedding:  Embedding<B>,
    pub recurrent1: RecurrentLayer<B>,
    pub recurrent2: RecurrentLayer<B>,
    pub dense1:     Linear<B>,
    pub dense2:     Linear<B>,
    pub output:     Linear<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> CharRnn<B> {
    /// windows: [batch, seq_len] → logits: [batch, vocab]
    pub fn forward(&self, windows: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let x = self.embedding.forward(windows);
        let x = self.recurrent1.forward(x);
        let x = self.recurrent2.forward(x);
        let x = attention_pool(x);

        let x = self.dropout.forward(relu(self.dense1.forward(x)));
        let x = self.dropout.forward(relu(self.dense2.forward(x)));
        self.output.forward(x)
    }

    /// Probability distribution over the vocabulary for each window.
    pub fn predict(&self, windows: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        softmax(self.forward(windows), 1)
    }

    /// Sparse categorical cross-entropy against the next-character ids.
    pub fn forward_loss(
        &self,
        windows: Tensor<B, 2, Int>,
        targets: Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(windows);
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), targets);
        (loss, logits)
    }

    /// Copy every parameter out, in canonical order.
    pub fn parameters(&self) -> CoreResult<Vec<ParameterTensor>> {
        let mut out = vec![export(&self.embedding.weight)?];
        for layer in [&self.recurrent1, &self.recurrent2] {
            out.push(export(&layer.input_gates.weight)?);
            out.push(export(&layer.hidden_gates.weight)?);
            out.push(export(bias_of(&layer.input_gates)?)?);
        }
        for dense in [&self.dense1, &self.dense2, &self.output] {
            out.push(export(&dense.weight)?);
            out.push(export(bias_of(dense)?)?);
        }
        Ok(out)
    }

    /// Replace every parameter with `params` (canonical order).
    ///
    /// Fails with `CorruptWeights` if the count or any shape differs from
    /// this network's own parameters.
    pub fn load_parameters(mut self, params: Vec<ParameterTensor>) -> CoreResult<Self> {
        let expected: Vec<Vec<usize>> = self
            .parameters()?
            .into_iter()
            .map(|p| p.shape)
            .collect();
        crate::infra::weight_codec::check_shapes(&params, &expected)?;

        let device = self.embedding.weight.val().device();
        let mut it = params.into_iter();
        let mut next = || it.next().ok_or_else(|| CoreError::CorruptWeights("too few tensors".into()));

        self.embedding.weight = import(next()?, &device);
        for layer in [&mut self.recurrent1, &mut self.recurrent2] {
            layer.input_gates.weight  = import(next()?, &device);
            layer.hidden_gates.weight = import(next()?, &device);
            layer.input_gates.bias    = Some(import(next()?, &device));
        }
        for dense in [&mut self.dense1, &mut self.dense2, &mut self.output] {
            dense.weight = import(next()?, &device);
            dense.bias   = Some(import(next()?, &device));
        }
        Ok(self)
    }
}

fn bias_of<B: Backend>(linear: &Linear<B>) -> CoreResult<&Param<Tensor<B, 1>>> {
    linear
        .bias
        .as_ref()
        .ok_or_else(|| CoreError::CorruptWeights("dense layer has no bias".into()))
}

fn export<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> CoreResult<ParameterTensor> {
    let tensor = param.val();
    let shape  = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| CoreError::CorruptWeights(format!("cannot read tensor: {e:?}")))?;
    Ok(ParameterTensor { values, shape })
}

fn import<B: Backend, const D: usize>(p: ParameterTensor, device: &B::Device) -> Param<Tensor<B, D>> {
    Param::from_tensor(Tensor::from_data(TensorData::new(p.values, p.shape), device))
}
