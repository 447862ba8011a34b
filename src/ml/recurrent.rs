// ============================================================
// Layer 5 — Recurrent Layer (LSTM)
// ============================================================
// Sequence-to-sequence LSTM returning one hidden vector per step.
//
//   z_t = x_t·W + dropout(h_{t-1})·U + b      (gates i, f, g, o)
//   c_t = σ(f) ⊙ c_{t-1} + σ(i) ⊙ tanh(g)
//   h_t = σ(o) ⊙ tanh(c_t)
//
// W is `input_gates` (with bias), U is `hidden_gates` (no bias).
// Dropout sits on the recurrent connection and is only active
// on an autodiff backend, i.e. while training.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{sigmoid, tanh},
};

#[derive(Config, Debug)]
pub struct RecurrentLayerConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
    #[config(default = 0.2)]
    pub recurrent_dropout: f64,
}

impl RecurrentLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RecurrentLayer<B> {
        let input_gates  = LinearConfig::new(self.d_input, 4 * self.d_hidden).init(device);
        let hidden_gates = LinearConfig::new(self.d_hidden, 4 * self.d_hidden)
            .with_bias(false)
            .init(device);
        let dropout = DropoutConfig::new(self.recurrent_dropout).init();
        RecurrentLayer { input_gates, hidden_gates, dropout }
    }

    /// Parameter shapes in canonical order: input kernel, recurrent kernel, bias.
    pub fn parameter_shapes(&self) -> Vec<Vec<usize>> {
        let gates = 4 * self.d_hidden;
        vec![
            vec![self.d_input, gates],
            vec![self.d_hidden, gates],
            vec![gates],
        ]
    }
}

#[derive(Module, Debug)]
pub struct RecurrentLayer<B: Backend> {
    pub input_gates:  Linear<B>,
    pub hidden_gates: Linear<B>,
    pub dropout:      Dropout,
}

impl<B: Backend> RecurrentLayer<B> {
    pub fn d_hidden(&self) -> usize {
        self.hidden_gates.weight.val().dims()[0]
    }

    /// input: [batch, seq_len, d_input] → [batch, seq_len, d_hidden]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = input.dims();
        let d_hidden = self.d_hidden();
        let device   = input.device();

        // Input projection for every step at once: [batch, seq_len, 4h]
        let projected = self.input_gates.forward(input);

        let mut hidden  = Tensor::<B, 2>::zeros([batch, d_hidden], &device);
        let mut cell    = Tensor::<B, 2>::zeros([batch, d_hidden], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let x_t = projected
                .clone()
                .narrow(1, t, 1)
                .reshape([batch, 4 * d_hidden]);
            let gates = x_t + self.hidden_gates.forward(self.dropout.forward(hidden));

            let input_gate  = sigmoid(gates.clone().narrow(1, 0, d_hidden));
            let forget_gate = sigmoid(gates.clone().narrow(1, d_hidden, d_hidden));
            let candidate   = tanh(gates.clone().narrow(1, 2 * d_hidden, d_hidden));
            let output_gate = sigmoid(gates.narrow(1, 3 * d_hidden, d_hidden));

            cell   = forget_gate * cell + input_gate * candidate;
            hidden = output_gate * tanh(cell.clone());

            outputs.push(hidden.clone().reshape([batch, 1, d_hidden]));
        }

        Tensor::cat(outputs, 1)
    }
}
