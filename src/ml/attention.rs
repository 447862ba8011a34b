// ============================================================
// Layer 5 — Attention Pooling
// ============================================================
// Collapses the sequence axis of the recurrent output:
//
//   H       : [batch, positions, features]
//   scores  = Σ_features H            → [batch, positions, 1]
//   weights = softmax over positions  → [batch, positions, 1]
//   pooled  = Σ_positions H ⊙ weights → [batch, features]
//
// No trainable parameters; gradients flow through H only.

use burn::prelude::*;
use burn::tensor::activation::softmax;

pub fn attention_pool<B: Backend>(hidden: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, positions, features] = hidden.dims();

    let scores  = hidden.clone().sum_dim(2);
    let weights = softmax(scores, 1).expand([batch, positions, features]);

    (hidden * weights).sum_dim(1).reshape([batch, features])
}
