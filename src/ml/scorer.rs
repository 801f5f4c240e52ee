// ============================================================
// Layer 5 — Predicate Context and Role Scorer
// ============================================================
// predicate_context:
//   encoder output [B, L, 2S]
//     → state at the predicate position          [B, 2S]
//     → tiled across L, concatenated per token    [B, L, 4S]
//
// RoleScorer (low-rank bilinear):
//   Wp = E_pred[pred] · Up                        [B, H]
//   Wr = E_role · Ur                              [R, H]
//   W  = relu(Wp ⊕ Wr + b)                        [B, R, H]
//   logits = combined · Wᵀ                        [B, L, R]
//
// With label restriction the logits are multiplied by the
// predicate's role mask. A masked role gets a logit of exactly
// 0, which is not necessarily the lowest score in its row.

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::activation::relu,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::ml::init::orthogonal_tensor;

/// outputs [B, L, D], pred_positions [B] → [B, L, 2D]
pub fn predicate_context<B: Backend>(outputs: Tensor<B, 3>, pred_positions: Tensor<B, 1, Int>) -> Tensor<B, 3> {
    let [batch, seq_len, width] = outputs.dims();
    let index = pred_positions
        .reshape([batch, 1, 1])
        .expand([batch, 1, width]);
    let pred_states = outputs.clone().gather(1, index).expand([batch, seq_len, width]);
    Tensor::cat(vec![outputs, pred_states], 2)
}

#[derive(Config, Debug)]
pub struct RoleScorerConfig {
    pub num_roles:        usize,
    pub num_lemmas:       usize,
    pub role_embed_size:  usize,
    pub lemma_embed_size: usize,
    /// Width of the combined per-token representation (4 × state size)
    pub input_size:       usize,
    #[config(default = false)]
    pub restrict_labels:  bool,
    #[config(default = 0)]
    pub seed:             u64,
}

impl RoleScorerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RoleScorer<B> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        RoleScorer {
            role_embeddings: Param::from_tensor(orthogonal_tensor(
                self.num_roles, self.role_embed_size, &mut rng, device,
            )),
            pred_embedding:  EmbeddingConfig::new(self.num_lemmas, self.lemma_embed_size).init(device),
            pred_projection: Param::from_tensor(orthogonal_tensor(
                self.lemma_embed_size, self.input_size, &mut rng, device,
            )),
            role_projection: Param::from_tensor(orthogonal_tensor(
                self.role_embed_size, self.input_size, &mut rng, device,
            )),
            bias:            Param::from_tensor(Tensor::zeros([self.input_size], device)),
            restrict_labels: self.restrict_labels,
        }
    }
}

#[derive(Module, Debug)]
pub struct RoleScorer<B: Backend> {
    role_embeddings: Param<Tensor<B, 2>>,
    pred_embedding:  Embedding<B>,
    pred_projection: Param<Tensor<B, 2>>,
    role_projection: Param<Tensor<B, 2>>,
    bias:            Param<Tensor<B, 1>>,
    restrict_labels: bool,
}

impl<B: Backend> RoleScorer<B> {
    /// Per-sentence scoring vectors for every role: preds [B] → [B, R, H]
    pub fn role_weights(&self, preds: Tensor<B, 1, Int>) -> Tensor<B, 3> {
        let [batch] = preds.dims();
        let wp = self
            .pred_embedding
            .forward(preds.reshape([batch, 1]))
            .squeeze::<2>(1)
            .matmul(self.pred_projection.val());
        let wr = self.role_embeddings.val().matmul(self.role_projection.val());

        let [roles, width] = wr.dims();
        let shape = [batch, roles, width];
        relu(
            wp.unsqueeze_dim::<3>(1).expand(shape)
                + wr.unsqueeze_dim::<3>(0).expand(shape)
                + self.bias.val().reshape([1, 1, width]).expand(shape),
        )
    }

    /// combined [B, L, H], preds [B], labels_mask [B, R] → logits [B, L, R]
    pub fn forward(&self, combined: Tensor<B, 3>, preds: Tensor<B, 1, Int>, labels_mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = combined.dims();
        let weights = self.role_weights(preds);
        let logits  = combined.matmul(weights.swap_dims(1, 2));

        if self.restrict_labels {
            let [_, roles] = labels_mask.dims();
            logits * labels_mask.unsqueeze_dim::<3>(1).expand([batch, seq_len, roles])
        } else {
            logits
        }
    }
}
