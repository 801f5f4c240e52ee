use anyhow::{ensure, Result};
use burn::{nn::loss::CrossEntropyLossConfig, prelude::*, tensor::activation::softmax};

use crate::data::batcher::SrlBatch;
use crate::domain::{embedding::EmbeddingMatrix, traits::ContextualEmbedder};
use crate::ml::{
    features::{FeatureComposer, FeatureComposerConfig},
    lstm::{SequenceEncoder, SequenceEncoderConfig},
    mode::Mode,
    scorer::{predicate_context, RoleScorer, RoleScorerConfig},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SrlModelConfig {
    pub features:                FeatureComposerConfig,
    pub num_roles:               usize,
    pub state_size:              usize,
    pub num_layers:              usize,
    pub role_embed_size:         usize,
    pub output_lemma_embed_size: usize,
    #[config(default = false)]
    pub use_highway_lstm:        bool,
    #[config(default = 0.0)]
    pub dropout:                 f64,
    #[config(default = 0.0)]
    pub recurrent_dropout:       f64,
    #[config(default = false)]
    pub restrict_labels:         bool,
    #[config(default = 0)]
    pub seed:                    u64,
}

impl SrlModelConfig {
    /// Width of the per-token representation the scorer consumes.
    pub fn combined_size(&self) -> usize {
        4 * self.state_size
    }

    fn encoder(&self) -> SequenceEncoderConfig {
        SequenceEncoderConfig::new(self.features.output_size(), self.state_size, self.num_layers)
            .with_highway(self.use_highway_lstm)
            .with_dropout(self.dropout)
            .with_recurrent_dropout(self.recurrent_dropout)
    }

    fn scorer(&self) -> RoleScorerConfig {
        RoleScorerConfig::new(
            self.num_roles,
            self.features.num_lemmas,
            self.role_embed_size,
            self.output_lemma_embed_size,
            self.combined_size(),
        )
        .with_restrict_labels(self.restrict_labels)
        .with_seed(self.seed)
    }

    /// Model with every table randomly initialised (weights to be loaded).
    pub fn init<B: Backend>(&self, device: &B::Device) -> SrlModel<B> {
        SrlModel {
            features: self.features.init(device),
            encoder:  self.encoder().init(device),
            scorer:   self.scorer().init(device),
        }
    }

    /// Fresh model whose pretrained word table (and supertag features)
    /// start from the supplied matrices.
    pub fn init_with<B: Backend>(
        &self,
        pretrained:    &EmbeddingMatrix,
        stag_features: Option<&EmbeddingMatrix>,
        device:        &B::Device,
    ) -> Result<SrlModel<B>> {
        Ok(SrlModel {
            features: self.features.init_with(pretrained, stag_features, device)?,
            encoder:  self.encoder().init(device),
            scorer:   self.scorer().init(device),
        })
    }
}

// ─── Inputs ───────────────────────────────────────────────────────────────────
/// One SrlBatch moved onto a device.
#[derive(Clone, Debug)]
pub struct SrlInputs<B: Backend> {
    pub words:          Tensor<B, 2, Int>,
    pub freqs:          Tensor<B, 2, Int>,
    pub pos:            Tensor<B, 2, Int>,
    pub lemmas:         Tensor<B, 2, Int>,
    pub stags:          Tensor<B, 2, Int>,
    pub labels:         Tensor<B, 2, Int>,
    pub preds:          Tensor<B, 1, Int>,
    pub pred_positions: Tensor<B, 1, Int>,
    pub seq_lengths:    Tensor<B, 1, Int>,
    pub labels_mask:    Tensor<B, 2>,
    /// Contextual vectors [B, L, context_embed_size]
    pub context:        Option<Tensor<B, 3>>,
}

impl<B: Backend> SrlInputs<B> {
    pub fn from_batch(
        batch:    &SrlBatch,
        embedder: Option<&dyn ContextualEmbedder>,
        device:   &B::Device,
    ) -> Result<Self> {
        let (n, l) = (batch.batch_size, batch.seq_len);
        let grid   = |v: &[i32]| Tensor::<B, 1, Int>::from_ints(v, device).reshape([n, l]);
        let line   = |v: &[i32]| Tensor::<B, 1, Int>::from_ints(v, device);

        let context = match embedder {
            Some(embedder) => {
                let dim    = embedder.dim();
                let values = embedder.embed(&batch.tokens, &batch.seq_lengths_usize())?;
                ensure!(
                    values.len() == n * l * dim,
                    "contextual embedder returned {} values for a {n}x{l}x{dim} batch",
                    values.len()
                );
                Some(Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([n, l, dim]))
            }
            None => None,
        };

        Ok(Self {
            words:          grid(&batch.words),
            freqs:          grid(&batch.freqs),
            pos:            grid(&batch.pos),
            lemmas:         grid(&batch.lemmas),
            stags:          grid(&batch.stags),
            labels:         grid(&batch.labels),
            preds:          line(&batch.preds),
            pred_positions: line(&batch.pred_positions),
            seq_lengths:    line(&batch.seq_lengths),
            labels_mask:    Tensor::<B, 1>::from_floats(batch.labels_mask.as_slice(), device)
                .reshape([n, batch.num_roles]),
            context,
        })
    }
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SrlModel<B: Backend> {
    pub features: FeatureComposer<B>,
    pub encoder:  SequenceEncoder<B>,
    pub scorer:   RoleScorer<B>,
}

pub struct SrlOutput<B: Backend> {
    /// [batch, seq_len, num_roles], after masking when restriction is on
    pub logits:        Tensor<B, 3>,
    /// softmax over roles
    pub probabilities: Tensor<B, 3>,
}

impl<B: Backend> SrlModel<B> {
    /// Reject inputs whose optional streams disagree with the architecture.
    pub fn check_inputs(&self, inputs: &SrlInputs<B>) -> Result<()> {
        self.features.check_inputs(inputs)
    }

    /// inputs → [batch, seq_len, 4 × state_size]
    pub fn combined_representation(&self, inputs: &SrlInputs<B>, mode: Mode) -> Tensor<B, 3> {
        let features = self.features.forward(inputs, mode);
        let outputs  = self.encoder.forward(features, inputs.seq_lengths.clone(), mode);
        predicate_context(outputs, inputs.pred_positions.clone())
    }

    pub fn forward(&self, inputs: &SrlInputs<B>, mode: Mode) -> SrlOutput<B> {
        let combined = self.combined_representation(inputs, mode);
        let logits   = self.scorer.forward(combined, inputs.preds.clone(), inputs.labels_mask.clone());
        let probabilities = softmax(logits.clone(), 2);
        SrlOutput { logits, probabilities }
    }

    /// Mean token-level cross-entropy of the (possibly masked) logits
    /// against the gold roles, over every position of every sentence.
    pub fn forward_loss(&self, inputs: &SrlInputs<B>, mode: Mode) -> (Tensor<B, 1>, SrlOutput<B>) {
        let output = self.forward(inputs, mode);
        let [batch, seq_len, roles] = output.logits.dims();

        let ce = CrossEntropyLossConfig::new().init(&output.logits.device());
        let loss = ce.forward(
            output.logits.clone().reshape([batch * seq_len, roles]),
            inputs.labels.clone().reshape([batch * seq_len]),
        );
        (loss, output)
    }
}
