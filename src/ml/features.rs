// ============================================================
// Layer 5 — Feature Composer
// ============================================================
// Builds the per-token input vector fed to the BiLSTM by
// concatenating every enabled feature stream on the last axis:
//
//   trainable word embedding          word_embed_size
//   pretrained word embedding         pretrained_embed_size
//   POS embedding                     pos_embed_size
//   predicate lemma embedding         lemma_embed_size
//   contextual embedding (optional)   context_embed_size
//   supertag embedding (optional)     stag_embed_size
//   supertag features (optional)      stag_feature_embed_size
//   predicate marker                  1
//
// Word dropout (training only) swaps a word for <UNK> with
// probability α / (freq + α) before either word lookup.

use anyhow::{ensure, Result};
use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig},
    prelude::*,
    tensor::{Distribution, TensorData},
};

use crate::domain::embedding::EmbeddingMatrix;
use crate::ml::mode::Mode;
use crate::ml::model::SrlInputs;

#[derive(Config, Debug)]
pub struct FeatureComposerConfig {
    pub num_words:  usize,
    pub num_pos:    usize,
    pub num_lemmas: usize,
    pub num_stags:  usize,
    pub unk_idx:    usize,

    pub word_embed_size:       usize,
    pub pretrained_embed_size: usize,
    pub pos_embed_size:        usize,
    pub lemma_embed_size:      usize,
    #[config(default = 0)]
    pub context_embed_size:    usize,

    #[config(default = false)]
    pub use_stags:               bool,
    #[config(default = 0)]
    pub stag_embed_size:         usize,
    #[config(default = false)]
    pub use_stag_features:       bool,
    #[config(default = 0)]
    pub stag_feature_embed_size: usize,

    #[config(default = false)]
    pub use_word_dropout: bool,
    #[config(default = 0.25)]
    pub alpha:            f64,
}

impl FeatureComposerConfig {
    /// Width of the composed per-token vector.
    pub fn output_size(&self) -> usize {
        let mut size = self.word_embed_size
            + self.pretrained_embed_size
            + self.pos_embed_size
            + self.lemma_embed_size
            + self.context_embed_size
            + 1;
        if self.use_stags {
            size += self.stag_embed_size;
            if self.use_stag_features {
                size += self.stag_feature_embed_size;
            }
        }
        size
    }

    /// Randomly initialised tables, used when rebuilding a model whose
    /// weights will be overwritten by a checkpoint.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeatureComposer<B> {
        let pretrained = EmbeddingConfig::new(self.num_words, self.pretrained_embed_size).init(device);
        let stag_features = (self.use_stags && self.use_stag_features).then(|| {
            frozen(EmbeddingConfig::new(self.num_stags, self.stag_feature_embed_size).init(device))
        });
        self.build(pretrained, stag_features, device)
    }

    /// Initialise the pretrained word table (and supertag features, when
    /// enabled) from externally supplied matrices.
    pub fn init_with<B: Backend>(
        &self,
        pretrained:    &EmbeddingMatrix,
        stag_features: Option<&EmbeddingMatrix>,
        device:        &B::Device,
    ) -> Result<FeatureComposer<B>> {
        ensure!(
            pretrained.rows() == self.num_words && pretrained.cols() == self.pretrained_embed_size,
            "pretrained vectors are {}x{}, expected {}x{}",
            pretrained.rows(), pretrained.cols(), self.num_words, self.pretrained_embed_size
        );

        let stag_features = if self.use_stags && self.use_stag_features {
            let Some(m) = stag_features else {
                anyhow::bail!("supertag features are enabled but no feature table was supplied");
            };
            ensure!(
                m.rows() == self.num_stags && m.cols() == self.stag_feature_embed_size,
                "supertag features are {}x{}, expected {}x{}",
                m.rows(), m.cols(), self.num_stags, self.stag_feature_embed_size
            );
            Some(frozen(embedding_from(m, device)))
        } else {
            None
        };

        Ok(self.build(embedding_from(pretrained, device), stag_features, device))
    }

    fn build<B: Backend>(
        &self,
        pretrained_embedding:   Embedding<B>,
        stag_feature_embedding: Option<Embedding<B>>,
        device:                 &B::Device,
    ) -> FeatureComposer<B> {
        FeatureComposer {
            word_embedding:  EmbeddingConfig::new(self.num_words, self.word_embed_size).init(device),
            pretrained_embedding,
            pos_embedding:   EmbeddingConfig::new(self.num_pos, self.pos_embed_size).init(device),
            lemma_embedding: EmbeddingConfig::new(self.num_lemmas, self.lemma_embed_size).init(device),
            stag_embedding:  self
                .use_stags
                .then(|| EmbeddingConfig::new(self.num_stags, self.stag_embed_size).init(device)),
            stag_feature_embedding,
            context_embed_size: self.context_embed_size,
            use_word_dropout:   self.use_word_dropout,
            alpha:              self.alpha,
            unk_idx:            self.unk_idx,
        }
    }
}

/// Embedding whose table is `matrix`.
fn embedding_from<B: Backend>(matrix: &EmbeddingMatrix, device: &B::Device) -> Embedding<B> {
    let weight = Tensor::<B, 2>::from_data(
        TensorData::new(matrix.values().to_vec(), [matrix.rows(), matrix.cols()]),
        device,
    );
    let mut embedding = EmbeddingConfig::new(matrix.rows(), matrix.cols()).init(device);
    embedding.weight = Param::from_tensor(weight);
    embedding
}

/// Exclude a table from gradient updates.
fn frozen<B: Backend>(mut embedding: Embedding<B>) -> Embedding<B> {
    embedding.weight = Param::from_tensor(embedding.weight.val()).set_require_grad(false);
    embedding
}

#[derive(Module, Debug)]
pub struct FeatureComposer<B: Backend> {
    word_embedding:         Embedding<B>,
    pretrained_embedding:   Embedding<B>,
    pos_embedding:          Embedding<B>,
    lemma_embedding:        Embedding<B>,
    stag_embedding:         Option<Embedding<B>>,
    stag_feature_embedding: Option<Embedding<B>>,
    context_embed_size:     usize,
    use_word_dropout:       bool,
    alpha:                  f64,
    unk_idx:                usize,
}

impl<B: Backend> FeatureComposer<B> {
    /// Contextual vectors must be present exactly when the composer was
    /// built with a context stream, and match its width.
    pub fn check_inputs(&self, inputs: &SrlInputs<B>) -> Result<()> {
        match &inputs.context {
            Some(context) => {
                let [batch, seq_len] = inputs.words.dims();
                ensure!(
                    self.context_embed_size > 0,
                    "contextual vectors supplied to a model without a context stream"
                );
                ensure!(
                    context.dims() == [batch, seq_len, self.context_embed_size],
                    "contextual vectors have shape {:?}, expected [{batch}, {seq_len}, {}]",
                    context.dims(), self.context_embed_size
                );
            }
            None => ensure!(
                self.context_embed_size == 0,
                "context_embed_size is {} but no contextual embedder produced vectors",
                self.context_embed_size
            ),
        }
        Ok(())
    }

    /// inputs → [batch, seq_len, output_size]
    pub fn forward(&self, inputs: &SrlInputs<B>, mode: Mode) -> Tensor<B, 3> {
        let [_, seq_len] = inputs.words.dims();

        let words = if self.use_word_dropout {
            word_dropout(inputs.words.clone(), inputs.freqs.clone(), self.alpha, self.unk_idx, mode)
        } else {
            inputs.words.clone()
        };

        let mut features = vec![
            self.word_embedding.forward(words.clone()),
            self.pretrained_embedding.forward(words),
            self.pos_embedding.forward(inputs.pos.clone()),
            self.lemma_embedding.forward(inputs.lemmas.clone()),
        ];

        if let Some(context) = &inputs.context {
            features.push(context.clone());
        }

        if let Some(stag_embedding) = &self.stag_embedding {
            features.push(stag_embedding.forward(inputs.stags.clone()));
            if let Some(stag_features) = &self.stag_feature_embedding {
                features.push(stag_features.forward(inputs.stags.clone()));
            }
        }

        features.push(predicate_markers(inputs.pred_positions.clone(), seq_len));

        Tensor::cat(features, 2)
    }
}

/// Replacement probability for a word of corpus frequency `freq`.
pub fn word_dropout_probability(freq: u32, alpha: f64, mode: Mode) -> f64 {
    alpha / (freq as f64 + alpha) * mode.switch()
}

/// Replace words by `unk_idx` with probability α / (freq + α).
/// Padding (id 0) is never replaced.
pub fn word_dropout<B: Backend>(
    words:   Tensor<B, 2, Int>,
    freqs:   Tensor<B, 2, Int>,
    alpha:   f64,
    unk_idx: usize,
    mode:    Mode,
) -> Tensor<B, 2, Int> {
    if mode.switch() == 0.0 {
        return words;
    }
    let real = words.clone().not_equal_elem(0).float();
    let prob = freqs
        .float()
        .add_scalar(alpha)
        .recip()
        .mul_scalar(alpha * mode.switch())
        * real;
    let draw = Tensor::random(prob.dims(), Distribution::Uniform(0.0, 1.0), &prob.device());
    words.mask_fill(draw.lower(prob), unk_idx as i32)
}

/// One-hot predicate position per sentence: [batch] → [batch, seq_len, 1].
pub fn predicate_markers<B: Backend>(pred_positions: Tensor<B, 1, Int>, seq_len: usize) -> Tensor<B, 3> {
    let [batch] = pred_positions.dims();
    let device  = pred_positions.device();
    let steps   = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
        .reshape([1, seq_len])
        .expand([batch, seq_len]);
    steps
        .equal(pred_positions.reshape([batch, 1]).expand([batch, seq_len]))
        .float()
        .unsqueeze_dim(2)
}
