// ============================================================
// Layer 2 — Persisted Hyper-parameters
// ============================================================
// SrlArgs is the record written to {model_dir}/args.json when
// training starts and read back by `evaluate`. Together with
// the vocabularies it fixes the model architecture.
//
// Two fields are allowed to be absent from an older record:
//   language   → "eng"
//   stags_dir  → "pred"
// Every other missing field fails deserialisation.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::vocab::Vocabs;
use crate::ml::{features::FeatureComposerConfig, model::SrlModelConfig, optim::OptimizerKind};

pub const DEFAULT_LANGUAGE:  &str = "eng";
pub const DEFAULT_STAGS_DIR: &str = "pred";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_stags_dir() -> String {
    DEFAULT_STAGS_DIR.to_string()
}

// ─── Training Configuration ──────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrlArgs {
    #[serde(default = "default_language")]
    pub language:      String,
    pub seed:          u64,
    pub batch_size:    usize,
    pub epochs:        usize,
    pub learning_rate: f64,

    pub word_embed_size:         usize,
    pub pretrained_embed_size:   usize,
    pub pos_embed_size:          usize,
    pub lemma_embed_size:        usize,
    pub output_lemma_embed_size: usize,
    pub role_embed_size:         usize,
    pub context_embed_size:      usize,
    pub stag_embed_size:         usize,
    pub stag_feature_embed_size: usize,

    pub state_size:        usize,
    pub num_layers:        usize,
    pub use_highway_lstm:  bool,
    /// Drop probability on LSTM layer inputs
    pub dropout:           f64,
    /// Drop probability on the recurrent state
    pub recurrent_dropout: f64,
    pub use_word_dropout:  bool,
    pub alpha:             f64,

    pub optimizer:       OptimizerKind,
    pub restrict_labels: bool,

    pub use_stags:         bool,
    pub use_stag_features: bool,
    pub stag_type:         String,
    #[serde(default = "default_stags_dir")]
    pub stags_dir:         String,
}

impl Default for SrlArgs {
    fn default() -> Self {
        Self {
            language:      default_language(),
            seed:          89,
            batch_size:    100,
            epochs:        10,
            learning_rate: 0.001,

            word_embed_size:         100,
            pretrained_embed_size:   100,
            pos_embed_size:          16,
            lemma_embed_size:        100,
            output_lemma_embed_size: 128,
            role_embed_size:         128,
            context_embed_size:      0,
            stag_embed_size:         16,
            stag_feature_embed_size: 50,

            state_size:        512,
            num_layers:        4,
            use_highway_lstm:  false,
            dropout:           0.0,
            recurrent_dropout: 0.0,
            use_word_dropout:  true,
            alpha:             0.25,

            optimizer:       OptimizerKind::Adam,
            restrict_labels: false,

            use_stags:         false,
            use_stag_features: false,
            stag_type:         "ud".to_string(),
            stags_dir:         default_stags_dir(),
        }
    }
}

impl SrlArgs {
    /// Reject settings no model can be built from.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.state_size > 0, "state_size must be positive");
        ensure!(self.num_layers > 0, "num_layers must be positive");
        ensure!(self.learning_rate > 0.0, "learning_rate must be positive");
        for (name, p) in [("dropout", self.dropout), ("recurrent_dropout", self.recurrent_dropout)] {
            ensure!((0.0..1.0).contains(&p), "{name} must be in [0, 1), got {p}");
        }
        ensure!(self.alpha > 0.0, "alpha must be positive");
        ensure!(
            !self.use_stag_features || self.use_stags,
            "use_stag_features requires use_stags"
        );
        ensure!(!self.use_stags || !self.stag_type.is_empty(), "use_stags requires a stag_type");
        Ok(())
    }

    /// Architecture for these settings over `vocabs`.
    pub fn model_config(&self, vocabs: &Vocabs) -> SrlModelConfig {
        let features = FeatureComposerConfig::new(
            vocabs.words.size(),
            vocabs.pos.size(),
            vocabs.lemmas.size(),
            vocabs.stags.size(),
            vocabs.words.unk_idx(),
            self.word_embed_size,
            self.pretrained_embed_size,
            self.pos_embed_size,
            self.lemma_embed_size,
        )
        .with_context_embed_size(self.context_embed_size)
        .with_use_stags(self.use_stags)
        .with_stag_embed_size(self.stag_embed_size)
        .with_use_stag_features(self.use_stags && self.use_stag_features)
        .with_stag_feature_embed_size(self.stag_feature_embed_size)
        .with_use_word_dropout(self.use_word_dropout)
        .with_alpha(self.alpha);

        SrlModelConfig::new(
            features,
            vocabs.labels.size(),
            self.state_size,
            self.num_layers,
            self.role_embed_size,
            self.output_lemma_embed_size,
        )
        .with_use_highway_lstm(self.use_highway_lstm)
        .with_dropout(self.dropout)
        .with_recurrent_dropout(self.recurrent_dropout)
        .with_restrict_labels(self.restrict_labels)
        .with_seed(self.seed)
    }

    /// `(stags_dir, stag_type)` when supertags are read.
    pub fn stag_files(&self) -> Option<(&str, &str)> {
        self.use_stags.then_some((self.stags_dir.as_str(), self.stag_type.as_str()))
    }
}
