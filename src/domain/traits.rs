// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams to the collaborators the labeler does not own:
//
//   ContextualEmbedder → per-token context vectors for raw tokens
//   PredictionScorer   → external F1 evaluation of a prediction file
//
// The batch producer seam lives in the data layer because its
// output type (`SrlBatch`) is a data-layer type.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ─── ContextualEmbedder ───────────────────────────────────────────────────────
/// Supplies a context-sensitive vector for every token position.
pub trait ContextualEmbedder {
    /// Width of each returned vector
    fn dim(&self) -> usize;

    /// `tokens` is `(batch, seq_len)` of raw strings (padding is `""`).
    /// Returns a row-major `(batch, seq_len, dim)` buffer; positions at or
    /// beyond a sentence's true length must be zero.
    fn embed(&self, tokens: &[Vec<String>], seq_lengths: &[usize]) -> Result<Vec<f32>>;
}

// ─── PredictionScorer ─────────────────────────────────────────────────────────
/// Labeled and unlabeled F1 (both in percent).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct F1Scores {
    pub labeled:   f64,
    pub unlabeled: f64,
}

/// Anything that can compare a system prediction file with gold data.
pub trait PredictionScorer {
    fn score(&self, gold: &Path, system: &Path) -> Result<F1Scores>;
}
