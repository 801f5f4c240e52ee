// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn-specific model code. The data
// and domain layers stay plain Rust so they can be tested
// without a device.
//
// Forward pass, bottom to top:
//
//   features.rs  — FeatureComposer
//                  word / pretrained / POS / lemma / context /
//                  supertag embeddings + predicate marker
//
//   lstm.rs      — SequenceEncoder
//                  stacked BiLSTM, standard or highway cell,
//                  input and recurrent dropout, length masks
//
//   scorer.rs    — PredicateContext + RoleScorer
//                  predicate state tiled onto every token,
//                  low-rank bilinear role scoring, optional
//                  multiplicative label mask
//
//   model.rs     — SrlModel wiring the three together, plus
//                  softmax and token-level cross-entropy
//
// Around it:
//
//   mode.rs      — Train / Eval switch threaded through forward
//   init.rs      — orthogonal initialisation
//   optim.rs     — Adam and Adadelta with gradient clipping
//   trainer.rs   — cached batches, training and testing epochs
//
// Reference: Marcheggiani, Frolov & Titov (2017)
//            He, Lee, Lewis & Zettlemoyer (2017)

/// Train / Eval mode and dropout helpers
pub mod mode;

/// Orthogonal matrix initialisation
pub mod init;

/// Per-token feature composition
pub mod features;

/// Stacked bidirectional LSTM encoder
pub mod lstm;

/// Predicate context and role scoring
pub mod scorer;

/// The complete labeler
pub mod model;

/// Optimisers with gradient clipping
pub mod optim;

/// Training and evaluation epochs
pub mod trainer;
