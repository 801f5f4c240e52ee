// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any specific
// business layer:
//
//   checkpoint.rs — model weights (Burn CompactRecorder) plus
//                   args.json and vocabs.json, everything
//                   needed to rebuild a model for evaluation
//
//   metrics.rs    — per-epoch loss and F1 rows in metrics.csv
//
//   embeddings.rs — text vector tables: pretrained word
//                   vectors, supertag features and the
//                   surface-form contextual embedder
//
//   scorer.rs     — the external evaluation script
//
//   silence.rs    — scoped stdout redirection used while
//                   gradients are built

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Pretrained and contextual vector tables
pub mod embeddings;

/// External F1 scorer
pub mod scorer;

/// Stdout silencing guard
pub mod silence;
