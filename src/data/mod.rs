// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the corpus files on disk and the padded
// host-side batches the model consumes:
//
//   {split}.jsonl + predicates + supertags
//       │
//       ▼
//   corpus::read_split      → Vec<Sentence> (parent arena)
//       │
//       ▼
//   producer::batch_sentences → one SrlItem per predicate
//       │
//       ▼
//   SrlBatcher              → fixed-size padded SrlBatch
//
// Reference: Burn Book §4 (Batcher)

/// Split file layout and readers
pub mod corpus;

/// Implements Burn's Batcher trait to pad and flatten instances
pub mod batcher;

/// The BatchProducer seam and its corpus-backed implementation
pub mod producer;
