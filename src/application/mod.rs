// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or evaluating a labeler).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Persisted hyper-parameters
pub mod args;

// Collaborators both workflows assemble
pub mod resources;

// The training workflow
pub mod train_use_case;

// Scoring a saved model on one split
pub mod evaluate_use_case;
