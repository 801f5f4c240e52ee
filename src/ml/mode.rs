// ============================================================
// Layer 5 — Runtime Mode and Dropout
// ============================================================
// Training and evaluation share one set of parameters and one
// forward pass. The only difference is the mode passed into
// `forward`, which scales every dropout probability by a 0/1
// switch:
//
//   effective_p = configured_p × switch    (Train → 1, Eval → 0)
//
// With the switch at 0 every dropout below returns its input
// untouched, so an evaluation forward pass is deterministic.

use burn::{prelude::*, tensor::Distribution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

impl Mode {
    /// Scalar multiplier applied to every dropout probability.
    pub fn switch(self) -> f64 {
        match self {
            Mode::Train => 1.0,
            Mode::Eval  => 0.0,
        }
    }
}

/// Inverted-dropout keep mask of the given shape, already scaled by
/// 1/keep. `None` when nothing would be dropped.
pub fn dropout_mask<B: Backend, const D: usize>(
    shape:  [usize; D],
    prob:   f64,
    mode:   Mode,
    device: &B::Device,
) -> Option<Tensor<B, D>> {
    let p = prob * mode.switch();
    if p <= 0.0 {
        return None;
    }
    let keep = 1.0 - p;
    let mask = Tensor::<B, D>::random(shape, Distribution::Bernoulli(keep), device);
    Some(mask.div_scalar(keep))
}

/// Elementwise inverted dropout.
pub fn dropout<B: Backend, const D: usize>(x: Tensor<B, D>, prob: f64, mode: Mode) -> Tensor<B, D> {
    match dropout_mask::<B, D>(x.dims(), prob, mode, &x.device()) {
        Some(mask) => x * mask,
        None       => x,
    }
}
