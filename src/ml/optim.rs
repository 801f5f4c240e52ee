// ============================================================
// Layer 5 — Optimisers
// ============================================================
// Two adaptive first-order methods, chosen when training starts:
//
//   adam       burn's Adam (ε = 1e-8)
//   adadelta   Zeiler (2012), with a learning rate on the update
//                E[g²]  = ρ E[g²]  + (1−ρ) g²
//                Δ      = √(E[Δ²] + ε) / √(E[g²] + ε) · g
//                E[Δ²]  = ρ E[Δ²]  + (1−ρ) Δ²
//                θ      = θ − lr · Δ
//
// Both clamp every gradient element to [-1, 1] before the update.

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, AdamConfig, Optimizer, SimpleOptimizer},
    LearningRate,
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

/// Elementwise bound applied to every gradient.
pub const GRAD_CLIP: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Adadelta,
}

fn clipping() -> Option<GradientClippingConfig> {
    Some(GradientClippingConfig::Value(GRAD_CLIP))
}

pub fn adam_config() -> AdamConfig {
    AdamConfig::new().with_epsilon(1e-8).with_grad_clipping(clipping())
}

pub fn adadelta_config() -> AdadeltaConfig {
    AdadeltaConfig::new().with_grad_clipping(clipping())
}

/// Adam with value clipping.
pub fn adam<B: AutodiffBackend, M: AutodiffModule<B>>() -> impl Optimizer<M, B> {
    adam_config().init::<B, M>()
}

/// Adadelta with value clipping.
pub fn adadelta<B: AutodiffBackend, M: AutodiffModule<B>>() -> impl Optimizer<M, B> {
    adadelta_config().init::<B, M>()
}

// ─── Adadelta ─────────────────────────────────────────────────────────────────
#[derive(Config)]
pub struct AdadeltaConfig {
    #[config(default = 0.95)]
    pub rho:           f32,
    #[config(default = 1e-8)]
    pub epsilon:       f32,
    pub grad_clipping: Option<GradientClippingConfig>,
}

impl AdadeltaConfig {
    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Adadelta, M, B> {
        let mut optim = OptimizerAdaptor::from(Adadelta {
            rho:     self.rho,
            epsilon: self.epsilon,
        });
        if let Some(config) = &self.grad_clipping {
            optim = optim.with_grad_clipping(config.init());
        }
        optim
    }
}

#[derive(Clone, Debug)]
pub struct Adadelta {
    rho:     f32,
    epsilon: f32,
}

/// Running averages of squared gradients and squared updates.
#[derive(Record, Clone)]
pub struct AdadeltaState<B: Backend, const D: usize> {
    pub square_grad:   Tensor<B, D>,
    pub square_update: Tensor<B, D>,
}

impl<B: Backend> SimpleOptimizer<B> for Adadelta {
    type State<const D: usize> = AdadeltaState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     LearningRate,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let (square_grad, square_update) = match state {
            Some(s) => (s.square_grad, s.square_update),
            None    => (grad.zeros_like(), grad.zeros_like()),
        };
        let rho = self.rho as f64;
        let eps = self.epsilon as f64;

        let square_grad = square_grad.mul_scalar(rho) + grad.clone().powf_scalar(2.0).mul_scalar(1.0 - rho);
        let update = square_update.clone().add_scalar(eps).sqrt()
            / square_grad.clone().add_scalar(eps).sqrt()
            * grad;
        let square_update = square_update.mul_scalar(rho) + update.clone().powf_scalar(2.0).mul_scalar(1.0 - rho);

        let tensor = tensor - update.mul_scalar(lr);
        (tensor, Some(AdadeltaState { square_grad, square_update }))
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.square_grad   = state.square_grad.to_device(device);
        state.square_update = state.square_update.to_device(device);
        state
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        module::Param,
        nn::{Linear, LinearConfig},
        optim::GradientsParams,
    };

    type TestBackend         = NdArray;
    type TestAutodiffBackend = Autodiff<NdArray>;
    type TinyLinear          = Linear<TestAutodiffBackend>;

    /// Train y = w·x (w starts at 0.5) with loss = y, so each step's
    /// gradient is exactly the input `x`. Returns the final weight.
    fn train_scalar<O: Optimizer<TinyLinear, TestAutodiffBackend>>(mut optim: O, inputs: &[f32]) -> f32 {
        let device = Default::default();
        let mut model: TinyLinear = LinearConfig::new(1, 1).with_bias(false).init(&device);
        model.weight = Param::from_tensor(Tensor::from_floats([[0.5]], &device));

        for &x in inputs {
            let loss  = model.forward(Tensor::<TestAutodiffBackend, 2>::from_floats([[x]], &device)).sum();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(0.1, model, grads);
        }
        model.weight.val().into_scalar()
    }

    #[test]
    fn test_value_clipping_bounds_every_element() {
        let device = Default::default();
        let grad   = Tensor::<TestBackend, 2>::from_floats([[250.0, -3.5], [0.25, -1e6]], &device);
        let clipped = GradientClippingConfig::Value(GRAD_CLIP)
            .init()
            .clip_gradient(grad)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(clipped, vec![1.0, -1.0, 0.25, -1.0]);
    }

    #[test]
    fn test_adam_builder_clips_large_gradients() {
        // a 1e6 gradient must act exactly like a gradient of 1
        let huge = train_scalar(adam::<TestAutodiffBackend, TinyLinear>(), &[1e6, 1.0]);
        let unit = train_scalar(adam::<TestAutodiffBackend, TinyLinear>(), &[1.0, 1.0]);
        assert_eq!(huge, unit);

        let unclipped = AdamConfig::new().with_epsilon(1e-8).init::<TestAutodiffBackend, TinyLinear>();
        assert_ne!(train_scalar(unclipped, &[1e6, 1.0]), unit);
    }

    #[test]
    fn test_adadelta_builder_clips_large_gradients() {
        let huge = train_scalar(adadelta::<TestAutodiffBackend, TinyLinear>(), &[1e6, 1.0]);
        let unit = train_scalar(adadelta::<TestAutodiffBackend, TinyLinear>(), &[1.0, 1.0]);
        assert_eq!(huge, unit);

        let unclipped = AdadeltaConfig::new().init::<TestAutodiffBackend, TinyLinear>();
        assert_ne!(train_scalar(unclipped, &[1e6, 1.0]), unit);
    }

    #[test]
    fn test_clipped_update_matches_clamped_gradient() {
        // with a large ε the first Adadelta step grows with |g|:
        // Δ = √ε / √((1−ρ)·g² + ε) · g
        let optim = adadelta_config().with_epsilon(1.0).init::<TestAutodiffBackend, TinyLinear>();
        let w     = train_scalar(optim, &[-1e6]);

        let g     = -1.0f64;
        let delta = 1.0 / (0.05 * g * g + 1.0f64).sqrt() * g;
        let expected = 0.5 - 0.1 * delta;
        assert!((w as f64 - expected).abs() < 1e-6, "{w} vs {expected}");
    }

    #[test]
    fn test_adadelta_first_step() {
        let device = Default::default();
        let optim  = Adadelta { rho: 0.95, epsilon: 1e-8 };
        let param  = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0], &device);
        let grad   = Tensor::<TestBackend, 1>::from_floats([1.0, -1.0], &device);

        let (param, state) = SimpleOptimizer::<TestBackend>::step(&optim, 1.0, param, grad, None);
        let values = param.into_data().to_vec::<f32>().unwrap();

        // Δ = √ε / √((1−ρ)·g² + ε) · g
        let delta = (1e-8f64).sqrt() / (0.05f64 + 1e-8).sqrt();
        assert!((values[0] as f64 - (1.0 - delta)).abs() < 1e-6);
        assert!((values[1] as f64 - (1.0 + delta)).abs() < 1e-6);
        assert!(state.is_some());
    }

    #[test]
    fn test_adadelta_moves_against_gradient() {
        let device = Default::default();
        let optim  = Adadelta { rho: 0.95, epsilon: 1e-6 };
        let mut param = Tensor::<TestBackend, 1>::from_floats([0.0], &device);
        let mut state = None;
        for _ in 0..5 {
            let grad = Tensor::<TestBackend, 1>::from_floats([2.0], &device);
            let (p, s) = SimpleOptimizer::<TestBackend>::step(&optim, 1.0, param, grad, state);
            param = p;
            state = s;
        }
        assert!(param.into_scalar() < 0.0);
    }

    #[test]
    fn test_optimizer_kind_serde() {
        assert_eq!(serde_json::to_string(&OptimizerKind::Adadelta).unwrap(), "\"adadelta\"");
        let kind: OptimizerKind = serde_json::from_str("\"adam\"").unwrap();
        assert_eq!(kind, OptimizerKind::Adam);
    }
}
