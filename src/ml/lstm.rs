// ============================================================
// Layer 5 — Sequence Encoder (stacked BiLSTM)
// ============================================================
// Architecture:
//   features [B, L, F]
//     → layer 1: dropout → forward LSTM ‖ backward LSTM → [B, L, 2S]
//     → layer 2: dropout → forward LSTM ‖ backward LSTM → [B, L, 2S]
//     → …
//
// Two cell variants share one implementation:
//
//   standard   gates i, f, o, g
//              c' = f ⊙ c + i ⊙ g
//              h' = o ⊙ tanh(c')
//
//   highway    adds a gate r and a linear carry of the input
//              h' = r ⊙ o ⊙ tanh(c') + (1 − r) ⊙ W_c x
//
// The input projection of every step is computed in one matmul
// before the scan; only the hidden projection runs per step.
//
// Recurrent dropout uses one mask per sequence (the same units
// are dropped at every step). Steps past a sentence's length
// leave the state untouched and emit zeros, so the backward
// direction starts at each sentence's last real token.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use crate::ml::mode::{dropout, dropout_mask, Mode};

const FORGET_BIAS: f64 = 1.0;

// ─── LstmCell ─────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LstmCellConfig {
    pub input_size: usize,
    pub state_size: usize,
    #[config(default = false)]
    pub highway:    bool,
}

impl LstmCellConfig {
    fn num_gates(&self) -> usize {
        if self.highway { 5 } else { 4 }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LstmCell<B> {
        let gates = self.num_gates();
        let carry = usize::from(self.highway);
        LstmCell {
            input:      LinearConfig::new(self.input_size, (gates + carry) * self.state_size).init(device),
            hidden:     LinearConfig::new(self.state_size, gates * self.state_size)
                .with_bias(false)
                .init(device),
            state_size: self.state_size,
            highway:    self.highway,
        }
    }
}

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    input:      Linear<B>,
    hidden:     Linear<B>,
    state_size: usize,
    highway:    bool,
}

impl<B: Backend> LstmCell<B> {
    /// [B, L, F] → [B, L, P], the input half of every gate at every step.
    pub fn project_inputs(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.input.forward(x)
    }

    /// One step from a projected input `x_t` [B, P] and the previous (h, c).
    pub fn step(&self, x_t: Tensor<B, 2>, h: Tensor<B, 2>, c: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let s          = self.state_size;
        let [batch, _] = x_t.dims();

        let (gates_x, carry) = if self.highway {
            (
                x_t.clone().slice([0..batch, 0..5 * s]),
                Some(x_t.slice([0..batch, 5 * s..6 * s])),
            )
        } else {
            (x_t, None)
        };

        let gates = gates_x + self.hidden.forward(h);
        let parts = gates.chunk(if self.highway { 5 } else { 4 }, 1);

        let i = sigmoid(parts[0].clone());
        let f = sigmoid(parts[1].clone().add_scalar(FORGET_BIAS));
        let o = sigmoid(parts[2].clone());
        let g = parts[3].clone().tanh();

        let c_next = f * c + i * g;
        let h_lstm = o * c_next.clone().tanh();

        let h_next = match carry {
            Some(carry) => {
                let r = sigmoid(parts[4].clone());
                r.clone() * h_lstm + r.neg().add_scalar(1.0) * carry
            }
            None => h_lstm,
        };
        (h_next, c_next)
    }

    /// Scan the whole sequence in one direction.
    ///
    /// `step_mask` is [B, L] with 1.0 on real tokens; `recurrent_mask`
    /// (already scaled) multiplies h before each hidden projection.
    pub fn scan(
        &self,
        x:              Tensor<B, 3>,
        step_mask:      Tensor<B, 2>,
        recurrent_mask: Option<Tensor<B, 2>>,
        reverse:        bool,
    ) -> Tensor<B, 3> {
        let [batch, seq_len, _] = x.dims();
        let device    = x.device();
        let projected = self.project_inputs(x);
        let width     = projected.dims()[2];
        let s         = self.state_size;

        let mut h = Tensor::<B, 2>::zeros([batch, s], &device);
        let mut c = Tensor::<B, 2>::zeros([batch, s], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for k in 0..seq_len {
            let t   = if reverse { seq_len - 1 - k } else { k };
            let x_t = projected.clone().slice([0..batch, t..t + 1, 0..width]).reshape([batch, width]);
            let m   = step_mask.clone().slice([0..batch, t..t + 1]).expand([batch, s]);

            let h_in = match &recurrent_mask {
                Some(mask) => h.clone() * mask.clone(),
                None       => h.clone(),
            };
            let (h_step, c_step) = self.step(x_t, h_in, c.clone());

            let hold = m.clone().neg().add_scalar(1.0);
            h = h_step.clone() * m.clone() + h * hold.clone();
            c = c_step * m.clone() + c * hold;
            outputs.push(h_step * m);
        }

        if reverse {
            outputs.reverse();
        }
        Tensor::stack(outputs, 1)
    }
}

// ─── BiLstmLayer ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BiLstmLayer<B: Backend> {
    forward_cell:  LstmCell<B>,
    backward_cell: LstmCell<B>,
}

impl<B: Backend> BiLstmLayer<B> {
    fn new(config: &LstmCellConfig, device: &B::Device) -> Self {
        Self {
            forward_cell:  config.init(device),
            backward_cell: config.init(device),
        }
    }

    /// [B, L, F] → [B, L, 2S]
    fn forward(&self, x: Tensor<B, 3>, step_mask: Tensor<B, 2>, recurrent_dropout: f64, mode: Mode) -> Tensor<B, 3> {
        let [batch, _, _] = x.dims();
        let s      = self.forward_cell.state_size;
        let device = x.device();

        let fwd = self.forward_cell.scan(
            x.clone(),
            step_mask.clone(),
            dropout_mask::<B, 2>([batch, s], recurrent_dropout, mode, &device),
            false,
        );
        let bwd = self.backward_cell.scan(
            x,
            step_mask,
            dropout_mask::<B, 2>([batch, s], recurrent_dropout, mode, &device),
            true,
        );
        Tensor::cat(vec![fwd, bwd], 2)
    }
}

// ─── SequenceEncoder ──────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct SequenceEncoderConfig {
    pub input_size: usize,
    pub state_size: usize,
    pub num_layers: usize,
    #[config(default = false)]
    pub highway:    bool,
    /// Drop probability on every layer's input
    #[config(default = 0.0)]
    pub dropout:    f64,
    /// Drop probability on the hidden state fed back each step
    #[config(default = 0.0)]
    pub recurrent_dropout: f64,
}

impl SequenceEncoderConfig {
    pub fn output_size(&self) -> usize {
        2 * self.state_size
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceEncoder<B> {
        let layers = (0..self.num_layers)
            .map(|i| {
                let input_size = if i == 0 { self.input_size } else { self.output_size() };
                let cell = LstmCellConfig::new(input_size, self.state_size).with_highway(self.highway);
                BiLstmLayer::new(&cell, device)
            })
            .collect();

        SequenceEncoder {
            layers,
            dropout:           self.dropout,
            recurrent_dropout: self.recurrent_dropout,
        }
    }
}

#[derive(Module, Debug)]
pub struct SequenceEncoder<B: Backend> {
    layers:            Vec<BiLstmLayer<B>>,
    dropout:           f64,
    recurrent_dropout: f64,
}

impl<B: Backend> SequenceEncoder<B> {
    /// features [B, L, F], seq_lengths [B] → [B, L, 2S]
    pub fn forward(&self, features: Tensor<B, 3>, seq_lengths: Tensor<B, 1, Int>, mode: Mode) -> Tensor<B, 3> {
        let [_, seq_len, _] = features.dims();
        let step_mask = length_mask(seq_lengths, seq_len);

        let mut x = features;
        for layer in &self.layers {
            x = dropout(x, self.dropout, mode);
            x = layer.forward(x, step_mask.clone(), self.recurrent_dropout, mode);
        }
        x
    }
}

/// [B] lengths → [B, L] float mask, 1.0 where position < length.
pub fn length_mask<B: Backend>(seq_lengths: Tensor<B, 1, Int>, seq_len: usize) -> Tensor<B, 2> {
    let [batch] = seq_lengths.dims();
    let device  = seq_lengths.device();
    Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
        .reshape([1, seq_len])
        .expand([batch, seq_len])
        .lower(seq_lengths.reshape([batch, 1]).expand([batch, seq_len]))
        .float()
}
