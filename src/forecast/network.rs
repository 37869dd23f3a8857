//! Attention-augmented bidirectional LSTM forward pass.
//!
//! The architecture is fixed at training time: two stacked bidirectional
//! LSTM layers followed by a tanh attention head that pools the hidden
//! states into a context vector and a linear head that maps it to one
//! scalar in target space. Gate layout inside the packed weight matrices
//! is input, forget, cell, output. The forward pass is pure and
//! deterministic: the same window always produces the same output.

use anyhow::{bail, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use crate::artifacts::TensorArchive;
use crate::models::NUM_FEATURES;

/// Stacked bidirectional layers in the trained network.
pub const NUM_LAYERS: usize = 2;

const GATES: usize = 4;

/// One direction of one LSTM layer.
struct LstmCell {
    /// Packed input weights, `(4 * hidden, input)`.
    w_ih: Array2<f32>,
    /// Packed recurrent weights, `(4 * hidden, hidden)`.
    w_hh: Array2<f32>,
    b_ih: Array1<f32>,
    b_hh: Array1<f32>,
    hidden: usize,
}

impl LstmCell {
    fn step(&self, input: ArrayView1<f32>, h: &mut Array1<f32>, c: &mut Array1<f32>) {
        let gates = self.w_ih.dot(&input) + &self.b_ih + self.w_hh.dot(&*h) + &self.b_hh;
        let n = self.hidden;
        for j in 0..n {
            let i_gate = sigmoid(gates[j]);
            let f_gate = sigmoid(gates[n + j]);
            let g_gate = gates[2 * n + j].tanh();
            let o_gate = sigmoid(gates[3 * n + j]);
            let cell = f_gate * c[j] + i_gate * g_gate;
            c[j] = cell;
            h[j] = o_gate * cell.tanh();
        }
    }
}

/// A bidirectional layer: one cell scanning forward in time, one backward,
/// hidden states concatenated per step.
struct BiLstmLayer {
    fwd: LstmCell,
    bwd: LstmCell,
}

impl BiLstmLayer {
    /// Map `(steps, input)` to `(steps, 2 * hidden)`.
    fn forward(&self, input: ArrayView2<f32>) -> Array2<f32> {
        let steps = input.nrows();
        let n = self.fwd.hidden;
        let mut output = Array2::zeros((steps, 2 * n));

        let mut h = Array1::zeros(n);
        let mut c = Array1::zeros(n);
        for t in 0..steps {
            self.fwd.step(input.row(t), &mut h, &mut c);
            output.slice_mut(s![t, ..n]).assign(&h);
        }

        let mut h = Array1::zeros(n);
        let mut c = Array1::zeros(n);
        for t in (0..steps).rev() {
            self.bwd.step(input.row(t), &mut h, &mut c);
            output.slice_mut(s![t, n..]).assign(&h);
        }

        output
    }
}

/// The trained forecasting network.
pub struct AttentionLstm {
    layers: Vec<BiLstmLayer>,
    attention_weight: Array1<f32>,
    attention_bias: f32,
    head_weight: Array1<f32>,
    head_bias: f32,
    hidden: usize,
}

impl AttentionLstm {
    /// Assemble the network from archive tensors, validating every shape
    /// against the fixed architecture. The hidden size is derived from the
    /// attention weight rather than hardcoded.
    pub(crate) fn from_archive(archive: &mut TensorArchive) -> Result<Self> {
        let attention = archive.take_matrix("attention.weight")?;
        if attention.nrows() != 1 || attention.ncols() % 2 != 0 || attention.ncols() == 0 {
            bail!(
                "attention.weight has shape {:?}, expected (1, 2 * hidden)",
                attention.shape()
            );
        }
        let hidden = attention.ncols() / 2;
        let attention_weight = attention.row(0).to_owned();
        let attention_bias = take_scalar(archive, "attention.bias")?;

        let mut layers = Vec::with_capacity(NUM_LAYERS);
        for layer in 0..NUM_LAYERS {
            let input = if layer == 0 { NUM_FEATURES } else { 2 * hidden };
            layers.push(BiLstmLayer {
                fwd: take_cell(archive, layer, "fwd", input, hidden)?,
                bwd: take_cell(archive, layer, "bwd", input, hidden)?,
            });
        }

        let head = archive.take_matrix("head.weight")?;
        if head.shape() != [1, 2 * hidden] {
            bail!(
                "head.weight has shape {:?}, expected (1, {})",
                head.shape(),
                2 * hidden
            );
        }
        let head_weight = head.row(0).to_owned();
        let head_bias = take_scalar(archive, "head.bias")?;

        Ok(Self {
            layers,
            attention_weight,
            attention_bias,
            head_weight,
            head_bias,
            hidden,
        })
    }

    /// Hidden units per direction per layer.
    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    /// Run the full forward pass over a scaled `(steps, NUM_FEATURES)`
    /// window and return the prediction in scaled target space.
    pub fn forward(&self, window: ArrayView2<f32>) -> f32 {
        let mut states = self.layers[0].forward(window);
        for layer in &self.layers[1..] {
            states = layer.forward(states.view());
        }

        let steps = states.nrows();
        let mut scores = Array1::zeros(steps);
        for t in 0..steps {
            scores[t] = (states.row(t).dot(&self.attention_weight) + self.attention_bias).tanh();
        }
        let weights = softmax(&scores);

        let mut context = Array1::<f32>::zeros(states.ncols());
        for t in 0..steps {
            context.scaled_add(weights[t], &states.row(t));
        }

        context.dot(&self.head_weight) + self.head_bias
    }
}

fn take_cell(
    archive: &mut TensorArchive,
    layer: usize,
    direction: &str,
    input: usize,
    hidden: usize,
) -> Result<LstmCell> {
    let prefix = format!("lstm.l{}.{}", layer, direction);
    let w_ih = archive.take_matrix(&format!("{}.w_ih", prefix))?;
    let w_hh = archive.take_matrix(&format!("{}.w_hh", prefix))?;
    let b_ih = archive.take_vector(&format!("{}.b_ih", prefix))?;
    let b_hh = archive.take_vector(&format!("{}.b_hh", prefix))?;

    let packed = GATES * hidden;
    if w_ih.shape() != [packed, input] {
        bail!(
            "{}.w_ih has shape {:?}, expected ({}, {})",
            prefix,
            w_ih.shape(),
            packed,
            input
        );
    }
    if w_hh.shape() != [packed, hidden] {
        bail!(
            "{}.w_hh has shape {:?}, expected ({}, {})",
            prefix,
            w_hh.shape(),
            packed,
            hidden
        );
    }
    if b_ih.len() != packed || b_hh.len() != packed {
        bail!(
            "{} biases have lengths {} and {}, expected {}",
            prefix,
            b_ih.len(),
            b_hh.len(),
            packed
        );
    }

    Ok(LstmCell {
        w_ih,
        w_hh,
        b_ih,
        b_hh,
        hidden,
    })
}

fn take_scalar(archive: &mut TensorArchive, name: &str) -> Result<f32> {
    let vec = archive.take_vector(name)?;
    if vec.len() != 1 {
        bail!("Tensor '{}' has {} elements, expected 1", name, vec.len());
    }
    Ok(vec[0])
}

/// Numerically stable softmax: the running maximum is subtracted before
/// exponentiation so large scores cannot overflow.
fn softmax(scores: &Array1<f32>) -> Array1<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = scores.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn zero_cell(input: usize, hidden: usize) -> LstmCell {
        LstmCell {
            w_ih: Array2::zeros((GATES * hidden, input)),
            w_hh: Array2::zeros((GATES * hidden, hidden)),
            b_ih: Array1::zeros(GATES * hidden),
            b_hh: Array1::zeros(GATES * hidden),
            hidden,
        }
    }

    fn zero_network(hidden: usize) -> AttentionLstm {
        AttentionLstm {
            layers: vec![
                BiLstmLayer {
                    fwd: zero_cell(NUM_FEATURES, hidden),
                    bwd: zero_cell(NUM_FEATURES, hidden),
                },
                BiLstmLayer {
                    fwd: zero_cell(2 * hidden, hidden),
                    bwd: zero_cell(2 * hidden, hidden),
                },
            ],
            attention_weight: Array1::zeros(2 * hidden),
            attention_bias: 0.0,
            head_weight: Array1::zeros(2 * hidden),
            head_bias: 0.0,
            hidden,
        }
    }

    #[test]
    fn test_lstm_step_matches_hand_computation() {
        // Single hidden unit, all weights 0.5, zero recurrence and biases.
        let cell = LstmCell {
            w_ih: Array2::from_elem((GATES, 1), 0.5),
            w_hh: Array2::zeros((GATES, 1)),
            b_ih: Array1::zeros(GATES),
            b_hh: Array1::zeros(GATES),
            hidden: 1,
        };
        let input = array![1.0_f32];
        let mut h = Array1::zeros(1);
        let mut c = Array1::zeros(1);
        cell.step(input.view(), &mut h, &mut c);

        // All gate preactivations are 0.5.
        let gate = sigmoid(0.5);
        let cell_state = gate * 0.5_f32.tanh();
        let hidden = gate * cell_state.tanh();
        assert!((c[0] - cell_state).abs() < 1e-6);
        assert!((h[0] - hidden).abs() < 1e-6);
    }

    #[test]
    fn test_forget_gate_scales_previous_cell_state() {
        // Large negative forget bias closes the gate.
        let mut cell = zero_cell(1, 1);
        cell.b_ih[1] = -100.0;
        let mut h = Array1::zeros(1);
        let mut c = array![5.0_f32];
        cell.step(array![0.0_f32].view(), &mut h, &mut c);
        assert!(c[0].abs() < 1e-4);

        // Large positive forget bias keeps it.
        let mut cell = zero_cell(1, 1);
        cell.b_ih[1] = 100.0;
        let mut h = Array1::zeros(1);
        let mut c = array![5.0_f32];
        cell.step(array![0.0_f32].view(), &mut h, &mut c);
        assert!((c[0] - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_network_outputs_head_bias() {
        let mut network = zero_network(3);
        network.head_bias = 0.75;
        let window = Array2::from_elem((48, NUM_FEATURES), 0.42_f32);
        assert_eq!(network.forward(window.view()), 0.75);
    }

    #[test]
    fn test_forward_is_deterministic() {
        let mut network = zero_network(2);
        network.head_bias = 0.1;
        // Perturb a few weights so the pass is not trivially constant.
        network.layers[0].fwd.w_ih[[0, 0]] = 0.3;
        network.layers[0].bwd.w_ih[[4, 1]] = -0.2;
        network.attention_weight[1] = 0.7;
        network.head_weight[2] = 1.1;

        let window =
            Array2::from_shape_fn((48, NUM_FEATURES), |(r, c)| ((r * 7 + c) % 5) as f32 * 0.1);
        let a = network.forward(window.view());
        let b = network.forward(window.view());
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_softmax_is_uniform_for_equal_scores() {
        let weights = softmax(&Array1::from_elem(4, 3.2));
        for &w in weights.iter() {
            assert!((w - 0.25).abs() < 1e-6);
        }
        assert!((weights.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_survives_large_scores() {
        let weights = softmax(&array![1000.0_f32, 999.0, 0.0]);
        assert!(weights.iter().all(|w| w.is_finite()));
        assert!((weights.sum() - 1.0).abs() < 1e-6);
        assert!(weights[0] > weights[1]);
        assert!(weights[2] < 1e-6);
    }

    #[test]
    fn test_attention_pools_toward_high_score_steps() {
        // Hidden states are produced by the LSTM, so drive the comparison
        // through the head: a network whose attention prefers later steps
        // must weight the backward-direction state of step 0 less.
        let mut network = zero_network(1);
        network.layers[0].fwd.w_ih[[0, 0]] = 2.0; // input gate opens with input
        network.layers[0].fwd.w_ih[[2, 0]] = 2.0; // cell gate follows input
        network.layers[1].fwd.w_ih[[0, 0]] = 2.0;
        network.layers[1].fwd.w_ih[[2, 0]] = 2.0;
        network.head_weight[0] = 1.0;

        let mut ramp = Array2::zeros((8, NUM_FEATURES));
        for t in 0..8 {
            ramp[[t, 0]] = t as f32 / 8.0;
        }

        // Uniform attention baseline.
        let baseline = network.forward(ramp.view());

        // Bias attention toward late steps, where the forward state is larger.
        network.attention_weight[0] = 50.0;
        let focused = network.forward(ramp.view());
        assert!(
            focused > baseline,
            "focused {} should exceed baseline {}",
            focused,
            baseline
        );
    }
}
