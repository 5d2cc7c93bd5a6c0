//! Fully connected Q-network: ReLU hidden layers, linear output, MSE loss,
//! Adam optimizer. Rows of a batch are processed in parallel with rayon; the
//! weight update happens once per `fit`, after all row gradients are summed.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::approximator::{FitMetrics, QApproximator};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::utils::argmax;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const ADAM_EPS: f32 = 1e-7;

fn relu(x: f32) -> f32 {
    x.max(0.0)
}

// derivative expressed through the activated value: relu(z) > 0 <=> z > 0
fn relu_derivative(activated: f32) -> f32 {
    if activated > 0.0 { 1.0 } else { 0.0 }
}

/// Dense layer, `weights[out][in]`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
}

impl Layer {
    /// He-uniform weights, zero biases.
    fn random<R: Rng + ?Sized>(input: usize, output: usize, rng: &mut R) -> Self {
        let limit = (6.0 / input as f32).sqrt();
        let weights = (0..output)
            .map(|_| (0..input).map(|_| rng.gen_range(-limit..limit)).collect())
            .collect();
        Self { weights, biases: vec![0.0; output] }
    }

    fn zeros_like(&self) -> Self {
        Self {
            weights: self.weights.iter().map(|w| vec![0.0; w.len()]).collect(),
            biases: vec![0.0; self.biases.len()],
        }
    }

    pub fn input_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn output_dim(&self) -> usize {
        self.biases.len()
    }

    fn apply(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(w, b)| b + w.iter().zip(input).map(|(w, x)| w * x).sum::<f32>())
            .collect()
    }

    fn add_assign(&mut self, other: &Layer) {
        for (row, other_row) in self.weights.iter_mut().zip(&other.weights) {
            for (w, o) in row.iter_mut().zip(other_row) {
                *w += o;
            }
        }
        for (b, o) in self.biases.iter_mut().zip(&other.biases) {
            *b += o;
        }
    }

    fn is_well_formed(&self) -> bool {
        self.weights.len() == self.biases.len()
            && self.weights.iter().all(|w| w.len() == self.input_dim())
    }
}

#[derive(Serialize, Deserialize)]
struct WeightsFile {
    input: usize,
    output: usize,
    layers: Vec<Layer>,
}

/// Gradient sums for a run of rows. One per rayon job, never one per row.
struct GradAcc {
    grads: Vec<Layer>, // same shapes as the network's layers
    loss: f32,         // summed per-row MSE
    hits: usize,       // rows whose argmax matches the label's
}

impl GradAcc {
    fn zeros(layers: &[Layer]) -> Self {
        Self { grads: layers.iter().map(Layer::zeros_like).collect(), loss: 0.0, hits: 0 }
    }

    fn merge(mut self, other: GradAcc) -> GradAcc {
        for (g, o) in self.grads.iter_mut().zip(&other.grads) {
            g.add_assign(o);
        }
        self.loss += other.loss;
        self.hits += other.hits;
        self
    }
}

/// Smallest number of rows a rayon job takes, which bounds how many
/// accumulators a batch allocates.
const ROWS_PER_JOB: usize = 64;

pub struct Mlp {
    layers: Vec<Layer>,
    m: Vec<Layer>, // Adam first moment
    v: Vec<Layer>, // Adam second moment
    t: i32,
    lr: f32,
}

impl Mlp {
    pub fn new<R: Rng + ?Sized>(input: usize, hidden: &[usize], output: usize, lr: f32, rng: &mut R) -> Self {
        let mut sizes = vec![input];
        sizes.extend_from_slice(hidden);
        sizes.push(output);
        let layers = sizes.windows(2).map(|w| Layer::random(w[0], w[1], rng)).collect();
        Self::with_layers(layers, lr)
    }

    /// Builds a network from explicit layers, checking that they chain.
    pub fn from_layers(layers: Vec<Layer>, lr: f32) -> Result<Self> {
        check_layers(&layers).map_err(Error::ShapeMismatch)?;
        Ok(Self::with_layers(layers, lr))
    }

    fn with_layers(layers: Vec<Layer>, lr: f32) -> Self {
        let m: Vec<Layer> = layers.iter().map(Layer::zeros_like).collect();
        let v = m.clone();
        Self { layers, m, v, t: 0, lr }
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_dim)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, Layer::output_dim)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let last = self.layers.len() - 1;
        self.layers.iter().enumerate().fold(input.to_vec(), |x, (l, layer)| {
            let z = layer.apply(&x);
            if l < last { z.into_iter().map(relu).collect() } else { z }
        })
    }

    /// Activations of every layer, input included.
    fn forward_trace(&self, input: &[f32]) -> Vec<Vec<f32>> {
        let last = self.layers.len() - 1;
        let mut acts = Vec::with_capacity(self.layers.len() + 1);
        acts.push(input.to_vec());
        for (l, layer) in self.layers.iter().enumerate() {
            let z = layer.apply(&acts[l]);
            acts.push(if l < last { z.into_iter().map(relu).collect() } else { z });
        }
        acts
    }

    /// Adds one row's MSE gradient (mean over outputs, not yet divided by
    /// batch size) into `acc`.
    fn accumulate_row(&self, acc: &mut GradAcc, input: &[f32], target: &[f32]) {
        let acts = self.forward_trace(input);
        let out = &acts[acts.len() - 1];
        let n = out.len() as f32;

        acc.loss += out.iter().zip(target).map(|(o, t)| (o - t) * (o - t)).sum::<f32>() / n;
        acc.hits += usize::from(argmax(out) == argmax(target));

        let mut delta: Vec<f32> = out.iter().zip(target).map(|(o, t)| 2.0 * (o - t) / n).collect();
        for l in (0..self.layers.len()).rev() {
            let layer = &self.layers[l];
            let x = &acts[l];
            let grad = &mut acc.grads[l];
            for (j, d) in delta.iter().enumerate() {
                for (g, xi) in grad.weights[j].iter_mut().zip(x) {
                    *g += d * xi;
                }
                grad.biases[j] += *d;
            }
            if l > 0 {
                // back through layer l, then through the ReLU that produced x
                delta = (0..x.len())
                    .map(|i| {
                        let back: f32 = delta.iter().enumerate().map(|(j, d)| layer.weights[j][i] * d).sum();
                        back * relu_derivative(x[i])
                    })
                    .collect();
            }
        }
    }

    /// Summed gradients over every row of the batch.
    fn batch_gradients(&self, states: &Matrix, targets: &Matrix) -> Option<GradAcc> {
        (0..states.rows())
            .into_par_iter()
            .with_min_len(ROWS_PER_JOB)
            .fold(
                || GradAcc::zeros(&self.layers),
                |mut acc, r| {
                    self.accumulate_row(&mut acc, states.row(r), targets.row(r));
                    acc
                },
            )
            .reduce_with(GradAcc::merge)
    }

    fn step_adam(&mut self, grads: &[Layer], scale: f32) {
        self.t += 1;
        let lr_t = self.lr * (1.0 - BETA2.powi(self.t)).sqrt() / (1.0 - BETA1.powi(self.t));
        for (l, g) in grads.iter().enumerate() {
            let (layer, m, v) = (&mut self.layers[l], &mut self.m[l], &mut self.v[l]);
            for j in 0..g.biases.len() {
                for i in 0..g.weights[j].len() {
                    adam_update(
                        &mut layer.weights[j][i],
                        &mut m.weights[j][i],
                        &mut v.weights[j][i],
                        g.weights[j][i] * scale,
                        lr_t,
                    );
                }
                adam_update(&mut layer.biases[j], &mut m.biases[j], &mut v.biases[j], g.biases[j] * scale, lr_t);
            }
        }
    }

    fn check_input(&self, states: &Matrix) -> Result<()> {
        if states.cols() != self.input_dim() {
            return Err(Error::ShapeMismatch(format!(
                "network expects {} inputs, got {}",
                self.input_dim(),
                states.cols()
            )));
        }
        if states.rows() == 0 {
            return Err(Error::ShapeMismatch("empty batch".into()));
        }
        Ok(())
    }
}

fn adam_update(p: &mut f32, m: &mut f32, v: &mut f32, g: f32, lr_t: f32) {
    *m = BETA1 * *m + (1.0 - BETA1) * g;
    *v = BETA2 * *v + (1.0 - BETA2) * g * g;
    *p -= lr_t * *m / (v.sqrt() + ADAM_EPS);
}

fn check_layers(layers: &[Layer]) -> std::result::Result<(), String> {
    if layers.is_empty() {
        return Err("network has no layers".into());
    }
    for (l, layer) in layers.iter().enumerate() {
        if !layer.is_well_formed() || layer.output_dim() == 0 || layer.input_dim() == 0 {
            return Err(format!("layer {l} is malformed"));
        }
    }
    for (l, pair) in layers.windows(2).enumerate() {
        if pair[0].output_dim() != pair[1].input_dim() {
            return Err(format!("layer {l} outputs {} values but layer {} takes {}", pair[0].output_dim(), l + 1, pair[1].input_dim()));
        }
    }
    Ok(())
}

impl QApproximator for Mlp {
    fn predict(&self, states: &Matrix) -> Result<Matrix> {
        self.check_input(states)?;
        let out: Vec<f32> = (0..states.rows())
            .into_par_iter()
            .flat_map_iter(|r| self.forward(states.row(r)))
            .collect();
        Matrix::from_vec(states.rows(), self.output_dim(), out)
    }

    fn fit(&mut self, states: &Matrix, targets: &Matrix) -> Result<FitMetrics> {
        self.check_input(states)?;
        if targets.rows() != states.rows() || targets.cols() != self.output_dim() {
            return Err(Error::ShapeMismatch(format!(
                "targets are {}x{}, expected {}x{}",
                targets.rows(),
                targets.cols(),
                states.rows(),
                self.output_dim()
            )));
        }

        let rows = states.rows();
        let total = self
            .batch_gradients(states, targets)
            .ok_or_else(|| Error::ShapeMismatch("empty batch".into()))?;

        let metrics = FitMetrics { loss: total.loss / rows as f32, accuracy: total.hits as f32 / rows as f32 };
        if !metrics.loss.is_finite() {
            tracing::error!(loss = metrics.loss, "non-finite loss, skipping weight update");
            return Ok(metrics);
        }
        self.step_adam(&total.grads, 1.0 / rows as f32);
        Ok(metrics)
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        let file = WeightsFile { input: self.input_dim(), output: self.output_dim(), layers: self.layers.clone() };
        let json = serde_json::to_string(&file)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Replaces the weights with the file's; the optimizer state starts over.
    fn load_weights(&mut self, path: &Path) -> Result<()> {
        let fail = |reason: String| Error::Weights { path: path.to_path_buf(), reason };
        let content = fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let file: WeightsFile = serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;
        check_layers(&file.layers).map_err(fail)?;
        let loaded = Self::with_layers(file.layers, self.lr);
        if loaded.input_dim() != self.input_dim() || loaded.output_dim() != self.output_dim() {
            return Err(fail(format!(
                "file holds a {}->{} network, expected {}->{}",
                loaded.input_dim(),
                loaded.output_dim(),
                self.input_dim(),
                self.output_dim()
            )));
        }
        *self = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("snake_dqn_{}_{}", std::process::id(), name))
    }

    #[test]
    fn shapes_follow_the_layer_sizes() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = Mlp::new(11, &[16, 8], 4, 0.001, &mut rng);
        assert_eq!(net.input_dim(), 11);
        assert_eq!(net.output_dim(), 4);
        let q = net.predict(&Matrix::zeros(3, 11)).unwrap();
        assert_eq!((q.rows(), q.cols()), (3, 4));
        assert!(net.predict(&Matrix::zeros(1, 10)).is_err());
    }

    #[test]
    fn linear_layer_forward() {
        let layer = Layer { weights: vec![vec![1.0, 2.0], vec![-1.0, 0.5]], biases: vec![0.5, 0.0] };
        let net = Mlp::from_layers(vec![layer], 0.01).unwrap();
        assert_eq!(net.forward(&[1.0, 1.0]), vec![3.5, -0.5]);
    }

    #[test]
    fn mismatched_layers_are_rejected() {
        let a = Layer { weights: vec![vec![1.0, 2.0]], biases: vec![0.0] };
        let b = Layer { weights: vec![vec![1.0, 1.0]], biases: vec![0.0] };
        assert!(Mlp::from_layers(vec![a, b], 0.01).is_err());
        assert!(Mlp::from_layers(vec![], 0.01).is_err());
    }

    #[test]
    fn fitting_reduces_the_loss() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut net = Mlp::new(3, &[16], 2, 0.01, &mut rng);
        let states = Matrix::from_rows(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        let targets = Matrix::from_rows(&[[1.0, -1.0], [-1.0, 1.0], [0.5, 0.5]]).unwrap();
        let first = net.fit(&states, &targets).unwrap();
        let mut last = first;
        for _ in 0..300 {
            last = net.fit(&states, &targets).unwrap();
        }
        assert!(last.loss < first.loss * 0.1, "loss {} -> {}", first.loss, last.loss);
        assert!(last.accuracy >= 2.0 / 3.0);
    }

    #[test]
    fn batch_gradients_sum_every_row_across_jobs() {
        let mut rng = StdRng::seed_from_u64(21);
        let net = Mlp::new(4, &[8], 3, 0.001, &mut rng);
        let rows = 5 * ROWS_PER_JOB + 7;
        let states: Vec<Vec<f32>> = (0..rows).map(|_| (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect()).collect();
        let targets: Vec<Vec<f32>> = (0..rows).map(|_| (0..3).map(|_| rng.gen_range(-1.0..1.0)).collect()).collect();
        let states = Matrix::from_rows(&states).unwrap();
        let targets = Matrix::from_rows(&targets).unwrap();

        let mut serial = GradAcc::zeros(net.layers());
        for r in 0..rows {
            net.accumulate_row(&mut serial, states.row(r), targets.row(r));
        }
        let parallel = net.batch_gradients(&states, &targets).unwrap();

        assert_eq!(parallel.hits, serial.hits);
        assert!((parallel.loss - serial.loss).abs() < 1e-3 * serial.loss.abs().max(1.0));
        for (p, s) in parallel.grads.iter().zip(&serial.grads) {
            for (pw, sw) in p.weights.iter().flatten().zip(s.weights.iter().flatten()) {
                assert!((pw - sw).abs() < 1e-3 * sw.abs().max(1.0), "{pw} vs {sw}");
            }
            for (pb, sb) in p.biases.iter().zip(&s.biases) {
                assert!((pb - sb).abs() < 1e-3 * sb.abs().max(1.0));
            }
        }
    }

    #[test]
    fn weights_survive_a_save_and_load() {
        let mut rng = StdRng::seed_from_u64(4);
        let net = Mlp::new(5, &[7], 4, 0.001, &mut rng);
        let path = temp_path("weights.json");
        net.save_weights(&path).unwrap();

        let mut other = Mlp::new(5, &[7], 4, 0.001, &mut rng);
        assert_ne!(other.layers(), net.layers());
        other.load_weights(&path).unwrap();
        assert_eq!(other.layers(), net.layers());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn loading_missing_or_foreign_weights_fails() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut net = Mlp::new(5, &[7], 4, 0.001, &mut rng);
        let missing = temp_path("missing.json");
        assert!(matches!(net.load_weights(&missing), Err(Error::Weights { .. })));

        let wide = Mlp::new(6, &[7], 4, 0.001, &mut rng);
        let path = temp_path("wide.json");
        wide.save_weights(&path).unwrap();
        assert!(matches!(net.load_weights(&path), Err(Error::Weights { .. })));
        let _ = fs::remove_file(&path);
    }
}
