use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::matrix::Matrix;

/// Metrics from one `fit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FitMetrics {
    pub loss: f32,
    /// Fraction of rows whose predicted best action matches the label's.
    pub accuracy: f32,
}

/// Black-box action-value function: `states[B, N] -> Q[B, actions]`.
///
/// Weights change only in `fit` and `load_weights`. The weight file format
/// belongs to the implementation.
pub trait QApproximator {
    fn predict(&self, states: &Matrix) -> Result<Matrix>;

    /// One epoch over `(states, targets)` as a single batch.
    fn fit(&mut self, states: &Matrix, targets: &Matrix) -> Result<FitMetrics>;

    fn save_weights(&self, path: &Path) -> Result<()>;

    fn load_weights(&mut self, path: &Path) -> Result<()>;
}
