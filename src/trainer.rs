//! Replay training: sample a batch, build Bellman targets, fit the approximator.

use rand::Rng;
use tracing::{error, warn};

use crate::approximator::{FitMetrics, QApproximator};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::replay_buffer::{ReplayBuffer, Transition};
use crate::utils::{argmax, has_non_finite};

/// Sampled transitions stacked column-wise. Always at least one row.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    pub states: Matrix,       // rows x state_len
    pub next_states: Matrix,  // rows x state_len
    pub actions: Vec<usize>,  // action taken in each state
    pub rewards: Vec<f32>,
    pub terminals: Vec<bool>, // next_state ended its episode
}

impl TrainingBatch {
    pub fn from_transitions(batch: &[&Transition]) -> Result<Self> {
        let states: Vec<&[f32]> = batch.iter().map(|t| t.state.as_slice()).collect();
        let next_states: Vec<&[f32]> = batch.iter().map(|t| t.next_state.as_slice()).collect();
        Ok(Self {
            states: Matrix::from_rows(&states)?,
            next_states: Matrix::from_rows(&next_states)?,
            actions: batch.iter().map(|t| t.action).collect(),
            rewards: batch.iter().map(|t| t.reward).collect(),
            terminals: batch.iter().map(|t| t.terminal).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// `r + gamma * max_a Q(s', a)` per row. Without `next_q` (the episode just
/// ended) every target is the bare reward; terminal rows never bootstrap.
pub fn bellman_targets(batch: &TrainingBatch, next_q: Option<&Matrix>, gamma: f32) -> Vec<f32> {
    let Some(next_q) = next_q else {
        return batch.rewards.clone();
    };
    let best_next = next_q.max_per_row();
    batch
        .rewards
        .iter()
        .zip(&batch.terminals)
        .zip(best_next)
        .map(|((&r, &terminal), q)| if terminal { r } else { r + gamma * q })
        .collect()
}

/// Overwrites `labels[i][actions[i]]` with `targets[i]`, leaving the other
/// actions at their predicted value. Rows with an out-of-range action are
/// left untouched; their count is returned.
pub fn write_targets(labels: &mut Matrix, actions: &[usize], targets: &[f32]) -> usize {
    let mut skipped = 0;
    for (i, (&a, &y)) in actions.iter().zip(targets).enumerate() {
        if a < labels.cols() {
            labels.set(i, a, y);
        } else {
            skipped += 1;
        }
    }
    skipped
}

/// Owns the replay memory and the approximator; the only code that calls
/// `predict` and `fit`.
pub struct Trainer<A> {
    model: A,             // Q(s, .) estimator
    memory: ReplayBuffer, // replay memory
    gamma: f32,           // discount factor
}

impl<A: QApproximator> Trainer<A> {
    pub fn new(model: A, memory: ReplayBuffer, gamma: f32) -> Self {
        Self { model, memory, gamma }
    }

    pub fn model(&self) -> &A { &self.model }
    pub fn model_mut(&mut self) -> &mut A { &mut self.model }
    pub fn memory(&self) -> &ReplayBuffer { &self.memory }

    /// Store transition in replay.
    pub fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    /// One training step on a freshly sampled batch. `stop` says the current
    /// episode just ended. Returns `None` when nothing was fitted.
    pub fn replay<R: Rng + ?Sized>(&mut self, rng: &mut R, stop: bool) -> Result<Option<FitMetrics>> {
        let batch = {
            let sampled = self.memory.batch(rng);
            if sampled.is_empty() {
                return Ok(None);
            }
            TrainingBatch::from_transitions(&sampled)?
        };
        self.train_on(&batch, stop)
    }

    pub fn train_on(&mut self, batch: &TrainingBatch, stop: bool) -> Result<Option<FitMetrics>> {
        let next_q = if stop { None } else { Some(self.model.predict(&batch.next_states)?) }; // Q(s', .)
        if next_q.as_ref().is_some_and(|q| has_non_finite(q.as_slice())) {
            error!("NaN/Inf in Q(s', .) during replay, skipping this batch");
            return Ok(None);
        }
        let targets = bellman_targets(batch, next_q.as_ref(), self.gamma);

        let mut labels = self.model.predict(&batch.states)?; // current Q(s, .) as the base label
        if has_non_finite(labels.as_slice()) {
            error!("NaN/Inf in Q(s, .) during replay, skipping this batch");
            return Ok(None);
        }
        let skipped = write_targets(&mut labels, &batch.actions, &targets);
        if skipped > 0 {
            warn!(skipped, rows = batch.len(), "transitions with out-of-range actions kept their predictions");
        }

        let metrics = self.model.fit(&batch.states, &labels)?; // one gradient step
        Ok(Some(metrics))
    }

    pub fn q_values(&self, state: &[f32]) -> Result<Vec<f32>> {
        let q = self.model.predict(&Matrix::from_rows(&[state])?)?;
        Ok(q.row(0).to_vec())
    }

    /// Greedy action; the first index wins ties.
    pub fn exploit(&self, state: &[f32]) -> Result<usize> {
        let q = self.q_values(state)?;
        if has_non_finite(&q) {
            error!(?q, "Q contains NaN/Inf in exploit");
        }
        Ok(argmax(&q))
    }
}
