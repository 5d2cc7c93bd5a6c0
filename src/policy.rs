use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::snake::ACTIONS;

/// `epsilon(step) = end + (start - end) * exp(-decay * step)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    pub start: f64, // epsilon at step 0
    pub end: f64,   // floor approached as steps grow
    pub decay: f64, // exponential rate per step
}

impl EpsilonSchedule {
    pub fn epsilon(&self, step: u64) -> f64 {
        self.end + (self.start - self.end) * (-self.decay * step as f64).exp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Explore,
    Exploit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: usize,  // absolute heading index
    pub choice: Choice, // random or greedy
    pub epsilon: f64,   // exploration rate in force
}

/// Epsilon-greedy over the discrete action set.
#[derive(Debug, Clone, Copy)]
pub struct EpsilonGreedy {
    schedule: EpsilonSchedule,
    actions: usize, // size of the discrete action set
}

impl EpsilonGreedy {
    pub fn new(schedule: EpsilonSchedule) -> Self {
        Self { schedule, actions: ACTIONS }
    }

    pub fn schedule(&self) -> &EpsilonSchedule {
        &self.schedule
    }

    /// Draws `u` in [0, 1); below `epsilon` a uniform random action is taken,
    /// otherwise `greedy` is asked for the best one.
    pub fn decide<R, F>(&self, rng: &mut R, epsilon: f64, greedy: F) -> Result<Decision>
    where
        R: Rng + ?Sized,
        F: FnOnce() -> Result<usize>,
    {
        let u: f64 = rng.r#gen();
        if u < epsilon {
            let action = rng.gen_range(0..self.actions);
            return Ok(Decision { action, choice: Choice::Explore, epsilon });
        }
        let action = greedy()?;
        Ok(Decision { action, choice: Choice::Exploit, epsilon })
    }
}
