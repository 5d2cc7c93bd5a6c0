//! Run configuration, loaded from JSON. Every field has a default so a config
//! file only needs to name what it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::policy::EpsilonSchedule;
use crate::reward::RewardConfig;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    pub width: u32,            // board width in cells
    pub height: u32,           // board height in cells
    pub initial_length: usize, // segments at spawn
    pub tick_millis: u64,      // frame throttle, 0 = run flat out
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { width: 30, height: 30, initial_length: 5, tick_millis: 0 }
    }
}

/// Hyperparameters for the agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub capacity: usize,             // replay buffer capacity
    pub batch_size: usize,           // minibatch size
    pub gamma: f32,                  // discount factor
    pub learning_rate: f32,          // Adam step size
    pub hidden: Vec<usize>,          // hidden layer widths
    pub eps_start: f64,
    pub eps_end: f64,
    pub eps_decay: f64,
    pub food_distance_feature: bool, // append the normalized food distance to the state
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            batch_size: 5_000,
            gamma: 0.9,
            learning_rate: 0.001,
            hidden: vec![150, 150, 150],
            eps_start: 1.0,
            eps_end: 0.03,
            eps_decay: 0.001,
            food_distance_feature: false,
            seed: 42,
        }
    }
}

impl AgentConfig {
    pub fn schedule(&self) -> EpsilonSchedule {
        EpsilonSchedule { start: self.eps_start, end: self.eps_end, decay: self.eps_decay }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainConfig {
    pub episodes: usize,
    pub max_steps: usize, // cap on ticks per episode
    pub weights_path: PathBuf,
    pub state_path: PathBuf,
    pub db_path: PathBuf,
    pub log_path: PathBuf,
    pub stat_limit: usize, // rolling window for loss/accuracy
    pub save_every: usize, // episodes between checkpoints
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            max_steps: 5_000,
            weights_path: PathBuf::from("weights.json"),
            state_path: PathBuf::from("agent_state.json"),
            db_path: PathBuf::from("episodes.db"),
            log_path: PathBuf::from("train.log"),
            stat_limit: 100,
            save_every: 10,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    pub agent: AgentConfig,
    pub reward: RewardConfig,
    pub train: TrainConfig,
}

impl Config {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let config = match path {
            Some(p) => {
                let content = fs::read_to_string(p)?;
                serde_json::from_str(&content)?
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));
        let a = &self.agent;
        if a.capacity == 0 {
            return fail("agent.capacity must be positive");
        }
        if a.batch_size == 0 {
            return fail("agent.batch_size must be positive");
        }
        if !(a.gamma > 0.0 && a.gamma < 1.0) {
            return fail("agent.gamma must lie in (0, 1)");
        }
        if !(a.learning_rate > 0.0) {
            return fail("agent.learning_rate must be positive");
        }
        if a.hidden.iter().any(|&h| h == 0) {
            return fail("agent.hidden layers must be non-empty");
        }
        if !(a.eps_start <= 1.0 && a.eps_end >= 0.0 && a.eps_end < a.eps_start) {
            return fail("agent epsilon must satisfy 0 <= eps_end < eps_start <= 1");
        }
        if !(a.eps_decay > 0.0) {
            return fail("agent.eps_decay must be positive");
        }
        if self.game.width < 5 || self.game.height < 5 {
            return fail("game board must be at least 5x5");
        }
        if self.game.initial_length == 0 || self.game.initial_length as u32 > self.game.height / 2 {
            return fail("game.initial_length must fit in the upper half of the board");
        }
        if !self.reward.is_finite() {
            return fail("reward constants must be finite");
        }
        if self.train.save_every == 0 {
            return fail("train.save_every must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "agent": { "batch_size": 32 } }"#).unwrap();
        assert_eq!(cfg.agent.batch_size, 32);
        assert_eq!(cfg.agent.capacity, 1_000_000);
        assert_eq!(cfg.game, GameConfig::default());
    }

    #[test]
    fn rejects_bad_gamma_and_capacity() {
        let mut cfg = Config::default();
        cfg.agent.gamma = 1.0;
        assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

        let mut cfg = Config::default();
        cfg.agent.capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.agent.eps_end = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("snake_dqn_no_such_config.json");
        assert!(matches!(Config::load(Some(&path)), Err(Error::Io(_))));
    }
}
