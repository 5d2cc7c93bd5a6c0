use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::GameConfig;
use crate::game::Game;
use crate::game_input::GameInput;
use crate::reward::RewardConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub reward: f32,
    pub terminal: bool, // died, or the board is full
}

/// What the training loop needs from a game.
pub trait Environment {
    fn state(&self) -> Vec<f32>;
    fn step(&mut self, action: usize) -> StepResult;
    fn reset(&mut self);
    fn score(&self) -> u32;
}

/// Snake game with the reward function and feature encoder attached.
pub struct SnakeEnv {
    game: Game,
    config: GameConfig,
    rewards: RewardConfig,
    food_distance_feature: bool,
    rng: StdRng,
}

impl SnakeEnv {
    pub fn new(config: GameConfig, rewards: RewardConfig, food_distance_feature: bool, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let game = Game::new(&config, StdRng::seed_from_u64(rng.r#gen()));
        Self { game, config, rewards, food_distance_feature, rng }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn state_len(&self) -> usize {
        GameInput::state_len(self.food_distance_feature)
    }
}

impl Environment for SnakeEnv {
    fn state(&self) -> Vec<f32> {
        GameInput::from_game(&self.game, self.food_distance_feature)
    }

    fn step(&mut self, action: usize) -> StepResult {
        let outcome = self.game.step(action);
        let reward = self.rewards.reward(outcome, self.game.food_distance());
        StepResult { reward, terminal: self.game.is_over() }
    }

    fn reset(&mut self) {
        self.game = Game::new(&self.config, StdRng::seed_from_u64(self.rng.r#gen()));
    }

    fn score(&self) -> u32 {
        self.game.score()
    }
}
