use serde::{Deserialize, Serialize};

use crate::game::Outcome;

/// Extra signal added to neutral steps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardShaping {
    None,
    /// `scale / max(distance, 1)` with distance the head-to-food Manhattan distance in cells.
    InverseDistance { scale: f32 },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct RewardConfig {
    pub died: f32,
    pub ate: f32,
    pub step: f32,
    pub shaping: RewardShaping,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self { died: -10.0, ate: 10.0, step: -1.0, shaping: RewardShaping::None }
    }
}

impl RewardConfig {
    /// Death outranks eating; everything else is a step.
    pub fn reward(&self, outcome: Outcome, food_distance: u32) -> f32 {
        if outcome.died {
            return self.died;
        }
        if outcome.ate {
            return self.ate;
        }
        match self.shaping {
            RewardShaping::None => self.step,
            RewardShaping::InverseDistance { scale } => {
                self.step + scale / food_distance.max(1) as f32
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        let scale = match self.shaping {
            RewardShaping::None => 0.0,
            RewardShaping::InverseDistance { scale } => scale,
        };
        [self.died, self.ate, self.step, scale].iter().all(|v| v.is_finite())
    }
}
