use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Progress saved next to the weights so training can resume where it stopped.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentState {
    pub episode: usize,
    pub steps: u64,
    pub epsilon: f64,
    pub best_score: u32,
}

pub fn save_agent_state(path: &Path, state: &AgentState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_agent_state(path: &Path) -> Result<AgentState> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
