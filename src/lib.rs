pub mod approximator;
pub mod border;
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod environment;
pub mod error;
pub mod food;
pub mod game;
pub mod game_input;
pub mod log;
pub mod matrix;
pub mod network;
pub mod policy;
pub mod render;
pub mod replay_buffer;
pub mod reward;
pub mod session;
pub mod snake;
pub mod stats;
pub mod trainer;
pub mod utils;

pub use error::{Error, Result};
