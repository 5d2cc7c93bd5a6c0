use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{Error, Result};

/// One environment step `(s, a, r, s')`, plus whether it ended the episode.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub terminal: bool,
}

/// Fixed-capacity ring of transitions. Once full, slot
/// `write_cursor % capacity` is overwritten, so the oldest push goes first.
pub struct ReplayBuffer {
    buffer: Vec<Transition>,
    capacity: usize,
    batch_size: usize,
    write_cursor: u64, // total pushes so far
}

impl ReplayBuffer {
    pub fn new(capacity: usize, batch_size: usize) -> Result<Self> {
        if capacity == 0 || batch_size == 0 {
            return Err(Error::InvalidConfig("replay capacity and batch size must be positive".into()));
        }
        Ok(Self {
            buffer: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            batch_size,
            write_cursor: 0,
        })
    }

    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            let slot = (self.write_cursor % self.capacity as u64) as usize;
            self.buffer[slot] = transition;
        }
        self.write_cursor += 1;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Storage order, which is ring order once the buffer has wrapped.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    /// `batch_size` distinct transitions drawn uniformly without replacement.
    /// With fewer stored transitions the whole buffer is returned.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Vec<&Transition> {
        if self.buffer.len() <= batch_size {
            return self.buffer.iter().collect();
        }
        self.buffer.choose_multiple(rng, batch_size).collect()
    }

    /// `sample` with the configured batch size.
    pub fn batch<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<&Transition> {
        self.sample(rng, self.batch_size)
    }
}
