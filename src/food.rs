use rand::Rng;
use rand::seq::IteratorRandom;

use crate::border::Border;
use crate::utils::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Food {
    pub position: Point,
}

impl Food {
    pub fn new(position: Point) -> Self {
        Self { position }
    }

    /// Moves the food to a uniformly chosen free cell.
    /// Returns false (and stays put) when the snake fills the board.
    pub fn respawn<R: Rng + ?Sized>(&mut self, rng: &mut R, snake_body: &[Point], border: &Border) -> bool {
        let free = border.cells().filter(|p| !snake_body.contains(p));
        match free.choose(rng) {
            Some(pos) => {
                self.position = pos;
                true
            }
            None => false,
        }
    }
}
