use rand::rngs::StdRng;

use crate::border::Border;
use crate::config::GameConfig;
use crate::food::Food;
use crate::snake::{Direction, Snake};
use crate::utils::Point;

/// What a single move did to the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    pub died: bool,
    pub ate: bool,
}

pub struct Game {
    snake: Snake,
    food: Food,
    border: Border,
    score: u32,
    over: bool,
    rng: StdRng,
}

impl Game {
    /// Snake in the middle of the board heading down, food on a random free cell.
    pub fn new(config: &GameConfig, rng: StdRng) -> Self {
        let border = Border::new(config.width, config.height);
        let snake = Snake::new(border.center(), config.initial_length, Direction::Down);
        let mut game = Self::with_layout(border, snake, Food::new(Point::new(0, 0)), rng);
        game.food.respawn(&mut game.rng, game.snake.body(), &game.border);
        game
    }

    pub fn with_layout(border: Border, snake: Snake, food: Food, rng: StdRng) -> Self {
        Self { snake, food, border, score: 0, over: false, rng }
    }

    pub fn snake(&self) -> &Snake { &self.snake }
    pub fn food(&self) -> Point { self.food.position }
    pub fn border(&self) -> &Border { &self.border }
    pub fn score(&self) -> u32 { self.score }
    pub fn is_over(&self) -> bool { self.over }

    pub fn food_distance(&self) -> u32 {
        self.snake.head().manhattan(self.food.position)
    }

    /// Applies `action` (an absolute heading index), moves, then checks for
    /// walls, self-bites and food. Unknown actions keep the current heading.
    pub fn step(&mut self, action: usize) -> Outcome {
        if self.over {
            return Outcome { died: true, ate: false };
        }
        if let Some(dir) = Direction::from_action(action) {
            self.snake.set_direction(dir);
        }

        let ate = self.snake.next_head() == self.food.position;
        self.snake.move_forward(ate);

        let died = !self.border.is_inside(self.snake.head()) || self.snake.bites_itself();
        if died {
            self.over = true;
            return Outcome { died, ate };
        }
        if ate {
            self.score += 1;
            if !self.food.respawn(&mut self.rng, self.snake.body(), &self.border) {
                // board is full, nothing left to eat
                self.over = true;
            }
        }
        Outcome { died, ate }
    }
}
