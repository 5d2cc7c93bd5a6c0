use crate::border::Border;
use crate::game::Game;
use crate::snake::{Direction, Relative, Snake};
use crate::utils::Point;

/// Length of the base feature vector.
pub const BASE_STATE_LEN: usize = 11;

/// Relative sides probed for obstacles, in feature order.
const PROBES: [Relative; 3] = [Relative::Right, Relative::Left, Relative::Forward];

/// Feature encoder for the agent.
///
/// Layout of the base vector:
/// `[obstacle_right, obstacle_left, obstacle_forward,
///   food_right, food_left, food_up, food_down,
///   dir_down, dir_up, dir_right, dir_left]`.
/// Obstacles are seen from the snake's heading, food flags are absolute.
/// The optional twelfth entry is the head-to-food Manhattan distance
/// normalized by `width + height`.
pub struct GameInput;

impl GameInput {
    pub fn state_len(with_food_distance: bool) -> usize {
        BASE_STATE_LEN + usize::from(with_food_distance)
    }

    pub fn from_game(game: &Game, with_food_distance: bool) -> Vec<f32> {
        let mut input = Self::encode(game.snake(), game.food(), game.border()).to_vec();
        if with_food_distance {
            let border = game.border();
            input.push(game.food_distance() as f32 / (border.width + border.height) as f32);
        }
        input
    }

    pub fn encode(snake: &Snake, food: Point, border: &Border) -> [f32; BASE_STATE_LEN] {
        let mut input = [0.0f32; BASE_STATE_LEN];
        let head = snake.head();
        let heading = snake.direction();

        for (i, side) in PROBES.iter().enumerate() {
            let cell = head.offset(heading.relative_delta(*side));
            input[i] = flag(!border.is_inside(cell) || snake.body_contains(cell));
        }

        input[3] = flag(head.x < food.x);
        input[4] = flag(head.x > food.x);
        input[5] = flag(head.y > food.y);
        input[6] = flag(head.y < food.y);

        let dir_slot = match heading {
            Direction::Down => 7,
            Direction::Up => 8,
            Direction::Right => 9,
            Direction::Left => 10,
        };
        input[dir_slot] = 1.0;

        input
    }
}

fn flag(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snake(body: &[(i32, i32)], dir: Direction) -> Snake {
        Snake::from_body(body.iter().map(|&(x, y)| Point::new(x, y)).collect(), dir).unwrap()
    }

    #[test]
    fn open_board_food_to_the_right_heading_down() {
        let s = snake(&[(5, 5), (5, 4), (5, 3)], Direction::Down);
        let v = GameInput::encode(&s, Point::new(8, 5), &Border::new(10, 10));
        assert_eq!(v, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn walls_are_seen_relative_to_heading() {
        let border = Border::new(10, 10);
        // top-left corner heading up: forward and left (screen left) are walls
        let s = snake(&[(0, 0), (0, 1)], Direction::Up);
        let v = GameInput::encode(&s, Point::new(5, 5), &border);
        assert_eq!(&v[0..3], &[0.0, 1.0, 1.0]);
        assert_eq!(v[8], 1.0);

        // same corner heading left: forward is the wall, right (screen up) is a wall too
        let s = snake(&[(0, 0), (1, 0)], Direction::Left);
        let v = GameInput::encode(&s, Point::new(5, 5), &border);
        assert_eq!(&v[0..3], &[1.0, 0.0, 1.0]);
        assert_eq!(v[10], 1.0);
    }

    #[test]
    fn own_body_counts_as_obstacle() {
        // heading right, body curls below the head: the snake's right is screen down
        let s = snake(&[(4, 4), (3, 4), (3, 5), (4, 5), (5, 5)], Direction::Right);
        let v = GameInput::encode(&s, Point::new(4, 1), &Border::new(10, 10));
        assert_eq!(&v[0..3], &[1.0, 0.0, 0.0]);
        // food straight up
        assert_eq!(&v[3..7], &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(v[9], 1.0);
    }

    #[test]
    fn optional_distance_feature() {
        use crate::config::GameConfig;
        use rand::SeedableRng;
        let game = Game::new(&GameConfig::default(), rand::rngs::StdRng::seed_from_u64(5));
        let v = GameInput::from_game(&game, true);
        assert_eq!(v.len(), GameInput::state_len(true));
        let expected = game.food_distance() as f32 / 60.0;
        assert!((v[11] - expected).abs() < 1e-6);
        assert_eq!(GameInput::from_game(&game, false).len(), BASE_STATE_LEN);
    }
}
