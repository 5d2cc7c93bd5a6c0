use crate::utils::Point;

pub const ACTIONS: usize = 4;

/// Absolute heading. The discriminant is the action index the agent emits.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Direction {
    Down = 0,
    Right = 1,
    Up = 2,
    Left = 3,
}

/// A side seen from the snake's point of view.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Relative {
    Right,
    Left,
    Forward,
}

impl Direction {
    pub const ALL: [Direction; ACTIONS] = [Direction::Down, Direction::Right, Direction::Up, Direction::Left];

    pub fn from_action(action: usize) -> Option<Direction> {
        Self::ALL.get(action).copied()
    }

    pub fn action(self) -> usize {
        self as usize
    }

    // 180° turn
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Step offset `(dx, dy)` for one move in this direction.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Offset of the neighbouring cell on `side`, obtained by rotating the
    /// forward offset by ±90° (screen coordinates, y down).
    pub fn relative_delta(&self, side: Relative) -> (i32, i32) {
        let (dx, dy) = self.delta();
        match side {
            Relative::Forward => (dx, dy),
            Relative::Right => (-dy, dx),
            Relative::Left => (dy, -dx),
        }
    }
}

pub struct Snake {
    body: Vec<Point>, // body[0] is the head
    direction: Direction,
}

impl Snake {
    pub fn new(head_position: Point, init_length: usize, direction: Direction) -> Snake {
        let (dx, dy) = direction.opposite().delta();
        let body = (0..init_length.max(1) as i32)
            .map(|i| Point { x: head_position.x + dx * i, y: head_position.y + dy * i })
            .collect();
        Snake { body, direction }
    }

    /// Snake with an explicit body, head first. `None` for an empty body.
    pub fn from_body(body: Vec<Point>, direction: Direction) -> Option<Snake> {
        if body.is_empty() {
            return None;
        }
        Some(Snake { body, direction })
    }

    pub fn head(&self) -> Point {
        self.body[0]
    }

    pub fn body(&self) -> &[Point] {
        &self.body
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Turns unless the new heading would reverse into the neck.
    /// Returns whether the heading was accepted.
    pub fn set_direction(&mut self, dir: Direction) -> bool {
        if dir == self.direction.opposite() {
            return false;
        }
        self.direction = dir;
        true
    }

    /// Cell the head will occupy after the next move.
    pub fn next_head(&self) -> Point {
        self.head().offset(self.direction.delta())
    }

    /// Moves one cell forward; with `grow` the tail stays put.
    pub fn move_forward(&mut self, grow: bool) {
        let new_head = self.next_head();
        self.body.insert(0, new_head);
        if !grow {
            self.body.pop();
        }
    }

    /// True if `p` is any segment except the head.
    pub fn body_contains(&self, p: Point) -> bool {
        self.body[1..].contains(&p)
    }

    pub fn bites_itself(&self) -> bool {
        self.body_contains(self.head())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_matches_screen_orientation() {
        // heading down, the snake's right is the screen's left
        assert_eq!(Direction::Down.relative_delta(Relative::Right), (-1, 0));
        assert_eq!(Direction::Down.relative_delta(Relative::Left), (1, 0));
        assert_eq!(Direction::Up.relative_delta(Relative::Right), (1, 0));
        assert_eq!(Direction::Right.relative_delta(Relative::Right), (0, 1));
        assert_eq!(Direction::Left.relative_delta(Relative::Right), (0, -1));
        assert_eq!(Direction::Left.relative_delta(Relative::Forward), (-1, 0));
    }

    #[test]
    fn action_indices_round_trip() {
        for (i, d) in Direction::ALL.iter().enumerate() {
            assert_eq!(d.action(), i);
            assert_eq!(Direction::from_action(i), Some(*d));
        }
        assert_eq!(Direction::from_action(4), None);
    }

    #[test]
    fn reverse_turn_is_ignored() {
        let mut s = Snake::new(Point::new(5, 5), 3, Direction::Down);
        assert!(!s.set_direction(Direction::Up));
        assert_eq!(s.direction(), Direction::Down);
        assert!(s.set_direction(Direction::Left));
    }

    #[test]
    fn headless_body_is_rejected() {
        assert!(Snake::from_body(Vec::new(), Direction::Up).is_none());
        let s = Snake::from_body(vec![Point::new(2, 3)], Direction::Up).unwrap();
        assert_eq!(s.head(), Point::new(2, 3));
        assert!(!s.bites_itself());
    }

    #[test]
    fn body_trails_behind_head() {
        let s = Snake::new(Point::new(5, 5), 3, Direction::Down);
        assert_eq!(s.body(), &[Point::new(5, 5), Point::new(5, 4), Point::new(5, 3)]);
    }

    #[test]
    fn move_and_grow() {
        let mut s = Snake::new(Point::new(5, 5), 3, Direction::Right);
        s.move_forward(false);
        assert_eq!(s.head(), Point::new(6, 5));
        assert_eq!(s.body().len(), 3);
        s.move_forward(true);
        assert_eq!(s.body().len(), 4);
        assert!(!s.bites_itself());
    }
}
