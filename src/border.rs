use crate::utils::Point;

/// Playing field in cells; everything outside is a wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    pub width: u32,
    pub height: u32,
}

impl Border {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_inside(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }

    pub fn cells(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.height as i32).flat_map(move |y| (0..self.width as i32).map(move |x| Point::new(x, y)))
    }

    pub fn center(&self) -> Point {
        Point::new((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_inside_and_beyond_is_not() {
        let b = Border::new(4, 3);
        assert!(b.is_inside(Point::new(0, 0)));
        assert!(b.is_inside(Point::new(3, 2)));
        assert!(!b.is_inside(Point::new(4, 0)));
        assert!(!b.is_inside(Point::new(0, 3)));
        assert!(!b.is_inside(Point::new(-1, 1)));
        assert_eq!(b.cells().count(), 12);
    }
}
