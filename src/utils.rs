/// Cell coordinate on the board. `y` grows downward.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, (dx, dy): (i32, i32)) -> Point {
        Point { x: self.x + dx, y: self.y + dy }
    }

    pub fn manhattan(self, other: Point) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

/// Index of the largest element; the first one wins ties. Empty slices give 0.
pub fn argmax(v: &[f32]) -> usize {
    let mut best_i = 0;
    for i in 1..v.len() {
        if v[i] > v[best_i] {
            best_i = i;
        }
    }
    best_i
}

pub fn has_non_finite(xs: &[f32]) -> bool {
    xs.iter().any(|&v| !v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.5, 2.0, 2.0, 1.0]), 1);
        assert_eq!(argmax(&[3.0, 3.0]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn manhattan_is_symmetric() {
        let a = Point::new(2, 7);
        let b = Point::new(5, 3);
        assert_eq!(a.manhattan(b), 7);
        assert_eq!(b.manhattan(a), 7);
    }

    #[test]
    fn detects_nan_and_inf() {
        assert!(has_non_finite(&[1.0, f32::NAN]));
        assert!(has_non_finite(&[f32::NEG_INFINITY]));
        assert!(!has_non_finite(&[1.0, 2.0]));
    }
}
