/// A point in normalized image space, `(0, 0)` top-left and `(1, 1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Unsigned angle ABC in degrees with `b` as the vertex, always in `[0, 180]`.
///
/// The winding of the three points does not matter: `angle(a, b, c)` equals
/// `angle(c, b, a)`. Coincident points are the caller's problem; they produce a
/// finite but meaningless value. Non-finite input yields `0`.
pub fn angle(a: Point, b: Point, c: Point) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let mut degrees = radians.to_degrees().abs();

    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }

    if degrees.is_finite() {
        degrees.clamp(0.0, 180.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn straight_line_is_180() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.5, 0.5);
        let c = Point::new(1.0, 1.0);
        assert!((angle(a, b, c) - 180.0).abs() < EPS);
    }

    #[test]
    fn right_turn_is_90() {
        let a = Point::new(0.5, 0.0);
        let b = Point::new(0.5, 0.5);
        let c = Point::new(1.0, 0.5);
        assert!((angle(a, b, c) - 90.0).abs() < EPS);
        assert!((angle(c, b, a) - 90.0).abs() < EPS);
    }

    #[test]
    fn reflex_difference_is_folded() {
        // atan2 difference here is 270 degrees before folding.
        let a = Point::new(-1.0, 0.0);
        let b = Point::new(0.0, 0.0);
        let c = Point::new(0.0, -1.0);
        assert!((angle(a, b, c) - 90.0).abs() < EPS);
    }

    #[test]
    fn nan_input_clamps_to_zero() {
        let a = Point::new(f64::NAN, 0.0);
        let b = Point::new(0.0, 0.0);
        let c = Point::new(1.0, 0.0);
        assert_eq!(angle(a, b, c), 0.0);
    }

    #[test]
    fn coincident_points_stay_finite() {
        let b = Point::new(0.3, 0.3);
        let value = angle(b, b, Point::new(0.9, 0.1));
        assert!(value.is_finite());
        assert!((0.0..=180.0).contains(&value));
    }

    fn point() -> impl Strategy<Value = Point> {
        (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        #[test]
        fn angle_is_within_half_turn(a in point(), b in point(), c in point()) {
            let value = angle(a, b, c);
            prop_assert!((0.0..=180.0).contains(&value));
        }

        #[test]
        fn angle_is_symmetric(a in point(), b in point(), c in point()) {
            prop_assert!((angle(a, b, c) - angle(c, b, a)).abs() < 1e-9);
        }
    }
}
