use serde::{Deserialize, Serialize};
use shared::{DIMENSION_X, DIMENSION_Y};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    pub x: f64,
    ///Value along the y-axis.
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vector2 { x, y }
    }

    ///Returns the unit vector pointing along `angle` radians.
    pub fn from_angle(angle: f64) -> Vector2 {
        Vector2 {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f64) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the vector scaled down uniformly so its magnitude is at most `max`.
    pub fn clamp_magnitude(&self, max: f64) -> Vector2 {
        let mag = self.magnitude();
        if mag > max {
            self.scale(max / mag)
        } else {
            *self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Brings `value` back into `[0, dimension)` by adding or subtracting the
/// dimension at most once. Values more than one dimension out of range stay
/// out of range.
pub fn wrap_axis(value: f64, dimension: f64) -> f64 {
    let wrapped = if value < 0.0 {
        value + dimension
    } else if value >= dimension {
        value - dimension
    } else {
        value
    };
    // -1e-13 + 5000.0 rounds to exactly 5000.0
    if wrapped == dimension {
        0.0
    } else {
        wrapped
    }
}

/// Moves `position` by `velocity * dt` and wraps it around the map edges.
pub fn advance(position: &mut Vector2, velocity: &Vector2, dt: f64) {
    let moved = position.add(&velocity.scale(dt));
    position.x = wrap_axis(moved.x, DIMENSION_X);
    position.y = wrap_axis(moved.y, DIMENSION_Y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vector_math() {
        let v = Vector2::new(3.0, 4.0);
        assert_eq!(v.magnitude(), 5.0);
        assert_eq!(v.scale(2.0), Vector2::new(6.0, 8.0));
        assert_eq!(v.add(&Vector2::new(1.0, -1.0)), Vector2::new(4.0, 3.0));

        let unit = Vector2::from_angle(std::f64::consts::FRAC_PI_2);
        assert_approx_eq!(unit.x, 0.0, 1e-12);
        assert_approx_eq!(unit.y, 1.0, 1e-12);
    }

    #[test]
    fn test_clamp_magnitude_keeps_direction() {
        let clamped = Vector2::new(30.0, 40.0).clamp_magnitude(10.0);
        assert_approx_eq!(clamped.magnitude(), 10.0, 1e-9);
        assert_approx_eq!(clamped.x / clamped.y, 0.75, 1e-9);

        let small = Vector2::new(1.0, 1.0);
        assert_eq!(small.clamp_magnitude(10.0), small);
    }

    #[test]
    fn test_wrap_axis() {
        assert_eq!(wrap_axis(10.0, 100.0), 10.0);
        assert_eq!(wrap_axis(-10.0, 100.0), 90.0);
        assert_eq!(wrap_axis(110.0, 100.0), 10.0);
        assert_eq!(wrap_axis(100.0, 100.0), 0.0);
        assert_eq!(wrap_axis(0.0, 100.0), 0.0);
        assert_eq!(wrap_axis(-1e-13, 5000.0), 0.0);
    }

    #[test]
    fn test_wrap_is_single_pass() {
        // Displacements beyond one full dimension are not folded further.
        assert_eq!(wrap_axis(250.0, 100.0), 150.0);
    }

    #[test]
    fn test_advance_wraps_both_axes() {
        let mut position = Vector2::new(DIMENSION_X - 1.0, 1.0);
        advance(&mut position, &Vector2::new(2.0, -2.0), 1.0);
        assert_approx_eq!(position.x, 1.0, 1e-9);
        assert_approx_eq!(position.y, DIMENSION_Y - 1.0, 1e-9);
    }
}
