//! A 2D point tagged with its coordinate space.

use std::marker::PhantomData;

/// A point tagged with a space marker such as [`Pixel`](super::Pixel), so
/// points from different frames cannot be mixed by accident.
#[derive(Clone, Copy, PartialEq)]
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> Coord<TSpace> {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    /// Returns true if both components are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Shifts the point by `(-dx, -dy)`.
    #[inline]
    pub fn shifted_back(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x - dx, self.y - dy)
    }
}

impl<TSpace> std::fmt::Debug for Coord<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl<TSpace> Default for Coord<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Pixel;

    #[test]
    fn shifted_back_subtracts_offset() {
        let point: Coord<Pixel> = Coord::new(250.0, 310.0);
        let local = point.shifted_back(200.0, 300.0);
        assert_eq!(local.x, 50.0);
        assert_eq!(local.y, 10.0);
    }

    #[test]
    fn non_finite_points_are_detected() {
        assert!(Coord::<Pixel>::new(1.0, 2.0).is_finite());
        assert!(!Coord::<Pixel>::new(f64::NAN, 2.0).is_finite());
        assert!(!Coord::<Pixel>::new(1.0, f64::NEG_INFINITY).is_finite());
    }
}
