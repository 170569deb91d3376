//! Values with two partial derivatives.
//!
//! [`Dual2`] carries `(v, dv/dx, dv/dy)` through arithmetic so that a
//! mapping's footprint can be read off its result. `warp` pushes each
//! destination pixel centre through the inverse matrix this way.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// A value and its derivatives along x and y.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual2 {
    /// Value.
    pub val: f32,
    /// Derivative along x.
    pub dx: f32,
    /// Derivative along y.
    pub dy: f32,
}

impl Dual2 {
    /// Creates a dual number.
    #[inline]
    pub const fn new(val: f32, dx: f32, dy: f32) -> Self {
        Self { val, dx, dy }
    }

    /// A constant (zero derivatives).
    #[inline]
    pub const fn constant(val: f32) -> Self {
        Self::new(val, 0.0, 0.0)
    }
}

impl Add for Dual2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

impl Add<f32> for Dual2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: f32) -> Self {
        Self::new(self.val + rhs, self.dx, self.dy)
    }
}

impl Sub for Dual2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.dx - rhs.dx, self.dy - rhs.dy)
    }
}

impl Neg for Dual2 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.val, -self.dx, -self.dy)
    }
}

impl Mul<f32> for Dual2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.val * rhs, self.dx * rhs, self.dy * rhs)
    }
}

impl Mul for Dual2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.val * rhs.val,
            self.val * rhs.dx + self.dx * rhs.val,
            self.val * rhs.dy + self.dy * rhs.val,
        )
    }
}

impl Div for Dual2 {
    type Output = Self;

    /// Quotient rule. The caller must check `rhs.val != 0`.
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = 1.0 / rhs.val;
        let val = self.val * inv;
        Self::new(val, inv * (self.dx - val * rhs.dx), inv * (self.dy - val * rhs.dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn product_rule() {
        let x = Dual2::new(3.0, 1.0, 0.0);
        let y = Dual2::new(2.0, 0.0, 1.0);
        let p = x * y;
        assert_eq!(p, Dual2::new(6.0, 2.0, 3.0));
        assert_eq!(x * 2.0 + 1.0, Dual2::new(7.0, 2.0, 0.0));
        assert_eq!(x - y, Dual2::new(1.0, 1.0, -1.0));
        assert_eq!(-y, Dual2::new(-2.0, 0.0, -1.0));
    }

    #[test]
    fn quotient_rule() {
        // d/dx (x / y) = 1/y, d/dy = -x/y^2
        let x = Dual2::new(3.0, 1.0, 0.0);
        let y = Dual2::new(2.0, 0.0, 1.0);
        let q = x / y;
        assert_abs_diff_eq!(q.val, 1.5);
        assert_abs_diff_eq!(q.dx, 0.5);
        assert_abs_diff_eq!(q.dy, -0.75);
        assert_eq!(x / Dual2::constant(1.0), x);
    }
}
