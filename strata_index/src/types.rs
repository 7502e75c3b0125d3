// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Axis-aligned boxes, the scalar abstraction used by backends, and the
//! float/integer rounding policy.

use core::cmp::Ordering;
use core::fmt::Debug;

/// Axis-aligned bounding box in 2D.
///
/// Boxes are closed: a box whose `min` equals its `max` on an axis still
/// covers that coordinate, and two boxes sharing only an edge intersect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Aabb2D<T> {
    /// Minimum x (left)
    pub min_x: T,
    /// Minimum y (top)
    pub min_y: T,
    /// Maximum x (right)
    pub max_x: T,
    /// Maximum y (bottom)
    pub max_y: T,
}

impl<T> Aabb2D<T> {
    /// Create a new AABB from min/max corners.
    pub const fn new(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl<T: Copy + PartialOrd> Aabb2D<T> {
    /// A zero-area box at a point.
    pub const fn point(x: T, y: T) -> Self {
        Self::new(x, y, x, y)
    }

    /// Build a box from two arbitrary corners, swapping coordinates as needed.
    pub fn from_corners(ax: T, ay: T, bx: T, by: T) -> Self {
        Self::new(min_t(ax, bx), min_t(ay, by), max_t(ax, bx), max_t(ay, by))
    }

    /// Whether this AABB contains the point (edges included).
    pub fn contains_point(&self, x: T, y: T) -> bool {
        le(self.min_x, x) && le(self.min_y, y) && le(x, self.max_x) && le(y, self.max_y)
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &Self) -> bool {
        le(self.min_x, other.min_x)
            && le(self.min_y, other.min_y)
            && le(other.max_x, self.max_x)
            && le(other.max_y, self.max_y)
    }

    /// Whether the two boxes overlap or touch.
    ///
    /// Inverted boxes never intersect anything.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && le(self.min_x, other.max_x)
            && le(other.min_x, self.max_x)
            && le(self.min_y, other.max_y)
            && le(other.min_y, self.max_y)
    }

    /// The smallest box covering both inputs.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: min_t(self.min_x, other.min_x),
            min_y: min_t(self.min_y, other.min_y),
            max_x: max_t(self.max_x, other.max_x),
            max_y: max_t(self.max_y, other.max_y),
        }
    }

    /// Return true if the AABB is inverted (max below min on some axis).
    ///
    /// Zero-area boxes are not empty. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        lt(self.max_x, self.min_x) || lt(self.max_y, self.min_y)
    }
}

impl Aabb2D<f64> {
    /// Create an AABB from origin and size.
    pub const fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x + w,
            max_y: y + h,
        }
    }
}

impl Aabb2D<i64> {
    /// Round a float box outward to integer coordinates.
    ///
    /// Minimum edges are floored and maximum edges ceiled, so the result always
    /// covers the input. Coordinates beyond the `i64` range saturate and NaN
    /// maps to zero.
    pub fn from_f64_outward(a: Aabb2D<f64>) -> Self {
        Self {
            min_x: floor_i64(a.min_x),
            min_y: floor_i64(a.min_y),
            max_x: ceil_i64(a.max_x),
            max_y: ceil_i64(a.max_y),
        }
    }

    /// Convert to float coordinates.
    ///
    /// Exact for magnitudes up to 2^53; larger values round to the nearest
    /// representable `f64`.
    #[allow(
        clippy::cast_precision_loss,
        reason = "Documented: integer coordinates beyond 2^53 round to nearest."
    )]
    pub const fn to_f64(self) -> Aabb2D<f64> {
        Aabb2D {
            min_x: self.min_x as f64,
            min_y: self.min_y as f64,
            max_x: self.max_x as f64,
            max_y: self.max_y as f64,
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "Float to int `as` saturates and maps NaN to 0, which is the rounding policy."
)]
fn floor_i64(v: f64) -> i64 {
    let t = v as i64;
    if (t as f64) > v {
        t.saturating_sub(1)
    } else {
        t
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "Float to int `as` saturates and maps NaN to 0, which is the rounding policy."
)]
fn ceil_i64(v: f64) -> i64 {
    let t = v as i64;
    if (t as f64) < v {
        t.saturating_add(1)
    } else {
        t
    }
}

/// Numeric scalar abstraction for the tree backends.
///
/// Split heuristics need areas and centroids; areas accumulate in a widened
/// type (`f64` for `f64`, `i128` for `i64`) so large coordinates compare
/// reliably.
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Widened accumulator type suitable for area/cost computations.
    type Acc: Copy
        + PartialOrd
        + core::ops::Add<Output = Self::Acc>
        + core::ops::Sub<Output = Self::Acc>
        + core::ops::Mul<Output = Self::Acc>
        + Debug;

    /// Non-negative extent `hi - lo` (zero when inverted).
    fn extent(lo: Self, hi: Self) -> Self::Acc;

    /// Midpoint between a and b (used for centroid ordering).
    fn mid(a: Self, b: Self) -> Self;

    /// Convert a `usize` to the accumulator type (for split weighting).
    fn acc_from_usize(n: usize) -> Self::Acc;
}

impl Scalar for f64 {
    type Acc = Self;

    #[inline]
    fn extent(lo: Self, hi: Self) -> Self::Acc {
        (hi - lo).max(0.0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline]
    #[allow(clippy::cast_precision_loss, reason = "Node fan-out is tiny.")]
    fn acc_from_usize(n: usize) -> Self::Acc {
        n as Self
    }
}

impl Scalar for i64 {
    type Acc = i128;

    #[inline]
    fn extent(lo: Self, hi: Self) -> Self::Acc {
        (i128::from(hi) - i128::from(lo)).max(0)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        // Average without overflow.
        (a & b) + ((a ^ b) >> 1)
    }

    #[inline]
    fn acc_from_usize(n: usize) -> Self::Acc {
        n as i128
    }
}

/// Area of an AABB in the scalar's widened accumulator type.
#[inline]
pub fn area<T: Scalar>(a: &Aabb2D<T>) -> T::Acc {
    T::extent(a.min_x, a.max_x) * T::extent(a.min_y, a.max_y)
}

/// Half perimeter of an AABB; keeps zero-area boxes distinguishable in split costs.
#[inline]
pub fn margin<T: Scalar>(a: &Aabb2D<T>) -> T::Acc {
    T::extent(a.min_x, a.max_x) + T::extent(a.min_y, a.max_y)
}

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

pub(crate) fn le<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o != Ordering::Greater)
        .unwrap_or(false)
}

pub(crate) fn lt<T: PartialOrd>(a: T, b: T) -> bool {
    a.partial_cmp(&b)
        .map(|o| o == Ordering::Less)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb2D::new(0.0, 0.0, 10.0, 10.0);
        let b = Aabb2D::new(10.0, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&Aabb2D::new(10.5, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn degenerate_box_is_found_by_touching_query() {
        let p = Aabb2D::point(5_i64, 5);
        assert!(!p.is_empty());
        assert!(p.intersects(&Aabb2D::new(0, 0, 5, 5)));
        assert!(!p.intersects(&Aabb2D::new(0, 0, 4, 4)));
    }

    #[test]
    fn inverted_boxes_never_intersect() {
        let inv = Aabb2D::new(10.0, 10.0, 0.0, 0.0);
        assert!(inv.is_empty());
        assert!(!inv.intersects(&Aabb2D::new(-100.0, -100.0, 100.0, 100.0)));
    }

    #[test]
    fn from_corners_normalizes() {
        let a = Aabb2D::from_corners(10.0, -2.0, -3.0, 7.0);
        assert_eq!(a, Aabb2D::new(-3.0, -2.0, 10.0, 7.0));
    }

    #[test]
    fn outward_rounding_covers_input() {
        let f = Aabb2D::new(-1.5, 0.2, 2.0, 3.0001);
        let i = Aabb2D::<i64>::from_f64_outward(f);
        assert_eq!(i, Aabb2D::new(-2, 0, 2, 4));
        assert!(i.to_f64().contains(&f));
    }

    #[test]
    fn outward_rounding_saturates_and_zeroes_nan() {
        let f = Aabb2D::new(-1.0e30, f64::NAN, 1.0e30, 0.0);
        let i = Aabb2D::<i64>::from_f64_outward(f);
        assert_eq!(i.min_x, i64::MIN);
        assert_eq!(i.max_x, i64::MAX);
        assert_eq!(i.min_y, 0);
    }

    #[test]
    fn integer_to_float_is_exact_below_2_pow_53() {
        let i = Aabb2D::new(-(1_i64 << 52), 3, 1_i64 << 52, 9);
        let f = i.to_f64();
        assert_eq!(Aabb2D::<i64>::from_f64_outward(f), i);
    }

    #[test]
    fn i64_area_does_not_overflow() {
        let a = Aabb2D::new(i64::MIN, 0, i64::MAX, 2);
        let expected = (i128::from(i64::MAX) - i128::from(i64::MIN)) * 2;
        assert_eq!(area(&a), expected);
    }
}
