// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversions between Kurbo rectangles and index boxes.

use kurbo::Rect;
use strata_index::Aabb2D;

/// Normalized Kurbo rect to a closed index box.
pub(crate) fn rect_to_aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::from_corners(r.x0, r.y0, r.x1, r.y1)
}

pub(crate) fn aabb_to_rect(a: Aabb2D<f64>) -> Rect {
    Rect::new(a.min_x, a.min_y, a.max_x, a.max_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_rects_are_normalized() {
        let a = rect_to_aabb(Rect::new(10.0, 5.0, 0.0, -5.0));
        assert_eq!(a, Aabb2D::new(0.0, -5.0, 10.0, 5.0));
        assert_eq!(aabb_to_rect(a), Rect::new(0.0, -5.0, 10.0, 5.0));
    }
}
