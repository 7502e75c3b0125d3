// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! World/screen coordinate transform: center, scale limits, boundary, and mirroring.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use strata_index::Aabb2D;

/// Half-extent of the default boundary, in world units.
const WORLD_LIMIT: f64 = i32::MAX as f64;

/// Default lower scale limit.
pub const DEFAULT_MIN_SCALE: f64 = 0.001;
/// Default upper scale limit.
pub const DEFAULT_MAX_SCALE: f64 = 15000.0;
/// Default boundary for the view center.
pub const DEFAULT_BOUNDARY: Rect = Rect::new(-WORLD_LIMIT, -WORLD_LIMIT, WORLD_LIMIT, WORLD_LIMIT);

/// Maps world coordinates to screen pixels and back.
///
/// The screen origin is the top-left pixel; the world point at [`center`](Self::center)
/// lands in the middle of the screen. Scale is screen pixels per world unit, and a
/// mirrored axis is negated in both directions of the transform.
#[derive(Clone, Debug)]
pub struct Viewport {
    center: Point,
    scale: f64,
    min_scale: f64,
    max_scale: f64,
    boundary: Rect,
    mirror_x: bool,
    mirror_y: bool,
    screen_size: Size,
    world_to_screen: Affine,
    screen_to_world: Affine,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE, DEFAULT_BOUNDARY)
    }
}

impl Viewport {
    /// Create a viewport at the world origin with scale 1 and an empty screen.
    pub fn new(min_scale: f64, max_scale: f64, boundary: Rect) -> Self {
        let mut vp = Self {
            center: Point::ZERO,
            scale: 1.0,
            min_scale: DEFAULT_MIN_SCALE,
            max_scale: DEFAULT_MAX_SCALE,
            boundary: DEFAULT_BOUNDARY,
            mirror_x: false,
            mirror_y: false,
            screen_size: Size::ZERO,
            world_to_screen: Affine::IDENTITY,
            screen_to_world: Affine::IDENTITY,
        };
        vp.set_scale_limits(min_scale, max_scale);
        vp.set_boundary(boundary);
        vp.recompute();
        vp
    }

    fn recompute(&mut self) {
        let sx = if self.mirror_x { -self.scale } else { self.scale };
        let sy = if self.mirror_y { -self.scale } else { self.scale };
        self.world_to_screen = Affine::translate(self.screen_size.to_vec2() * 0.5)
            * Affine::scale_non_uniform(sx, sy)
            * Affine::translate(-self.center.to_vec2());
        self.screen_to_world = self.world_to_screen.inverse();
    }

    /// World point shown in the middle of the screen.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Move the view; the center is clamped into the boundary.
    pub fn set_center(&mut self, center: Point) {
        let b = self.boundary;
        self.center = Point::new(
            center.x.max(b.x0).min(b.x1),
            center.y.max(b.y0).min(b.y1),
        );
        self.recompute();
    }

    /// Screen pixels per world unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Zoom to `scale`, keeping the world point `anchor` at the same screen position.
    ///
    /// Without an anchor the view zooms around its center. The scale is clamped to
    /// the configured limits; non-positive or non-finite scales are ignored.
    pub fn set_scale(&mut self, scale: f64, anchor: Option<Point>) {
        debug_assert!(
            scale.is_finite() && scale > 0.0,
            "scale must be positive and finite, got {scale}"
        );
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        let anchor = anchor.unwrap_or(self.center);
        let on_screen = self.to_screen(anchor);
        self.scale = scale.max(self.min_scale).min(self.max_scale);
        self.recompute();
        let drift = self.to_world(on_screen) - anchor;
        self.set_center(self.center - drift);
    }

    /// Current `(min, max)` scale limits.
    pub fn scale_limits(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }

    /// Set the scale limits and re-clamp the current scale.
    ///
    /// `max` must exceed `min` and `min` must be positive; anything else is a
    /// caller bug that asserts in debug builds and is ignored otherwise.
    pub fn set_scale_limits(&mut self, min: f64, max: f64) {
        debug_assert!(
            min > 0.0 && max > min,
            "invalid scale limits: min {min}, max {max}"
        );
        if !(min > 0.0 && max > min) {
            return;
        }
        self.min_scale = min;
        self.max_scale = max;
        self.set_scale(self.scale, None);
    }

    /// Rectangle the view center is confined to.
    pub fn boundary(&self) -> Rect {
        self.boundary
    }

    /// Confine the view center to `boundary` and re-clamp the current center.
    pub fn set_boundary(&mut self, boundary: Rect) {
        debug_assert!(
            boundary.is_finite(),
            "boundary must be finite, got {boundary:?}"
        );
        if !boundary.is_finite() {
            return;
        }
        self.boundary = boundary.abs();
        self.set_center(self.center);
    }

    /// Integer variant of [`set_boundary`](Self::set_boundary).
    ///
    /// Converts exactly for coordinates up to 2^53 in magnitude.
    pub fn set_boundary_int(&mut self, boundary: Aabb2D<i64>) {
        self.set_boundary(crate::util::aabb_to_rect(boundary.to_f64()));
    }

    /// Mirror flags for the x and y axes.
    pub fn mirror(&self) -> (bool, bool) {
        (self.mirror_x, self.mirror_y)
    }

    /// Mirror the x and/or y axis.
    pub fn set_mirror(&mut self, mirror_x: bool, mirror_y: bool) {
        self.mirror_x = mirror_x;
        self.mirror_y = mirror_y;
        self.recompute();
    }

    /// Screen size in pixels.
    pub fn screen_size(&self) -> Size {
        self.screen_size
    }

    /// Set the screen size in pixels. Negative extents are treated as zero.
    pub fn set_screen_size(&mut self, size: Size) {
        self.screen_size = Size::new(size.width.max(0.0), size.height.max(0.0));
        self.recompute();
    }

    /// Center and zoom so that `rect` fills the screen.
    ///
    /// Returns `false` (and leaves the view untouched) when the screen has no area.
    pub fn set_viewport(&mut self, rect: Rect) -> bool {
        let screen = self.screen_size;
        if !(screen.width > 0.0 && screen.height > 0.0) {
            return false;
        }
        let rect = rect.abs();
        let fit = (screen.width / rect.width()).min(screen.height / rect.height());
        let fit = if fit.is_finite() { fit } else { self.max_scale };
        self.set_center(rect.center());
        self.set_scale(fit, None);
        true
    }

    /// World-space rectangle covered by the screen.
    pub fn viewport(&self) -> Rect {
        let far = Point::new(self.screen_size.width, self.screen_size.height);
        Rect::from_points(self.to_world(Point::ZERO), self.to_world(far))
    }

    /// Full world-to-screen transform.
    pub fn world_to_screen(&self) -> Affine {
        self.world_to_screen
    }

    /// Full screen-to-world transform.
    pub fn screen_to_world(&self) -> Affine {
        self.screen_to_world
    }

    /// World point to screen point.
    pub fn to_screen(&self, p: Point) -> Point {
        self.world_to_screen * p
    }

    /// Screen point to world point.
    pub fn to_world(&self, p: Point) -> Point {
        self.screen_to_world * p
    }

    /// World direction to screen direction (no translation, mirroring applied).
    pub fn to_screen_vec(&self, v: Vec2) -> Vec2 {
        let (sx, sy) = self.signed_scale();
        Vec2::new(v.x * sx, v.y * sy)
    }

    /// Screen direction to world direction (no translation, mirroring applied).
    pub fn to_world_vec(&self, v: Vec2) -> Vec2 {
        let (sx, sy) = self.signed_scale();
        Vec2::new(v.x / sx, v.y / sy)
    }

    /// World length to screen length.
    pub fn to_screen_size(&self, size: f64) -> f64 {
        size * self.scale
    }

    /// Screen length to world length.
    pub fn to_world_size(&self, size: f64) -> f64 {
        size / self.scale
    }

    fn signed_scale(&self) -> (f64, f64) {
        (
            if self.mirror_x { -self.scale } else { self.scale },
            if self.mirror_y { -self.scale } else { self.scale },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot2() < 1e-12
    }

    #[test]
    fn zoom_around_origin_scales_points() {
        let mut vp = Viewport::default();
        vp.set_scale(2.0, Some(Point::ZERO));
        assert_eq!(vp.scale(), 2.0);
        assert_eq!(vp.to_screen(Point::new(10.0, 0.0)), Point::new(20.0, 0.0));
        assert_eq!(vp.to_screen_size(10.0), 20.0);
    }

    #[test]
    fn round_trip_under_every_mirror_combination() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(12.5, -3.25),
            Point::new(-1.0e6, 4.0e5),
        ];
        for (mx, my) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut vp = Viewport::default();
            vp.set_screen_size(Size::new(800.0, 600.0));
            vp.set_center(Point::new(100.0, -50.0));
            vp.set_scale(3.5, None);
            vp.set_mirror(mx, my);
            for p in pts {
                let back = vp.to_world(vp.to_screen(p));
                assert!((back.x - p.x).abs() < 1e-6, "x drifted: {back:?} vs {p:?}");
                assert!((back.y - p.y).abs() < 1e-6, "y drifted: {back:?} vs {p:?}");
            }
        }
    }

    #[test]
    fn mirroring_negates_vectors_but_not_sizes() {
        let mut vp = Viewport::default();
        vp.set_scale(4.0, None);
        vp.set_mirror(true, false);
        assert_eq!(vp.to_screen_vec(Vec2::new(1.0, 1.0)), Vec2::new(-4.0, 4.0));
        assert_eq!(vp.to_world_vec(Vec2::new(-4.0, 4.0)), Vec2::new(1.0, 1.0));
        assert_eq!(vp.to_screen_size(1.0), 4.0);
        assert_eq!(vp.to_world_size(4.0), 1.0);
        let a = vp.to_screen(Point::new(1.0, 0.0));
        let b = vp.to_screen(Point::new(2.0, 0.0));
        assert!(b.x < a.x, "mirrored x must decrease on screen");
    }

    #[test]
    fn anchored_zoom_keeps_anchor_on_screen() {
        let mut vp = Viewport::default();
        vp.set_screen_size(Size::new(640.0, 480.0));
        vp.set_center(Point::new(10.0, 10.0));
        let anchor = Point::new(30.0, -20.0);
        let before = vp.to_screen(anchor);
        vp.set_scale(7.0, Some(anchor));
        assert!(close(vp.to_screen(anchor), before));
    }

    #[test]
    fn scale_is_clamped_to_limits() {
        let mut vp = Viewport::default();
        vp.set_scale_limits(0.5, 4.0);
        vp.set_scale(100.0, None);
        assert_eq!(vp.scale(), 4.0);
        vp.set_scale(0.01, None);
        assert_eq!(vp.scale(), 0.5);
        vp.set_scale(8.0, None);
        vp.set_scale_limits(0.5, 2.0);
        assert_eq!(vp.scale(), 2.0);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "invalid scale limits"))]
    fn inverted_scale_limits_are_rejected() {
        let mut vp = Viewport::default();
        vp.set_scale_limits(10.0, 1.0);
        assert_eq!(vp.scale_limits(), (DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE));
    }

    #[test]
    fn center_is_clamped_into_boundary() {
        let mut vp = Viewport::default();
        vp.set_boundary(Rect::new(0.0, 0.0, 100.0, 50.0));
        vp.set_center(Point::new(-10.0, 80.0));
        assert_eq!(vp.center(), Point::new(0.0, 50.0));
        vp.set_boundary_int(Aabb2D::new(10, 10, 20, 20));
        assert_eq!(vp.center(), Point::new(10.0, 20.0));
    }

    #[test]
    fn set_viewport_fits_rect() {
        let mut vp = Viewport::default();
        vp.set_screen_size(Size::new(200.0, 100.0));
        assert!(vp.set_viewport(Rect::new(0.0, 0.0, 50.0, 50.0)));
        assert_eq!(vp.scale(), 2.0);
        assert_eq!(vp.center(), Point::new(25.0, 25.0));
        assert_eq!(vp.viewport(), Rect::new(-25.0, 0.0, 75.0, 50.0));
    }

    #[test]
    fn set_viewport_without_screen_is_ignored() {
        let mut vp = Viewport::default();
        assert!(!vp.set_viewport(Rect::new(0.0, 0.0, 50.0, 50.0)));
        assert_eq!(vp.scale(), 1.0);
        assert_eq!(vp.viewport(), Rect::ZERO);
    }

    #[test]
    fn viewport_is_normalized_when_mirrored() {
        let mut vp = Viewport::default();
        vp.set_screen_size(Size::new(100.0, 100.0));
        vp.set_mirror(true, true);
        let r = vp.viewport();
        assert_eq!(r, Rect::new(-50.0, -50.0, 50.0, 50.0));
    }
}
