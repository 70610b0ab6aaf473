//! Geometric primitives.
//!
//! Rectangles are closed intervals on the integer pixel grid: `(0, 0, 9, 9)`
//! covers 10x10 pixels and a rectangle with `x1 == x2` is one pixel wide.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use crate::trig;
use crate::ZOOM_NONE;

/// Pixel coordinate. Valid drawing coordinates lie in `COORD_MIN..=COORD_MAX`.
pub type Coord = i32;

pub const COORD_MAX: Coord = 16383;
pub const COORD_MIN: Coord = -16384;

/// A 2D point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Rotate by `angle` (tenths of a degree) and scale by `zoom` (256 = 1.0)
    /// around `pivot`.
    pub fn transform(&self, angle: i32, zoom: u32, pivot: Point) -> Point {
        if angle == 0 && zoom == ZOOM_NONE {
            return *self;
        }

        let x = i64::from(self.x - pivot.x);
        let y = i64::from(self.y - pivot.y);
        let zoom = i64::from(zoom);

        if angle == 0 {
            return Point::new(
                ((x * zoom) >> 8) as Coord + pivot.x,
                ((y * zoom) >> 8) as Coord + pivot.y,
            );
        }

        let (sinma, cosma) = trig::sin_cos_tenths(angle);
        let (sinma, cosma) = (i64::from(sinma), i64::from(cosma));
        let shift = trig::TRANSFORM_SHIFT;

        if zoom == i64::from(ZOOM_NONE) {
            Point::new(
                ((cosma * x - sinma * y) >> shift) as Coord + pivot.x,
                ((sinma * x + cosma * y) >> shift) as Coord + pivot.y,
            )
        } else {
            Point::new(
                (((cosma * x - sinma * y) * zoom) >> (shift + 8)) as Coord + pivot.x,
                (((sinma * x + cosma * y) * zoom) >> (shift + 8)) as Coord + pivot.y,
            )
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A 2D size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: Coord,
    pub height: Coord,
}

impl Size {
    #[inline]
    pub const fn new(width: Coord, height: Coord) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn area(&self) -> u32 {
        (self.width.max(0) as u32) * (self.height.max(0) as u32)
    }
}

/// An inclusive integer rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x1: Coord,
    pub y1: Coord,
    pub x2: Coord,
    pub y2: Coord,
}

impl Rect {
    #[inline]
    pub const fn new(x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rectangle with its top-left corner at `(x, y)` and the given size.
    #[inline]
    pub const fn from_size(x: Coord, y: Coord, width: Coord, height: Coord) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width - 1,
            y2: y + height - 1,
        }
    }

    #[inline]
    pub fn set(&mut self, x1: Coord, y1: Coord, x2: Coord, y2: Coord) {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
    }

    #[inline]
    pub fn width(&self) -> Coord {
        self.x2 - self.x1 + 1
    }

    #[inline]
    pub fn height(&self) -> Coord {
        self.y2 - self.y1 + 1
    }

    /// Change the width keeping the left edge.
    #[inline]
    pub fn set_width(&mut self, width: Coord) {
        self.x2 = self.x1 + width - 1;
    }

    /// Change the height keeping the top edge.
    #[inline]
    pub fn set_height(&mut self, height: Coord) {
        self.y2 = self.y1 + height - 1;
    }

    /// Move the top-left corner to `(x, y)` keeping the size.
    pub fn set_pos(&mut self, x: Coord, y: Coord) {
        let w = self.width();
        let h = self.height();
        self.x1 = x;
        self.y1 = y;
        self.set_width(w);
        self.set_height(h);
    }

    #[inline]
    pub fn dimensions(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    /// Number of pixels covered. Zero for inverted rectangles.
    #[inline]
    pub fn size(&self) -> u32 {
        self.dimensions().area()
    }

    #[inline]
    pub fn origin(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    #[inline]
    pub fn move_by(&mut self, dx: Coord, dy: Coord) {
        self.x1 += dx;
        self.x2 += dx;
        self.y1 += dy;
        self.y2 += dy;
    }

    /// Grow by `w_extra` on the left and right and by `h_extra` on the top and bottom.
    pub fn increase(&mut self, w_extra: Coord, h_extra: Coord) {
        self.x1 -= w_extra;
        self.x2 += w_extra;
        self.y1 -= h_extra;
        self.y2 += h_extra;
    }

    /// The common part of two rectangles, or `None` if they share no pixel.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let res = Rect::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        );

        if res.x1 > res.x2 || res.y1 > res.y2 {
            None
        } else {
            Some(res)
        }
    }

    /// Bounding rectangle of both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    #[inline]
    pub fn is_point_on(&self, point: Point) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    /// Whether the two rectangles share at least one pixel.
    #[inline]
    pub fn is_on(&self, other: &Rect) -> bool {
        self.x1 <= other.x2 && self.x2 >= other.x1 && self.y1 <= other.y2 && self.y2 >= other.y1
    }

    /// Whether every pixel of `self` lies inside `outer`.
    #[inline]
    pub fn is_in(&self, outer: &Rect) -> bool {
        self.x1 >= outer.x1 && self.y1 >= outer.y1 && self.x2 <= outer.x2 && self.y2 <= outer.y2
    }
}

/// Bounding box of a `width` x `height` image after rotation and zoom,
/// relative to the image's top-left corner.
///
/// The box is grown by two pixels on every side so antialiased edges are
/// not clipped.
pub fn transformed_area(width: Coord, height: Coord, angle: i32, zoom: u32, pivot: Point) -> Rect {
    if angle == 0 && zoom == ZOOM_NONE {
        return Rect::new(0, 0, width - 1, height - 1);
    }

    let corners = [
        Point::new(0, 0),
        Point::new(width - 1, 0),
        Point::new(0, height - 1),
        Point::new(width - 1, height - 1),
    ]
    .map(|p| p.transform(angle, zoom, pivot));

    let x1 = corners.iter().map(|p| p.x).min().unwrap_or(0);
    let x2 = corners.iter().map(|p| p.x).max().unwrap_or(0);
    let y1 = corners.iter().map(|p| p.y).min().unwrap_or(0);
    let y2 = corners.iter().map(|p| p.y).max().unwrap_or(0);

    Rect::new(x1 - 2, y1 - 2, x2 + 2, y2 + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_size() {
        let r = Rect::new(0, 0, 9, 4);
        assert_eq!(r.width(), 10);
        assert_eq!(r.height(), 5);
        assert_eq!(r.size(), 50);

        let px = Rect::new(3, 7, 3, 7);
        assert_eq!(px.width(), 1);
        assert_eq!(px.height(), 1);
    }

    #[test]
    fn test_set_width_keeps_anchor() {
        let mut r = Rect::new(5, 6, 9, 9);
        r.set_width(20);
        r.set_height(2);
        assert_eq!(r, Rect::new(5, 6, 24, 7));
    }

    #[test]
    fn test_union_and_intersect() {
        let a = Rect::new(0, 0, 9, 9);
        let b = Rect::new(5, 5, 14, 14);

        let u = a.union(&b);
        assert_eq!(u, Rect::new(0, 0, 14, 14));
        assert_eq!(u.size(), 225);
        assert!(a.is_in(&u) && b.is_in(&u));

        let i = a.intersect(&b).unwrap();
        assert_eq!(i, Rect::new(5, 5, 9, 9));
        assert_eq!(i.size(), 25);
        assert!(i.is_in(&a) && i.is_in(&b));
    }

    #[test]
    fn test_intersect_touching_edges() {
        let a = Rect::new(0, 0, 9, 9);
        let b = Rect::new(9, 9, 20, 20);
        assert_eq!(a.intersect(&b), Some(Rect::new(9, 9, 9, 9)));
        assert!(a.is_on(&b));

        let c = Rect::new(10, 0, 20, 9);
        assert_eq!(a.intersect(&c), None);
        assert!(!a.is_on(&c));
    }

    #[test]
    fn test_is_in() {
        let outer = Rect::new(0, 0, 9, 9);
        assert!(outer.is_in(&outer));
        assert!(Rect::new(2, 2, 9, 9).is_in(&outer));
        assert!(!Rect::new(2, 2, 10, 9).is_in(&outer));
    }

    #[test]
    fn test_is_point_on() {
        let r = Rect::new(0, 0, 9, 9);
        assert!(r.is_point_on(Point::new(0, 0)));
        assert!(r.is_point_on(Point::new(9, 9)));
        assert!(!r.is_point_on(Point::new(10, 5)));
    }

    #[test]
    fn test_move_and_increase() {
        let mut r = Rect::from_size(0, 0, 4, 4);
        r.move_by(10, -2);
        assert_eq!(r, Rect::new(10, -2, 13, 1));
        r.increase(1, 2);
        assert_eq!(r, Rect::new(9, -4, 14, 3));
        r.set_pos(0, 0);
        assert_eq!(r, Rect::new(0, 0, 5, 7));
    }

    #[test]
    fn test_point_transform_identity() {
        let p = Point::new(7, -3);
        assert_eq!(p.transform(0, ZOOM_NONE, Point::new(2, 2)), p);
    }

    #[test]
    fn test_point_transform_zoom() {
        let p = Point::new(10, 4).transform(0, 512, Point::ZERO);
        assert_eq!(p, Point::new(20, 8));
    }

    #[test]
    fn test_point_transform_quarter_turn() {
        let p = Point::new(10, 0).transform(900, ZOOM_NONE, Point::ZERO);
        assert!((p.x).abs() <= 1);
        assert!((p.y - 10).abs() <= 1);
    }

    #[test]
    fn test_transformed_area() {
        assert_eq!(transformed_area(8, 4, 0, ZOOM_NONE, Point::ZERO), Rect::new(0, 0, 7, 3));

        let area = transformed_area(10, 10, 450, ZOOM_NONE, Point::new(5, 5));
        assert!(area.width() > 12);
        assert!(Rect::new(0, 0, 9, 9).is_in(&area));
    }
}
