// ============================================================================
// GEOMETRY — centered view coordinates, page rectangles, projection
// ============================================================================
//
// All engine math runs in a centered coordinate system: the surface center is
// (0, 0), x grows right and y grows UP.  Device-pixel input (y down, origin at
// the top-left) is converted once at the edge via `ViewRect::to_gl_x/y`.
//
//   fold.rs — fold key points, cylinder radius and the curl mapping
// ============================================================================

pub mod fold;

pub use fold::{CurlPoint, FoldGeometry};

/// A 2-D point in centered view coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn set(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    pub fn dot(self, rhs: Point) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Unit vector, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Point> {
        let len = self.length();
        if len < 1e-6 {
            None
        } else {
            Some(Point::new(self.x / len, self.y / len))
        }
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Point {
        Point::new(-self.y, self.x)
    }

    /// Mirror this direction across a line whose unit normal is `n`.
    pub fn reflect(self, n: Point) -> Point {
        self - n * (2.0 * self.dot(n))
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Point;
    fn mul(self, k: f32) -> Point {
        Point::new(self.x * k, self.y * k)
    }
}

/// Axis-aligned rectangle in view coordinates (`top > bottom`).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self { left, right, top, bottom }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    /// Strict containment; an empty rectangle contains nothing.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.left < self.right
            && self.bottom < self.top
            && self.left <= x
            && x < self.right
            && self.bottom <= y
            && y < self.top
    }

    /// Clip the infinite line `{ p : (p - origin)·n == t }` against this
    /// rectangle.  Returns the two end points of the visible segment.
    pub fn clip_line(&self, origin: Point, n: Point, t: f32) -> Option<(Point, Point)> {
        let base = origin + n * t;
        let dir = n.perp();
        let mut lo = f32::NEG_INFINITY;
        let mut hi = f32::INFINITY;

        // Liang–Barsky against each slab.
        for (p, d, min, max) in [
            (base.x, dir.x, self.left, self.right),
            (base.y, dir.y, self.bottom, self.top),
        ] {
            if d.abs() < 1e-6 {
                if p < min || p > max {
                    return None;
                }
                continue;
            }
            let a = (min - p) / d;
            let b = (max - p) / d;
            lo = lo.max(a.min(b));
            hi = hi.min(a.max(b));
        }

        if hi - lo <= 1e-4 {
            return None;
        }
        Some((base + dir * lo, base + dir * hi))
    }
}

/// Drawable surface described in centered coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewRect {
    pub surface_width: f32,
    pub surface_height: f32,
    pub half_width: f32,
    pub half_height: f32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl ViewRect {
    pub fn new(width: u32, height: u32) -> Self {
        let mut rect = Self::default();
        rect.set(width, height);
        rect
    }

    pub fn set(&mut self, width: u32, height: u32) {
        self.surface_width = width as f32;
        self.surface_height = height as f32;
        self.half_width = self.surface_width * 0.5;
        self.half_height = self.surface_height * 0.5;
        self.left = -self.half_width;
        self.right = self.half_width;
        self.top = self.half_height;
        self.bottom = -self.half_height;
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.left, self.right, self.top, self.bottom)
    }

    /// Device x → centered x.
    pub fn to_gl_x(&self, x: f32) -> f32 {
        x - self.half_width
    }

    /// Device y (down) → centered y (up).
    pub fn to_gl_y(&self, y: f32) -> f32 {
        self.half_height - y
    }

    pub fn max_of_width_height(&self) -> f32 {
        self.surface_width.max(self.surface_height)
    }

    /// Column-major model-view-projection for this surface.
    ///
    /// Orthographic over the whole surface with the eye on +z: x and y map
    /// to clip space, z in `[-FAR/2, FAR/2]` maps to depth `1..0` so larger z
    /// is closer to the viewer.
    pub fn mvp(&self) -> [[f32; 4]; 4] {
        const FAR: f32 = 6000.0;
        let sx = if self.half_width > 0.0 { 1.0 / self.half_width } else { 0.0 };
        let sy = if self.half_height > 0.0 { 1.0 / self.half_height } else { 0.0 };
        [
            [sx, 0.0, 0.0, 0.0],
            [0.0, sy, 0.0, 0.0],
            [0.0, 0.0, -1.0 / FAR, 0.0],
            [0.0, 0.0, 0.5, 1.0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(m: &[[f32; 4]; 4], p: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0; 4];
        for (col, v) in m.iter().zip([p[0], p[1], p[2], 1.0]) {
            for (o, c) in out.iter_mut().zip(col) {
                *o += c * v;
            }
        }
        [out[0] / out[3], out[1] / out[3], out[2] / out[3]]
    }

    #[test]
    fn device_to_centered() {
        let v = ViewRect::new(800, 600);
        assert_eq!(v.to_gl_x(0.0), -400.0);
        assert_eq!(v.to_gl_y(0.0), 300.0);
        assert_eq!(v.to_gl_x(800.0), 400.0);
        assert_eq!(v.to_gl_y(600.0), -300.0);
        assert_eq!(v.max_of_width_height(), 800.0);
    }

    #[test]
    fn mvp_maps_corners_and_depth() {
        let v = ViewRect::new(800, 600);
        let m = v.mvp();
        let tr = apply(&m, [400.0, 300.0, 0.0]);
        assert!((tr[0] - 1.0).abs() < 1e-6 && (tr[1] - 1.0).abs() < 1e-6);
        assert!((tr[2] - 0.5).abs() < 1e-6);
        let near = apply(&m, [0.0, 0.0, 10.0]);
        let far = apply(&m, [0.0, 0.0, -1.0]);
        assert!(near[2] < far[2]);
    }

    #[test]
    fn clip_vertical_line() {
        let r = Rect::new(0.0, 100.0, 50.0, -50.0);
        // n = -x from origin (100, 0): line at x = 60.
        let (a, b) = r
            .clip_line(Point::new(100.0, 0.0), Point::new(-1.0, 0.0), 40.0)
            .unwrap();
        assert!((a.x - 60.0).abs() < 1e-4 && (b.x - 60.0).abs() < 1e-4);
        assert!(((a.y - b.y).abs() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn clip_outside_is_none() {
        let r = Rect::new(0.0, 100.0, 50.0, -50.0);
        assert!(
            r.clip_line(Point::new(100.0, 0.0), Point::new(-1.0, 0.0), 500.0)
                .is_none()
        );
    }

    #[test]
    fn reflect_across_x_normal() {
        let d = Point::new(1.0, 1.0).reflect(Point::new(1.0, 0.0));
        assert_eq!(d, Point::new(-1.0, 1.0));
    }
}
