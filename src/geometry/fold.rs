// ============================================================================
// FOLD GEOMETRY — key points of a cylindrical page curl
// ============================================================================
//
// Naming (all in centered view coordinates):
//
//   O   origin point      the page corner being lifted
//   T   touch point       where O is dragged to
//   M   middle point      (O + T) / 2
//
//   The fold line is the perpendicular bisector of O→T.  It crosses the
//   origin's horizontal edge at XFold and its vertical edge at YFold.  Each
//   of those has two companions at (1 - s) and (1 + s) of the way from O,
//   where s is the semi-perimeter ratio:
//
//        YFold1 ─┐
//        YFold  ─┤   curl starts at the "1" line, the half cylinder
//        YFold0 ─┤   spans "1" → "0", everything past "0" lies flat,
//                │   flipped over onto the page.
//     O ─ XFold0 ─ XFold ─ XFold1 ──────── D
//
//   Radius R = |T - O| · s / π, so the half cylinder's arc length (πR) is
//   exactly the distance between the "1" and "0" lines.
// ============================================================================

use std::f32::consts::PI;

use super::Point;

/// Curl angle bounds, in degrees.
pub const MIN_PAGE_CURL_ANGLE: f32 = 5.0;
pub const MAX_PAGE_CURL_ANGLE: f32 = 65.0;
const PAGE_CURL_ANGLE_DIFF: f32 = MAX_PAGE_CURL_ANGLE - MIN_PAGE_CURL_ANGLE;
const MAX_PAGE_CURL_ANGLE_RATIO: f32 = MAX_PAGE_CURL_ANGLE / 90.0;

/// Below this |T - O| the fold is treated as flat.
const FLAT_EPSILON: f32 = 1e-3;
const DIV_EPSILON: f32 = 1e-4;

/// Maximum tangent of the curl angle for a finger `dy` away (vertically) from
/// the page edge.  The further from the edge, the flatter the allowed curl.
pub fn tan_of_curl_angle(dy: f32, half_height: f32) -> f32 {
    let ratio = if half_height > 0.0 { dy / half_height } else { 0.0 };
    if ratio <= 1.0 - MAX_PAGE_CURL_ANGLE_RATIO {
        return MAX_PAGE_CURL_ANGLE.to_radians().tan();
    }

    let degree = MAX_PAGE_CURL_ANGLE - PAGE_CURL_ANGLE_DIFF * ratio;
    if degree < MIN_PAGE_CURL_ANGLE {
        MIN_PAGE_CURL_ANGLE.to_radians().tan()
    } else {
        degree.to_radians().tan()
    }
}

fn nonzero(v: f32) -> f32 {
    if v.abs() < DIV_EPSILON {
        DIV_EPSILON.copysign(v)
    } else {
        v
    }
}

/// A page point after the curl has been applied.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CurlPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// `sin θ` on the cylinder, 0 on flat parts.  Drives the light ramp.
    pub shade: f32,
}

impl CurlPoint {
    fn flat(p: Point) -> Self {
        Self { x: p.x, y: p.y, z: 0.0, shade: 0.0 }
    }

    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Fold state for one touch position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FoldGeometry {
    pub origin: Point,
    pub touch: Point,
    pub middle: Point,
    pub x_fold: Point,
    pub x_fold0: Point,
    pub x_fold1: Point,
    pub y_fold: Point,
    pub y_fold0: Point,
    pub y_fold1: Point,
    /// |T - O|.
    pub len_t2o: f32,
    pub radius: f32,
    /// Slope of T→O, 0 when vertical.
    pub k: f32,
    pub vertical: bool,
    /// Unit vector O→T.
    axis: Point,
    /// Distance from O (along `axis`) of the line where the curl starts.
    base: f32,
}

impl FoldGeometry {
    /// Fold with a vertical fold line: T shares O's y.
    pub fn vertical(origin: Point, diagonal_y: f32, touch_x: f32, ratio: f32) -> Self {
        let touch = Point::new(touch_x, origin.y);
        let middle = Point::new((touch_x + origin.x) * 0.5, origin.y);
        let (r0, r1) = (1.0 - ratio, 1.0 + ratio);

        let x_fold = Point::new(middle.x, origin.y);
        let x_fold0 = Point::new(origin.x + (x_fold.x - origin.x) * r0, origin.y);
        let x_fold1 = Point::new(origin.x + (x_fold.x - origin.x) * r1, origin.y);
        let y_fold = Point::new(middle.x, diagonal_y);
        let y_fold0 = Point::new(x_fold0.x, diagonal_y);
        let y_fold1 = Point::new(x_fold1.x, diagonal_y);

        let len_t2o = (touch_x - origin.x).abs();
        Self::finish(Self {
            origin,
            touch,
            middle,
            x_fold,
            x_fold0,
            x_fold1,
            y_fold,
            y_fold0,
            y_fold1,
            len_t2o,
            radius: len_t2o * ratio / PI,
            k: 0.0,
            vertical: true,
            axis: Point::default(),
            base: 0.0,
        }, ratio)
    }

    /// General fold with a slanted fold line.
    pub fn slope(origin: Point, touch: Point, ratio: f32) -> Self {
        let middle = Point::new((touch.x + origin.x) * 0.5, (touch.y + origin.y) * 0.5);
        let dx = nonzero(middle.x - origin.x);
        let dy = nonzero(middle.y - origin.y);
        let (r0, r1) = (1.0 - ratio, 1.0 + ratio);

        let x_fold = Point::new(middle.x + dy * dy / dx, origin.y);
        let x_fold0 = Point::new(origin.x + (x_fold.x - origin.x) * r0, origin.y);
        let x_fold1 = Point::new(origin.x + r1 * (x_fold.x - origin.x), origin.y);
        let y_fold = Point::new(origin.x, middle.y + dx * dx / dy);
        let y_fold0 = Point::new(origin.x, origin.y + (y_fold.y - origin.y) * r0);
        let y_fold1 = Point::new(origin.x, origin.y + r1 * (y_fold.y - origin.y));

        let len_t2o = (touch.x - origin.x).hypot(touch.y - origin.y);
        Self::finish(Self {
            origin,
            touch,
            middle,
            x_fold,
            x_fold0,
            x_fold1,
            y_fold,
            y_fold0,
            y_fold1,
            len_t2o,
            radius: len_t2o * ratio / PI,
            k: (touch.y - origin.y) / nonzero(touch.x - origin.x),
            vertical: false,
            axis: Point::default(),
            base: 0.0,
        }, ratio)
    }

    fn finish(mut self, ratio: f32) -> Self {
        self.axis = (self.touch - self.origin).normalized().unwrap_or_default();
        self.base = (1.0 + ratio) * self.len_t2o * 0.5;
        self
    }

    /// True when T sits on O: nothing is curled.
    pub fn is_flat(&self) -> bool {
        self.len_t2o < FLAT_EPSILON
    }

    pub fn axis(&self) -> Point {
        self.axis
    }

    /// Distance from O, along the O→T axis, where the curl begins.
    pub fn base(&self) -> f32 {
        self.base
    }

    /// Signed distance of `p` from O along the O→T axis.
    pub fn axial(&self, p: Point) -> f32 {
        (p - self.origin).dot(self.axis)
    }

    /// Double-page mode: pin the curl start to the spine at `spine_x` and
    /// shrink the radius so the page wraps around it instead of sliding past.
    pub fn clamp_to_spine(&mut self, spine_x: f32, page_width: f32) {
        if self.is_flat() {
            return;
        }
        let o = self.origin;
        let cos_a = nonzero((self.touch.x - o.x) / self.len_t2o);
        let ratio = 1.0 - page_width * cos_a.abs() / self.len_t2o;

        self.x_fold1.x = spine_x;
        self.radius = (self.len_t2o * (1.0 - 2.0 * ratio) / PI).max(0.0);
        self.x_fold0.x = self.len_t2o * ratio / cos_a + o.x;

        if self.vertical {
            self.y_fold0.x = self.x_fold0.x;
            self.y_fold1.x = self.x_fold1.x;
        } else {
            let k = nonzero(self.k);
            self.y_fold1.y = o.y + (self.x_fold1.x - o.x) / k;
            self.y_fold0.y = o.y + (self.x_fold0.x - o.x) / k;
        }

        self.base = (spine_x - o.x) * self.axis.x;
    }

    /// Map a flat page point onto the curled page.
    pub fn map(&self, p: Point) -> CurlPoint {
        if self.is_flat() {
            return CurlPoint::flat(p);
        }

        let t = self.axial(p);
        let d = self.base - t;
        if d <= 0.0 {
            return CurlPoint::flat(p);
        }

        let r = self.radius;
        let half_turn = PI * r;
        let (t_new, z, shade) = if d < half_turn {
            let theta = d / r;
            (self.base - r * theta.sin(), r * (1.0 - theta.cos()), theta.sin())
        } else {
            (2.0 * self.base - half_turn - t, 2.0 * r, 0.0)
        };

        let q = p + self.axis * (t_new - t);
        CurlPoint { x: q.x, y: q.y, z, shade }
    }

    /// Mirror image of `p` across the fold line, which is where flat points
    /// past the cylinder end up.
    pub fn reflect(&self, p: Point) -> Point {
        let t = self.axial(p);
        let t_new = 2.0 * self.base - PI * self.radius - t;
        p + self.axis * (t_new - t)
    }
}
